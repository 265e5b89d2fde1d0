//! Views assembled from store records and shared by the API and monitor
//! binaries.

use std::collections::BTreeMap;

use serde::{ser::SerializeMap, Deserialize, Serialize, Serializer};
use serde_json::Value;
use strum_macros::{AsRefStr, Display, EnumIter, EnumString};

use crate::keys::setting_key;

/// Field/value pairs of a status hash.
pub type FieldMap = BTreeMap<String, String>;

/// Edge of the global topology graph. The local port is deliberately absent.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConnectionEdge {
    pub source: String,
    pub destination: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NodeListing {
    pub nodes: Vec<String>,
    pub connections: Vec<ConnectionEdge>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NodeSettings {
    pub service_aging: String,
    pub connection_aging: String,
}

/// Everything known about a single node. An unknown node is an empty shell,
/// never an error.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NodeDetail {
    pub name: String,
    pub status: FieldMap,
    pub services: BTreeMap<String, FieldMap>,
    /// Keyed by the raw `localPort::remoteHost` suffix.
    pub connections: BTreeMap<String, FieldMap>,
    pub monitoring: Option<Value>,
    pub settings: NodeSettings,
}

/// Shape of a stored configuration value.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ConfigValue {
    Scalar(String),
    List(Vec<String>),
    Hash(FieldMap),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, AsRefStr, Display)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum SettingKind {
    Array,
    Hash,
    SingleValue,
}

/// Fields of the `nagios_instance` hash.
pub const NAGIOS_INSTANCE_FIELDS: [&str; 4] = ["url", "user", "password", "expire"];

/// The fixed catalog of named settings. Adding a setting means adding a
/// variant here; writing an unknown key does not extend the catalog.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, AsRefStr, Display, EnumString, EnumIter)]
#[strum(serialize_all = "snake_case")]
pub enum Setting {
    OtherInternalNetworks,
    UserNodeAliases,
    NagiosInstance,
    NagiosUseAliases,
    ServiceAging,
    ConnectionAging,
    ServiceExpire,
    ConnectionExpire,
    ServiceHiding,
    ConnectionHiding,
}

impl Setting {
    pub fn kind(self) -> SettingKind {
        match self {
            Setting::OtherInternalNetworks => SettingKind::Array,
            Setting::UserNodeAliases | Setting::NagiosInstance => SettingKind::Hash,
            _ => SettingKind::SingleValue,
        }
    }

    /// Store key holding this setting.
    pub fn key(self) -> String {
        setting_key(self.as_ref())
    }

    pub fn default_value(self) -> Option<&'static str> {
        match self {
            Setting::ServiceAging | Setting::ConnectionAging => Some("300"),
            Setting::ServiceExpire | Setting::ConnectionExpire => Some("0"),
            Setting::ServiceHiding | Setting::ConnectionHiding => Some("7"),
            _ => None,
        }
    }

    pub fn description(self) -> &'static str {
        match self {
            Setting::OtherInternalNetworks => {
                "Networks that DOTM should consider internal. Note that private networks \
                 (127.0.0.0/8 10.0.0.0/8 172.16.0.0/12 192.168.0.0/16) are always considered \
                 internal. Separate different networks in CIDR syntax by spaces."
            }
            Setting::UserNodeAliases => {
                "Node aliases to map node names of your monitoring to a node name in DOTM"
            }
            Setting::NagiosInstance => {
                "Nagios/Icinga instance configuration. Currently only one instance is supported. \
                 The \"url\" field should point to your cgi-bin/ location (e.g. \
                 \"http://my.domain.com/icinga/cgi-bin/\"). The \"expire\" field should contain \
                 the number of seconds after which to discard old check results."
            }
            Setting::NagiosUseAliases => {
                "Set to \"1\" if Nagios/Icinga/... aliases are to be used instead of host names. \
                 You want to set this if for example you have FQDNs as Nagios host names and use \
                 short names in the Nagios alias. Default is \"0\"."
            }
            Setting::ServiceAging => {
                "Number of seconds after which a service without connections is considered \
                 unused. Default is \"300\"s."
            }
            Setting::ConnectionAging => {
                "Number of seconds after which a connection type is considered unused. Default \
                 is \"300\"s."
            }
            Setting::ServiceExpire => {
                "Number of days after which old service data should be forgotten. Default is \
                 \"0\" (never)."
            }
            Setting::ConnectionExpire => {
                "Number of days after which old connection data should be forgotten. Default is \
                 \"0\" (never)."
            }
            Setting::ServiceHiding => {
                "Number of days after which old service data should not be displayed in node \
                 graph anymore. Default is \"7\" days."
            }
            Setting::ConnectionHiding => {
                "Number of days after which old connection data should not be displayed in node \
                 graph anymore. Default is \"7\" days."
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SettingEntry {
    #[serde(skip)]
    pub setting: Setting,
    pub description: &'static str,
    #[serde(rename = "type")]
    pub kind: SettingKind,
    pub values: Option<ConfigValue>,
}

/// Resolved catalog, serialized as a map keyed by setting name in catalog
/// order.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct SettingsCatalog {
    entries: Vec<SettingEntry>,
}

impl SettingsCatalog {
    pub fn new(entries: Vec<SettingEntry>) -> Self {
        Self { entries }
    }

    pub fn entries(&self) -> &[SettingEntry] {
        &self.entries
    }

    pub fn get(&self, setting: Setting) -> Option<&SettingEntry> {
        self.entries.iter().find(|entry| entry.setting == setting)
    }
}

impl Serialize for SettingsCatalog {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.entries.len()))?;
        for entry in &self.entries {
            map.serialize_entry(entry.setting.as_ref(), entry)?;
        }
        map.end()
    }
}
