//! Named settings with documented defaults, plus the raw configuration hash.

use std::{str::FromStr, sync::Arc, time::Duration};

use serde_json::Value;
use strum::IntoEnumIterator;
use thiserror::Error;
use tracing::{debug, warn};

use crate::keys::CONFIG_KEY;
use crate::model::{
    ConfigValue, FieldMap, Setting, SettingEntry, SettingKind, SettingsCatalog,
    NAGIOS_INSTANCE_FIELDS,
};
use crate::storage::{KeyValueStore, StorageError, StorageResult};

/// Errors emitted when a configuration write is refused. Nothing is written
/// when any of these is returned.
#[derive(Debug, Error)]
pub enum ConfigWriteError {
    #[error("configuration payload must be a JSON object")]
    NotAnObject,
    #[error("configuration payload is empty")]
    Empty,
    #[error("configuration value for `{0}` is not a scalar")]
    NonScalar(String),
    #[error("configuration value for `{name}` rejected: {reason}")]
    Rejected { name: String, reason: String },
    #[error("storage error: {0}")]
    Storage(#[from] StorageError),
}

/// Per-entry check run before any configuration key is written.
pub trait ConfigValidator: Send + Sync {
    fn validate(&self, name: &str, value: &str) -> Result<(), ConfigWriteError>;
}

/// Accepts every name and value as-is.
#[derive(Debug, Default, Clone, Copy)]
pub struct AcceptAll;

impl ConfigValidator for AcceptAll {
    fn validate(&self, _name: &str, _value: &str) -> Result<(), ConfigWriteError> {
        Ok(())
    }
}

#[derive(Clone)]
pub struct SettingsResolver<S> {
    store: S,
    validator: Arc<dyn ConfigValidator>,
}

impl<S: KeyValueStore> SettingsResolver<S> {
    pub fn new(store: S) -> Self {
        Self::with_validator(store, Arc::new(AcceptAll))
    }

    pub fn with_validator(store: S, validator: Arc<dyn ConfigValidator>) -> Self {
        Self { store, validator }
    }

    /// Stored value of `key`, or `default` when the key is absent. A stored
    /// empty string or `"0"` is returned as-is.
    pub async fn get_scalar_or_default(&self, key: &str, default: &str) -> StorageResult<String> {
        Ok(self
            .store
            .get(key)
            .await?
            .unwrap_or_else(|| default.to_string()))
    }

    /// Resolves one catalog setting, applying its default.
    pub async fn setting(&self, setting: Setting) -> StorageResult<Option<ConfigValue>> {
        let key = setting.key();
        let value = match setting {
            Setting::OtherInternalNetworks => {
                Some(ConfigValue::List(self.store.list_range(&key).await?))
            }
            Setting::UserNodeAliases => Some(ConfigValue::Hash(self.store.hash_get_all(&key).await?)),
            Setting::NagiosInstance => {
                let mut fields = FieldMap::new();
                for field in NAGIOS_INSTANCE_FIELDS {
                    if let Some(value) = self.store.hash_get(&key, field).await? {
                        fields.insert(field.to_string(), value);
                    }
                }
                Some(ConfigValue::Hash(fields))
            }
            scalar => match scalar.default_value() {
                Some(default) => Some(ConfigValue::Scalar(
                    self.get_scalar_or_default(&key, default).await?,
                )),
                None => self.store.get(&key).await?.map(ConfigValue::Scalar),
            },
        };
        Ok(value)
    }

    /// Resolved scalar setting as a string, using the catalog default.
    pub async fn scalar(&self, setting: Setting) -> StorageResult<String> {
        self.get_scalar_or_default(&setting.key(), setting.default_value().unwrap_or_default())
            .await
    }

    pub async fn get_settings_catalog(&self) -> StorageResult<SettingsCatalog> {
        let mut entries = Vec::new();
        for setting in Setting::iter() {
            entries.push(SettingEntry {
                setting,
                description: setting.description(),
                kind: setting.kind(),
                values: self.setting(setting).await?,
            });
        }
        Ok(SettingsCatalog::new(entries))
    }

    pub async fn get_config(&self) -> StorageResult<FieldMap> {
        self.store.hash_get_all(CONFIG_KEY).await
    }

    pub async fn get_config_value(&self, name: &str) -> StorageResult<Option<String>> {
        self.store.hash_get(CONFIG_KEY, name).await
    }

    /// Writes a flat `name -> scalar` mapping. The whole payload is checked
    /// before the first write; the writes themselves are not transactional.
    pub async fn set_config(&self, payload: &Value) -> Result<FieldMap, ConfigWriteError> {
        let object = payload.as_object().ok_or(ConfigWriteError::NotAnObject)?;
        if object.is_empty() {
            return Err(ConfigWriteError::Empty);
        }

        let mut entries = FieldMap::new();
        for (name, value) in object {
            let value = scalar_to_string(value)
                .ok_or_else(|| ConfigWriteError::NonScalar(name.clone()))?;
            self.validator.validate(name, &value)?;
            entries.insert(name.clone(), value);
        }

        for (name, value) in &entries {
            self.store.hash_set(CONFIG_KEY, name, value).await?;
            if let Ok(setting) = Setting::from_str(name) {
                if setting.kind() == SettingKind::SingleValue {
                    self.store.set(&setting.key(), value).await?;
                }
            }
            debug!(%name, "configuration value written");
        }
        Ok(entries)
    }

    /// Lifetime of cached monitoring records: `nagios_instance.expire` when
    /// stored as a positive number of seconds, else `fallback`.
    pub async fn monitoring_expiry(&self, fallback: Duration) -> StorageResult<Duration> {
        let raw = self
            .store
            .hash_get(&Setting::NagiosInstance.key(), "expire")
            .await?;
        let Some(raw) = raw else {
            return Ok(fallback);
        };
        match raw.trim().parse::<u64>() {
            Ok(secs) if secs > 0 => Ok(Duration::from_secs(secs)),
            _ => {
                warn!(value = %raw, "ignoring invalid nagios_instance expire");
                Ok(fallback)
            }
        }
    }

    /// Monitoring host name -> DOTM node name.
    pub async fn node_aliases(&self) -> StorageResult<FieldMap> {
        self.store
            .hash_get_all(&Setting::UserNodeAliases.key())
            .await
    }

    pub async fn use_monitoring_aliases(&self) -> StorageResult<bool> {
        Ok(self
            .store
            .get(&Setting::NagiosUseAliases.key())
            .await?
            .is_some_and(|value| value.trim() == "1"))
    }
}

fn scalar_to_string(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(if *b { "1" } else { "0" }.to_string()),
        _ => None,
    }
}
