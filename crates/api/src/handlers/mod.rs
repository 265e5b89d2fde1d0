pub mod config;
pub mod metrics;
pub mod monitoring;
pub mod response;
pub mod topology;

pub use config::{config_handler, config_value_handler, set_config_handler};
pub use metrics::metrics_handler;
pub use monitoring::{
    mon_node_field_handler, mon_node_handler, mon_nodes_handler, mon_reload_handler,
    mon_services_handler,
};
pub use topology::{node_handler, nodes_handler, settings_handler};

use actix_web::{http::StatusCode, HttpResponse, ResponseError};
use serde::Serialize;
use thiserror::Error;

use dotm_domain::services::ConfigWriteError;
use dotm_domain::storage::StorageError;
use dotm_monitor::RefreshError;

use response::cache_control;

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("Not Found")]
    NotFound,
    #[error("No callback function provided")]
    MissingCallback,
    #[error("Invalid callback function name")]
    InvalidCallback,
    #[error("Wrong POST data format: {0}")]
    BadPayload(String),
    #[error("monitoring refresh failed: {0}")]
    Refresh(#[from] RefreshError),
    #[error("storage failure: {0}")]
    Storage(#[from] StorageError),
    #[error("failed to encode response: {0}")]
    Encode(#[from] serde_json::Error),
}

impl From<ConfigWriteError> for ApiError {
    fn from(err: ConfigWriteError) -> Self {
        match err {
            ConfigWriteError::Storage(err) => ApiError::Storage(err),
            other => ApiError::BadPayload(other.to_string()),
        }
    }
}

impl ResponseError for ApiError {
    fn status_code(&self) -> StatusCode {
        match self {
            ApiError::NotFound => StatusCode::NOT_FOUND,
            ApiError::MissingCallback | ApiError::InvalidCallback | ApiError::BadPayload(_) => {
                StatusCode::BAD_REQUEST
            }
            ApiError::Refresh(_) => StatusCode::SERVICE_UNAVAILABLE,
            ApiError::Storage(_) | ApiError::Encode(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn error_response(&self) -> HttpResponse {
        let status = self.status_code();
        HttpResponse::build(status)
            .insert_header(cache_control())
            .json(ErrorBody::new(status, self.to_string()))
    }
}

/// `{"error": {"message": ..., "status_code": ...}}`
#[derive(Debug, Serialize)]
pub struct ErrorBody {
    pub error: ErrorDetail,
}

#[derive(Debug, Serialize)]
pub struct ErrorDetail {
    pub message: String,
    pub status_code: u16,
}

impl ErrorBody {
    pub fn new(status: StatusCode, message: impl Into<String>) -> Self {
        Self {
            error: ErrorDetail {
                message: message.into(),
                status_code: status.as_u16(),
            },
        }
    }
}
