use actix_web::{web, HttpRequest, HttpResponse};
use serde_json::{Map, Value};

use crate::state::AppState;

use super::{response::render, ApiError};

pub async fn config_handler(
    req: HttpRequest,
    state: web::Data<AppState>,
) -> Result<HttpResponse, ApiError> {
    let config = state.settings().get_config().await?;
    render(&req, "config", Some(config))
}

pub async fn config_value_handler(
    req: HttpRequest,
    state: web::Data<AppState>,
    variable: web::Path<String>,
) -> Result<HttpResponse, ApiError> {
    let variable = variable.into_inner();
    let body = state
        .settings()
        .get_config_value(&variable)
        .await?
        .filter(|value| !value.is_empty())
        .map(|value| {
            let mut single = Map::new();
            single.insert(variable, Value::String(value));
            single
        });
    render(&req, "config_value", body)
}

/// Stores a flat JSON object of settings and echoes it back.
pub async fn set_config_handler(
    req: HttpRequest,
    state: web::Data<AppState>,
    body: web::Bytes,
) -> Result<HttpResponse, ApiError> {
    let payload: Value =
        serde_json::from_slice(&body).map_err(|err| ApiError::BadPayload(err.to_string()))?;
    state.settings().set_config(&payload).await?;
    render(&req, "set_config", Some(payload))
}
