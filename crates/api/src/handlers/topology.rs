use actix_web::{web, HttpRequest, HttpResponse};

use crate::state::AppState;

use super::{response::render, ApiError};

pub async fn nodes_handler(
    req: HttpRequest,
    state: web::Data<AppState>,
) -> Result<HttpResponse, ApiError> {
    let listing = state.topology().list_nodes().await?;
    render(&req, "nodes", Some(listing))
}

pub async fn node_handler(
    req: HttpRequest,
    state: web::Data<AppState>,
    name: web::Path<String>,
) -> Result<HttpResponse, ApiError> {
    let detail = state.topology().get_node(&name).await?;
    render(&req, "node", Some(detail))
}

pub async fn settings_handler(
    req: HttpRequest,
    state: web::Data<AppState>,
) -> Result<HttpResponse, ApiError> {
    let catalog = state.settings().get_settings_catalog().await?;
    render(&req, "settings", Some(catalog))
}
