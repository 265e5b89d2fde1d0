use actix_web::{web, HttpRequest, HttpResponse};
use serde::Serialize;

use crate::state::AppState;

use super::{response::render, ApiError};

#[derive(Debug, Serialize)]
pub struct ReloadResponse {
    pub last_updated: i64,
}

pub async fn mon_nodes_handler(
    req: HttpRequest,
    state: web::Data<AppState>,
) -> Result<HttpResponse, ApiError> {
    let nodes = state.monitoring().list_monitored_nodes().await?;
    render(&req, "mon_nodes", Some(nodes).filter(|nodes| !nodes.is_empty()))
}

pub async fn mon_node_handler(
    req: HttpRequest,
    state: web::Data<AppState>,
    node: web::Path<String>,
) -> Result<HttpResponse, ApiError> {
    let snapshot = state.monitoring().get_monitoring_snapshot(&node).await?;
    render(&req, "mon_node", snapshot)
}

pub async fn mon_node_field_handler(
    req: HttpRequest,
    state: web::Data<AppState>,
    path: web::Path<(String, String)>,
) -> Result<HttpResponse, ApiError> {
    let (node, key) = path.into_inner();
    let field = state.monitoring().get_monitoring_field(&node, &key).await?;
    render(&req, "mon_node_field", field)
}

pub async fn mon_services_handler(
    req: HttpRequest,
    state: web::Data<AppState>,
    node: web::Path<String>,
) -> Result<HttpResponse, ApiError> {
    let history = state.monitoring().get_monitoring_services(&node).await?;
    render(
        &req,
        "mon_services",
        Some(history).filter(|history| !history.is_empty()),
    )
}

pub async fn mon_reload_handler(
    req: HttpRequest,
    state: web::Data<AppState>,
) -> Result<HttpResponse, ApiError> {
    let outcome = state.coordinator().request_refresh().await?;
    // An uninitialized clock has no timestamp yet and answers 404.
    let body = outcome
        .last_updated()
        .map(|last_updated| ReloadResponse { last_updated });
    render(&req, "mon_reload", body)
}
