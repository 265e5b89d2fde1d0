//! JSON / JSONP rendering shared by every read endpoint.

use actix_web::{
    http::{
        header::{self, CacheControl, CacheDirective},
        StatusCode,
    },
    web, HttpRequest, HttpResponse,
};
use metrics::counter;
use serde::{Deserialize, Serialize};

use super::{ApiError, ErrorBody};

const JSON: &str = "application/json";
const JAVASCRIPT: &str = "application/javascript";

#[derive(Debug, Deserialize)]
struct JsonpQuery {
    callback: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Format {
    Json,
    /// Body wrapped as `callback(body)`.
    Jsonp(String),
}

impl Format {
    /// The first of `application/json` or `application/javascript` listed in
    /// `Accept` wins; anything else falls back to JSON.
    pub fn negotiate(req: &HttpRequest) -> Result<Self, ApiError> {
        let accept = req
            .headers()
            .get(header::ACCEPT)
            .and_then(|value| value.to_str().ok())
            .unwrap_or_default();
        let wants_script = accept
            .split(',')
            .map(|item| item.split(';').next().unwrap_or_default().trim())
            .find(|media| *media == JSON || *media == JAVASCRIPT)
            == Some(JAVASCRIPT);
        if !wants_script {
            return Ok(Format::Json);
        }

        let callback = web::Query::<JsonpQuery>::from_query(req.query_string())
            .ok()
            .and_then(|query| query.into_inner().callback)
            .filter(|callback| !callback.is_empty())
            .ok_or(ApiError::MissingCallback)?;
        if !is_callback_name(&callback) {
            return Err(ApiError::InvalidCallback);
        }
        Ok(Format::Jsonp(callback))
    }
}

pub fn cache_control() -> CacheControl {
    CacheControl(vec![CacheDirective::MaxAge(30), CacheDirective::MustRevalidate])
}

/// Renders `body` in the negotiated format; `None` becomes a 404.
pub fn render<T: Serialize>(
    req: &HttpRequest,
    endpoint: &'static str,
    body: Option<T>,
) -> Result<HttpResponse, ApiError> {
    let format = Format::negotiate(req)?;
    let status = if body.is_some() {
        StatusCode::OK
    } else {
        StatusCode::NOT_FOUND
    };
    counter!("api_requests_total", "endpoint" => endpoint, "status" => status.as_str().to_string())
        .increment(1);

    match (format, body) {
        (Format::Json, Some(body)) => Ok(HttpResponse::Ok()
            .insert_header(cache_control())
            .json(body)),
        (Format::Json, None) => Err(ApiError::NotFound),
        (Format::Jsonp(callback), body) => {
            let payload = match body {
                Some(body) => serde_json::to_string(&body),
                None => serde_json::to_string(&ErrorBody::new(status, "Not Found")),
            }?;
            Ok(HttpResponse::build(status)
                .insert_header(cache_control())
                .content_type(JAVASCRIPT)
                .body(format!("{callback}({payload})")))
        }
    }
}

/// Dotted JavaScript identifier path such as `jQuery.cb_1`.
fn is_callback_name(name: &str) -> bool {
    name.split('.').all(|part| {
        let mut chars = part.chars();
        matches!(chars.next(), Some(c) if c.is_ascii_alphabetic() || c == '_' || c == '$')
            && chars.all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '$')
    })
}
