//! JSON-over-HTTP surface for [`LinkPreviewService`].

use crate::{LinkPreviewService, Parser};
use axum::body::Bytes;
use axum::extract::State;
use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::post;
use axum::Router;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{error, warn};

/// Body sent for every resolve failure, whatever the cause.
pub const INVALID_URL_BODY: &str = r#"{"status":"FAILED","message":"Invalid URL"}"#;

/// Mounts [`handle_preview`] at `POST /preview`.
pub fn router<P: Parser>(service: Arc<LinkPreviewService<P>>) -> Router {
    Router::new()
        .route("/preview", post(handle_preview::<P>))
        .with_state(service)
}

/// Expects `{"url": "..."}` and answers with the preview JSON.
///
/// A body that is not a JSON object of strings gets an empty 400.
pub async fn handle_preview<P: Parser>(
    State(service): State<Arc<LinkPreviewService<P>>>,
    body: Bytes,
) -> Response {
    let input: HashMap<String, String> = match serde_json::from_slice(&body) {
        Ok(input) => input,
        Err(e) => {
            warn!(error = %e, "Invalid json input");
            return StatusCode::BAD_REQUEST.into_response();
        }
    };

    let Some(input_url) = input.get("url") else {
        return failed();
    };

    match service.resolve(input_url).await {
        Ok(info) => match serde_json::to_string(&info) {
            Ok(json) => json_response(StatusCode::OK, json),
            Err(e) => {
                error!(error = %e, "Failed to serialize preview");
                failed()
            }
        },
        Err(e) => {
            warn!(url = %input_url, "Invalid URL provided");
            e.log();
            failed()
        }
    }
}

fn failed() -> Response {
    json_response(StatusCode::INTERNAL_SERVER_ERROR, INVALID_URL_BODY.to_string())
}

fn json_response(status: StatusCode, body: String) -> Response {
    (status, [(header::CONTENT_TYPE, "application/json")], body).into_response()
}
