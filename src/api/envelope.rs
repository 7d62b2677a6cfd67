//! Error envelope rendering
//!
//! Handlers and extractors fail with [`AppError`](crate::error::AppError),
//! which tags its response with an [`ErrorReport`]. This middleware turns
//! that report into the client-facing body for the request's language and
//! the deployment environment. Headers already on the response, such as
//! cleared cookies, are kept.

use axum::{
    body::Body,
    extract::{Request, State},
    http::{
        header::{CONTENT_LENGTH, CONTENT_TYPE},
        HeaderValue,
    },
    middleware::Next,
    response::Response,
};

use crate::{error::ErrorReport, i18n::Lang, AppState};

pub async fn render_errors(
    State(state): State<AppState>,
    lang: Lang,
    request: Request,
    next: Next,
) -> Response {
    let method = request.method().clone();
    let uri = request.uri().clone();
    let response = next.run(request).await;

    let Some(report) = response.extensions().get::<ErrorReport>().cloned() else {
        return response;
    };

    if report.status.is_server_error() {
        tracing::error!(%method, %uri, status = %report.status, "{}", report.stack);
    } else {
        tracing::debug!(%method, %uri, status = %report.status, key = %report.key, "Request rejected");
    }

    let body = report.render(lang, state.config.app.is_production());
    let bytes = match serde_json::to_vec(&body) {
        Ok(bytes) => bytes,
        Err(e) => {
            tracing::error!("Failed to serialize error body: {}", e);
            return response;
        }
    };

    let (mut parts, _) = response.into_parts();
    parts.headers.remove(CONTENT_LENGTH);
    parts
        .headers
        .insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
    Response::from_parts(parts, Body::from(bytes))
}
