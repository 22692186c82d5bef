use crate::api::error::{ErrorDetail, ErrorResponse};
use crate::config::RuntimeMode;
use axum::{
    body::{Body, to_bytes},
    extract::{Request, State},
    http::header,
    middleware::Next,
    response::Response,
};

/// Error bodies are tiny; anything larger is passed through untouched.
const MAX_ENVELOPE_BYTES: usize = 64 * 1024;

/// Adds the `stack` field to error envelopes outside production and always
/// strips the internal [`ErrorDetail`] extension.
pub async fn error_envelope(
    State(mode): State<RuntimeMode>,
    req: Request,
    next: Next,
) -> Response {
    let mut response = next.run(req).await;

    let Some(ErrorDetail(stack)) = response.extensions_mut().remove::<ErrorDetail>() else {
        return response;
    };
    if mode.is_production() {
        return response;
    }

    let (mut parts, body) = response.into_parts();
    let bytes = match to_bytes(body, MAX_ENVELOPE_BYTES).await {
        Ok(bytes) => bytes,
        Err(e) => {
            tracing::warn!("Could not buffer error body: {}", e);
            return Response::from_parts(parts, Body::empty());
        }
    };

    let Ok(mut envelope) = serde_json::from_slice::<ErrorResponse>(&bytes) else {
        return Response::from_parts(parts, Body::from(bytes));
    };
    envelope.stack = Some(stack);

    match serde_json::to_vec(&envelope) {
        Ok(body) => {
            parts.headers.remove(header::CONTENT_LENGTH);
            Response::from_parts(parts, Body::from(body))
        }
        Err(_) => Response::from_parts(parts, Body::from(bytes)),
    }
}
