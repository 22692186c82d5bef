use crate::api::error::AppError;
use axum::{
    body::Body,
    extract::Request,
    http::{Method, StatusCode, header},
    middleware::Next,
    response::{IntoResponse, Response},
};

pub async fn security_headers(req: Request, next: Next) -> Response {
    // TRACE/TRACK echo request headers back (proxy disclosure)
    let method = req.method();
    if *method == Method::TRACE || method.as_str() == "TRACK" {
        return (StatusCode::METHOD_NOT_ALLOWED, Body::empty()).into_response();
    }

    let mut response = next.run(req).await;
    let headers = response.headers_mut();

    headers.insert(
        header::STRICT_TRANSPORT_SECURITY,
        header::HeaderValue::from_static("max-age=31536000; includeSubDomains"),
    );
    headers.insert(
        header::X_CONTENT_TYPE_OPTIONS,
        header::HeaderValue::from_static("nosniff"),
    );
    headers.insert(
        header::REFERRER_POLICY,
        header::HeaderValue::from_static("strict-origin-when-cross-origin"),
    );
    // Listing pages embed stored photos from another origin
    headers.insert(
        header::HeaderName::from_static("cross-origin-resource-policy"),
        header::HeaderValue::from_static("cross-origin"),
    );
    headers.insert(
        header::SERVER,
        header::HeaderValue::from_static("listing-uploads"),
    );

    response
}

/// Public prefix of stored uploads.
const UPLOADS_PREFIX: &str = "/uploads/";

/// Staged uploads sit next to finished ones as dotfiles. Stored names never
/// start with a dot, so no dot-prefixed segment under `/uploads` is served.
pub async fn hide_staged_uploads(req: Request, next: Next) -> Response {
    let hidden = req
        .uri()
        .path()
        .strip_prefix(UPLOADS_PREFIX)
        .is_some_and(|rest| rest.split('/').any(is_dot_segment));

    if hidden {
        return AppError::NotFound("Route not found".to_string()).into_response();
    }
    next.run(req).await
}

/// Matches both a literal and a percent-encoded leading dot.
fn is_dot_segment(segment: &str) -> bool {
    segment.starts_with('.')
        || segment
            .get(..3)
            .is_some_and(|head| head.eq_ignore_ascii_case("%2e"))
}
