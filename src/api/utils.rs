//! Request helpers shared by the handlers

use axum::body::{Body, Bytes};
use axum::http::{HeaderMap, header};
use http_body_util::{BodyExt, Limited};

use crate::api::error::ApiError;

/// Parses and validates Content-Type header for application/json
///
/// Accepts `application/json` with optional parameters; rejects look-alikes
/// such as `application/jsonp` or `text/json`.
pub fn parse_content_type(content_type: &str) -> Result<mime::Mime, ApiError> {
    let media_type: mime::Mime = content_type.parse().map_err(|_| {
        ApiError::InvalidPayload(format!("invalid Content-Type: {}", content_type))
    })?;

    if media_type.type_() != mime::APPLICATION || media_type.subtype() != mime::JSON {
        return Err(ApiError::InvalidPayload(format!(
            "Content-Type must be application/json, got: {}/{}",
            media_type.type_(),
            media_type.subtype()
        )));
    }

    Ok(media_type)
}

pub fn require_json(headers: &HeaderMap) -> Result<(), ApiError> {
    let content_type = headers
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .ok_or_else(|| ApiError::InvalidPayload("missing Content-Type header".into()))?;
    parse_content_type(content_type)?;
    Ok(())
}

/// Collect a (possibly decompressed) body, failing once it exceeds `max_size`
pub async fn read_body(body: Body, max_size: usize) -> Result<Bytes, ApiError> {
    match Limited::new(body, max_size).collect().await {
        Ok(collected) => Ok(collected.to_bytes()),
        Err(err) if err.is::<http_body_util::LengthLimitError>() => {
            Err(ApiError::PayloadTooLarge(max_size))
        }
        Err(err) => Err(ApiError::InvalidPayload(format!("unreadable body: {}", err))),
    }
}
