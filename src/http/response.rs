//! Response handling and error mapping.
//!
//! # Responsibilities
//! - Map relay failures to status codes (503 unreachable, 500 no hijack)
//! - Render errors as plain text including their whole source chain
//! - Copy upstream headers without dropping or merging values

use std::error::Error as StdError;

use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};

/// Message sent when the connection cannot be taken over for a tunnel.
pub const HIJACK_UNSUPPORTED: &str = "Hijacking not supported";

/// Plain-text error response.
pub fn error_response(status: StatusCode, message: impl Into<String>) -> Response {
    (status, message.into()).into_response()
}

/// 503 for a destination that could not be reached or did not answer.
pub fn service_unavailable(err: &(dyn StdError + 'static)) -> Response {
    error_response(StatusCode::SERVICE_UNAVAILABLE, error_text(err))
}

/// Render an error followed by each of its sources, `: ` separated.
pub fn error_text(err: &(dyn StdError + 'static)) -> String {
    let mut text = err.to_string();
    let mut source = err.source();
    while let Some(cause) = source {
        let cause_text = cause.to_string();
        // Some wrappers already embed their source in the message.
        if !text.ends_with(&cause_text) {
            text.push_str(": ");
            text.push_str(&cause_text);
        }
        source = cause.source();
    }
    text
}

/// Append every header value from `src` to `dst`, keeping repeats.
pub fn copy_headers(dst: &mut HeaderMap, src: &HeaderMap) {
    for (name, value) in src {
        dst.append(name, value.clone());
    }
}
