//! Response emitter: wrap the final body into an HTTP response.

use axum::http::{StatusCode, header};
use axum::response::{IntoResponse, Response};

use catboard_core::{PipelineError, Result};

/// Statuses a final response may carry.
const VALID_STATUS: std::ops::RangeInclusive<u16> = 200..=599;

/// Build the success response: the delegate's status, a JSON body.
pub fn emit(status: u16, body: String) -> Result<Response> {
    if !VALID_STATUS.contains(&status) {
        return Err(PipelineError::InvalidStatus(status));
    }
    let status = StatusCode::from_u16(status).map_err(|_| PipelineError::InvalidStatus(status))?;

    Ok((status, [(header::CONTENT_TYPE, "application/json")], body).into_response())
}

/// Build the uniform failure response for any pipeline error.
pub fn emit_failure(error: &PipelineError) -> Response {
    (
        StatusCode::INTERNAL_SERVER_ERROR,
        [(header::CONTENT_TYPE, "text/plain")],
        error.to_string(),
    )
        .into_response()
}
