//! Context builder: turn an inbound request into the delegate's [`Context`].
//!
//! Headers are flattened to one value per lower-case name. A name that
//! arrives more than once keeps every value, joined in arrival order with
//! `", "`. The body is read once, fully, and must be valid UTF-8.

use axum::body::Body;
use axum::extract::Request;
use axum::http::{HeaderMap, header, request::Parts};
use std::collections::BTreeMap;

use catboard_core::{Context, Environment, PipelineError, RequestContext, Result};

/// Read the request and bundle it with the environment.
pub async fn build_context(
    request: Request,
    env: &Environment,
    max_body_bytes: usize,
) -> Result<Context> {
    let (parts, body) = request.into_parts();

    let url = absolute_url(&parts);
    let headers = flatten_headers(&parts.headers);
    let body = read_body(body, max_body_bytes).await?;

    Ok(Context {
        request: RequestContext {
            method: parts.method.as_str().to_string(),
            url,
            headers,
            body,
        },
        env: env.clone(),
    })
}

/// Collapse a header collection into a simple name → value mapping.
pub fn flatten_headers(headers: &HeaderMap) -> BTreeMap<String, String> {
    let mut flat: BTreeMap<String, String> = BTreeMap::new();
    for (name, value) in headers {
        let value = String::from_utf8_lossy(value.as_bytes());
        flat.entry(name.as_str().to_string())
            .and_modify(|existing| {
                existing.push_str(", ");
                existing.push_str(&value);
            })
            .or_insert_with(|| value.into_owned());
    }
    flat
}

/// Rebuild the absolute URL the client asked for.
fn absolute_url(parts: &Parts) -> String {
    let uri = &parts.uri;
    if uri.scheme().is_some() && uri.authority().is_some() {
        return uri.to_string();
    }

    let scheme = parts
        .headers
        .get("x-forwarded-proto")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.split(',').next())
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .unwrap_or("http");

    let host = uri
        .authority()
        .map(|a| a.as_str())
        .or_else(|| parts.headers.get(header::HOST).and_then(|v| v.to_str().ok()))
        .unwrap_or("localhost");

    let path = uri.path_and_query().map(|p| p.as_str()).unwrap_or("/");

    format!("{scheme}://{host}{path}")
}

async fn read_body(body: Body, limit: usize) -> Result<String> {
    let bytes = axum::body::to_bytes(body, limit)
        .await
        .map_err(|e| PipelineError::BodyRead(e.to_string()))?;

    String::from_utf8(bytes.to_vec())
        .map_err(|e| PipelineError::BodyRead(format!("body is not valid UTF-8: {e}")))
}
