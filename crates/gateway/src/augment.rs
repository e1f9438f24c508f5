//! Response augmenter: overwrite `data.embeds` and `data.components`.
//!
//! Only the top level and `data` are decoded, and only down to their keys.
//! Every other value is carried as its original text, so numbers, escapes
//! and nesting leave exactly as the delegate wrote them. Key order is kept.

use indexmap::IndexMap;
use serde_json::value::{RawValue, to_raw_value};
use tracing::debug;

use catboard_core::{AugmentError, Presentation, Result};

/// A JSON object whose values are kept undecoded.
type RawObject = IndexMap<String, Box<RawValue>>;

/// Decode `body`, inject the presentation into `data`, and re-encode it.
pub fn augment(body: &str, presentation: &Presentation) -> Result<String> {
    let top: Box<RawValue> = serde_json::from_str(body).map_err(AugmentError::InvalidJson)?;
    let mut payload = as_object(&top).ok_or(AugmentError::NotAnObject)?;

    let raw_data = payload.get("data").ok_or(AugmentError::MissingData)?;
    let mut data = as_object(raw_data).ok_or(AugmentError::MissingData)?;

    data.insert("embeds".to_string(), to_raw_value(&presentation.embeds())?);
    data.insert(
        "components".to_string(),
        to_raw_value(&presentation.components())?,
    );

    debug!(data = ?data, "Augmented response data");

    payload.insert("data".to_string(), to_raw_value(&data)?);

    let augmented = serde_json::to_string(&payload)?;
    debug!(body = %augmented, "Augmented response body");

    Ok(augmented)
}

/// Split a raw JSON object into its members, or `None` if it is not an object.
fn as_object(raw: &RawValue) -> Option<RawObject> {
    serde_json::from_str(raw.get()).ok()
}
