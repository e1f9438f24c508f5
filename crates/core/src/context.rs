//! The context handed to the computation delegate.
//!
//! A [`Context`] is a normalized snapshot of one inbound request plus the
//! process-wide [`Environment`]. It serializes to the JSON shape
//! computation modules consume:
//!
//! ```json
//! {
//!   "request": { "method": "POST", "url": "http://host/", "headers": {}, "body": "" },
//!   "env": { "PUBLIC_KEY": "...", "SYMBOLS": "Crypto.SOL/USD,Crypto.BTC/USD" }
//! }
//! ```

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::collections::BTreeMap;

/// Snapshot of one inbound HTTP request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RequestContext {
    pub method: String,

    /// Absolute URL, including query string.
    pub url: String,

    /// Lower-case header names. Repeated headers are joined with `", "`.
    pub headers: BTreeMap<String, String>,

    /// Raw request payload decoded as UTF-8.
    pub body: String,
}

impl RequestContext {
    /// Look up a header by name, case-insensitively.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .get(&name.to_ascii_lowercase())
            .map(String::as_str)
    }
}

/// Static deployment values shared by every request.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Environment {
    #[serde(rename = "PUBLIC_KEY")]
    pub public_key: String,

    #[serde(
        rename = "SYMBOLS",
        serialize_with = "join_symbols",
        deserialize_with = "split_symbols"
    )]
    pub symbols: Vec<String>,
}

impl Environment {
    pub fn new(public_key: impl Into<String>, symbols: Vec<String>) -> Self {
        Self {
            public_key: public_key.into(),
            symbols,
        }
    }
}

fn join_symbols<S: Serializer>(symbols: &[String], serializer: S) -> Result<S::Ok, S::Error> {
    serializer.serialize_str(&symbols.join(","))
}

fn split_symbols<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<String>, D::Error> {
    let raw = String::deserialize(deserializer)?;
    Ok(raw
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(String::from)
        .collect())
}

/// Everything the delegate sees for one request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Context {
    pub request: RequestContext,
    pub env: Environment,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> Context {
        let mut headers = BTreeMap::new();
        headers.insert("content-type".to_string(), "application/json".to_string());
        headers.insert("x-test".to_string(), "1, 2".to_string());
        Context {
            request: RequestContext {
                method: "POST".into(),
                url: "http://localhost/interactions".into(),
                headers,
                body: "hello".into(),
            },
            env: Environment::new(
                "abc123",
                vec!["Crypto.SOL/USD".into(), "Crypto.BTC/USD".into()],
            ),
        }
    }

    #[test]
    fn env_serializes_with_upper_case_keys() {
        let json = serde_json::to_value(sample()).unwrap();
        assert_eq!(json["env"]["PUBLIC_KEY"], "abc123");
        assert_eq!(json["env"]["SYMBOLS"], "Crypto.SOL/USD,Crypto.BTC/USD");
        assert_eq!(json["request"]["headers"]["x-test"], "1, 2");
        assert_eq!(json["request"]["body"], "hello");
    }

    #[test]
    fn symbols_parse_from_comma_list() {
        let env: Environment =
            serde_json::from_str(r#"{"PUBLIC_KEY":"k","SYMBOLS":"A/USD, B/USD,,"}"#).unwrap();
        assert_eq!(env.symbols, vec!["A/USD".to_string(), "B/USD".to_string()]);
    }

    #[test]
    fn empty_symbols_serialize_as_empty_string() {
        let json = serde_json::to_value(Environment::default()).unwrap();
        assert_eq!(json["SYMBOLS"], "");
    }

    #[test]
    fn header_lookup_is_case_insensitive() {
        let ctx = sample();
        assert_eq!(ctx.request.header("Content-Type"), Some("application/json"));
        assert_eq!(ctx.request.header("x-missing"), None);
    }
}
