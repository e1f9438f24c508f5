//! ComputeDelegate trait: the abstraction over the computation engine.
//!
//! A delegate takes the request [`Context`] plus the deployment's product
//! list and answers with an HTTP status and a JSON body. The edge handler
//! treats it as opaque: it never looks inside the body beyond the
//! augmentation step.
//!
//! Implementations: the wasmtime-backed `WasmDelegate` in `catboard-engine`,
//! and scripted mocks in tests.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::context::Context;
use crate::error::DelegateError;

/// What the delegate answered.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DelegateResult {
    /// HTTP status to send back to the caller.
    pub status: u16,

    /// JSON-encoded response body. Untyped until parsed.
    pub body: String,
}

impl DelegateResult {
    pub fn new(status: u16, body: impl Into<String>) -> Self {
        Self {
            status,
            body: body.into(),
        }
    }
}

/// The core ComputeDelegate trait.
#[async_trait]
pub trait ComputeDelegate: Send + Sync {
    /// A human-readable name for this delegate (e.g., "wasm").
    fn name(&self) -> &str;

    /// Run the computation for one request.
    async fn compute(
        &self,
        context: &Context,
        products: &[String],
    ) -> std::result::Result<DelegateResult, DelegateError>;

    /// Perform one-time initialization ahead of the first request.
    ///
    /// Default implementation does nothing. Implementations with a costly
    /// bootstrap must make this idempotent and safe to call concurrently
    /// with [`ComputeDelegate::compute`].
    async fn warm_up(&self) -> std::result::Result<(), DelegateError> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::{Environment, RequestContext};
    use std::collections::BTreeMap;

    struct EchoDelegate;

    #[async_trait]
    impl ComputeDelegate for EchoDelegate {
        fn name(&self) -> &str {
            "echo"
        }

        async fn compute(
            &self,
            context: &Context,
            products: &[String],
        ) -> std::result::Result<DelegateResult, DelegateError> {
            let body = serde_json::json!({
                "data": { "body": context.request.body, "products": products }
            });
            Ok(DelegateResult::new(200, body.to_string()))
        }
    }

    #[tokio::test]
    async fn default_warm_up_is_noop() {
        assert!(EchoDelegate.warm_up().await.is_ok());
    }

    #[tokio::test]
    async fn delegate_sees_context_and_products() {
        let context = Context {
            request: RequestContext {
                method: "GET".into(),
                url: "http://localhost/".into(),
                headers: BTreeMap::new(),
                body: "ping".into(),
            },
            env: Environment::default(),
        };
        let result = EchoDelegate
            .compute(&context, &["Crypto.SOL/USD".to_string()])
            .await
            .unwrap();
        assert_eq!(result.status, 200);
        assert_eq!(
            result.body,
            r#"{"data":{"body":"ping","products":["Crypto.SOL/USD"]}}"#
        );
    }
}
