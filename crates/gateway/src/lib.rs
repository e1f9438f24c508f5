//! HTTP edge handler for Catboard.
//!
//! Every request, on any path and with any method, runs the same
//! pipeline:
//!
//! 1. [`context::build_context`]: snapshot the request plus environment
//! 2. [`ComputeDelegate::compute`]: run the computation
//! 3. [`augment::augment`]: inject embeds and components into `data`
//! 4. [`emit::emit`]: answer with the delegate's status and JSON
//!
//! Any failure short-circuits to `500 text/plain` with the error text.
//!
//! Built on Axum for high performance async HTTP.

pub mod augment;
pub mod context;
pub mod emit;

use axum::extract::{Request, State};
use axum::response::Response;
use axum::Router;
use std::sync::Arc;
use tracing::{debug, error, info};

use catboard_core::{ComputeDelegate, Environment, Presentation};
use catboard_engine::WasmDelegate;

/// Shared, read-only state for every request.
pub struct EdgeState {
    pub delegate: Arc<dyn ComputeDelegate>,
    pub environment: Environment,
    pub products: Vec<String>,
    pub presentation: Presentation,
    pub max_body_bytes: usize,
}

impl EdgeState {
    /// Build the state from configuration around an existing delegate.
    pub fn from_config(
        config: &catboard_config::AppConfig,
        delegate: Arc<dyn ComputeDelegate>,
    ) -> Self {
        Self {
            delegate,
            environment: config.environment.to_environment(),
            products: config.products.clone(),
            presentation: config.presentation.clone(),
            max_body_bytes: config.gateway.max_body_bytes,
        }
    }
}

pub type SharedState = Arc<EdgeState>;

/// Build the Axum router: one fallback handler for every path and method.
pub fn build_router(state: SharedState) -> Router {
    Router::new()
        .fallback(edge_handler)
        .layer(tower_http::trace::TraceLayer::new_for_http())
        .with_state(state)
}

/// Run the four pipeline stages in order.
pub async fn run_pipeline(state: &EdgeState, request: Request) -> catboard_core::Result<Response> {
    let context =
        context::build_context(request, &state.environment, state.max_body_bytes).await?;

    debug!(
        method = %context.request.method,
        url = %context.request.url,
        content_type = context.request.header("content-type").unwrap_or("-"),
        body_len = context.request.body.len(),
        delegate = state.delegate.name(),
        "Delegating request"
    );

    let result = state.delegate.compute(&context, &state.products).await?;
    let body = augment::augment(&result.body, &state.presentation)?;

    emit::emit(result.status, body)
}

async fn edge_handler(State(state): State<SharedState>, request: Request) -> Response {
    match run_pipeline(&state, request).await {
        Ok(response) => response,
        Err(e) => {
            error!(error = %e, "Request pipeline failed");
            emit::emit_failure(&e)
        }
    }
}

/// Start the edge HTTP server.
///
/// The WASM module is compiled once per process: at startup when
/// `engine.eager_init` is set, otherwise by the first request.
pub async fn start(config: catboard_config::AppConfig) -> Result<(), Box<dyn std::error::Error>> {
    let addr = format!("{}:{}", config.gateway.host, config.gateway.port);

    let delegate = Arc::new(WasmDelegate::from_config(&config.engine));
    if config.engine.eager_init {
        delegate.warm_up().await?;
        info!(path = %config.engine.wasm_path.display(), "Computation module ready");
    }

    let state = Arc::new(EdgeState::from_config(&config, delegate));
    let app = build_router(state);

    info!(
        addr = %addr,
        products = config.products.len(),
        symbols = config.environment.symbols.len(),
        "Edge handler starting"
    );
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
