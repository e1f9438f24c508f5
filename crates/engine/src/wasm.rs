//! WASM computation delegate: run a compiled module in a wasmtime sandbox.
//!
//! The module is compiled once per process, on first use or at startup
//! via [`ComputeDelegate::warm_up`]. Compilation sits behind a
//! single-flight cell: concurrent first requests all await the same
//! compilation. Every computation then gets a fresh `Store` and instance,
//! so nothing leaks between requests.
//!
//! # Module Interface
//!
//! The module must export:
//! - `(memory (export "memory"))`: shared linear memory
//! - `(func (export "alloc") (param i32) (result i32))`: allocator
//! - `(func (export "compute") (param i32 i32) (result i32))`
//!
//! The host writes `{"context": .., "products": [..]}` as UTF-8 JSON into
//! a buffer obtained from `alloc`, calls `compute(ptr, len)`, and reads a
//! NUL-terminated JSON string `{"status": u16, "body": "<json text>"}` at
//! the returned pointer.

use async_trait::async_trait;
use serde::Serialize;
use std::path::PathBuf;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use tokio::sync::OnceCell;
use tracing::{debug, info};
use wasmtime::*;

use catboard_config::EngineConfig;
use catboard_core::delegate::{ComputeDelegate, DelegateResult};
use catboard_core::error::DelegateError;
use catboard_core::Context;

const DELEGATE_NAME: &str = "wasm";

/// Where the module bytes come from.
#[derive(Clone)]
enum ModuleSource {
    File(PathBuf),
    Bytes(Arc<[u8]>),
}

impl std::fmt::Display for ModuleSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ModuleSource::File(path) => write!(f, "{}", path.display()),
            ModuleSource::Bytes(bytes) => write!(f, "<{} inline bytes>", bytes.len()),
        }
    }
}

/// Per-computation resource limits.
#[derive(Debug, Clone, Copy)]
struct Limits {
    max_memory_bytes: usize,
    max_fuel: u64,
    timeout_ms: u64,
}

impl From<&EngineConfig> for Limits {
    fn from(config: &EngineConfig) -> Self {
        Self {
            max_memory_bytes: config.max_memory_bytes,
            max_fuel: config.max_fuel,
            timeout_ms: config.timeout_ms,
        }
    }
}

/// A compiled module together with the engine that owns it.
struct Compiled {
    engine: Engine,
    module: Module,
}

#[derive(Serialize)]
struct ComputeInput<'a> {
    context: &'a Context,
    products: &'a [String],
}

/// A [`ComputeDelegate`] backed by a WASM module.
pub struct WasmDelegate {
    source: ModuleSource,
    limits: Limits,
    compiled: OnceCell<Arc<Compiled>>,
    compilations: AtomicUsize,
}

impl std::fmt::Debug for WasmDelegate {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WasmDelegate")
            .field("source", &self.source.to_string())
            .field("limits", &self.limits)
            .field("compiled", &self.compiled.initialized())
            .finish_non_exhaustive()
    }
}

impl WasmDelegate {
    /// Create a delegate for the module at `config.wasm_path`.
    ///
    /// Nothing is read until the first computation or [`ComputeDelegate::warm_up`].
    pub fn from_config(config: &EngineConfig) -> Self {
        Self::with_source(ModuleSource::File(config.wasm_path.clone()), config)
    }

    /// Create a delegate from raw module bytes (for testing or embedded modules).
    pub fn from_bytes(config: &EngineConfig, wasm_bytes: impl Into<Arc<[u8]>>) -> Self {
        Self::with_source(ModuleSource::Bytes(wasm_bytes.into()), config)
    }

    fn with_source(source: ModuleSource, config: &EngineConfig) -> Self {
        Self {
            source,
            limits: Limits::from(config),
            compiled: OnceCell::new(),
            compilations: AtomicUsize::new(0),
        }
    }

    /// How many times the module has been compiled. Stays at 1 once warm.
    pub fn compilations(&self) -> usize {
        self.compilations.load(Ordering::SeqCst)
    }

    /// Whether the module is compiled and ready.
    pub fn is_ready(&self) -> bool {
        self.compiled.initialized()
    }

    /// Compile the module, or wait for the compilation already in flight.
    ///
    /// A failed compilation leaves the cell empty so a later call tries again.
    async fn bootstrap(&self) -> Result<Arc<Compiled>, DelegateError> {
        let compiled = self
            .compiled
            .get_or_try_init(|| async {
                self.compilations.fetch_add(1, Ordering::SeqCst);
                let source = self.source.clone();
                let limits = self.limits;
                match tokio::task::spawn_blocking(move || compile(&source, limits)).await {
                    Ok(compiled) => compiled.map(Arc::new),
                    Err(e) => Err(DelegateError::Bootstrap(format!("compile task failed: {e}"))),
                }
            })
            .await?;
        Ok(compiled.clone())
    }
}

fn compile(source: &ModuleSource, limits: Limits) -> Result<Compiled, DelegateError> {
    let mut engine_config = Config::new();
    engine_config.consume_fuel(limits.max_fuel > 0);

    let engine = Engine::new(&engine_config)
        .map_err(|e| DelegateError::Bootstrap(format!("Failed to create WASM engine: {e}")))?;

    let module = match source {
        ModuleSource::File(path) => Module::from_file(&engine, path).map_err(|e| {
            DelegateError::Bootstrap(format!(
                "Failed to load WASM module '{}': {e}",
                path.display()
            ))
        })?,
        ModuleSource::Bytes(bytes) => Module::new(&engine, bytes)
            .map_err(|e| DelegateError::Bootstrap(format!("Failed to compile WASM module: {e}")))?,
    };

    info!(
        source = %source,
        max_memory = limits.max_memory_bytes,
        max_fuel = limits.max_fuel,
        timeout_ms = limits.timeout_ms,
        "Compiled WASM computation module"
    );

    Ok(Compiled { engine, module })
}

fn execution_failed(reason: impl Into<String>) -> DelegateError {
    DelegateError::Execution {
        delegate: DELEGATE_NAME.into(),
        reason: reason.into(),
    }
}

/// Run one computation in a fresh store, returning the raw output string.
fn invoke(compiled: &Compiled, input_json: &str, limits: Limits) -> Result<String, DelegateError> {
    let store_limits = StoreLimitsBuilder::new()
        .memory_size(limits.max_memory_bytes)
        .build();
    let mut store = Store::new(&compiled.engine, store_limits);
    store.limiter(|state| state);

    if limits.max_fuel > 0 {
        store
            .set_fuel(limits.max_fuel)
            .map_err(|e| execution_failed(format!("Failed to set fuel: {e}")))?;
    }

    // Empty linker: no WASI, no host imports.
    let linker = Linker::new(&compiled.engine);
    let instance = linker
        .instantiate(&mut store, &compiled.module)
        .map_err(|e| execution_failed(format!("WASM instantiation failed: {e}")))?;

    let memory = instance
        .get_memory(&mut store, "memory")
        .ok_or_else(|| execution_failed("WASM module must export 'memory'"))?;

    let alloc = instance
        .get_typed_func::<i32, i32>(&mut store, "alloc")
        .map_err(|e| execution_failed(format!("WASM module must export 'alloc(i32) -> i32': {e}")))?;

    let compute = instance
        .get_typed_func::<(i32, i32), i32>(&mut store, "compute")
        .map_err(|e| {
            execution_failed(format!("WASM module must export 'compute(i32, i32) -> i32': {e}"))
        })?;

    let input_bytes = input_json.as_bytes();
    let input_len = i32::try_from(input_bytes.len())
        .map_err(|_| execution_failed("Input too large for WASM memory"))?;

    let input_ptr = alloc
        .call(&mut store, input_len)
        .map_err(|e| trap_to_error("alloc", e))?;

    memory
        .write(&mut store, input_ptr as u32 as usize, input_bytes)
        .map_err(|_| execution_failed("Input too large for WASM memory"))?;

    let result_ptr = compute
        .call(&mut store, (input_ptr, input_len))
        .map_err(|e| trap_to_error("compute", e))?;

    // The result is a NUL-terminated string at result_ptr.
    let mem_data = memory.data(&store);
    let result_start = result_ptr as u32 as usize;
    if result_start >= mem_data.len() {
        return Err(execution_failed("Invalid result pointer from WASM"));
    }

    let result_end = mem_data[result_start..]
        .iter()
        .position(|&b| b == 0)
        .map(|pos| result_start + pos)
        .unwrap_or(mem_data.len());

    let result_str = std::str::from_utf8(&mem_data[result_start..result_end])
        .map_err(|e| DelegateError::InvalidOutput(format!("Invalid UTF-8 in WASM output: {e}")))?;

    Ok(result_str.to_string())
}

fn trap_to_error(export: &str, error: wasmtime::Error) -> DelegateError {
    if matches!(error.downcast_ref::<Trap>(), Some(Trap::OutOfFuel)) {
        execution_failed("WASM execution exceeded fuel limit (too many instructions)")
    } else {
        execution_failed(format!("WASM {export} failed: {error}"))
    }
}

#[async_trait]
impl ComputeDelegate for WasmDelegate {
    fn name(&self) -> &str {
        DELEGATE_NAME
    }

    async fn compute(
        &self,
        context: &Context,
        products: &[String],
    ) -> std::result::Result<DelegateResult, DelegateError> {
        let compiled = self.bootstrap().await?;

        let input_json = serde_json::to_string(&ComputeInput { context, products })
            .map_err(|e| execution_failed(format!("Failed to serialize input: {e}")))?;

        debug!(input_len = input_json.len(), "Executing WASM computation");

        let limits = self.limits;
        let task = tokio::task::spawn_blocking(move || invoke(&compiled, &input_json, limits));

        let joined = if limits.timeout_ms > 0 {
            // A timed-out execution keeps running on the blocking pool until
            // its fuel runs out; only the request stops waiting for it.
            tokio::time::timeout(std::time::Duration::from_millis(limits.timeout_ms), task)
                .await
                .map_err(|_| DelegateError::Timeout {
                    delegate: DELEGATE_NAME.into(),
                    timeout_ms: limits.timeout_ms,
                })?
        } else {
            task.await
        };

        let output = joined.map_err(|e| execution_failed(format!("WASM task failed: {e}")))??;

        serde_json::from_str::<DelegateResult>(&output).map_err(|e| {
            DelegateError::InvalidOutput(format!("expected {{\"status\", \"body\"}}: {e}"))
        })
    }

    async fn warm_up(&self) -> std::result::Result<(), DelegateError> {
        self.bootstrap().await.map(|_| ())
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use catboard_core::{Environment, RequestContext};
    use std::collections::BTreeMap;

    // Answers {"status":200,"body":"{\"data\":{}}"} from a data segment.
    const FIXED_WAT: &str = r##"
        (module
            (memory (export "memory") 1)
            (data (i32.const 2048) "{\"status\":200,\"body\":\"{\\\"data\\\":{}}\"}\00")
            (func (export "alloc") (param i32) (result i32)
                i32.const 1024
            )
            (func (export "compute") (param i32 i32) (result i32)
                i32.const 2048
            )
        )
    "##;

    // Writes a NUL after the input and hands the input back.
    const ECHO_WAT: &str = r#"
        (module
            (memory (export "memory") 1)
            (func (export "alloc") (param i32) (result i32)
                i32.const 1024
            )
            (func (export "compute") (param i32 i32) (result i32)
                (i32.store8 (i32.add (local.get 0) (local.get 1)) (i32.const 0))
                local.get 0
            )
        )
    "#;

    const SPIN_WAT: &str = r#"
        (module
            (memory (export "memory") 1)
            (func (export "alloc") (param i32) (result i32)
                i32.const 1024
            )
            (func (export "compute") (param i32 i32) (result i32)
                (loop $spin (br $spin))
                i32.const 0
            )
        )
    "#;

    fn engine_config() -> EngineConfig {
        EngineConfig {
            max_fuel: 0,
            ..EngineConfig::default()
        }
    }

    fn delegate(wat_src: &str, config: &EngineConfig) -> WasmDelegate {
        let wasm_bytes = wat::parse_str(wat_src).expect("Failed to parse WAT");
        WasmDelegate::from_bytes(config, wasm_bytes)
    }

    fn context() -> Context {
        Context {
            request: RequestContext {
                method: "POST".into(),
                url: "http://localhost/".into(),
                headers: BTreeMap::new(),
                body: "hello".into(),
            },
            env: Environment::new("abc", vec!["Crypto.SOL/USD".into()]),
        }
    }

    #[test]
    fn engine_config_defaults() {
        let limits = Limits::from(&EngineConfig::default());
        assert_eq!(limits.max_memory_bytes, 16 * 1024 * 1024);
        assert_eq!(limits.max_fuel, 1_000_000_000);
        assert_eq!(limits.timeout_ms, 0);
    }

    #[tokio::test]
    async fn compute_reads_status_and_body() {
        let delegate = delegate(FIXED_WAT, &engine_config());
        let result = delegate.compute(&context(), &[]).await.unwrap();
        assert_eq!(result.status, 200);
        assert_eq!(result.body, r#"{"data":{}}"#);
    }

    #[test]
    fn host_writes_context_and_products() {
        let wasm_bytes = wat::parse_str(ECHO_WAT).unwrap();
        let compiled = compile(&ModuleSource::Bytes(wasm_bytes.into()), Limits::from(&engine_config())).unwrap();

        let ctx = context();
        let products = vec!["Crypto.SOL/USD".to_string()];
        let input = serde_json::to_string(&ComputeInput {
            context: &ctx,
            products: &products,
        })
        .unwrap();

        let echoed = invoke(&compiled, &input, Limits::from(&engine_config())).unwrap();
        let value: serde_json::Value = serde_json::from_str(&echoed).unwrap();
        assert_eq!(value["context"]["request"]["body"], "hello");
        assert_eq!(value["context"]["env"]["PUBLIC_KEY"], "abc");
        assert_eq!(value["context"]["env"]["SYMBOLS"], "Crypto.SOL/USD");
        assert_eq!(value["products"][0], "Crypto.SOL/USD");
    }

    #[tokio::test]
    async fn output_without_status_is_invalid() {
        // The echo module answers with the input, which has no status field.
        let delegate = delegate(ECHO_WAT, &engine_config());
        let err = delegate.compute(&context(), &[]).await.unwrap_err();
        assert!(matches!(err, DelegateError::InvalidOutput(_)));
    }

    #[tokio::test]
    async fn concurrent_first_calls_compile_once() {
        let delegate = Arc::new(delegate(FIXED_WAT, &engine_config()));
        assert!(!delegate.is_ready());

        let mut handles = Vec::new();
        for _ in 0..8 {
            let delegate = delegate.clone();
            handles.push(tokio::spawn(async move {
                delegate.compute(&context(), &[]).await
            }));
        }
        for handle in handles {
            assert_eq!(handle.await.unwrap().unwrap().status, 200);
        }

        assert!(delegate.is_ready());
        assert_eq!(delegate.compilations(), 1);
    }

    #[tokio::test]
    async fn warm_up_is_idempotent() {
        let delegate = delegate(FIXED_WAT, &engine_config());
        delegate.warm_up().await.unwrap();
        delegate.warm_up().await.unwrap();
        delegate.compute(&context(), &[]).await.unwrap();
        assert_eq!(delegate.compilations(), 1);
    }

    #[tokio::test]
    async fn missing_module_fails_bootstrap_and_is_retried() {
        let config = EngineConfig {
            wasm_path: PathBuf::from("/nonexistent/path/catboard.wasm"),
            ..engine_config()
        };
        let delegate = WasmDelegate::from_config(&config);

        let err = delegate.compute(&context(), &[]).await.unwrap_err();
        assert!(matches!(err, DelegateError::Bootstrap(_)));
        assert!(err.to_string().contains("catboard.wasm"));

        // Failures are not cached.
        assert!(delegate.warm_up().await.is_err());
        assert_eq!(delegate.compilations(), 2);
        assert!(!delegate.is_ready());
    }

    #[tokio::test]
    async fn missing_export_is_execution_error() {
        let delegate = delegate(r#"(module (memory (export "memory") 1))"#, &engine_config());
        let err = delegate.compute(&context(), &[]).await.unwrap_err();
        assert!(err.to_string().contains("alloc"));
    }

    #[tokio::test]
    async fn fuel_limit_stops_runaway_module() {
        let config = EngineConfig {
            max_fuel: 10_000,
            ..engine_config()
        };
        let delegate = delegate(SPIN_WAT, &config);
        let err = delegate.compute(&context(), &[]).await.unwrap_err();
        assert!(err.to_string().contains("fuel"));
    }

    #[tokio::test]
    async fn timeout_applies_when_configured() {
        // Fuel bounds the spin so the blocking task still finishes.
        let config = EngineConfig {
            max_fuel: 200_000_000,
            timeout_ms: 1,
            ..engine_config()
        };
        let delegate = delegate(SPIN_WAT, &config);
        delegate.warm_up().await.unwrap();
        let err = delegate.compute(&context(), &[]).await.unwrap_err();
        assert!(matches!(err, DelegateError::Timeout { timeout_ms: 1, .. }));
    }

    #[tokio::test]
    async fn memory_limit_rejects_large_module() {
        // Two pages (128 KiB) against a 64 KiB limit.
        let config = EngineConfig {
            max_memory_bytes: 64 * 1024,
            ..engine_config()
        };
        let delegate = delegate(
            r#"(module
                (memory (export "memory") 2)
                (func (export "alloc") (param i32) (result i32) i32.const 0)
                (func (export "compute") (param i32 i32) (result i32) i32.const 0))"#,
            &config,
        );
        let err = delegate.compute(&context(), &[]).await.unwrap_err();
        assert!(err.to_string().contains("instantiation"));
    }
}
