//! `catboard doctor`: Diagnose configuration and the computation module.

use catboard_config::AppConfig;
use catboard_core::ComputeDelegate;
use catboard_engine::WasmDelegate;
use std::path::Path;

pub async fn run(config_path: &Path) -> Result<(), Box<dyn std::error::Error>> {
    println!("🩺 Catboard Doctor — System Diagnostics");
    println!("========================================\n");

    let issues = match AppConfig::load_with_overrides(config_path) {
        Ok(config) => {
            if config_path.exists() {
                println!("  ✅ Config file valid");
            } else {
                println!("  ⚠️  No config file at {}, using defaults", config_path.display());
            }
            check_config(&config).await
        }
        Err(e) => {
            println!("  ❌ Config file invalid: {e}");
            1
        }
    };

    // Summary
    println!();
    if issues == 0 {
        println!("  🎉 All checks passed!");
    } else {
        println!("  ⚠️  {issues} issue(s) found. See above for details.");
    }

    Ok(())
}

/// Run the per-setting checks, returning how many failed.
async fn check_config(config: &AppConfig) -> usize {
    let mut issues = 0;

    if config.environment.public_key.is_empty() {
        println!("  ⚠️  No public key — set environment.public_key or CATBOARD_PUBLIC_KEY");
        issues += 1;
    } else {
        println!("  ✅ Public key configured");
    }

    if config.environment.symbols.is_empty() {
        println!("  ⚠️  No symbols — set environment.symbols or CATBOARD_SYMBOLS");
        issues += 1;
    } else {
        println!("  ✅ {} symbol(s) configured", config.environment.symbols.len());
    }

    let wasm_path = &config.engine.wasm_path;
    if !wasm_path.exists() {
        println!("  ❌ Computation module not found at {}", wasm_path.display());
        return issues + 1;
    }

    match WasmDelegate::from_config(&config.engine).warm_up().await {
        Ok(()) => println!("  ✅ Computation module compiles"),
        Err(e) => {
            println!("  ❌ {e}");
            issues += 1;
        }
    }

    issues
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn missing_module_is_reported() {
        let mut config = AppConfig::default();
        config.environment.public_key = "abc".into();
        config.environment.symbols = vec!["Crypto.SOL/USD".into()];
        config.engine.wasm_path = "/nonexistent/catboard.wasm".into();
        assert_eq!(check_config(&config).await, 1);
    }

    #[tokio::test]
    async fn invalid_module_is_reported() {
        let dir = tempfile::tempdir().unwrap();
        let wasm_path = dir.path().join("broken.wasm");
        std::fs::write(&wasm_path, b"not wasm").unwrap();

        let mut config = AppConfig::default();
        config.engine.wasm_path = wasm_path;
        // Missing key, missing symbols, broken module.
        assert_eq!(check_config(&config).await, 3);
    }
}
