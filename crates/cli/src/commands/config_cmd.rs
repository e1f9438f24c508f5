//! `catboard config`: Configuration management commands.

use std::path::Path;

pub async fn validate(config_path: &Path) -> Result<(), Box<dyn std::error::Error>> {
    println!("🔍 Validating configuration...");

    match super::load_config(config_path) {
        Ok(config) => {
            println!("   ✅ Config parsed successfully");

            let mut warnings = Vec::new();

            if config.environment.public_key.is_empty() {
                warnings.push("No public key set (set CATBOARD_PUBLIC_KEY env var)");
            }

            if config.environment.symbols.is_empty() {
                warnings.push("No symbols set (set CATBOARD_SYMBOLS env var)");
            }

            if config.products.is_empty() {
                warnings.push("Product list is empty");
            }

            if config.gateway.host == "0.0.0.0" {
                warnings.push("Gateway bound to 0.0.0.0 (all interfaces)");
            }

            if warnings.is_empty() {
                println!("   ✅ All checks passed");
            } else {
                println!();
                for w in &warnings {
                    println!("   ⚠️  {w}");
                }
            }

            println!();
            println!(
                "   Gateway:   {}:{}",
                config.gateway.host, config.gateway.port
            );
            println!("   Module:    {}", config.engine.wasm_path.display());
            println!("   Symbols:   {}", config.environment.symbols.join(","));
            println!("   Products:  {}", config.products.len());
        }
        Err(e) => {
            println!("   ❌ {e}");
            return Err(e);
        }
    }

    Ok(())
}

pub async fn show(config_path: &Path) -> Result<(), Box<dyn std::error::Error>> {
    let config = super::load_config(config_path)?;
    let toml_str = toml::to_string_pretty(&config)?;
    println!("{toml_str}");
    Ok(())
}

pub async fn path(config_path: &Path) -> Result<(), Box<dyn std::error::Error>> {
    println!("{}", config_path.display());
    Ok(())
}

#[cfg(test)]
mod tests {
    #[test]
    fn config_path_is_valid() {
        let path = super::super::default_config_path();
        assert!(path.to_str().unwrap().ends_with("config.toml"));
        assert!(path.to_str().unwrap().contains(".catboard"));
    }
}
