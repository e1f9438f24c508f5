//! `catboard serve`: Start the HTTP edge handler.

use std::path::Path;

pub async fn run(config_path: &Path, port_override: Option<u16>) -> Result<(), Box<dyn std::error::Error>> {
    let mut config = super::load_config(config_path)?;

    if let Some(port) = port_override {
        config.gateway.port = port;
    }

    println!("🐈 Catboard Edge");
    println!("   Listening: {}:{}", config.gateway.host, config.gateway.port);
    println!("   Module:    {}", config.engine.wasm_path.display());
    println!("   Products:  {}", config.products.len());
    println!(
        "   Bootstrap: {}",
        if config.engine.eager_init { "eager" } else { "on first request" }
    );

    catboard_gateway::start(config).await?;

    Ok(())
}
