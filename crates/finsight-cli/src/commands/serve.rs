//! Server command implementation

use std::path::Path;

use anyhow::{Context, Result};
use tracing::{info, warn};

use super::open_db;

pub async fn cmd_serve(
    db_path: &Path,
    host: &str,
    port: u16,
    no_encrypt: bool,
    static_dir: Option<&Path>,
) -> Result<()> {
    println!("🚀 Starting Finsight web server...");
    println!("   Database: {}", db_path.display());
    println!("   Listening: http://{}:{}", host, port);
    if let Some(dir) = static_dir {
        println!("   Static files: {}", dir.display());
    }

    let config = finsight_server::ServerConfig::from_env();

    println!("   🔐 Authentication: session tokens (POST /api/auth/login)");
    if !config.api_keys.is_empty() {
        println!(
            "   🔑 Operator API keys: {} configured ({})",
            config.api_keys.len(),
            finsight_server::API_KEYS_ENV
        );
    }
    if !config.allowed_origins.is_empty() {
        println!(
            "   🌐 Allowed origins: {}",
            config.allowed_origins.join(", ")
        );
    }
    println!("   🧠 Categorizer model: {}", config.model_path.display());
    if no_encrypt {
        warn!("Serving an unencrypted database: {}", db_path.display());
        println!("   ⚠️  Encryption DISABLED (--no-encrypt)");
    }
    println!();
    println!("   Press Ctrl+C to stop");

    let db = open_db(db_path, no_encrypt)?;
    info!("Opened database {}", db_path.display());

    let static_dir_str = static_dir
        .map(|p| p.to_str().context("static_dir path must be valid UTF-8"))
        .transpose()?;
    finsight_server::serve_with_config(db, host, port, static_dir_str, config).await?;

    Ok(())
}
