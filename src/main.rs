//!
//! matchdesk server binary
//! -----------------------
//! Parses flags and environment once into `AppConfig`, then starts the HTTP
//! server.

use tracing::info;
use tracing_subscriber::{fmt, EnvFilter};

use matchdesk::config::{has_flag, AppConfig, USAGE};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args: Vec<String> = std::env::args().collect();
    if has_flag(&args, "--help") || has_flag(&args, "-h") {
        println!("{}", USAGE);
        return Ok(());
    }

    let filter = EnvFilter::try_from_default_env().or_else(|_| EnvFilter::try_new("info"))?;
    fmt().with_env_filter(filter).init();

    let cfg = AppConfig::from_env_and_args()?;
    let rust_log = std::env::var("RUST_LOG").unwrap_or_else(|_| "<unset>".to_string());
    info!(target: "startup", "matchdesk {} starting: RUST_LOG='{}'", env!("CARGO_PKG_VERSION"), rust_log);

    matchdesk::server::run_with_config(cfg).await
}
