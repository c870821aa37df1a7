//! evalbridge HTTP server binary.
//!
//! Usage:
//!   cargo run -p evalbridge-server
//!
//! Configuration is read from the environment; see [`ServerConfig`].

use evalbridge_server::{init_tracing, serve, ServerConfig};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = ServerConfig::from_env()?;
    init_tracing(config.log_format);

    serve(config).await?;
    Ok(())
}
