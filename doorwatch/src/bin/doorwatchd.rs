//! Door monitor daemon.

use anyhow::{Context, Result};

use doorwatch::config::Config;
use doorwatch::{daemon, tracing};

#[tokio::main]
async fn main() -> Result<()> {
    let config = Config::from_env().context("invalid configuration")?;
    tracing::init_journald_or_stdout();

    daemon::run(config).await?;
    Ok(())
}
