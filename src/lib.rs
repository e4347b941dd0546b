pub mod agent;
pub mod config;
pub mod core;
pub mod logging;

use crate::config::Config;

/// Run the agent until a shutdown signal arrives.
pub async fn run(config: Config) -> anyhow::Result<()> {
    agent::run(config).await
}
