use anyhow::{anyhow, Result};
use tracing_subscriber::EnvFilter;

use crate::config::MonitoringConfig;

/// Install the global subscriber. `RUST_LOG` wins over the configured level.
pub fn init_logging(config: &MonitoringConfig) -> Result<()> {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&config.log_level));

    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_file(true)
        .with_line_number(true)
        .with_writer(std::io::stderr);

    let installed = if config.json_logs {
        builder.json().try_init()
    } else {
        builder.try_init()
    };

    installed.map_err(|e| anyhow!("could not install log subscriber: {e}"))
}
