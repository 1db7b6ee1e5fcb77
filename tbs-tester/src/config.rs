use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::Path;
use tbs::BrokerConfig;

const CONFIG_PATH_ENV: &str = "TBS_CONFIG";

#[derive(Deserialize, Default)]
#[serde(default, deny_unknown_fields)]
struct TesterConfig {
    broker: BrokerConfig,
}

/// Load the broker configuration from the TOML file named by `TBS_CONFIG`,
/// falling back to defaults when the variable is unset.
pub fn load() -> Result<BrokerConfig> {
    let Ok(path) = std::env::var(CONFIG_PATH_ENV) else {
        log::debug!("{CONFIG_PATH_ENV} not set, using default broker configuration");
        return Ok(BrokerConfig::default());
    };
    let path = Path::new(&path);

    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read config from {}", path.display()))?;
    let config = parse(&raw).with_context(|| format!("failed to parse {}", path.display()))?;
    log::info!("loaded broker configuration from {}", path.display());
    Ok(config)
}

fn parse(raw: &str) -> Result<BrokerConfig> {
    let config: TesterConfig = toml::from_str(raw).context("invalid TOML")?;
    config.broker.validate()?;
    Ok(config.broker)
}
