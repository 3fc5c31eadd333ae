use anyhow::{Context, Result};
use config::{Config as RawConfig, Environment, File};
use perfcap_common::constants::{DEFAULT_RECORDER, PROCESS_POLL_INTERVAL_MS, STOP_GRACE_PERIOD_MS};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct Config {
    /// Delay between the completion of one process snapshot and the next
    /// request while the attach view is active.
    pub process_polling_interval_ms: u64,
    /// How long a stopped session may keep running before it is killed.
    pub stop_grace_period_ms: u64,
    /// The external recorder executable, resolved through PATH.
    pub recorder_path: PathBuf,
    /// Override for the persisted settings file, mainly for tests.
    pub settings_path: Option<PathBuf>,
}

pub struct ConfigLoader;

impl ConfigLoader {
    pub fn load_default_config() -> Result<Config> {
        Self::load_config(None)
    }

    /// Builds the configuration from defaults, an optional TOML file and
    /// `PERFCAP_*` environment overrides, in that precedence order.
    pub fn load_config(config_file: Option<&str>) -> Result<Config> {
        let mut builder = RawConfig::builder()
            .set_default("process_polling_interval_ms", PROCESS_POLL_INTERVAL_MS)?
            .set_default("stop_grace_period_ms", STOP_GRACE_PERIOD_MS)?
            .set_default("recorder_path", DEFAULT_RECORDER)?
            .set_default("settings_path", None::<String>)?;

        if let Some(path) = config_file {
            builder = builder.add_source(File::with_name(path));
        }

        builder = builder.add_source(Environment::with_prefix("PERFCAP"));

        let config: Config = builder
            .build()?
            .try_deserialize()
            .context("failed to parse configuration")?;

        Ok(config)
    }
}
