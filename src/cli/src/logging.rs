use anyhow::{Context, Result};
use perfcap_common::constants::{LOG_FILE, WORK_DIR};
use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::{
    fmt::{self, time::SystemTime},
    prelude::*,
    EnvFilter,
};

pub fn setup_logging() -> Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    std::fs::create_dir_all(WORK_DIR).context("failed to create work dir")?;
    let file_appender = RollingFileAppender::new(Rotation::NEVER, WORK_DIR, "perfcap.log");

    let file_layer = fmt::layer()
        .with_target(true)
        .with_level(true)
        .with_timer(SystemTime)
        .with_ansi(false)
        .with_writer(file_appender);

    let subscriber = tracing_subscriber::registry().with(filter).with(file_layer);

    tracing::subscriber::set_global_default(subscriber)
        .context("failed to set tracing subscriber")?;

    tracing::debug!("logging initialized, writing to {}", LOG_FILE);
    Ok(())
}
