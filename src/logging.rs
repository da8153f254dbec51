use crate::infrastructure::error::InfraError;
use chrono::Utc;
use std::fs;
use std::path::{Path, PathBuf};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

const LOG_LEVEL_ENV: &str = "TASKFLOW_LOG_LEVEL";
const DEFAULT_LOG_LEVEL: &str = "warn";

pub fn init_logging(logs_dir: &Path) -> Result<(PathBuf, WorkerGuard), InfraError> {
    fs::create_dir_all(logs_dir)?;
    let log_file_path = log_file_path(logs_dir);
    let file = fs::File::create(&log_file_path)?;
    let (non_blocking, guard) = tracing_appender::non_blocking(file);

    let file_layer = fmt::layer()
        .with_writer(non_blocking)
        .with_ansi(false)
        .with_target(true)
        .with_thread_ids(true)
        .with_file(true)
        .with_line_number(true);

    tracing_subscriber::registry()
        .with(build_log_filter(std::env::var(LOG_LEVEL_ENV).ok().as_deref()))
        .with(file_layer)
        .try_init()
        .map_err(|error| InfraError::InvalidConfig(format!("failed to install logger: {error}")))?;

    tracing::info!(path = %log_file_path.display(), "logging initialized");
    Ok((log_file_path, guard))
}

fn build_log_filter(raw_level: Option<&str>) -> EnvFilter {
    let level = raw_level.and_then(normalize_log_level).unwrap_or(DEFAULT_LOG_LEVEL);
    EnvFilter::new(format!("{level},taskflow={level}"))
}

fn normalize_log_level(raw: &str) -> Option<&'static str> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "trace" => Some("trace"),
        "debug" => Some("debug"),
        "info" => Some("info"),
        "warn" | "warning" => Some("warn"),
        "error" => Some("error"),
        _ => None,
    }
}

pub fn log_file_path(logs_dir: &Path) -> PathBuf {
    let timestamp = Utc::now().format("%Y-%m-%d_%H-%M-%S");
    logs_dir.join(format!("taskflow-{timestamp}.log"))
}
