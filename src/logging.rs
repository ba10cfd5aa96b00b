use std::{
    fs::{self, File},
    path::{Path, PathBuf},
    sync::Mutex,
};

use chrono::{Local, NaiveDateTime};
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::error::{Error, Result};

#[must_use]
pub fn log_file_path(logs_dir: &Path, at: NaiveDateTime) -> PathBuf {
    logs_dir.join(format!("scraper_log_{}.log", at.format("%Y%m%d_%H%M%S")))
}

/// Logs to the console and to a fresh file under `logs_dir`. `RUST_LOG`
/// overrides the default `info` level. `log` records are forwarded too.
pub fn init(logs_dir: &Path) -> Result<PathBuf> {
    fs::create_dir_all(logs_dir)?;
    let path = log_file_path(logs_dir, Local::now().naive_local());
    let file = File::create(&path)?;
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer())
        .with(fmt::layer().with_ansi(false).with_writer(Mutex::new(file)))
        .try_init()
        .map_err(|e| Error::config_error(format!("logging is already set up: {e}")))?;
    Ok(path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    #[test]
    fn test_log_file_path() {
        let at = NaiveDate::from_ymd_opt(2025, 4, 1)
            .unwrap()
            .and_hms_opt(9, 30, 0)
            .unwrap();
        assert_eq!(
            log_file_path(Path::new("logs"), at),
            PathBuf::from("logs/scraper_log_20250401_093000.log")
        );
    }
}
