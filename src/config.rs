use std::{env, fmt::Display, num::NonZeroU32, path::PathBuf, str::FromStr};

use url::Url;

use crate::{
    error::{Error, Result},
    pacing::MAX_SCALE,
};

pub const DEFAULT_SEARCH_URL: &str =
    "https://www.aaha.org/for-pet-parents/find-an-aaha-accredited-animal-hospital-near-me/";
pub const DEFAULT_WEBDRIVER_URL: &str = "http://localhost:9515";

/// Retry ceilings and recycling intervals for the scrape loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Search submissions per location (and per refresh) before giving up.
    pub max_search_attempts: u32,
    /// Extra tries per hospital detail page after the first.
    pub detail_retries: u32,
    /// Re-run the search before every n-th hospital; 0 never does.
    pub refresh_every: usize,
    /// Tear the browser down after this many locations.
    pub recycle_every: usize,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_search_attempts: 3,
            detail_retries: 3,
            refresh_every: 5,
            recycle_every: 1,
        }
    }
}

#[derive(Debug, Clone)]
pub struct Config {
    pub search_url: Url,
    pub webdriver_url: Url,
    pub headless: bool,
    pub search_radius: u32,
    pub zipcodes_dir: PathBuf,
    pub us_zip_csv: String,
    pub can_zip_csv: String,
    pub input_dir: PathBuf,
    pub output_dir: PathBuf,
    pub logs_dir: PathBuf,
    pub locations_dump: Option<PathBuf>,
    pub retries: RetryPolicy,
    /// Multiplier on every pause window; 0 disables pausing.
    pub pace_scale: f64,
    pub navigations_per_minute: NonZeroU32,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|name| env::var(name).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let get = |name: &str| lookup(name).filter(|v| !v.trim().is_empty());

        let config = Self {
            search_url: parse_var(&get, "SEARCH_URL", DEFAULT_SEARCH_URL)?,
            webdriver_url: parse_var(&get, "WEBDRIVER_URL", DEFAULT_WEBDRIVER_URL)?,
            headless: get("HEADLESS").map_or(Ok(false), |v| parse_bool("HEADLESS", &v))?,
            search_radius: parse_var(&get, "SEARCH_RADIUS", "20")?,
            zipcodes_dir: get("ZIPCODES_DIR").unwrap_or_else(|| "zipcodes".into()).into(),
            us_zip_csv: get("US_ZIP_CSV").unwrap_or_else(|| "USZIPCodes202503.csv".into()),
            can_zip_csv: get("CAN_ZIP_CSV")
                .unwrap_or_else(|| "CanadianPostalCodes202403.csv".into()),
            input_dir: get("INPUT_DIR").unwrap_or_else(|| "input".into()).into(),
            output_dir: get("OUTPUT_DIR").unwrap_or_else(|| "output".into()).into(),
            logs_dir: get("LOGS_DIR").unwrap_or_else(|| "logs".into()).into(),
            locations_dump: get("LOCATIONS_DUMP").map(PathBuf::from),
            retries: RetryPolicy {
                max_search_attempts: parse_var(&get, "MAX_SEARCH_ATTEMPTS", "3")?,
                detail_retries: parse_var(&get, "DETAIL_RETRIES", "3")?,
                refresh_every: parse_var(&get, "REFRESH_EVERY", "5")?,
                recycle_every: parse_var(&get, "RECYCLE_EVERY", "1")?,
            },
            pace_scale: parse_var(&get, "PACE_SCALE", "1.0")?,
            navigations_per_minute: parse_var(&get, "NAVIGATIONS_PER_MINUTE", "6")?,
        };
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<()> {
        if self.retries.max_search_attempts == 0 {
            return Err(Error::config_error("MAX_SEARCH_ATTEMPTS must be at least 1"));
        }
        if self.retries.recycle_every == 0 {
            return Err(Error::config_error("RECYCLE_EVERY must be at least 1"));
        }
        if !self.pace_scale.is_finite() || self.pace_scale < 0.0 {
            return Err(Error::config_error("PACE_SCALE must be a non-negative number"));
        }
        if self.pace_scale > MAX_SCALE {
            return Err(Error::config_error(format!(
                "PACE_SCALE must be at most {MAX_SCALE}"
            )));
        }
        Ok(())
    }

    #[must_use]
    pub fn zipcode_source(&self, file_name: &str) -> PathBuf {
        self.zipcodes_dir.join(file_name)
    }
}

fn parse_var<T>(get: &impl Fn(&str) -> Option<String>, name: &str, default: &str) -> Result<T>
where
    T: FromStr,
    T::Err: Display,
{
    let raw = get(name).unwrap_or_else(|| default.to_owned());
    raw.trim()
        .parse()
        .map_err(|e| Error::config_error(format!("{name}={raw:?}: {e}")))
}

fn parse_bool(name: &str, raw: &str) -> Result<bool> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        _ => Err(Error::config_error(format!("{name}={raw:?} is not a boolean"))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn config_from(pairs: &[(&str, &str)]) -> Result<Config> {
        let vars: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| ((*k).to_owned(), (*v).to_owned()))
            .collect();
        Config::from_lookup(|name| vars.get(name).cloned())
    }

    #[test]
    fn test_defaults() {
        let config = config_from(&[]).unwrap();
        assert_eq!(config.search_url.as_str(), DEFAULT_SEARCH_URL);
        assert_eq!(config.webdriver_url.host_str(), Some("localhost"));
        assert!(!config.headless);
        assert_eq!(config.search_radius, 20);
        assert_eq!(config.retries, RetryPolicy::default());
        assert_eq!(config.navigations_per_minute.get(), 6);
        assert!(config.locations_dump.is_none());
        assert_eq!(
            config.zipcode_source(&config.us_zip_csv),
            PathBuf::from("zipcodes/USZIPCodes202503.csv")
        );
    }

    #[test]
    fn test_overrides() {
        let config = config_from(&[
            ("HEADLESS", "yes"),
            ("SEARCH_RADIUS", " 50 "),
            ("REFRESH_EVERY", "0"),
            ("PACE_SCALE", "0"),
            ("LOCATIONS_DUMP", "output/locations.json"),
            ("OUTPUT_DIR", ""),
        ])
        .unwrap();
        assert!(config.headless);
        assert_eq!(config.search_radius, 50);
        assert_eq!(config.retries.refresh_every, 0);
        assert!(config.pace_scale.abs() < f64::EPSILON);
        assert_eq!(
            config.locations_dump,
            Some(PathBuf::from("output/locations.json"))
        );
        // blank values fall back to defaults
        assert_eq!(config.output_dir, PathBuf::from("output"));
    }

    #[test]
    fn test_invalid_values() {
        assert!(matches!(
            config_from(&[("HEADLESS", "maybe")]),
            Err(Error::Config(_))
        ));
        assert!(matches!(
            config_from(&[("SEARCH_RADIUS", "twenty")]),
            Err(Error::Config(_))
        ));
        assert!(matches!(
            config_from(&[("MAX_SEARCH_ATTEMPTS", "0")]),
            Err(Error::Config(_))
        ));
        assert!(matches!(
            config_from(&[("NAVIGATIONS_PER_MINUTE", "0")]),
            Err(Error::Config(_))
        ));
        assert!(matches!(
            config_from(&[("PACE_SCALE", "-1")]),
            Err(Error::Config(_))
        ));
        assert!(matches!(
            config_from(&[("PACE_SCALE", "1e300")]),
            Err(Error::Config(_))
        ));
        assert!(config_from(&[("PACE_SCALE", "100")]).is_ok());
        assert!(matches!(
            config_from(&[("WEBDRIVER_URL", "not a url")]),
            Err(Error::Config(_))
        ));
    }
}
