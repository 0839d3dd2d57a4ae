//! Startup configuration read from the environment (and `.env`).

use std::env;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use binwatch_core::{Coordinate, PredictionConfig};
use binwatch_provider_osrm::DEFAULT_BASE_URL;
use binwatch_provider_supabase::SupabaseSettings;

const SUPABASE_URL: &str = "SUPABASE_URL";
const SUPABASE_PUBLISHABLE_KEY: &str = "SUPABASE_PUBLISHABLE_KEY";
const OSRM_URL: &str = "OSRM_URL";
const ORIGIN: &str = "BINWATCH_ORIGIN";
const DEFAULT_LOOKBACK_HOURS: &str = "BINWATCH_DEFAULT_LOOKBACK_HOURS";
const DEFAULT_FILL_RATE: &str = "BINWATCH_DEFAULT_FILL_RATE";
const FEED_INTERVAL_SECS: &str = "BINWATCH_FEED_INTERVAL_SECS";
const LOG_FILE: &str = "BINWATCH_LOG_FILE";

const DEFAULT_LOG_FILE: &str = "binwatch.log";

#[derive(thiserror::Error, Debug, PartialEq)]
pub(crate) enum ConfigError {
    #[error("Invalid {key}={value:?}: {reason}")]
    Invalid {
        key: &'static str,
        value: String,
        reason: String,
    },
}

#[derive(Debug, Clone)]
pub(crate) struct Config {
    pub supabase: SupabaseSettings,
    pub osrm_url: String,
    /// Operator position used as the start of routes.
    pub origin: Option<Coordinate>,
    pub prediction: PredictionConfig,
    pub log_file: PathBuf,
}

impl Config {
    pub(crate) fn from_env() -> Result<Self, ConfigError> {
        if let Err(err) = dotenvy::dotenv()
            && !err.not_found()
        {
            return Err(ConfigError::Invalid {
                key: ".env",
                value: String::new(),
                reason: err.to_string(),
            });
        }
        Self::from_lookup(|key| env::var(key).ok())
    }

    pub(crate) fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let read = |key: &str| lookup(key).filter(|value| !value.trim().is_empty());

        let mut supabase = SupabaseSettings::new(
            read(SUPABASE_URL).unwrap_or_default(),
            read(SUPABASE_PUBLISHABLE_KEY).unwrap_or_default(),
        );
        if let Some(raw) = read(FEED_INTERVAL_SECS) {
            let secs = parse::<u64>(FEED_INTERVAL_SECS, &raw)?;
            if secs == 0 {
                return Err(invalid(FEED_INTERVAL_SECS, &raw, "must be at least 1"));
            }
            supabase.feed_interval = Duration::from_secs(secs);
        }

        let origin = read(ORIGIN).map(|raw| parse_origin(&raw)).transpose()?;

        let defaults = PredictionConfig::default();
        let default_lookback_hours = read(DEFAULT_LOOKBACK_HOURS)
            .map(|raw| parse::<u32>(DEFAULT_LOOKBACK_HOURS, &raw))
            .transpose()?
            .unwrap_or(defaults.default_lookback_hours);
        let default_fill_rate = match read(DEFAULT_FILL_RATE) {
            Some(raw) => {
                let rate = parse::<f64>(DEFAULT_FILL_RATE, &raw)?;
                if !rate.is_finite() || rate <= 0.0 {
                    return Err(invalid(DEFAULT_FILL_RATE, &raw, "must be a positive number"));
                }
                rate
            }
            None => defaults.default_fill_rate,
        };

        Ok(Self {
            supabase,
            osrm_url: read(OSRM_URL).unwrap_or_else(|| DEFAULT_BASE_URL.to_owned()),
            origin,
            prediction: PredictionConfig {
                default_lookback_hours,
                default_fill_rate,
            },
            log_file: read(LOG_FILE).map_or_else(|| PathBuf::from(DEFAULT_LOG_FILE), PathBuf::from),
        })
    }
}

fn parse<T>(key: &'static str, raw: &str) -> Result<T, ConfigError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    raw.trim()
        .parse::<T>()
        .map_err(|err| invalid(key, raw, &err.to_string()))
}

fn parse_origin(raw: &str) -> Result<Coordinate, ConfigError> {
    let Some((latitude, longitude)) = raw.split_once(',') else {
        return Err(invalid(ORIGIN, raw, "expected `latitude,longitude`"));
    };
    let latitude = parse::<f64>(ORIGIN, latitude)?;
    let longitude = parse::<f64>(ORIGIN, longitude)?;
    Coordinate::new(latitude, longitude).map_err(|err| invalid(ORIGIN, raw, &err.to_string()))
}

fn invalid(key: &'static str, value: &str, reason: &str) -> ConfigError {
    ConfigError::Invalid {
        key,
        value: value.to_owned(),
        reason: reason.to_owned(),
    }
}
