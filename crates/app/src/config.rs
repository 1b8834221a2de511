//! Runtime settings for the `reels` binary.
//!
//! Priority: command-line flag > `reels.toml` > environment (`.env`) > default.

use std::path::{Path, PathBuf};

use chrono::FixedOffset;
use reels_core::scheduler::SchedulerConfig;
use reels_core::time::offset_from_minutes;
use serde::Deserialize;
use thiserror::Error;

pub const DEFAULT_CONFIG_PATH: &str = "reels.toml";
pub const DEFAULT_DB_URL: &str = "sqlite:reels.sqlite3?mode=rwc";

pub const DB_URL_ENV: &str = "REELS_DB_URL";
pub const UTC_OFFSET_ENV: &str = "REELS_UTC_OFFSET_MINUTES";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("cannot read {path}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("invalid {path}: {source}")]
    Parse {
        path: PathBuf,
        source: toml::de::Error,
    },
    #[error("invalid {UTC_OFFSET_ENV} value: {raw}")]
    InvalidUtcOffset { raw: String },
}

/// `reels.toml` layout.
#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct FileConfig {
    database: Option<DatabaseConfig>,
    scheduler: Option<SchedulerConfig>,
}

#[derive(Debug, Default, Deserialize)]
struct DatabaseConfig {
    url: Option<String>,
}

/// Fully resolved settings.
#[derive(Debug, Clone, PartialEq)]
pub struct Settings {
    pub db_url: String,
    pub scheduler: SchedulerConfig,
    /// `None` means "use the host offset".
    pub utc_offset: Option<FixedOffset>,
}

/// Values coming from the environment, split out so tests need not touch
/// process-wide state.
#[derive(Debug, Default, Clone)]
pub struct EnvOverrides {
    pub db_url: Option<String>,
    pub utc_offset_minutes: Option<String>,
}

impl EnvOverrides {
    /// Load `.env` if present, then read the `REELS_*` variables.
    pub fn from_env() -> Self {
        let _ = dotenvy::dotenv();
        Self {
            db_url: std::env::var(DB_URL_ENV).ok(),
            utc_offset_minutes: std::env::var(UTC_OFFSET_ENV).ok(),
        }
    }
}

/// Resolve settings.
///
/// An explicit `config_path` must exist; the default `reels.toml` is optional.
///
/// # Errors
///
/// Returns `ConfigError` if the config file cannot be read or parsed, or if the
/// UTC offset variable is not a whole number of minutes within a day.
pub fn load(
    config_path: Option<&Path>,
    db_flag: Option<String>,
    env: EnvOverrides,
) -> Result<Settings, ConfigError> {
    let file = match config_path {
        Some(path) => read_file_config(path)?,
        None => {
            let path = Path::new(DEFAULT_CONFIG_PATH);
            if path.exists() {
                read_file_config(path)?
            } else {
                FileConfig::default()
            }
        }
    };

    let file_db_url = file.database.and_then(|db| db.url);
    let db_url = if let Some(url) = db_flag {
        url
    } else if let Some(url) = file_db_url {
        tracing::info!(db_url = %url, "using database from config file");
        url
    } else if let Some(url) = env.db_url {
        tracing::info!(db_url = %url, "using database from {DB_URL_ENV}");
        url
    } else {
        DEFAULT_DB_URL.to_owned()
    };

    let utc_offset = env
        .utc_offset_minutes
        .map(|raw| parse_utc_offset(&raw))
        .transpose()?;

    Ok(Settings {
        db_url,
        scheduler: file.scheduler.unwrap_or_default(),
        utc_offset,
    })
}

fn read_file_config(path: &Path) -> Result<FileConfig, ConfigError> {
    let contents = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
        path: path.to_path_buf(),
        source,
    })?;
    parse_file_config(&contents).map_err(|source| ConfigError::Parse {
        path: path.to_path_buf(),
        source,
    })
}

fn parse_file_config(contents: &str) -> Result<FileConfig, toml::de::Error> {
    toml::from_str(contents)
}

fn parse_utc_offset(raw: &str) -> Result<FixedOffset, ConfigError> {
    raw.trim()
        .parse::<i32>()
        .ok()
        .and_then(offset_from_minutes)
        .ok_or_else(|| ConfigError::InvalidUtcOffset {
            raw: raw.to_owned(),
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn missing_config() -> PathBuf {
        std::env::temp_dir().join("reels-config-that-does-not-exist.toml")
    }

    #[test]
    fn scheduler_table_overrides_only_given_fields() {
        let file = parse_file_config(
            r#"
            [database]
            url = "sqlite:custom.db"

            [scheduler]
            max_interval_days = 90
            easy_bonus = 0.2
            "#,
        )
        .unwrap();

        let scheduler = file.scheduler.unwrap();
        assert_eq!(scheduler.max_interval_days, 90);
        assert!((scheduler.easy_bonus - 0.2).abs() < f64::EPSILON);
        assert!((scheduler.initial_ease - 2.5).abs() < f64::EPSILON);
        assert_eq!(file.database.unwrap().url.as_deref(), Some("sqlite:custom.db"));
    }

    #[test]
    fn unknown_sections_are_rejected() {
        assert!(parse_file_config("[decks]\nsize = 3\n").is_err());
    }

    #[test]
    fn explicit_missing_config_is_an_error() {
        let err = load(Some(&missing_config()), None, EnvOverrides::default()).unwrap_err();
        assert!(matches!(err, ConfigError::Read { .. }));
    }

    #[test]
    fn flag_beats_environment() {
        let env = EnvOverrides {
            db_url: Some("sqlite:env.db".into()),
            utc_offset_minutes: Some("-300".into()),
        };
        let path = std::env::temp_dir().join("reels-empty-config.toml");
        std::fs::write(&path, "").unwrap();

        let settings = load(Some(&path), Some("sqlite:flag.db".into()), env.clone()).unwrap();
        assert_eq!(settings.db_url, "sqlite:flag.db");
        assert_eq!(settings.utc_offset, FixedOffset::west_opt(5 * 3600));

        let settings = load(Some(&path), None, env).unwrap();
        assert_eq!(settings.db_url, "sqlite:env.db");
        assert_eq!(settings.scheduler, SchedulerConfig::default());
    }

    #[test]
    fn bad_offset_is_reported() {
        assert!(matches!(
            parse_utc_offset("two hours"),
            Err(ConfigError::InvalidUtcOffset { .. })
        ));
        assert!(parse_utc_offset("3000").is_err());
        assert_eq!(parse_utc_offset(" 60 ").unwrap(), FixedOffset::east_opt(3600).unwrap());
    }
}
