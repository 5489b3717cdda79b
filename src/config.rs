//! Runtime configuration read from the environment.

use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use secrecy::SecretString;

use crate::error::ConfigError;
use crate::form::ProgressLayout;

pub const DEFAULT_DB_PATH: &str = "./data/anketa.db";
pub const DEFAULT_DATA_DIR: &str = "./data/attachments";
pub const DEFAULT_SHEETS_RANGE: &str = "Анкеты!A:N";

/// Telegram transport settings. Present only when a bot token is configured.
#[derive(Debug, Clone)]
pub struct TelegramConfig {
    pub bot_token: SecretString,
    pub allowed_users: Vec<String>,
    pub api_base: Option<String>,
}

/// Google Sheets export target.
#[derive(Debug, Clone)]
pub struct SheetsConfig {
    pub spreadsheet_id: String,
    pub access_token: SecretString,
    pub range: String,
    pub timeout: Duration,
    pub api_base: Option<String>,
}

#[derive(Debug, Clone)]
pub struct BotConfig {
    pub db_path: PathBuf,
    pub data_dir: PathBuf,
    pub progress_layout: ProgressLayout,
    /// Sessions untouched for this long are flushed and dropped.
    pub session_idle: Duration,
    pub reconcile_interval: Duration,
    pub api_port: Option<u16>,
    pub log_dir: Option<PathBuf>,
    pub cli_enabled: bool,
    pub telegram: Option<TelegramConfig>,
    pub sheets: Option<SheetsConfig>,
}

impl Default for BotConfig {
    fn default() -> Self {
        Self {
            db_path: PathBuf::from(DEFAULT_DB_PATH),
            data_dir: PathBuf::from(DEFAULT_DATA_DIR),
            progress_layout: ProgressLayout::default(),
            session_idle: Duration::from_secs(3600),
            reconcile_interval: Duration::from_secs(300),
            api_port: Some(8080),
            log_dir: None,
            cli_enabled: false,
            telegram: None,
            sheets: None,
        }
    }
}

impl BotConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build the config from any key lookup. Blank values count as unset.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| {
            lookup(key)
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
        };
        let defaults = Self::default();

        let db_path = get("ANKETA_DB_PATH")
            .map(PathBuf::from)
            .unwrap_or(defaults.db_path);
        let data_dir = get("ANKETA_DATA_DIR")
            .map(PathBuf::from)
            .unwrap_or(defaults.data_dir);

        let progress_layout = match get("ANKETA_PROGRESS_LAYOUT") {
            Some(raw) => ProgressLayout::from_str(&raw).map_err(|_| ConfigError::InvalidValue {
                key: "ANKETA_PROGRESS_LAYOUT".into(),
                message: format!("expected 'full' or 'compact', got '{raw}'"),
            })?,
            None => defaults.progress_layout,
        };

        let session_idle = parse_secs(&get, "ANKETA_SESSION_IDLE_SECS")?
            .unwrap_or(defaults.session_idle);
        let reconcile_interval = parse_secs(&get, "ANKETA_RECONCILE_SECS")?
            .unwrap_or(defaults.reconcile_interval);

        // Port 0 disables the admin API.
        let api_port = match parse::<u16>(&get, "ANKETA_API_PORT")? {
            Some(0) => None,
            Some(port) => Some(port),
            None => defaults.api_port,
        };

        let log_dir = get("ANKETA_LOG_DIR").map(PathBuf::from);
        let cli_enabled = parse_bool(&get, "ANKETA_CLI")?.unwrap_or(false);

        let telegram = get("TELEGRAM_BOT_TOKEN").map(|token| TelegramConfig {
            bot_token: SecretString::from(token),
            allowed_users: split_list(get("TELEGRAM_ALLOWED_USERS").as_deref().unwrap_or("*")),
            api_base: get("TELEGRAM_API_BASE"),
        });

        let sheets = match get("GOOGLE_SHEETS_ID") {
            Some(spreadsheet_id) => {
                let access_token =
                    get("GOOGLE_SHEETS_ACCESS_TOKEN").ok_or_else(|| ConfigError::MissingRequired {
                        key: "GOOGLE_SHEETS_ACCESS_TOKEN".into(),
                        hint: "Set it when GOOGLE_SHEETS_ID is configured".into(),
                    })?;
                let range = get("GOOGLE_SHEETS_RANGE").unwrap_or_else(|| DEFAULT_SHEETS_RANGE.into());
                if !range.contains('!') {
                    return Err(ConfigError::InvalidValue {
                        key: "GOOGLE_SHEETS_RANGE".into(),
                        message: format!("expected '<sheet>!<columns>', got '{range}'"),
                    });
                }
                Some(SheetsConfig {
                    spreadsheet_id,
                    access_token: SecretString::from(access_token),
                    range,
                    timeout: parse_secs(&get, "GOOGLE_SHEETS_TIMEOUT_SECS")?
                        .unwrap_or(Duration::from_secs(15)),
                    api_base: get("GOOGLE_SHEETS_API_BASE"),
                })
            }
            None => None,
        };

        if telegram.is_none() && !cli_enabled {
            return Err(ConfigError::MissingRequired {
                key: "TELEGRAM_BOT_TOKEN".into(),
                hint: "Set a bot token or ANKETA_CLI=1 for a local session".into(),
            });
        }

        Ok(Self {
            db_path,
            data_dir,
            progress_layout,
            session_idle,
            reconcile_interval,
            api_port,
            log_dir,
            cli_enabled,
            telegram,
            sheets,
        })
    }

    /// Config for the one-shot subcommands: only storage and sheets matter,
    /// so a missing transport is not an error.
    pub fn for_maintenance<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        Self::from_lookup(|key| match key {
            "ANKETA_CLI" => Some("1".into()),
            _ => lookup(key),
        })
    }
}

fn parse<T>(get: &impl Fn(&str) -> Option<String>, key: &str) -> Result<Option<T>, ConfigError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    get(key)
        .map(|raw| {
            raw.parse::<T>().map_err(|e| ConfigError::InvalidValue {
                key: key.into(),
                message: format!("'{raw}': {e}"),
            })
        })
        .transpose()
}

fn parse_secs(
    get: &impl Fn(&str) -> Option<String>,
    key: &str,
) -> Result<Option<Duration>, ConfigError> {
    match parse::<u64>(get, key)? {
        Some(0) => Err(ConfigError::InvalidValue {
            key: key.into(),
            message: "must be greater than zero".into(),
        }),
        other => Ok(other.map(Duration::from_secs)),
    }
}

fn parse_bool(get: &impl Fn(&str) -> Option<String>, key: &str) -> Result<Option<bool>, ConfigError> {
    get(key)
        .map(|raw| match raw.to_ascii_lowercase().as_str() {
            "1" | "true" | "yes" | "on" => Ok(true),
            "0" | "false" | "no" | "off" => Ok(false),
            _ => Err(ConfigError::InvalidValue {
                key: key.into(),
                message: format!("expected a boolean, got '{raw}'"),
            }),
        })
        .transpose()
}

fn split_list(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .collect()
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use secrecy::ExposeSecret;

    use super::*;

    fn load(vars: &[(&str, &str)]) -> Result<BotConfig, ConfigError> {
        let map: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        BotConfig::from_lookup(|key| map.get(key).cloned())
    }

    #[test]
    fn defaults_with_telegram_token() {
        let config = load(&[("TELEGRAM_BOT_TOKEN", "123:abc")]).unwrap();
        assert_eq!(config.db_path, PathBuf::from(DEFAULT_DB_PATH));
        assert_eq!(config.progress_layout, ProgressLayout::Full);
        assert_eq!(config.api_port, Some(8080));
        assert!(config.sheets.is_none());

        let telegram = config.telegram.unwrap();
        assert_eq!(telegram.bot_token.expose_secret(), "123:abc");
        assert_eq!(telegram.allowed_users, vec!["*"]);
    }

    #[test]
    fn requires_a_transport() {
        let err = load(&[]).unwrap_err();
        assert!(matches!(err, ConfigError::MissingRequired { ref key, .. } if key == "TELEGRAM_BOT_TOKEN"));

        let config = load(&[("ANKETA_CLI", "true")]).unwrap();
        assert!(config.cli_enabled);
        assert!(config.telegram.is_none());
    }

    #[test]
    fn maintenance_config_needs_no_transport() {
        let config = BotConfig::for_maintenance(|_| None).unwrap();
        assert!(config.telegram.is_none());
    }

    #[test]
    fn allowed_users_are_split_and_trimmed() {
        let config = load(&[
            ("TELEGRAM_BOT_TOKEN", "t"),
            ("TELEGRAM_ALLOWED_USERS", " alice, 42 ,,"),
        ])
        .unwrap();
        assert_eq!(config.telegram.unwrap().allowed_users, vec!["alice", "42"]);
    }

    #[test]
    fn sheets_need_a_token() {
        let err = load(&[("ANKETA_CLI", "1"), ("GOOGLE_SHEETS_ID", "sheet")]).unwrap_err();
        assert!(
            matches!(err, ConfigError::MissingRequired { ref key, .. } if key == "GOOGLE_SHEETS_ACCESS_TOKEN")
        );

        let config = load(&[
            ("ANKETA_CLI", "1"),
            ("GOOGLE_SHEETS_ID", "sheet"),
            ("GOOGLE_SHEETS_ACCESS_TOKEN", "ya29.x"),
        ])
        .unwrap();
        let sheets = config.sheets.unwrap();
        assert_eq!(sheets.range, DEFAULT_SHEETS_RANGE);
        assert_eq!(sheets.timeout, Duration::from_secs(15));
    }

    #[test]
    fn rejects_invalid_values() {
        let err = load(&[("ANKETA_CLI", "1"), ("ANKETA_PROGRESS_LAYOUT", "tiny")]).unwrap_err();
        assert!(matches!(err, ConfigError::InvalidValue { .. }));

        let err = load(&[("ANKETA_CLI", "1"), ("ANKETA_SESSION_IDLE_SECS", "0")]).unwrap_err();
        assert!(matches!(err, ConfigError::InvalidValue { ref key, .. } if key == "ANKETA_SESSION_IDLE_SECS"));

        let err = load(&[("ANKETA_CLI", "maybe")]).unwrap_err();
        assert!(matches!(err, ConfigError::InvalidValue { .. }));

        let err = load(&[
            ("ANKETA_CLI", "1"),
            ("GOOGLE_SHEETS_ID", "s"),
            ("GOOGLE_SHEETS_ACCESS_TOKEN", "t"),
            ("GOOGLE_SHEETS_RANGE", "A:N"),
        ])
        .unwrap_err();
        assert!(matches!(err, ConfigError::InvalidValue { ref key, .. } if key == "GOOGLE_SHEETS_RANGE"));
    }

    #[test]
    fn port_zero_disables_api_and_layout_parses() {
        let config = load(&[
            ("ANKETA_CLI", "1"),
            ("ANKETA_API_PORT", "0"),
            ("ANKETA_PROGRESS_LAYOUT", "compact"),
            ("ANKETA_RECONCILE_SECS", "60"),
        ])
        .unwrap();
        assert_eq!(config.api_port, None);
        assert_eq!(config.progress_layout, ProgressLayout::Compact);
        assert_eq!(config.reconcile_interval, Duration::from_secs(60));
    }
}
