//! Process configuration.
//!
//! Everything is read from environment variables. `.env` and
//! `.secrets.env` in the working directory are loaded first when present;
//! variables already set in the process environment take precedence.

use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

use crate::error::ConfigError;

pub const DEFAULT_GRACE_PERIOD: &str = "PT10M";
pub const DEFAULT_PUSHOVER_URL: &str = "https://api.pushover.net/1/messages.json";
pub const DEFAULT_PUSHOVER_RECEIPTS_URL: &str = "https://api.pushover.net/1/receipts";
pub const DEFAULT_DATABASE_PATH: &str = "doorwatch.db";
pub const DEFAULT_API_ADDR: &str = "127.0.0.1:7786";

/// Emergency priority: the provider repeats the alert until it is
/// acknowledged, expires, or is cancelled through its receipt.
pub const DEFAULT_PRIORITY: i8 = 2;
pub const DEFAULT_RETRY_SECS: u32 = 60;
pub const DEFAULT_EXPIRE_SECS: u32 = 3600;
pub const DEFAULT_PROVIDER_TIMEOUT_SECS: u64 = 10;

/// Settings for the Pushover notification provider.
#[derive(Debug, Clone)]
pub struct PushoverConfig {
    pub messages_url: String,
    /// Cancel requests go to `{receipts_url}/{receipt}/cancel.json`.
    pub receipts_url: String,
    pub user_key: String,
    pub app_token: String,
    pub priority: i8,
    pub retry: Duration,
    pub expire: Duration,
    pub timeout: Duration,
}

impl Default for PushoverConfig {
    fn default() -> Self {
        Self {
            messages_url: DEFAULT_PUSHOVER_URL.to_string(),
            receipts_url: DEFAULT_PUSHOVER_RECEIPTS_URL.to_string(),
            user_key: String::new(),
            app_token: String::new(),
            priority: DEFAULT_PRIORITY,
            retry: Duration::from_secs(DEFAULT_RETRY_SECS.into()),
            expire: Duration::from_secs(DEFAULT_EXPIRE_SECS.into()),
            timeout: Duration::from_secs(DEFAULT_PROVIDER_TIMEOUT_SECS),
        }
    }
}

#[derive(Debug, Clone)]
pub struct Config {
    /// How long a sensor may stay open before the alarm fires.
    pub grace_period: Duration,
    pub pushover: PushoverConfig,
    pub database_path: PathBuf,
    pub api_addr: SocketAddr,
}

impl Config {
    /// Load `.env` files, then read the process environment.
    pub fn from_env() -> Result<Self, ConfigError> {
        for file in [".env", ".secrets.env"] {
            // Missing files are normal; anything else is worth a note.
            if let Err(e) = dotenvy::from_filename(file) {
                if !e.not_found() {
                    eprintln!("Ignoring {file}: {e}");
                }
            }
        }
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Build the configuration from an arbitrary variable lookup.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |name: &str| lookup(name).filter(|v| !v.trim().is_empty());

        let grace_raw =
            var("ALARM_DELAY_ISO_8601").unwrap_or_else(|| DEFAULT_GRACE_PERIOD.to_string());
        let grace_period = parse_iso8601_duration(&grace_raw).map_err(|reason| {
            ConfigError::Invalid {
                name: "ALARM_DELAY_ISO_8601",
                value: grace_raw.clone(),
                reason,
            }
        })?;
        if grace_period.is_zero() {
            return Err(ConfigError::Invalid {
                name: "ALARM_DELAY_ISO_8601",
                value: grace_raw,
                reason: "grace period must be positive".to_string(),
            });
        }

        let defaults = PushoverConfig::default();
        let pushover = PushoverConfig {
            messages_url: var("PUSHOVER_URL").unwrap_or(defaults.messages_url),
            receipts_url: var("PUSHOVER_RECEIPTS_URL")
                .map(|url| url.trim_end_matches('/').to_string())
                .unwrap_or(defaults.receipts_url),
            user_key: var("PUSHOVER_USER_KEY").ok_or(ConfigError::Missing {
                name: "PUSHOVER_USER_KEY",
            })?,
            app_token: var("PUSHOVER_APP_TOKEN").ok_or(ConfigError::Missing {
                name: "PUSHOVER_APP_TOKEN",
            })?,
            priority: parse_number(&var, "PUSHOVER_PRIORITY", DEFAULT_PRIORITY)?,
            retry: Duration::from_secs(
                parse_number(&var, "PUSHOVER_RETRY", DEFAULT_RETRY_SECS)?.into(),
            ),
            expire: Duration::from_secs(
                parse_number(&var, "PUSHOVER_EXPIRE", DEFAULT_EXPIRE_SECS)?.into(),
            ),
            timeout: Duration::from_secs(parse_number(
                &var,
                "PUSHOVER_TIMEOUT_SECS",
                DEFAULT_PROVIDER_TIMEOUT_SECS,
            )?),
        };

        let database_path = PathBuf::from(
            var("DATABASE_PATH").unwrap_or_else(|| DEFAULT_DATABASE_PATH.to_string()),
        );

        let api_addr_raw =
            var("DOORWATCH_API_ADDR").unwrap_or_else(|| DEFAULT_API_ADDR.to_string());
        let api_addr = api_addr_raw
            .parse()
            .map_err(|e: std::net::AddrParseError| ConfigError::Invalid {
                name: "DOORWATCH_API_ADDR",
                value: api_addr_raw.clone(),
                reason: e.to_string(),
            })?;

        Ok(Self {
            grace_period,
            pushover,
            database_path,
            api_addr,
        })
    }
}

fn parse_number<T, F>(var: &F, name: &'static str, default: T) -> Result<T, ConfigError>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
    F: Fn(&str) -> Option<String>,
{
    match var(name) {
        None => Ok(default),
        Some(raw) => raw.trim().parse().map_err(|e: T::Err| ConfigError::Invalid {
            name,
            value: raw,
            reason: e.to_string(),
        }),
    }
}

/// Parse an ISO-8601 duration such as `PT10M`, `PT1H30M`, `P1DT2H` or
/// `PT0.5S`.
///
/// Years and months are rejected because their length depends on the
/// calendar.
pub fn parse_iso8601_duration(input: &str) -> Result<Duration, String> {
    match iso8601::duration(&input.trim().to_ascii_uppercase())? {
        iso8601::Duration::Weeks(weeks) => Ok(Duration::from_secs(u64::from(weeks) * 7 * 86_400)),
        iso8601::Duration::YMDHMS {
            year,
            month,
            day,
            hour,
            minute,
            second,
            millisecond,
        } => {
            if year != 0 || month != 0 {
                return Err("years and months are not supported".to_string());
            }
            let secs = u64::from(day) * 86_400
                + u64::from(hour) * 3_600
                + u64::from(minute) * 60
                + u64::from(second);
            Ok(Duration::from_secs(secs) + Duration::from_millis(millisecond.into()))
        }
    }
}

/// Format a duration as `h:mm:ss` for notification text.
pub fn format_hms(duration: Duration) -> String {
    let secs = duration.as_secs();
    format!("{}:{:02}:{:02}", secs / 3600, (secs / 60) % 60, secs % 60)
}
