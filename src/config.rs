//! Configuration types for nntp-importer

use serde::{Deserialize, Serialize};
use std::{path::PathBuf, time::Duration};

/// Default NNTP port, used for both the MBBS and the upstream news server
pub const DEFAULT_NNTP_PORT: u16 = 119;

/// Default cycle interval for both jobs, in minutes
pub const DEFAULT_INTERVAL_MINUTES: u64 = 5;

/// Default name of the newsgroup status file
pub const DEFAULT_STATUS_FILE: &str = "NNTPImporter.cfg";

/// Username literal meaning "the news server needs no authentication"
pub const NO_AUTH_LITERAL: &str = "nil";

/// Main configuration for the importer and downloader jobs
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Config {
    /// Importer job settings (local queue → MBBS)
    pub importer: ImporterConfig,

    /// Downloader job settings (NNTP server → local files)
    pub downloader: DownloaderConfig,

    /// Connect timeout and retry delay shared by both jobs
    #[serde(default)]
    pub retry: RetryConfig,
}

/// Address of an NNTP-speaking server
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Server hostname or IP
    pub host: String,

    /// Server port (default: 119)
    #[serde(default = "default_port")]
    pub port: u16,
}

impl ServerConfig {
    /// Server on the default NNTP port
    pub fn new(host: impl Into<String>) -> Self {
        Self {
            host: host.into(),
            port: DEFAULT_NNTP_PORT,
        }
    }

    /// `host:port` form used for dialing and logging
    pub fn addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

/// Importer job configuration
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ImporterConfig {
    /// MBBS server receiving the imported messages
    pub server: ServerConfig,

    /// Directory scanned for `*.txt` message files each cycle
    pub import_dir: PathBuf,

    /// Delay between import cycles (default: 5 minutes)
    #[serde(default = "default_interval", with = "duration_serde")]
    pub interval: Duration,
}

/// Downloader job configuration
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct DownloaderConfig {
    /// Upstream NNTP server articles are downloaded from
    pub server: ServerConfig,

    /// Credentials for `AUTHINFO`, if the server requires them
    #[serde(default)]
    pub credentials: Option<Credentials>,

    /// Directory downloaded articles are written to (created if missing)
    pub download_dir: PathBuf,

    /// Newsgroup status file holding the per-group cursors
    #[serde(default = "default_status_file")]
    pub status_file: PathBuf,

    /// Delay between download cycles (default: 5 minutes)
    #[serde(default = "default_interval", with = "duration_serde")]
    pub interval: Duration,
}

/// `AUTHINFO USER` / `AUTHINFO PASS` credentials
#[derive(Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Credentials {
    /// Username sent with `AUTHINFO USER`
    pub username: String,
    /// Password sent with `AUTHINFO PASS`
    pub password: String,
}

impl Credentials {
    /// Build credentials from the raw username/password arguments.
    ///
    /// Returns `None` when the username is the literal `nil`.
    pub fn from_args(username: &str, password: &str) -> Option<Self> {
        if username == NO_AUTH_LITERAL {
            return None;
        }
        Some(Self {
            username: username.to_string(),
            password: password.to_string(),
        })
    }
}

impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credentials")
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .finish()
    }
}

/// Connection retry policy
///
/// A connect attempt that fails or exceeds `connect_timeout` is followed by a
/// fixed `retry_delay` before the next attempt. There is no attempt ceiling.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct RetryConfig {
    /// Upper bound for a single TCP connect attempt (default: 10 seconds)
    #[serde(default = "default_connect_timeout", with = "duration_serde")]
    pub connect_timeout: Duration,

    /// Delay between connect attempts (default: 30 seconds)
    #[serde(default = "default_retry_delay", with = "duration_serde")]
    pub retry_delay: Duration,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            connect_timeout: default_connect_timeout(),
            retry_delay: default_retry_delay(),
        }
    }
}

/// Parse an interval argument given in minutes.
///
/// Non-numeric input falls back to the default of 5 minutes; anything below
/// one minute is raised to one minute.
pub fn interval_from_arg(arg: &str) -> Duration {
    let minutes = arg
        .trim()
        .parse::<i64>()
        .map(|m| m.max(1) as u64)
        .unwrap_or(DEFAULT_INTERVAL_MINUTES);
    Duration::from_secs(minutes.saturating_mul(60))
}

/// Whole minutes in an interval, for log messages
pub fn interval_minutes(interval: Duration) -> u64 {
    interval.as_secs() / 60
}

fn default_port() -> u16 {
    DEFAULT_NNTP_PORT
}

fn default_interval() -> Duration {
    Duration::from_secs(DEFAULT_INTERVAL_MINUTES * 60)
}

fn default_status_file() -> PathBuf {
    PathBuf::from(DEFAULT_STATUS_FILE)
}

fn default_connect_timeout() -> Duration {
    Duration::from_secs(10)
}

fn default_retry_delay() -> Duration {
    Duration::from_secs(30)
}

// Duration serialization helper
mod duration_serde {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_u64(duration.as_secs())
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let secs = u64::deserialize(deserializer)?;
        Ok(Duration::from_secs(secs))
    }
}
