//! Configuration types for ar-courier
//!
//! Every setting can be deserialized from JSON/TOML through serde or read
//! from the process environment with [`Config::from_env`] (a `.env` file in
//! the working directory is loaded first when present).

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::{path::PathBuf, time::Duration};

/// Remote storage (FTP) connection settings
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct StorageConfig {
    /// Server hostname or IP address
    pub host: String,

    /// Control-channel port (default: 21)
    #[serde(default = "default_ftp_port")]
    pub port: u16,

    /// Login user
    pub username: String,

    /// Login password
    pub password: String,

    /// Remote directory prefix prepended to every staged file name (default: "")
    ///
    /// Used verbatim, so it should end with `/` when non-empty.
    #[serde(default)]
    pub directory: String,
}

impl StorageConfig {
    /// `host:port` of the control channel
    pub fn address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

/// Upload behavior
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct TransferConfig {
    /// Bound for every network call (default: 10 seconds)
    #[serde(default = "default_timeout", with = "duration_serde")]
    pub timeout: Duration,

    /// Bytes sent per chunk; one progress event follows each chunk (default: 8192)
    #[serde(default = "default_chunk_size")]
    pub chunk_size: usize,

    /// Pause between closing the remote session and reporting success (default: 400ms)
    #[serde(default = "default_settle_delay", with = "millis_serde")]
    pub settle_delay: Duration,
}

impl Default for TransferConfig {
    fn default() -> Self {
        Self {
            timeout: default_timeout(),
            chunk_size: default_chunk_size(),
            settle_delay: default_settle_delay(),
        }
    }
}

/// Local staging of generated batch files
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct StagingConfig {
    /// Directory batch files are written to before upload (default: "ftp_files")
    #[serde(default = "default_staging_dir")]
    pub directory: PathBuf,

    /// Client acronym used in batch file names and headers
    pub client_acronym: String,
}

/// Upstream registration API settings
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct RegistrationConfig {
    /// API base URL (e.g., "https://api.example.com")
    pub base_url: String,

    /// Path of the OAuth token endpoint, appended to `base_url`
    pub token_uri: String,

    /// Path of the include endpoint, appended to `base_url`
    pub include_uri: String,

    /// OAuth client id
    pub client_id: String,

    /// OAuth client secret
    pub client_secret: String,

    /// OAuth grant type (default: "client_credentials")
    #[serde(default = "default_grant_type")]
    pub grant_type: String,
}

impl RegistrationConfig {
    /// Full URL of the token endpoint
    pub fn token_url(&self) -> String {
        join_url(&self.base_url, &self.token_uri)
    }

    /// Full URL of the include endpoint
    pub fn include_url(&self) -> String {
        join_url(&self.base_url, &self.include_uri)
    }
}

fn join_url(base: &str, path: &str) -> String {
    if path.is_empty() {
        return base.to_string();
    }
    format!(
        "{}/{}",
        base.trim_end_matches('/'),
        path.trim_start_matches('/')
    )
}

/// Main configuration for ar-courier
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Config {
    /// Remote storage connection
    pub storage: StorageConfig,

    /// Upload behavior
    #[serde(default)]
    pub transfer: TransferConfig,

    /// Local staging
    pub staging: StagingConfig,

    /// Upstream registration API
    pub registration: RegistrationConfig,
}

impl Config {
    /// Load configuration from the process environment
    ///
    /// A `.env` file is loaded first if one exists; variables already set in
    /// the environment take precedence over it.
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok();
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load configuration through an arbitrary key lookup
    ///
    /// Empty values are treated as unset. A few settings still answer to the
    /// names older deployments used (see [`LEGACY_KEYS`]); the current name
    /// wins when both are set. The result is validated.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| {
            let found = |name: &str| lookup(name).filter(|v| !v.trim().is_empty());
            found(key).or_else(|| {
                LEGACY_KEYS
                    .iter()
                    .find(|(current, _)| *current == key)
                    .and_then(|(_, legacy)| found(*legacy))
            })
        };
        let required = |key: &str| {
            get(key).ok_or_else(|| Error::config(format!("{key} is not set"), key))
        };

        let config = Config {
            storage: StorageConfig {
                host: required("FTP_SERVER_HOST")?,
                port: parse_or(get("FTP_SERVER_PORT"), "FTP_SERVER_PORT", default_ftp_port())?,
                username: required("FTP_SERVER_USER")?,
                password: required("FTP_SERVER_PASS")?,
                directory: get("FTP_SERVER_DIR").unwrap_or_default(),
            },
            transfer: TransferConfig {
                timeout: Duration::from_secs(parse_or(
                    get("CONNECTION_TIMEOUT"),
                    "CONNECTION_TIMEOUT",
                    default_timeout().as_secs(),
                )?),
                chunk_size: parse_or(
                    get("TRANSFER_CHUNK_SIZE"),
                    "TRANSFER_CHUNK_SIZE",
                    default_chunk_size(),
                )?,
                settle_delay: default_settle_delay(),
            },
            staging: StagingConfig {
                directory: get("STAGING_DIR")
                    .map(PathBuf::from)
                    .unwrap_or_else(default_staging_dir),
                client_acronym: required("CLIENT_ACRONYM")?,
            },
            registration: RegistrationConfig {
                base_url: required("REGISTRATION_BASE_URL")?,
                token_uri: required("OAUTH_TOKEN_URI")?,
                include_uri: required("REGISTRATION_INCLUDE_URI")?,
                client_id: required("OAUTH_CLIENT_ID")?,
                client_secret: required("OAUTH_CLIENT_SECRET")?,
                grant_type: get("OAUTH_GRANT_TYPE").unwrap_or_else(default_grant_type),
            },
        };

        config.validate()?;
        Ok(config)
    }

    /// Reject settings the pipeline cannot run with
    pub fn validate(&self) -> Result<()> {
        if self.storage.host.trim().is_empty() {
            return Err(Error::config("FTP host must not be empty", "FTP_SERVER_HOST"));
        }
        if self.storage.port == 0 {
            return Err(Error::config("FTP port must not be 0", "FTP_SERVER_PORT"));
        }
        if self.transfer.chunk_size == 0 {
            return Err(Error::config(
                "chunk size must be greater than 0",
                "TRANSFER_CHUNK_SIZE",
            ));
        }
        if self.transfer.timeout.is_zero() {
            return Err(Error::config(
                "connection timeout must be greater than 0",
                "CONNECTION_TIMEOUT",
            ));
        }
        if self.staging.client_acronym.trim().is_empty() {
            return Err(Error::config(
                "client acronym must not be empty",
                "CLIENT_ACRONYM",
            ));
        }
        url::Url::parse(&self.registration.base_url).map_err(|e| {
            Error::config(
                format!("invalid registration base URL: {e}"),
                "REGISTRATION_BASE_URL",
            )
        })?;
        Ok(())
    }
}

/// Older variable names still accepted, as `(current, legacy)`
pub const LEGACY_KEYS: &[(&str, &str)] = &[
    ("CONNECTION_TIMEOUT", "FLASK_CONNECTION_TIMEOUT"),
    ("REGISTRATION_BASE_URL", "ECIDADE_BASE"),
    ("REGISTRATION_INCLUDE_URI", "ECIDADE_INCLUSAO"),
];

fn parse_or<T>(value: Option<String>, key: &str, default: T) -> Result<T>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    match value {
        None => Ok(default),
        Some(raw) => raw
            .trim()
            .parse()
            .map_err(|e| Error::config(format!("{key}={raw:?} is invalid: {e}"), key)),
    }
}

fn default_ftp_port() -> u16 {
    21
}

fn default_timeout() -> Duration {
    Duration::from_secs(10)
}

fn default_chunk_size() -> usize {
    8192
}

fn default_settle_delay() -> Duration {
    Duration::from_millis(400)
}

fn default_staging_dir() -> PathBuf {
    PathBuf::from("ftp_files")
}

fn default_grant_type() -> String {
    "client_credentials".to_string()
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

// Sub-second Duration serialization helper
mod millis_serde {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_u64(duration.as_millis() as u64)
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let millis = u64::deserialize(deserializer)?;
        Ok(Duration::from_millis(millis))
    }
}

#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;
    use std::collections::HashMap;

    fn full_env() -> HashMap<&'static str, &'static str> {
        HashMap::from([
            ("FTP_SERVER_HOST", "ftp.example.com"),
            ("FTP_SERVER_USER", "courier"),
            ("FTP_SERVER_PASS", "secret"),
            ("CLIENT_ACRONYM", "PMX"),
            ("REGISTRATION_BASE_URL", "https://api.example.com"),
            ("OAUTH_TOKEN_URI", "/oauth/token"),
            ("REGISTRATION_INCLUDE_URI", "/ar/include"),
            ("OAUTH_CLIENT_ID", "client"),
            ("OAUTH_CLIENT_SECRET", "shh"),
        ])
    }

    fn load(env: &HashMap<&'static str, &'static str>) -> Result<Config> {
        Config::from_lookup(|key| env.get(key).map(|v| v.to_string()))
    }

    #[test]
    fn test_from_lookup_applies_defaults() {
        let config = load(&full_env()).unwrap();

        assert_eq!(config.storage.port, 21);
        assert_eq!(config.storage.directory, "");
        assert_eq!(config.transfer.timeout, Duration::from_secs(10));
        assert_eq!(config.transfer.chunk_size, 8192);
        assert_eq!(config.transfer.settle_delay, Duration::from_millis(400));
        assert_eq!(config.staging.directory, PathBuf::from("ftp_files"));
        assert_eq!(config.registration.grant_type, "client_credentials");
        assert_eq!(config.storage.address(), "ftp.example.com:21");
    }

    #[test]
    fn test_from_lookup_reads_overrides() {
        let mut env = full_env();
        env.insert("FTP_SERVER_PORT", "2121");
        env.insert("FTP_SERVER_DIR", "inbox/");
        env.insert("CONNECTION_TIMEOUT", "3");
        env.insert("TRANSFER_CHUNK_SIZE", "1024");
        env.insert("STAGING_DIR", "/tmp/staging");

        let config = load(&env).unwrap();
        assert_eq!(config.storage.port, 2121);
        assert_eq!(config.storage.directory, "inbox/");
        assert_eq!(config.transfer.timeout, Duration::from_secs(3));
        assert_eq!(config.transfer.chunk_size, 1024);
        assert_eq!(config.staging.directory, PathBuf::from("/tmp/staging"));
    }

    #[test]
    fn test_legacy_names_fill_in_for_current_ones() {
        let mut env = full_env();
        env.remove("REGISTRATION_BASE_URL");
        env.remove("REGISTRATION_INCLUDE_URI");
        env.insert("ECIDADE_BASE", "https://legacy.example.com");
        env.insert("ECIDADE_INCLUSAO", "/ecidade/ar");
        env.insert("FLASK_CONNECTION_TIMEOUT", "7");

        let config = load(&env).unwrap();
        assert_eq!(config.registration.base_url, "https://legacy.example.com");
        assert_eq!(
            config.registration.include_url(),
            "https://legacy.example.com/ecidade/ar"
        );
        assert_eq!(config.transfer.timeout, Duration::from_secs(7));

        env.insert("CONNECTION_TIMEOUT", "3");
        env.insert("REGISTRATION_BASE_URL", "https://api.example.com");
        let config = load(&env).unwrap();
        assert_eq!(config.transfer.timeout, Duration::from_secs(3));
        assert_eq!(config.registration.base_url, "https://api.example.com");
    }

    #[test]
    fn test_missing_required_key_names_the_key() {
        let mut env = full_env();
        env.remove("FTP_SERVER_HOST");

        match load(&env) {
            Err(Error::Config { key, .. }) => assert_eq!(key.as_deref(), Some("FTP_SERVER_HOST")),
            other => panic!("expected config error, got {other:?}"),
        }
    }

    #[test]
    fn test_blank_value_counts_as_missing() {
        let mut env = full_env();
        env.insert("CLIENT_ACRONYM", "   ");
        assert!(load(&env).is_err());
    }

    #[test]
    fn test_invalid_numbers_are_rejected() {
        let mut env = full_env();
        env.insert("FTP_SERVER_PORT", "ftp");
        assert!(load(&env).is_err());

        let mut env = full_env();
        env.insert("TRANSFER_CHUNK_SIZE", "0");
        match load(&env) {
            Err(Error::Config { key, .. }) => {
                assert_eq!(key.as_deref(), Some("TRANSFER_CHUNK_SIZE"))
            }
            other => panic!("expected config error, got {other:?}"),
        }

        let mut env = full_env();
        env.insert("CONNECTION_TIMEOUT", "0");
        assert!(load(&env).is_err());
    }

    #[test]
    fn test_registration_urls_are_joined() {
        let mut env = full_env();
        env.insert("REGISTRATION_BASE_URL", "https://api.example.com/");
        let config = load(&env).unwrap();
        assert_eq!(
            config.registration.token_url(),
            "https://api.example.com/oauth/token"
        );
        assert_eq!(
            config.registration.include_url(),
            "https://api.example.com/ar/include"
        );
    }

    #[test]
    fn test_transfer_config_serde_units() {
        let json = serde_json::to_value(TransferConfig::default()).unwrap();
        assert_eq!(json["timeout"], 10);
        assert_eq!(json["settle_delay"], 400);

        let parsed: TransferConfig = serde_json::from_str(r#"{"timeout": 5}"#).unwrap();
        assert_eq!(parsed.timeout, Duration::from_secs(5));
        assert_eq!(parsed.chunk_size, 8192);
        assert_eq!(parsed.settle_delay, Duration::from_millis(400));
    }

    #[test]
    #[serial]
    fn test_from_env_reads_process_environment() {
        let env = full_env();
        // SAFETY: serialized with every other environment-mutating test
        unsafe {
            for (key, value) in &env {
                std::env::set_var(key, value);
            }
            std::env::set_var("FTP_SERVER_PORT", "990");
        }

        let config = Config::from_env();

        unsafe {
            for key in env.keys() {
                std::env::remove_var(key);
            }
            std::env::remove_var("FTP_SERVER_PORT");
        }

        let config = config.unwrap();
        assert_eq!(config.storage.host, "ftp.example.com");
        assert_eq!(config.storage.port, 990);
    }
}
