//! Environment-backed configuration.
//!
//! Every setting has a default. Override with `INTERVUE_*` environment variables.

pub mod error;


pub use error::ConfigError;

use std::env;
use std::net::IpAddr;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use crate::constants::*;
use crate::session::EngineConfig;

/// Process configuration loaded from environment variables.
///
/// Use [`Config::from_env`] to read `INTERVUE_*` overrides on top of defaults.
#[derive(Debug, Clone)]
pub struct Config {
    /// HTTP server port. Default: `8080`.
    pub port: u16,

    /// IP address to bind to. Default: `127.0.0.1`.
    pub bind_addr: IpAddr,

    /// Directory for the file-backed store. `None` keeps everything in memory.
    pub storage_path: Option<PathBuf>,

    /// `genai` model name. `None` runs fully offline.
    pub model: Option<String>,

    /// JSON file replacing the built-in question bank.
    pub question_bank_path: Option<PathBuf>,

    pub exact_capacity: u64,
    pub semantic_capacity: usize,
    pub cache_ttl_secs: u64,
    pub semantic_threshold: f32,
    pub difficulty_window: usize,
    pub standard_questions: usize,
    pub rapid_fire_questions: usize,
    pub rapid_fire_time_limit_secs: u64,
    pub remote_timeout_secs: u64,
    pub batch_timeout_secs: u64,
    pub min_answer_length: usize,
    pub session_retention_secs: u64,
    pub inactivity_timeout_secs: u64,
    pub reaper_interval_secs: u64,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            port: 8080,
            bind_addr: IpAddr::V4(std::net::Ipv4Addr::new(127, 0, 0, 1)),
            storage_path: None,
            model: None,
            question_bank_path: None,
            exact_capacity: DEFAULT_EXACT_CAPACITY,
            semantic_capacity: DEFAULT_SEMANTIC_CAPACITY,
            cache_ttl_secs: DEFAULT_CACHE_TTL_SECS,
            semantic_threshold: DEFAULT_SEMANTIC_THRESHOLD,
            difficulty_window: DEFAULT_DIFFICULTY_WINDOW,
            standard_questions: DEFAULT_STANDARD_QUESTIONS,
            rapid_fire_questions: DEFAULT_RAPID_FIRE_QUESTIONS,
            rapid_fire_time_limit_secs: DEFAULT_RAPID_FIRE_TIME_LIMIT_SECS,
            remote_timeout_secs: DEFAULT_REMOTE_TIMEOUT_SECS,
            batch_timeout_secs: DEFAULT_BATCH_TIMEOUT_SECS,
            min_answer_length: DEFAULT_MIN_ANSWER_LENGTH,
            session_retention_secs: DEFAULT_SESSION_RETENTION_SECS,
            inactivity_timeout_secs: DEFAULT_INACTIVITY_TIMEOUT_SECS,
            reaper_interval_secs: DEFAULT_REAPER_INTERVAL_SECS,
        }
    }
}

impl Config {
    const ENV_PORT: &'static str = "INTERVUE_PORT";
    const ENV_BIND_ADDR: &'static str = "INTERVUE_BIND_ADDR";
    const ENV_STORAGE_PATH: &'static str = "INTERVUE_STORAGE_PATH";
    const ENV_MODEL: &'static str = "INTERVUE_MODEL";
    const ENV_QUESTION_BANK_PATH: &'static str = "INTERVUE_QUESTION_BANK_PATH";
    const ENV_EXACT_CAPACITY: &'static str = "INTERVUE_EXACT_CAPACITY";
    const ENV_SEMANTIC_CAPACITY: &'static str = "INTERVUE_SEMANTIC_CAPACITY";
    const ENV_CACHE_TTL_SECS: &'static str = "INTERVUE_CACHE_TTL_SECS";
    const ENV_SEMANTIC_THRESHOLD: &'static str = "INTERVUE_SEMANTIC_THRESHOLD";
    const ENV_DIFFICULTY_WINDOW: &'static str = "INTERVUE_DIFFICULTY_WINDOW";
    const ENV_STANDARD_QUESTIONS: &'static str = "INTERVUE_STANDARD_QUESTIONS";
    const ENV_RAPID_FIRE_QUESTIONS: &'static str = "INTERVUE_RAPID_FIRE_QUESTIONS";
    const ENV_RAPID_FIRE_TIME_LIMIT_SECS: &'static str = "INTERVUE_RAPID_FIRE_TIME_LIMIT_SECS";
    const ENV_REMOTE_TIMEOUT_SECS: &'static str = "INTERVUE_REMOTE_TIMEOUT_SECS";
    const ENV_BATCH_TIMEOUT_SECS: &'static str = "INTERVUE_BATCH_TIMEOUT_SECS";
    const ENV_MIN_ANSWER_LENGTH: &'static str = "INTERVUE_MIN_ANSWER_LENGTH";
    const ENV_SESSION_RETENTION_SECS: &'static str = "INTERVUE_SESSION_RETENTION_SECS";
    const ENV_INACTIVITY_TIMEOUT_SECS: &'static str = "INTERVUE_INACTIVITY_TIMEOUT_SECS";
    const ENV_REAPER_INTERVAL_SECS: &'static str = "INTERVUE_REAPER_INTERVAL_SECS";

    /// Loads configuration from environment variables (falling back to defaults).
    pub fn from_env() -> Result<Self, ConfigError> {
        let d = Self::default();

        Ok(Self {
            port: Self::parse_port_from_env(d.port)?,
            bind_addr: Self::parse_bind_addr_from_env(d.bind_addr)?,
            storage_path: Self::parse_optional_path_from_env(Self::ENV_STORAGE_PATH),
            model: Self::parse_optional_string_from_env(Self::ENV_MODEL),
            question_bank_path: Self::parse_optional_path_from_env(Self::ENV_QUESTION_BANK_PATH),
            exact_capacity: Self::parse_from_env(Self::ENV_EXACT_CAPACITY, d.exact_capacity)?,
            semantic_capacity: Self::parse_from_env(
                Self::ENV_SEMANTIC_CAPACITY,
                d.semantic_capacity,
            )?,
            cache_ttl_secs: Self::parse_from_env(Self::ENV_CACHE_TTL_SECS, d.cache_ttl_secs)?,
            semantic_threshold: Self::parse_from_env(
                Self::ENV_SEMANTIC_THRESHOLD,
                d.semantic_threshold,
            )?,
            difficulty_window: Self::parse_from_env(
                Self::ENV_DIFFICULTY_WINDOW,
                d.difficulty_window,
            )?,
            standard_questions: Self::parse_from_env(
                Self::ENV_STANDARD_QUESTIONS,
                d.standard_questions,
            )?,
            rapid_fire_questions: Self::parse_from_env(
                Self::ENV_RAPID_FIRE_QUESTIONS,
                d.rapid_fire_questions,
            )?,
            rapid_fire_time_limit_secs: Self::parse_from_env(
                Self::ENV_RAPID_FIRE_TIME_LIMIT_SECS,
                d.rapid_fire_time_limit_secs,
            )?,
            remote_timeout_secs: Self::parse_from_env(
                Self::ENV_REMOTE_TIMEOUT_SECS,
                d.remote_timeout_secs,
            )?,
            batch_timeout_secs: Self::parse_from_env(
                Self::ENV_BATCH_TIMEOUT_SECS,
                d.batch_timeout_secs,
            )?,
            min_answer_length: Self::parse_from_env(
                Self::ENV_MIN_ANSWER_LENGTH,
                d.min_answer_length,
            )?,
            session_retention_secs: Self::parse_from_env(
                Self::ENV_SESSION_RETENTION_SECS,
                d.session_retention_secs,
            )?,
            inactivity_timeout_secs: Self::parse_from_env(
                Self::ENV_INACTIVITY_TIMEOUT_SECS,
                d.inactivity_timeout_secs,
            )?,
            reaper_interval_secs: Self::parse_from_env(
                Self::ENV_REAPER_INTERVAL_SECS,
                d.reaper_interval_secs,
            )?,
        })
    }

    /// Validates paths and engine invariants (does not create directories).
    pub fn validate(&self) -> Result<(), ConfigError> {
        if let Some(ref path) = self.storage_path
            && path.exists()
            && !path.is_dir()
        {
            return Err(ConfigError::NotADirectory { path: path.clone() });
        }

        if let Some(ref path) = self.question_bank_path {
            if !path.exists() {
                return Err(ConfigError::PathNotFound { path: path.clone() });
            }
            if !path.is_file() {
                return Err(ConfigError::NotAFile { path: path.clone() });
            }
        }

        if self.reaper_interval_secs == 0 {
            return Err(ConfigError::OutOfRange {
                name: Self::ENV_REAPER_INTERVAL_SECS,
                reason: "must be at least 1 second".to_string(),
            });
        }

        self.engine_config().validate()
    }

    /// Returns `"{bind_addr}:{port}"` (useful for logging/binding).
    pub fn socket_addr(&self) -> String {
        format!("{}:{}", self.bind_addr, self.port)
    }

    /// The engine-side slice of this configuration.
    pub fn engine_config(&self) -> EngineConfig {
        EngineConfig {
            exact_capacity: self.exact_capacity,
            semantic_capacity: self.semantic_capacity,
            cache_ttl: Duration::from_secs(self.cache_ttl_secs),
            semantic_threshold: self.semantic_threshold,
            difficulty_window: self.difficulty_window,
            standard_questions: self.standard_questions,
            rapid_fire_questions: self.rapid_fire_questions,
            rapid_fire_time_limit: Duration::from_secs(self.rapid_fire_time_limit_secs),
            remote_timeout: Duration::from_secs(self.remote_timeout_secs),
            batch_timeout: Duration::from_secs(self.batch_timeout_secs),
            min_answer_length: self.min_answer_length,
            session_retention: Duration::from_secs(self.session_retention_secs),
            inactivity_timeout: Duration::from_secs(self.inactivity_timeout_secs),
            reaper_interval: Duration::from_secs(self.reaper_interval_secs),
        }
    }

    fn parse_port_from_env(default: u16) -> Result<u16, ConfigError> {
        match env::var(Self::ENV_PORT) {
            Ok(value) => {
                let port: u16 = value.parse().map_err(|e| ConfigError::PortParseError {
                    value: value.clone(),
                    source: e,
                })?;

                if port == 0 {
                    return Err(ConfigError::InvalidPort { value });
                }

                Ok(port)
            }
            Err(_) => Ok(default),
        }
    }

    fn parse_bind_addr_from_env(default: IpAddr) -> Result<IpAddr, ConfigError> {
        match env::var(Self::ENV_BIND_ADDR) {
            Ok(value) => value
                .parse()
                .map_err(|e| ConfigError::InvalidBindAddr { value, source: e }),
            Err(_) => Ok(default),
        }
    }

    fn parse_optional_path_from_env(var_name: &str) -> Option<PathBuf> {
        Self::parse_optional_string_from_env(var_name).map(PathBuf::from)
    }

    fn parse_optional_string_from_env(var_name: &str) -> Option<String> {
        env::var(var_name)
            .ok()
            .map(|v| v.trim().to_string())
            .filter(|v| !v.is_empty())
    }

    fn parse_from_env<T: FromStr>(var_name: &'static str, default: T) -> Result<T, ConfigError> {
        match env::var(var_name) {
            Ok(value) => value
                .trim()
                .parse()
                .map_err(|_| ConfigError::InvalidValue {
                    name: var_name,
                    value,
                }),
            Err(_) => Ok(default),
        }
    }
}
