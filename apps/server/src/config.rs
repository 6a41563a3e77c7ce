use std::env;
use std::time::Duration;

use chrono::{FixedOffset, Offset, Utc};

/// Application configuration loaded from environment variables
#[derive(Debug, Clone)]
pub struct Config {
    pub host: String,
    pub port: u16,
    pub storage: StorageBackend,
    pub database: Option<DatabaseConfig>,
    pub quota: QuotaConfig,
    pub generator: GeneratorConfig,
    pub worker: WorkerConfig,
    pub notification: NotificationConfig,
}

/// Where jobs and usage counters are persisted
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StorageBackend {
    Postgres,
    /// In-process maps; state is lost on restart. Meant for local development.
    Memory,
}

/// Database connection pool configuration
#[derive(Debug, Clone)]
pub struct DatabaseConfig {
    pub url: String,
    pub max_connections: u32,
    pub min_connections: u32,
    pub acquire_timeout: Duration,
    pub idle_timeout: Duration,
    pub max_lifetime: Duration,
}

/// Daily generation quota configuration
#[derive(Debug, Clone)]
pub struct QuotaConfig {
    /// Generations (fresh or regenerated) allowed per user per calendar day
    pub daily_limit: i32,
    /// Offset of the reference timezone used to compute the calendar day
    pub utc_offset_minutes: i32,
}

/// External content generator configuration
#[derive(Debug, Clone)]
pub struct GeneratorConfig {
    /// When false the worker always uses the fallback synthesizer
    pub enabled: bool,
    pub base_url: String,
    pub model: String,
    pub api_key: Option<String>,
    pub language: String,
    pub timeout: Duration,
    pub max_attempts: u32,
    pub base_delay: Duration,
    pub max_jitter: Duration,
}

/// Worker and dispatcher configuration
#[derive(Debug, Clone)]
pub struct WorkerConfig {
    pub max_concurrent_jobs_per_user: usize,
    /// Hard cap on the generate step, retries and backoff included
    pub job_deadline: Duration,
    /// Non-terminal jobs untouched for longer than this are reported as stalled
    pub stall_after: Duration,
}

/// Completion event delivery configuration
#[derive(Debug, Clone)]
pub struct NotificationConfig {
    pub webhook_url: Option<String>,
    pub webhook_secret: Option<String>,
}

fn env_or<T: std::str::FromStr>(key: &str, default: T) -> T {
    env::var(key)
        .ok()
        .and_then(|v| v.trim().parse().ok())
        .unwrap_or(default)
}

fn env_flag(key: &str, default: bool) -> bool {
    env::var(key)
        .map(|v| v == "true" || v == "1")
        .unwrap_or(default)
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self, ConfigError> {
        let storage = match env::var("STORAGE_BACKEND").as_deref() {
            Ok("memory") => StorageBackend::Memory,
            Ok("postgres") | Err(_) => StorageBackend::Postgres,
            Ok(_) => return Err(ConfigError::InvalidStorageBackend),
        };

        let database = match storage {
            StorageBackend::Postgres => Some(DatabaseConfig::from_env()?),
            StorageBackend::Memory => None,
        };

        Ok(Self {
            host: env::var("HOST").unwrap_or_else(|_| "0.0.0.0".to_string()),
            port: env::var("PORT")
                .unwrap_or_else(|_| "8080".to_string())
                .parse()
                .map_err(|_| ConfigError::InvalidPort)?,
            storage,
            database,
            quota: QuotaConfig::from_env(),
            generator: GeneratorConfig::from_env()?,
            worker: WorkerConfig::from_env(),
            notification: NotificationConfig::from_env(),
        })
    }
}

impl DatabaseConfig {
    /// Load database configuration from environment variables
    pub fn from_env() -> Result<Self, ConfigError> {
        let url = env::var("DATABASE_URL").map_err(|_| ConfigError::MissingDatabaseUrl)?;

        Ok(Self {
            url,
            max_connections: env_or("DATABASE_MAX_CONNECTIONS", 10),
            min_connections: env_or("DATABASE_MIN_CONNECTIONS", 1),
            acquire_timeout: Duration::from_secs(env_or("DATABASE_ACQUIRE_TIMEOUT_SECS", 5)),
            idle_timeout: Duration::from_secs(env_or("DATABASE_IDLE_TIMEOUT_SECS", 600)),
            max_lifetime: Duration::from_secs(env_or("DATABASE_MAX_LIFETIME_SECS", 1800)),
        })
    }
}

impl QuotaConfig {
    /// Load quota configuration from environment variables
    pub fn from_env() -> Self {
        Self {
            daily_limit: env_or("DAILY_GENERATION_LIMIT", 10),
            // Western Indonesia Time (UTC+7)
            utc_offset_minutes: env_or("QUOTA_UTC_OFFSET_MINUTES", 420),
        }
    }

    /// Reference timezone for day boundaries. Out-of-range offsets fall back to UTC.
    pub fn offset(&self) -> FixedOffset {
        FixedOffset::east_opt(self.utc_offset_minutes.saturating_mul(60))
            .unwrap_or_else(|| Utc.fix())
    }
}

impl GeneratorConfig {
    /// Load generator configuration from environment variables
    pub fn from_env() -> Result<Self, ConfigError> {
        let enabled = env_flag("GENERATOR_ENABLED", true);
        let api_key = env::var("GENERATOR_API_KEY").ok().filter(|k| !k.is_empty());

        if enabled && api_key.is_none() {
            return Err(ConfigError::MissingGeneratorApiKey);
        }

        Ok(Self {
            enabled,
            base_url: env::var("GENERATOR_BASE_URL").unwrap_or_else(|_| {
                "https://generativelanguage.googleapis.com/v1beta".to_string()
            }),
            model: env::var("GENERATOR_MODEL").unwrap_or_else(|_| "gemini-1.5-flash".to_string()),
            api_key,
            language: env::var("GENERATOR_LANGUAGE").unwrap_or_else(|_| "Indonesian".to_string()),
            timeout: Duration::from_secs(env_or("GENERATOR_TIMEOUT_SECS", 30)),
            max_attempts: env_or("GENERATOR_MAX_ATTEMPTS", 3),
            base_delay: Duration::from_millis(env_or("GENERATOR_BASE_DELAY_MS", 2000)),
            max_jitter: Duration::from_millis(env_or("GENERATOR_MAX_JITTER_MS", 1000)),
        })
    }
}

impl WorkerConfig {
    /// Load worker configuration from environment variables
    pub fn from_env() -> Self {
        Self {
            max_concurrent_jobs_per_user: env_or::<usize>("MAX_CONCURRENT_JOBS_PER_USER", 2).max(1),
            job_deadline: Duration::from_secs(env_or("JOB_DEADLINE_SECS", 120)),
            stall_after: Duration::from_secs(env_or("STALL_AFTER_SECS", 300)),
        }
    }
}

impl NotificationConfig {
    /// Load notification configuration from environment variables
    pub fn from_env() -> Self {
        Self {
            webhook_url: env::var("COMPLETION_WEBHOOK_URL")
                .ok()
                .filter(|u| !u.is_empty()),
            webhook_secret: env::var("COMPLETION_WEBHOOK_SECRET")
                .ok()
                .filter(|s| !s.is_empty()),
        }
    }
}

#[derive(Debug)]
pub enum ConfigError {
    InvalidPort,
    InvalidStorageBackend,
    MissingDatabaseUrl,
    MissingGeneratorApiKey,
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigError::InvalidPort => write!(f, "PORT must be a valid number"),
            ConfigError::InvalidStorageBackend => {
                write!(f, "STORAGE_BACKEND must be either 'postgres' or 'memory'")
            }
            ConfigError::MissingDatabaseUrl => {
                write!(f, "DATABASE_URL environment variable is required")
            }
            ConfigError::MissingGeneratorApiKey => {
                write!(
                    f,
                    "GENERATOR_API_KEY is required unless GENERATOR_ENABLED=false"
                )
            }
        }
    }
}

impl std::error::Error for ConfigError {}
