use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::PathBuf;

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Config {
    pub service: ServiceConfig,
    pub scheduling: SchedulingConfig,
    pub access: AccessConfig,
    pub recording: RecordingConfig,
    pub storage: StorageConfig,
    pub questions: QuestionsConfig,
    pub registry: RegistryConfig,
    pub reminders: ReminderConfig,
    pub nats: NatsConfig,
    pub store: StoreConfig,
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ServiceConfig {
    pub name: String,
    pub http: HttpConfig,
    /// Base URL used when building candidate join links
    pub public_base_url: String,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            name: "interview-orchestrator".to_string(),
            http: HttpConfig::default(),
            public_base_url: "http://localhost:3000".to_string(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct HttpConfig {
    pub bind: String,
    pub port: u16,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            bind: "127.0.0.1".to_string(),
            port: 8080,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct SchedulingConfig {
    /// Canonical daily start times, "HH:MM" wall clock
    pub times: Vec<String>,
    pub duration_minutes: u32,
    /// Same-day bookings must start at least this far in the future
    pub same_day_buffer_minutes: u32,
    pub lookahead_days: u32,
    pub skip_weekends: bool,
    pub interviewer_type: String,
    /// Offset of the wall clock the catalog is expressed in
    pub utc_offset_minutes: i32,
}

impl Default for SchedulingConfig {
    fn default() -> Self {
        Self {
            times: ["09:00", "10:00", "11:00", "14:00", "15:00", "16:00"]
                .iter()
                .map(|t| t.to_string())
                .collect(),
            duration_minutes: 45,
            same_day_buffer_minutes: 120,
            lookahead_days: 14,
            skip_weekends: true,
            interviewer_type: "ai".to_string(),
            utc_offset_minutes: 0,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct AccessConfig {
    pub early_access_minutes: u32,
    pub grace_minutes: u32,
}

impl Default for AccessConfig {
    fn default() -> Self {
        Self {
            early_access_minutes: 15,
            grace_minutes: 30,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct RecordingConfig {
    /// Capture provider REST base URL
    pub provider_url: String,
    pub app_id: String,
    pub customer_id: String,
    pub customer_secret: String,
    /// Where finished artifacts can be downloaded from
    pub artifact_base_url: String,
    pub mode: String,
    pub resource_expired_hours: u32,
    pub max_idle_secs: u32,
    /// Local scratch directory for downloaded artifacts
    pub artifacts_dir: PathBuf,
    pub upload_max_attempts: u32,
    pub upload_backoff_ms: u64,
    /// Session id prefixes treated as demo sessions
    pub demo_id_prefixes: Vec<String>,
}

impl Default for RecordingConfig {
    fn default() -> Self {
        Self {
            provider_url: "https://api.agora.io".to_string(),
            app_id: String::new(),
            customer_id: String::new(),
            customer_secret: String::new(),
            artifact_base_url: String::new(),
            mode: "composite".to_string(),
            resource_expired_hours: 24,
            max_idle_secs: 30,
            artifacts_dir: PathBuf::from("data/recordings"),
            upload_max_attempts: 3,
            upload_backoff_ms: 2_000,
            demo_id_prefixes: vec!["TEST-".to_string()],
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    pub root: PathBuf,
    pub public_base_url: String,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            root: PathBuf::from("data/storage"),
            public_base_url: "http://localhost:8080/files".to_string(),
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct QuestionsConfig {
    /// JSON question banks keyed by job reference; the built-in bank is used when unset
    pub bank_path: Option<PathBuf>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct RegistryConfig {
    /// Idle entries older than this are evicted
    pub entry_ttl_secs: u64,
    pub sweep_interval_secs: u64,
}

impl Default for RegistryConfig {
    fn default() -> Self {
        Self {
            entry_ttl_secs: 4 * 60 * 60,
            sweep_interval_secs: 60,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ReminderConfig {
    pub enabled: bool,
    pub lookahead_hours: u32,
    pub check_interval_secs: u64,
}

impl Default for ReminderConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            lookahead_hours: 24,
            check_interval_secs: 15 * 60,
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct NatsConfig {
    /// Lifecycle events are only logged when unset
    pub url: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    /// JSON snapshot file; in-memory only when unset
    pub path: Option<PathBuf>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    pub json: bool,
}

impl Config {
    /// Load the optional config file at `path`, overridden by `INTERVIEW__*` env vars
    pub fn load(path: &str) -> Result<Self> {
        let settings = config::Config::builder()
            .add_source(config::File::with_name(path).required(false))
            .add_source(
                config::Environment::with_prefix("INTERVIEW")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()
            .context("Failed to build configuration")?;

        Ok(settings.try_deserialize()?)
    }
}
