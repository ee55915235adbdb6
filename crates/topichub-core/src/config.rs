//! Settings loader and path helpers.
//!
//! Uses Figment to merge built-in defaults, `config.toml`, `config.<env>.toml`
//! and `TOPICHUB_*` env vars (`__` separates nested keys, e.g.
//! `TOPICHUB_LIMITS__MAX_TEXTS=100`).
use figment::{
    providers::{Env, Format, Serialized, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};
use std::env;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::types::JobStatus;

pub const ENV_PREFIX: &str = "TOPICHUB_";

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub limits: Limits,
    pub session: SessionSettings,
    pub stages_ms: StageDurations,
    pub suggestions: SuggestionSettings,
    pub checkpoints: CheckpointSettings,
    pub server: ServerSettings,
    pub poll: PollSettings,
}

/// Submission limits.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Limits {
    pub min_texts: usize,
    pub max_texts: usize,
    pub max_text_length: usize,
    pub max_concurrent_jobs: usize,
}

impl Default for Limits {
    fn default() -> Self {
        Self { min_texts: 10, max_texts: 50_000, max_text_length: 5_000, max_concurrent_jobs: 3 }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionSettings {
    /// A running job not written for longer than this reads as interrupted.
    pub staleness_timeout_secs: u64,
    pub job_ttl_secs: u64,
    /// Retention of completed results, so they can seed reclustering.
    pub result_ttl_secs: u64,
    /// Interval between progress writes of a running job.
    pub heartbeat_ms: u64,
}

impl Default for SessionSettings {
    fn default() -> Self {
        Self { staleness_timeout_secs: 10, job_ttl_secs: 86_400, result_ttl_secs: 172_800, heartbeat_ms: 250 }
    }
}

impl SessionSettings {
    pub fn staleness_timeout(&self) -> chrono::Duration {
        chrono::Duration::seconds(self.staleness_timeout_secs.min(i64::MAX as u64 / 1_000) as i64)
    }

    pub fn heartbeat(&self) -> Duration {
        Duration::from_millis(self.heartbeat_ms)
    }
}

/// Nominal duration of each active stage, in milliseconds. Progress is
/// weighted by these. Labeling lasts until the compute call returns.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StageDurations {
    pub queued: u64,
    pub embedding: u64,
    pub reducing: u64,
    pub clustering: u64,
    pub labeling: u64,
}

impl Default for StageDurations {
    fn default() -> Self {
        Self { queued: 300, embedding: 4_000, reducing: 2_000, clustering: 1_500, labeling: 2_500 }
    }
}

impl StageDurations {
    pub fn millis(&self, stage: JobStatus) -> u64 {
        match stage {
            JobStatus::Queued => self.queued,
            JobStatus::Embedding => self.embedding,
            JobStatus::Reducing => self.reducing,
            JobStatus::Clustering => self.clustering,
            JobStatus::Labeling => self.labeling,
            _ => 0,
        }
    }

    pub fn duration(&self, stage: JobStatus) -> Duration {
        Duration::from_millis(self.millis(stage))
    }

    pub fn total_millis(&self) -> u64 {
        JobStatus::PIPELINE.iter().map(|s| self.millis(*s)).sum()
    }

    /// Milliseconds of all stages before `stage`.
    pub fn offset_millis(&self, stage: JobStatus) -> u64 {
        JobStatus::PIPELINE.iter().take_while(|s| **s != stage).map(|s| self.millis(*s)).sum()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SuggestionSettings {
    pub enabled: bool,
    pub max_per_pass: usize,
}

impl Default for SuggestionSettings {
    fn default() -> Self {
        Self { enabled: true, max_per_pass: 5 }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CheckpointSettings {
    pub enabled: bool,
    pub max_depth: usize,
    /// Snapshot the previous result before every mutation.
    pub auto_save: bool,
}

impl Default for CheckpointSettings {
    fn default() -> Self {
        Self { enabled: true, max_depth: 20, auto_save: true }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerSettings {
    pub host: String,
    pub port: u16,
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self { host: "127.0.0.1".to_string(), port: 8000 }
    }
}

impl ServerSettings {
    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PollSettings {
    pub interval_ms: u64,
}

impl Default for PollSettings {
    fn default() -> Self {
        Self { interval_ms: 1_000 }
    }
}

impl Settings {
    /// Loads settings for the environment named by `RUST_ENV` (default `dev`).
    pub fn load() -> anyhow::Result<Self> {
        let env_name = env::var("RUST_ENV").unwrap_or_else(|_| "dev".to_string());
        Self::from_figment(Self::figment(&env_name))
    }

    pub fn figment(env_name: &str) -> Figment {
        let mut figment = Figment::from(Serialized::defaults(Settings::default())).merge(Toml::file("config.toml"));
        match env_name {
            "dev" | "development" => figment = figment.merge(Toml::file("config.dev.toml")),
            "prod" | "production" => figment = figment.merge(Toml::file("config.prod.toml")),
            "test" | "testing" => figment = figment.merge(Toml::file("config.test.toml")),
            _ => {}
        }
        figment.merge(Env::prefixed(ENV_PREFIX).split("__"))
    }

    pub fn from_figment(figment: Figment) -> anyhow::Result<Self> {
        let settings: Settings = figment
            .extract()
            .map_err(|e| anyhow::anyhow!("Failed to load settings: {}", e))?;
        settings.validate()?;
        Ok(settings)
    }

    pub fn validate(&self) -> anyhow::Result<()> {
        if self.limits.min_texts == 0 {
            anyhow::bail!("limits.min_texts must be at least 1");
        }
        if self.limits.max_texts < self.limits.min_texts {
            anyhow::bail!(
                "limits.max_texts ({}) is below limits.min_texts ({})",
                self.limits.max_texts,
                self.limits.min_texts
            );
        }
        if self.limits.max_text_length == 0 || self.limits.max_concurrent_jobs == 0 {
            anyhow::bail!("limits.max_text_length and limits.max_concurrent_jobs must be positive");
        }
        if self.session.heartbeat_ms == 0 {
            anyhow::bail!("session.heartbeat_ms must be positive");
        }
        // A heartbeat at or past the timeout would report live jobs as interrupted.
        if self.session.heartbeat_ms >= self.session.staleness_timeout_secs.saturating_mul(1_000) {
            anyhow::bail!(
                "session.heartbeat_ms ({}) must be below the staleness timeout ({}s)",
                self.session.heartbeat_ms,
                self.session.staleness_timeout_secs
            );
        }
        if self.checkpoints.enabled && self.checkpoints.max_depth == 0 {
            anyhow::bail!("checkpoints.max_depth must be at least 1");
        }
        if self.poll.interval_ms == 0 {
            anyhow::bail!("poll.interval_ms must be positive");
        }
        Ok(())
    }
}

/// Expand a user-provided path string:
/// - Expands leading '~' to the user's home directory
/// - Expands ${VAR} and $VAR environment variables
/// - Returns a PathBuf without attempting to canonicalize
pub fn expand_path<S: AsRef<str>>(input: S) -> PathBuf {
    let s = input.as_ref();
    let expanded_env = shellexpand::env(s).unwrap_or(std::borrow::Cow::Borrowed(s));
    let expanded = shellexpand::tilde(&expanded_env);
    PathBuf::from(expanded.as_ref())
}

/// Resolve a possibly relative path against `base` after expansion.
pub fn resolve_with_base<S: AsRef<str>>(base: &Path, p: S) -> PathBuf {
    let p = expand_path(p);
    if p.is_absolute() {
        p
    } else {
        base.join(p)
    }
}
