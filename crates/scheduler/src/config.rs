use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::SchedulerError;

/// Upper bound on the resolved pool size.
pub const MAX_WORKER_THREADS: usize = 256;

/// Scheduler configuration, typically parsed from TOML.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SchedulerConfig {
    /// Number of worker threads. 0 = available parallelism.
    #[serde(default = "default_worker_threads")]
    pub worker_threads: usize,
    /// Polling interval used by `wait` and `wait_all`, in milliseconds.
    #[serde(default = "default_wait_interval_ms")]
    pub wait_interval_ms: u64,
    /// Sleep applied when a worker only sees jobs pinned to other workers.
    #[serde(default = "default_affinity_backoff_ms")]
    pub affinity_backoff_ms: u64,
    /// Initial size of each worker's scratch buffer.
    #[serde(default = "default_scratch_bytes")]
    pub scratch_bytes: usize,
    /// Worker threads are named `"{prefix} {index}"`.
    #[serde(default = "default_thread_name_prefix")]
    pub thread_name_prefix: String,
}

fn default_worker_threads() -> usize { 8 }
fn default_wait_interval_ms() -> u64 { 30 }
fn default_affinity_backoff_ms() -> u64 { 15 }
fn default_scratch_bytes() -> usize { 1024 * 1024 }
fn default_thread_name_prefix() -> String { "Worker Thread".to_string() }

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            worker_threads: default_worker_threads(),
            wait_interval_ms: default_wait_interval_ms(),
            affinity_backoff_ms: default_affinity_backoff_ms(),
            scratch_bytes: default_scratch_bytes(),
            thread_name_prefix: default_thread_name_prefix(),
        }
    }
}

impl SchedulerConfig {
    /// Config with `n` workers and everything else at its default.
    pub fn with_workers(n: usize) -> Self {
        Self {
            worker_threads: n,
            ..Self::default()
        }
    }

    /// Parse config from a TOML string.
    ///
    /// Accepts either a document with a `[scheduler]` table or the bare keys.
    /// Environment overrides are applied before validation.
    pub fn from_toml(toml_str: &str) -> Result<Self, SchedulerError> {
        let mut table: toml::Table = toml::from_str(toml_str)?;
        let section = match table.remove("scheduler") {
            Some(toml::Value::Table(section)) => section,
            Some(_) => {
                return Err(SchedulerError::Config(
                    "`scheduler` must be a table".to_string(),
                ))
            }
            None => table,
        };
        let mut config: Self = toml::Value::Table(section).try_into()?;
        config.apply_env_overrides();
        config.validate()?;
        Ok(config)
    }

    /// Load config from a file path.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, SchedulerError> {
        let content = std::fs::read_to_string(path.as_ref())?;
        Self::from_toml(&content)
    }

    /// Defaults plus environment overrides.
    pub fn from_env() -> Result<Self, SchedulerError> {
        let mut config = Self::default();
        config.apply_env_overrides();
        config.validate()?;
        Ok(config)
    }

    /// Apply environment variable overrides.
    ///
    /// Convention: `JOBSYS_<FIELD>` overrides `<field>`. Values that fail to
    /// parse are ignored.
    pub fn apply_env_overrides(&mut self) {
        if let Some(n) = env_parsed("JOBSYS_WORKER_THREADS") {
            self.worker_threads = n;
        }
        if let Some(ms) = env_parsed("JOBSYS_WAIT_INTERVAL_MS") {
            self.wait_interval_ms = ms;
        }
        if let Some(ms) = env_parsed("JOBSYS_AFFINITY_BACKOFF_MS") {
            self.affinity_backoff_ms = ms;
        }
        if let Some(bytes) = env_parsed("JOBSYS_SCRATCH_BYTES") {
            self.scratch_bytes = bytes;
        }
        if let Ok(prefix) = std::env::var("JOBSYS_THREAD_NAME_PREFIX") {
            self.thread_name_prefix = prefix;
        }
    }

    /// Validate ranges that the worker pool relies on.
    pub fn validate(&self) -> Result<(), SchedulerError> {
        let workers = self.resolved_worker_threads();
        if workers > MAX_WORKER_THREADS {
            return Err(SchedulerError::Config(format!(
                "worker_threads must be at most {MAX_WORKER_THREADS}, got {workers}"
            )));
        }
        if self.scratch_bytes == 0 {
            return Err(SchedulerError::Config(
                "scratch_bytes must be non-zero".to_string(),
            ));
        }
        if self.thread_name_prefix.trim().is_empty() {
            return Err(SchedulerError::Config(
                "thread_name_prefix must not be empty".to_string(),
            ));
        }
        Ok(())
    }

    /// Resolve worker thread count (0 means use available parallelism).
    pub fn resolved_worker_threads(&self) -> usize {
        if self.worker_threads == 0 {
            std::thread::available_parallelism()
                .map(|n| n.get())
                .unwrap_or(4)
        } else {
            self.worker_threads
        }
    }

    pub fn wait_interval(&self) -> Duration {
        Duration::from_millis(self.wait_interval_ms)
    }

    pub fn affinity_backoff(&self) -> Duration {
        Duration::from_millis(self.affinity_backoff_ms)
    }

    /// Print a summary for startup logs.
    pub fn log_summary(&self) {
        tracing::info!("Scheduler config:");
        tracing::info!("  workers:          {}", self.resolved_worker_threads());
        tracing::info!("  wait interval:    {}ms", self.wait_interval_ms);
        tracing::info!("  affinity backoff: {}ms", self.affinity_backoff_ms);
        tracing::info!("  scratch buffer:   {} bytes", self.scratch_bytes);
    }
}

fn env_parsed<T: std::str::FromStr>(key: &str) -> Option<T> {
    std::env::var(key).ok().and_then(|v| v.trim().parse().ok())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn scheduler_config_defaults() {
        let config = SchedulerConfig::default();
        assert_eq!(config.worker_threads, 8);
        assert_eq!(config.wait_interval_ms, 30);
        assert_eq!(config.affinity_backoff_ms, 15);
        assert_eq!(config.scratch_bytes, 1024 * 1024);
        assert_eq!(config.wait_interval(), Duration::from_millis(30));
        assert_eq!(config.affinity_backoff(), Duration::from_millis(15));
    }

    #[test]
    fn resolved_worker_threads() {
        let mut config = SchedulerConfig::default();
        config.worker_threads = 0;
        // 0 means auto-detect
        assert!(config.resolved_worker_threads() > 0);

        config.worker_threads = 3;
        assert_eq!(config.resolved_worker_threads(), 3);
    }

    #[test]
    fn parse_scheduler_section() {
        let toml = r#"
[scheduler]
worker_threads = 4
wait_interval_ms = 5
"#;
        let config = SchedulerConfig::from_toml(toml).unwrap();
        assert_eq!(config.worker_threads, 4);
        assert_eq!(config.wait_interval_ms, 5);
        assert_eq!(config.affinity_backoff_ms, 15);
    }

    #[test]
    fn parse_bare_table() {
        let config = SchedulerConfig::from_toml("scratch_bytes = 4096\n").unwrap();
        assert_eq!(config.scratch_bytes, 4096);
        assert_eq!(config.worker_threads, 8);
    }

    #[test]
    fn empty_document_is_default() {
        let config = SchedulerConfig::from_toml("").unwrap();
        assert_eq!(config.wait_interval_ms, 30);
    }

    #[test]
    fn scheduler_key_must_be_a_table() {
        let err = SchedulerConfig::from_toml("scheduler = 3\n").unwrap_err();
        assert!(matches!(err, SchedulerError::Config(_)));
    }

    #[test]
    fn malformed_toml_is_a_parse_error() {
        let err = SchedulerConfig::from_toml("[scheduler\nworker_threads = ").unwrap_err();
        assert!(matches!(err, SchedulerError::ConfigParse(_)));
    }

    #[test]
    fn rejects_oversized_pool() {
        let err = SchedulerConfig::from_toml("worker_threads = 100000\n").unwrap_err();
        assert!(err.to_string().contains("worker_threads"));
    }

    #[test]
    fn rejects_zero_scratch() {
        let config = SchedulerConfig {
            scratch_bytes: 0,
            ..SchedulerConfig::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn env_override_thread_name_prefix() {
        // SAFETY: test-only, no other test reads this variable
        unsafe {
            std::env::set_var("JOBSYS_THREAD_NAME_PREFIX", "Pool");
        }
        let config = SchedulerConfig::from_toml("").unwrap();
        assert_eq!(config.thread_name_prefix, "Pool");
        unsafe {
            std::env::remove_var("JOBSYS_THREAD_NAME_PREFIX");
        }
    }

    #[test]
    fn load_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("jobsys.toml");
        std::fs::write(&path, "[scheduler]\nworker_threads = 2\n").unwrap();

        let config = SchedulerConfig::from_file(&path).unwrap();
        assert_eq!(config.worker_threads, 2);
    }

    #[test]
    fn missing_file_is_io_error() {
        let err = SchedulerConfig::from_file("/definitely/not/here.toml").unwrap_err();
        assert!(matches!(err, SchedulerError::ConfigIo(_)));
    }
}
