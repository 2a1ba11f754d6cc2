//! Engine configuration
//!
//! Defines how the external workflow engine is invoked and where run
//! workspaces live. The configuration is built once and handed to the
//! launcher and orchestrator at construction; nothing in the lifecycle reads
//! the environment on its own.

use std::path::PathBuf;
use std::time::Duration;

/// External engine configuration
///
/// Defaults target Nextflow:
/// `nextflow run <script> -work-dir <output> -name run_<id> --k v`.
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Engine executable, resolved through `PATH` when not absolute
    pub executable: PathBuf,

    /// Arguments placed before the script path (e.g. the `run` subcommand)
    pub engine_args: Vec<String>,

    /// Flag that declares the engine's working/output directory.
    /// `None` passes nothing after the script path besides parameters.
    pub work_dir_flag: Option<String>,

    /// Flag that labels the engine run with `run_<id>`. `None` omits it.
    pub run_name_flag: Option<String>,

    /// Parameter names that may not be supplied by callers
    pub reserved_params: Vec<String>,

    /// Directory under which one workspace per run is created
    pub runs_dir: PathBuf,

    /// How often captured output is flushed into the run record
    pub log_flush_interval: Duration,

    /// Optional wall-clock limit, enforced through cancellation
    pub max_run_duration: Option<Duration>,

    /// How long a cancel request waits for the run to become terminal
    pub cancel_grace: Duration,
}

impl EngineConfig {
    /// Creates a new configuration with defaults for everything but the
    /// executable and the runs directory
    pub fn new(executable: impl Into<PathBuf>, runs_dir: impl Into<PathBuf>) -> Self {
        Self {
            executable: executable.into(),
            engine_args: vec!["run".to_string()],
            work_dir_flag: Some("-work-dir".to_string()),
            run_name_flag: Some("-name".to_string()),
            reserved_params: default_reserved_params(),
            runs_dir: runs_dir.into(),
            log_flush_interval: Duration::from_millis(1000),
            max_run_duration: None,
            cancel_grace: Duration::from_secs(10),
        }
    }

    /// Creates configuration from environment variables
    ///
    /// Every variable is optional:
    /// - CIENCIA_ENGINE_BIN (default: nextflow)
    /// - CIENCIA_ENGINE_ARGS (whitespace separated, default: run)
    /// - CIENCIA_WORK_DIR_FLAG (default: -work-dir, empty disables it)
    /// - CIENCIA_RUN_NAME_FLAG (default: -name, empty disables it)
    /// - CIENCIA_RESERVED_PARAMS (comma separated)
    /// - CIENCIA_RUNS_DIR (default: ./runs)
    /// - CIENCIA_LOG_FLUSH_INTERVAL_MS (default: 1000)
    /// - CIENCIA_MAX_RUN_DURATION (seconds, default: unlimited)
    /// - CIENCIA_CANCEL_GRACE (seconds, default: 10)
    pub fn from_env() -> anyhow::Result<Self> {
        let mut config = Self::default();

        if let Ok(bin) = std::env::var("CIENCIA_ENGINE_BIN") {
            config.executable = PathBuf::from(bin);
        }

        if let Ok(args) = std::env::var("CIENCIA_ENGINE_ARGS") {
            config.engine_args = args.split_whitespace().map(str::to_string).collect();
        }

        if let Ok(flag) = std::env::var("CIENCIA_WORK_DIR_FLAG") {
            let flag = flag.trim();
            config.work_dir_flag = (!flag.is_empty()).then(|| flag.to_string());
        }

        if let Ok(flag) = std::env::var("CIENCIA_RUN_NAME_FLAG") {
            let flag = flag.trim();
            config.run_name_flag = (!flag.is_empty()).then(|| flag.to_string());
        }

        if let Ok(reserved) = std::env::var("CIENCIA_RESERVED_PARAMS") {
            config.reserved_params = parse_list(&reserved);
        }

        if let Ok(dir) = std::env::var("CIENCIA_RUNS_DIR") {
            config.runs_dir = PathBuf::from(dir);
        }

        if let Some(ms) = parse_env::<u64>("CIENCIA_LOG_FLUSH_INTERVAL_MS")? {
            config.log_flush_interval = Duration::from_millis(ms);
        }

        if let Some(secs) = parse_env::<u64>("CIENCIA_MAX_RUN_DURATION")? {
            config.max_run_duration = Some(Duration::from_secs(secs));
        }

        if let Some(secs) = parse_env::<u64>("CIENCIA_CANCEL_GRACE")? {
            config.cancel_grace = Duration::from_secs(secs);
        }

        Ok(config)
    }

    /// Sets the maximum run duration
    pub fn with_max_run_duration(mut self, limit: Duration) -> Self {
        self.max_run_duration = Some(limit);
        self
    }

    /// Validates the configuration
    pub fn validate(&self) -> anyhow::Result<()> {
        if self.executable.as_os_str().is_empty() {
            anyhow::bail!("engine executable cannot be empty");
        }

        if self.runs_dir.as_os_str().is_empty() {
            anyhow::bail!("runs_dir cannot be empty");
        }

        if self.log_flush_interval.is_zero() {
            anyhow::bail!("log_flush_interval must be greater than 0");
        }

        if self.max_run_duration.is_some_and(|limit| limit.is_zero()) {
            anyhow::bail!("max_run_duration must be greater than 0 when set");
        }

        if let Some(flag) = &self.work_dir_flag {
            if !flag.starts_with('-') {
                anyhow::bail!("work_dir_flag must start with '-' (got '{}')", flag);
            }
        }

        if let Some(flag) = &self.run_name_flag {
            if !flag.starts_with('-') {
                anyhow::bail!("run_name_flag must start with '-' (got '{}')", flag);
            }
        }

        Ok(())
    }
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self::new("nextflow", "runs")
    }
}

fn default_reserved_params() -> Vec<String> {
    ["work-dir", "name", "params-file", "resume", "profile"]
        .iter()
        .map(|s| s.to_string())
        .collect()
}

fn parse_list(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}

fn parse_env<T>(name: &str) -> anyhow::Result<Option<T>>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    match std::env::var(name) {
        Ok(raw) => raw
            .trim()
            .parse::<T>()
            .map(Some)
            .map_err(|e| anyhow::anyhow!("invalid value for {}: {}", name, e)),
        Err(_) => Ok(None),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = EngineConfig::default();
        assert_eq!(config.executable, PathBuf::from("nextflow"));
        assert_eq!(config.engine_args, vec!["run".to_string()]);
        assert_eq!(config.work_dir_flag.as_deref(), Some("-work-dir"));
        assert_eq!(config.run_name_flag.as_deref(), Some("-name"));
        assert_eq!(config.log_flush_interval, Duration::from_millis(1000));
        assert!(config.max_run_duration.is_none());
        assert!(config.reserved_params.contains(&"work-dir".to_string()));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_config_validation() {
        let mut config = EngineConfig::default();
        assert!(config.validate().is_ok());

        config.executable = PathBuf::new();
        assert!(config.validate().is_err());
        config.executable = PathBuf::from("nextflow");

        config.log_flush_interval = Duration::ZERO;
        assert!(config.validate().is_err());
        config.log_flush_interval = Duration::from_millis(250);

        config.work_dir_flag = Some("work-dir".to_string());
        assert!(config.validate().is_err());
        config.work_dir_flag = None;
        assert!(config.validate().is_ok());

        config.run_name_flag = Some("name".to_string());
        assert!(config.validate().is_err());
        config.run_name_flag = None;
        assert!(config.validate().is_ok());

        config.max_run_duration = Some(Duration::ZERO);
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_with_max_run_duration() {
        let config =
            EngineConfig::new("sh", "/tmp/runs").with_max_run_duration(Duration::from_secs(60));
        assert_eq!(config.max_run_duration, Some(Duration::from_secs(60)));
        assert_eq!(config.runs_dir, PathBuf::from("/tmp/runs"));
    }

    #[test]
    fn test_parse_list_skips_blanks() {
        assert_eq!(
            parse_list(" outdir, ,name ,"),
            vec!["outdir".to_string(), "name".to_string()]
        );
        assert!(parse_list("").is_empty());
    }
}
