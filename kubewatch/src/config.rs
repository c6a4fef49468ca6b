//! Watch configuration: targets, sampling cadence, retention, and the
//! context budget.
//!
//! Defaults are applied here, in the loader, and nowhere else. Durations are
//! written as strings (`"30s"`, `"2h"`); malformed values are reported with
//! the offending text.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Deserialize;
use thiserror::Error;

/// Namespace assumed when a target does not name one.
pub const DEFAULT_NAMESPACE: &str = "default";

/// Cadence of collection cycles.
pub const DEFAULT_INTERVAL: Duration = Duration::from_secs(30);

/// Retention/visibility window.
pub const DEFAULT_WINDOW: Duration = Duration::from_secs(2 * 60 * 60);

/// Log lines tailed per container and cycle.
pub const DEFAULT_MAX_LOG_LINES: usize = 100;

/// Character budget for the multi-target context block.
pub const DEFAULT_MAX_CONTEXT_CHARS: usize = 32_000;

/// Scrape path assumed when a target sets a metrics port without a path.
pub const DEFAULT_METRICS_PATH: &str = "/metrics";

/// Identity of one watched workload, plus its optional scrape endpoint.
#[derive(Clone, Debug, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct WatchTarget {
    #[serde(default)]
    pub deployment: String,
    #[serde(default)]
    pub namespace: String,
    #[serde(default)]
    pub metrics_port: Option<u16>,
    #[serde(default)]
    pub metrics_path: Option<String>,
    /// Glob patterns admitting scraped metric names; empty admits all.
    #[serde(default)]
    pub metrics_filter: Vec<String>,
}

impl WatchTarget {
    /// A target with defaults applied and no scrape endpoint.
    pub fn new(deployment: impl Into<String>, namespace: impl Into<String>) -> Self {
        Self {
            deployment: deployment.into(),
            namespace: namespace.into(),
            metrics_port: None,
            metrics_path: None,
            metrics_filter: Vec::new(),
        }
    }

    /// The stable `namespace/deployment` key for this target.
    pub fn key(&self) -> String {
        format!("{}/{}", self.namespace, self.deployment)
    }
}

/// Configuration for watching a single workload.
#[derive(Clone, Debug)]
pub struct WatchConfig {
    pub deployment: String,
    pub namespace: String,
    pub interval: Duration,
    pub window: Duration,
    pub max_log_lines: usize,
    /// Path to a kubeconfig; `None` selects the default kubeconfig with an
    /// in-cluster fallback.
    pub kubeconfig: Option<PathBuf>,
}

/// Configuration for watching several workloads with shared cadence.
#[derive(Clone, Debug)]
pub struct MultiWatchConfig {
    pub targets: Vec<WatchTarget>,
    pub interval: Duration,
    pub window: Duration,
    pub max_log_lines: usize,
    pub kubeconfig: Option<PathBuf>,
    pub max_context_chars: usize,
}

/// Indicates that a configuration document was rejected.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The configuration file could not be read.
    #[error("failed to read {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The document is not valid YAML for the expected shape.
    #[error(transparent)]
    Parse(#[from] serde_yaml::Error),

    /// A multi-target document listed no targets.
    #[error("no targets configured")]
    NoTargets,

    /// A target is missing its deployment name.
    #[error("target[{0}]: deployment is required")]
    TargetDeployment(usize),

    /// A single-target document is missing its deployment name.
    #[error("deployment is required")]
    Deployment,

    /// The interval could not be parsed or is zero.
    #[error("invalid interval: {0}")]
    InvalidInterval(String),

    /// The window could not be parsed or is zero.
    #[error("invalid window: {0}")]
    InvalidWindow(String),
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawWatchConfig {
    #[serde(default)]
    deployment: Option<String>,
    #[serde(default)]
    namespace: Option<String>,
    #[serde(default)]
    interval: Option<String>,
    #[serde(default)]
    window: Option<String>,
    #[serde(default)]
    max_log_lines: Option<usize>,
    #[serde(default)]
    kubeconfig: Option<PathBuf>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawMultiWatchConfig {
    #[serde(default)]
    targets: Vec<WatchTarget>,
    #[serde(default)]
    interval: Option<String>,
    #[serde(default)]
    window: Option<String>,
    #[serde(default)]
    max_log_lines: Option<usize>,
    #[serde(default)]
    kubeconfig: Option<PathBuf>,
    #[serde(default)]
    max_context_chars: Option<i64>,
}

// === impl WatchConfig ===

impl WatchConfig {
    /// A single-target configuration with all defaults applied.
    pub fn new(deployment: impl Into<String>) -> Self {
        Self {
            deployment: deployment.into(),
            namespace: DEFAULT_NAMESPACE.to_string(),
            interval: DEFAULT_INTERVAL,
            window: DEFAULT_WINDOW,
            max_log_lines: DEFAULT_MAX_LOG_LINES,
            kubeconfig: None,
        }
    }

    /// Loads and validates a single-target YAML document.
    pub fn from_yaml_str(doc: &str) -> Result<Self, ConfigError> {
        let raw: RawWatchConfig = serde_yaml::from_str(doc)?;
        let deployment = raw
            .deployment
            .filter(|name| !name.is_empty())
            .ok_or(ConfigError::Deployment)?;
        Ok(Self {
            deployment,
            namespace: default_namespace(raw.namespace),
            interval: resolve_interval(raw.interval)?,
            window: resolve_window(raw.window)?,
            max_log_lines: raw.max_log_lines.unwrap_or(DEFAULT_MAX_LOG_LINES),
            kubeconfig: raw.kubeconfig,
        })
    }

    /// Loads a single-target YAML file.
    pub fn from_yaml_file(path: &Path) -> Result<Self, ConfigError> {
        Self::from_yaml_str(&read_file(path)?)
    }
}

// === impl MultiWatchConfig ===

impl MultiWatchConfig {
    /// Loads and validates a multi-target YAML document.
    pub fn from_yaml_str(doc: &str) -> Result<Self, ConfigError> {
        let raw: RawMultiWatchConfig = serde_yaml::from_str(doc)?;
        if raw.targets.is_empty() {
            return Err(ConfigError::NoTargets);
        }
        let targets = raw
            .targets
            .into_iter()
            .enumerate()
            .map(|(index, target)| {
                if target.deployment.is_empty() {
                    return Err(ConfigError::TargetDeployment(index));
                }
                Ok(normalize_target(target))
            })
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self {
            targets,
            interval: resolve_interval(raw.interval)?,
            window: resolve_window(raw.window)?,
            max_log_lines: raw.max_log_lines.unwrap_or(DEFAULT_MAX_LOG_LINES),
            kubeconfig: raw.kubeconfig,
            max_context_chars: match raw.max_context_chars {
                Some(chars) if chars > 0 => chars as usize,
                _ => DEFAULT_MAX_CONTEXT_CHARS,
            },
        })
    }

    /// Loads a multi-target YAML file.
    pub fn from_yaml_file(path: &Path) -> Result<Self, ConfigError> {
        Self::from_yaml_str(&read_file(path)?)
    }
}

impl From<WatchConfig> for MultiWatchConfig {
    /// Lifts a single-target configuration into a one-target multi
    /// configuration. Values are carried verbatim; defaulting already
    /// happened in the loader.
    fn from(config: WatchConfig) -> Self {
        let target = WatchTarget::new(config.deployment, config.namespace);
        Self {
            targets: vec![target],
            interval: config.interval,
            window: config.window,
            max_log_lines: config.max_log_lines,
            kubeconfig: config.kubeconfig,
            max_context_chars: DEFAULT_MAX_CONTEXT_CHARS,
        }
    }
}

fn read_file(path: &Path) -> Result<String, ConfigError> {
    std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
        path: path.to_path_buf(),
        source,
    })
}

fn default_namespace(namespace: Option<String>) -> String {
    namespace
        .filter(|ns| !ns.is_empty())
        .unwrap_or_else(|| DEFAULT_NAMESPACE.to_string())
}

fn normalize_target(mut target: WatchTarget) -> WatchTarget {
    if target.namespace.is_empty() {
        target.namespace = DEFAULT_NAMESPACE.to_string();
    }
    // A zero port is the "unset" sentinel in hand-written documents.
    if target.metrics_port == Some(0) {
        target.metrics_port = None;
    }
    if target.metrics_port.is_some() && target.metrics_path.is_none() {
        target.metrics_path = Some(DEFAULT_METRICS_PATH.to_string());
    }
    // Filters may be written as a list, as comma-joined entries, or a mix.
    target.metrics_filter = target
        .metrics_filter
        .iter()
        .flat_map(|entry| entry.split(','))
        .map(|pattern| pattern.trim().to_string())
        .filter(|pattern| !pattern.is_empty())
        .collect();
    target
}

fn resolve_interval(raw: Option<String>) -> Result<Duration, ConfigError> {
    match raw {
        None => Ok(DEFAULT_INTERVAL),
        Some(text) => parse_duration(&text)
            .ok()
            .filter(|interval| !interval.is_zero())
            .ok_or(ConfigError::InvalidInterval(text)),
    }
}

fn resolve_window(raw: Option<String>) -> Result<Duration, ConfigError> {
    match raw {
        None => Ok(DEFAULT_WINDOW),
        Some(text) => parse_duration(&text)
            .ok()
            .filter(|window| !window.is_zero())
            .ok_or(ConfigError::InvalidWindow(text)),
    }
}

#[derive(Copy, Clone, Debug, Error)]
#[error("invalid duration")]
struct InvalidDuration;

fn parse_duration(text: &str) -> Result<Duration, InvalidDuration> {
    let re = regex::Regex::new(r"^\s*(\d+)\s*(ms|s|m|h)?\s*$").expect("duration regex");
    let cap = re.captures(text).ok_or(InvalidDuration)?;
    let magnitude: u64 = cap[1].parse().map_err(|_| InvalidDuration)?;
    match cap.get(2).map(|m| m.as_str()) {
        None if magnitude == 0 => Ok(Duration::ZERO),
        Some("ms") => Ok(Duration::from_millis(magnitude)),
        Some("s") => Ok(Duration::from_secs(magnitude)),
        Some("m") => Ok(Duration::from_secs(magnitude * 60)),
        Some("h") => Ok(Duration::from_secs(magnitude * 3600)),
        _ => Err(InvalidDuration),
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use std::io::Write;

    #[test]
    fn multi_defaults_are_applied() {
        let config = MultiWatchConfig::from_yaml_str(
            "targets:\n  - deployment: web\n",
        )
        .expect("valid config");
        assert_eq!(config.targets.len(), 1);
        assert_eq!(config.targets[0].namespace, "default");
        assert_eq!(config.targets[0].metrics_port, None);
        assert_eq!(config.targets[0].metrics_path, None);
        assert_eq!(config.interval, DEFAULT_INTERVAL);
        assert_eq!(config.window, DEFAULT_WINDOW);
        assert_eq!(config.max_log_lines, DEFAULT_MAX_LOG_LINES);
        assert_eq!(config.max_context_chars, DEFAULT_MAX_CONTEXT_CHARS);
    }

    #[test]
    fn metrics_path_is_defaulted_only_with_a_port() {
        let config = MultiWatchConfig::from_yaml_str(
            "targets:\n  - deployment: web\n    metricsPort: 9090\n  - deployment: api\n    namespace: prod\n",
        )
        .expect("valid config");
        assert_eq!(config.targets[0].metrics_port, Some(9090));
        assert_eq!(config.targets[0].metrics_path.as_deref(), Some("/metrics"));
        assert_eq!(config.targets[1].metrics_path, None);
        assert_eq!(config.targets[1].key(), "prod/api");
    }

    #[test]
    fn comma_joined_filters_are_split() {
        let config = MultiWatchConfig::from_yaml_str(
            "targets:\n  - deployment: web\n    metricsPort: 9090\n    metricsFilter:\n      - \"http_*,grpc_*\"\n      - process_cpu_seconds\n",
        )
        .expect("valid config");
        assert_eq!(
            config.targets[0].metrics_filter,
            vec!["http_*", "grpc_*", "process_cpu_seconds"]
        );
    }

    #[test]
    fn zero_metrics_port_means_unset() {
        let config = MultiWatchConfig::from_yaml_str(
            "targets:\n  - deployment: web\n    metricsPort: 0\n",
        )
        .expect("valid config");
        assert_eq!(config.targets[0].metrics_port, None);
        assert_eq!(config.targets[0].metrics_path, None);
    }

    #[test]
    fn empty_target_list_is_rejected() {
        let error = MultiWatchConfig::from_yaml_str("targets: []\n").unwrap_err();
        assert!(error.to_string().contains("no targets"));
    }

    #[test]
    fn missing_deployment_names_the_target_index() {
        let error = MultiWatchConfig::from_yaml_str(
            "targets:\n  - deployment: web\n  - namespace: prod\n",
        )
        .unwrap_err();
        assert_eq!(error.to_string(), "target[1]: deployment is required");
    }

    #[test]
    fn malformed_durations_report_the_value() {
        let error = MultiWatchConfig::from_yaml_str(
            "targets:\n  - deployment: web\ninterval: soon\n",
        )
        .unwrap_err();
        assert_eq!(error.to_string(), "invalid interval: soon");

        let error = MultiWatchConfig::from_yaml_str(
            "targets:\n  - deployment: web\nwindow: 0s\n",
        )
        .unwrap_err();
        assert_eq!(error.to_string(), "invalid window: 0s");
    }

    #[test]
    fn durations_parse_with_unit_suffixes() {
        let config = MultiWatchConfig::from_yaml_str(
            "targets:\n  - deployment: web\ninterval: 15s\nwindow: 2h\n",
        )
        .expect("valid config");
        assert_eq!(config.interval, Duration::from_secs(15));
        assert_eq!(config.window, Duration::from_secs(7200));
    }

    #[test]
    fn non_positive_context_budget_falls_back() {
        let config = MultiWatchConfig::from_yaml_str(
            "targets:\n  - deployment: web\nmaxContextChars: -5\n",
        )
        .expect("valid config");
        assert_eq!(config.max_context_chars, DEFAULT_MAX_CONTEXT_CHARS);
    }

    #[test]
    fn single_target_requires_a_deployment() {
        let error = WatchConfig::from_yaml_str("namespace: prod\n").unwrap_err();
        assert_eq!(error.to_string(), "deployment is required");
    }

    #[test]
    fn single_to_multi_carries_values_verbatim() {
        let single = WatchConfig {
            deployment: "web".into(),
            namespace: "prod".into(),
            interval: Duration::from_secs(10),
            window: Duration::from_secs(600),
            max_log_lines: 50,
            kubeconfig: None,
        };
        let multi = MultiWatchConfig::from(single);
        assert_eq!(multi.targets.len(), 1);
        assert_eq!(multi.targets[0].key(), "prod/web");
        assert_eq!(multi.interval, Duration::from_secs(10));
        assert_eq!(multi.window, Duration::from_secs(600));
        assert_eq!(multi.max_log_lines, 50);
    }

    #[test]
    fn loads_from_a_file() {
        let mut file = tempfile::NamedTempFile::new().expect("temp file");
        file.write_all(b"targets:\n  - deployment: web\n    namespace: prod\n")
            .expect("write config");
        let config = MultiWatchConfig::from_yaml_file(file.path()).expect("valid config");
        assert_eq!(config.targets[0].key(), "prod/web");
    }
}
