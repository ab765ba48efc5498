use std::fmt;
use std::time::Duration;

use serde::{Deserialize, Serialize};

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Coordinator config
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// How dispatched tool calls are handed off for execution.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DispatchMode {
    /// Execute synchronously inside `dispatch_tool`, one at a time.
    Inline,
    /// Hand off to a background work queue drained by a worker pool.
    /// Used when tools are slow or blocking (image generation, HTTP).
    Queued,
}

/// Tunables for the execution coordinator.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CoordinatorConfig {
    /// TTL for execution state and the index counter (seconds). Must span
    /// a slow LLM turn — expiry mid-wait loses state.
    #[serde(default = "d_600")]
    pub execution_ttl_sec: u64,
    /// TTL for stored per-tool results (seconds). Results are consumed
    /// once by the waiter, so this stays short.
    #[serde(default = "d_120")]
    pub result_ttl_sec: u64,
    /// Fallback re-check interval while waiting for completion (ms).
    #[serde(default = "d_500")]
    pub check_interval_ms: u64,
    /// Wall-clock bound applied by `await_all`, the default-deadline wait
    /// (seconds).
    #[serde(default = "d_180")]
    pub wait_timeout_sec: u64,
    #[serde(default = "d_inline")]
    pub dispatch_mode: DispatchMode,
    /// Worker tasks for the queued dispatch mode.
    #[serde(default = "d_4")]
    pub workers: usize,
    /// How far the allocator probes forward past an occupied index before
    /// falling back to a timestamp-derived one.
    #[serde(default = "d_256")]
    pub probe_window: u32,
}

impl Default for CoordinatorConfig {
    fn default() -> Self {
        Self {
            execution_ttl_sec: 600,
            result_ttl_sec: 120,
            check_interval_ms: 500,
            wait_timeout_sec: 180,
            dispatch_mode: DispatchMode::Inline,
            workers: 4,
            probe_window: 256,
        }
    }
}

impl CoordinatorConfig {
    pub fn execution_ttl(&self) -> Duration {
        Duration::from_secs(self.execution_ttl_sec)
    }

    pub fn result_ttl(&self) -> Duration {
        Duration::from_secs(self.result_ttl_sec)
    }

    pub fn check_interval(&self) -> Duration {
        Duration::from_millis(self.check_interval_ms)
    }

    pub fn wait_timeout(&self) -> Duration {
        Duration::from_secs(self.wait_timeout_sec)
    }

    /// Validate the configuration and return a list of issues.
    pub fn validate(&self) -> Vec<ConfigError> {
        let mut errors = Vec::new();

        if self.execution_ttl_sec == 0 {
            errors.push(ConfigError {
                severity: ConfigSeverity::Error,
                field: "execution_ttl_sec".into(),
                message: "must be greater than 0".into(),
            });
        }

        if self.result_ttl_sec == 0 {
            errors.push(ConfigError {
                severity: ConfigSeverity::Error,
                field: "result_ttl_sec".into(),
                message: "must be greater than 0".into(),
            });
        }

        if self.check_interval_ms == 0 {
            errors.push(ConfigError {
                severity: ConfigSeverity::Error,
                field: "check_interval_ms".into(),
                message: "must be greater than 0".into(),
            });
        }

        if self.dispatch_mode == DispatchMode::Queued && self.workers == 0 {
            errors.push(ConfigError {
                severity: ConfigSeverity::Error,
                field: "workers".into(),
                message: "queued dispatch requires at least one worker".into(),
            });
        }

        // Results expiring before the batch deadline means the waiter can
        // observe pending placeholders for tools that actually finished.
        if self.result_ttl_sec < self.wait_timeout_sec {
            errors.push(ConfigError {
                severity: ConfigSeverity::Warning,
                field: "result_ttl_sec".into(),
                message: format!(
                    "shorter than wait_timeout_sec ({}); early results may expire mid-wait",
                    self.wait_timeout_sec
                ),
            });
        }

        if self.probe_window == 0 {
            errors.push(ConfigError {
                severity: ConfigSeverity::Warning,
                field: "probe_window".into(),
                message: "0 disables conflict probing; allocation conflicts jump straight to timestamp fallback".into(),
            });
        }

        errors
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Config validation
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigSeverity {
    Error,
    Warning,
}

/// A single configuration validation issue.
#[derive(Debug, Clone)]
pub struct ConfigError {
    pub severity: ConfigSeverity,
    pub field: String,
    pub message: String,
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let tag = match self.severity {
            ConfigSeverity::Error => "ERROR",
            ConfigSeverity::Warning => "WARN",
        };
        write!(f, "[{tag}] {}: {}", self.field, self.message)
    }
}

// ── serde default helpers ───────────────────────────────────────────

fn d_600() -> u64 {
    600
}

fn d_120() -> u64 {
    120
}

fn d_500() -> u64 {
    500
}

fn d_180() -> u64 {
    180
}

fn d_4() -> usize {
    4
}

fn d_256() -> u32 {
    256
}

fn d_inline() -> DispatchMode {
    DispatchMode::Inline
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Tests
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let cfg = CoordinatorConfig::default();
        assert_eq!(cfg.execution_ttl_sec, 600);
        assert_eq!(cfg.result_ttl_sec, 120);
        assert_eq!(cfg.check_interval_ms, 500);
        assert_eq!(cfg.wait_timeout_sec, 180);
        assert_eq!(cfg.dispatch_mode, DispatchMode::Inline);
        assert_eq!(cfg.workers, 4);
    }

    #[test]
    fn default_config_validates_with_one_warning() {
        // Default result TTL (120s) is shorter than the default wait
        // timeout (180s) — flagged as a warning, not an error.
        let issues = CoordinatorConfig::default().validate();
        assert_eq!(issues.len(), 1);
        assert_eq!(issues[0].severity, ConfigSeverity::Warning);
        assert_eq!(issues[0].field, "result_ttl_sec");
    }

    #[test]
    fn zero_ttl_is_an_error() {
        let cfg = CoordinatorConfig {
            execution_ttl_sec: 0,
            ..Default::default()
        };
        assert!(cfg
            .validate()
            .iter()
            .any(|e| e.severity == ConfigSeverity::Error && e.field == "execution_ttl_sec"));
    }

    #[test]
    fn queued_without_workers_is_an_error() {
        let cfg = CoordinatorConfig {
            dispatch_mode: DispatchMode::Queued,
            workers: 0,
            ..Default::default()
        };
        assert!(cfg
            .validate()
            .iter()
            .any(|e| e.severity == ConfigSeverity::Error && e.field == "workers"));
    }

    #[test]
    fn deserializes_with_defaults() {
        let cfg: CoordinatorConfig = serde_json::from_str("{}").unwrap();
        assert_eq!(cfg.wait_timeout_sec, 180);

        let cfg: CoordinatorConfig =
            serde_json::from_str(r#"{ "dispatch_mode": "queued", "workers": 8 }"#).unwrap();
        assert_eq!(cfg.dispatch_mode, DispatchMode::Queued);
        assert_eq!(cfg.workers, 8);
    }

    #[test]
    fn duration_accessors() {
        let cfg = CoordinatorConfig::default();
        assert_eq!(cfg.check_interval(), Duration::from_millis(500));
        assert_eq!(cfg.wait_timeout(), Duration::from_secs(180));
    }
}
