//! Act-phase configuration stored as TOML.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result, anyhow};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::core::action_log::{ActionLog, DEFAULT_MAX_ENTRIES, DEFAULT_TRIM_COUNT};

/// Default config file name looked up in the working directory.
pub const DEFAULT_CONFIG_FILE: &str = "act.toml";

/// Act-phase configuration (TOML).
///
/// Missing fields fall back to the defaults below, so an empty file is valid.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct ActConfig {
    /// Action log length that triggers a trim.
    pub max_log_entries: usize,

    /// Oldest batches dropped by each trim.
    pub trim_count: usize,

    /// Plans longer than this are only printed in full at `trace` level.
    pub max_plan_print_size: usize,

    /// Optional JSON-lines trace file.
    pub trace_path: Option<PathBuf>,

    pub dispatch: DispatchConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct DispatchConfig {
    /// Destination every published instruction is sent to.
    pub destination: String,

    /// `action` value that stops the control loop instead of being executed.
    pub terminate_action: String,
}

impl Default for DispatchConfig {
    fn default() -> Self {
        Self {
            destination: "/topic/plan".to_string(),
            terminate_action: "Land".to_string(),
        }
    }
}

impl Default for ActConfig {
    fn default() -> Self {
        Self {
            max_log_entries: DEFAULT_MAX_ENTRIES,
            trim_count: DEFAULT_TRIM_COUNT,
            max_plan_print_size: 5,
            trace_path: None,
            dispatch: DispatchConfig::default(),
        }
    }
}

impl ActConfig {
    pub fn validate(&self) -> Result<()> {
        if self.max_log_entries == 0 {
            return Err(anyhow!("max_log_entries must be > 0"));
        }
        if self.trim_count == 0 {
            return Err(anyhow!("trim_count must be > 0"));
        }
        if self.trim_count > self.max_log_entries {
            return Err(anyhow!(
                "trim_count {} exceeds max_log_entries {}",
                self.trim_count,
                self.max_log_entries
            ));
        }
        if self.dispatch.destination.trim().is_empty() {
            return Err(anyhow!("dispatch.destination must not be empty"));
        }
        if self.dispatch.terminate_action.trim().is_empty() {
            return Err(anyhow!("dispatch.terminate_action must not be empty"));
        }
        Ok(())
    }

    /// Empty action log sized by this config.
    pub fn action_log(&self) -> ActionLog {
        ActionLog::new(self.max_log_entries, self.trim_count)
    }
}

/// Load config from a TOML file.
///
/// If the file is missing, returns `ActConfig::default()`.
pub fn load_config(path: &Path) -> Result<ActConfig> {
    if !path.exists() {
        debug!(path = %path.display(), "config missing, using defaults");
        let cfg = ActConfig::default();
        cfg.validate()?;
        return Ok(cfg);
    }
    let contents = fs::read_to_string(path).with_context(|| format!("read {}", path.display()))?;
    let cfg: ActConfig =
        toml::from_str(&contents).with_context(|| format!("parse {}", path.display()))?;
    cfg.validate()
        .with_context(|| format!("validate {}", path.display()))?;
    Ok(cfg)
}

/// Atomically write config to disk (temp file + rename).
pub fn write_config(path: &Path, cfg: &ActConfig) -> Result<()> {
    cfg.validate()?;
    let mut buf = toml::to_string_pretty(cfg).context("serialize config toml")?;
    buf.push('\n');
    write_atomic(path, &buf)
}

fn write_atomic(path: &Path, contents: &str) -> Result<()> {
    let parent = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };
    fs::create_dir_all(parent).with_context(|| format!("create directory {}", parent.display()))?;
    let tmp_path = path.with_extension("toml.tmp");
    fs::write(&tmp_path, contents)
        .with_context(|| format!("write temp config {}", tmp_path.display()))?;
    fs::rename(&tmp_path, path).with_context(|| format!("replace config {}", path.display()))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn load_missing_returns_default() {
        let temp = tempfile::tempdir().expect("tempdir");
        let cfg = load_config(&temp.path().join("missing.toml")).expect("load");
        assert_eq!(cfg, ActConfig::default());
        assert_eq!(cfg.max_log_entries, 400);
        assert_eq!(cfg.trim_count, 200);
    }

    #[test]
    fn write_then_load_round_trips() {
        let temp = tempfile::tempdir().expect("tempdir");
        let path = temp.path().join("act.toml");
        let cfg = ActConfig {
            trace_path: Some(PathBuf::from("trace.jsonl")),
            ..ActConfig::default()
        };
        write_config(&path, &cfg).expect("write");
        assert_eq!(load_config(&path).expect("load"), cfg);
    }

    #[test]
    fn partial_file_fills_defaults() {
        let temp = tempfile::tempdir().expect("tempdir");
        let path = temp.path().join("act.toml");
        fs::write(&path, "max_log_entries = 10\ntrim_count = 5\n").expect("write");
        let cfg = load_config(&path).expect("load");
        assert_eq!(cfg.max_log_entries, 10);
        assert_eq!(cfg.dispatch.terminate_action, "Land");
    }

    #[test]
    fn rejects_trim_larger_than_limit() {
        let cfg = ActConfig {
            max_log_entries: 10,
            trim_count: 11,
            ..ActConfig::default()
        };
        let err = cfg.validate().unwrap_err();
        assert!(err.to_string().contains("exceeds max_log_entries"));
    }
}
