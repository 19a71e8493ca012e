//! Per-cycle diagnostic trace sinks.
//!
//! A phase announces itself with [`TraceSink::add_module`] and then attaches
//! owned snapshots (`WORLD`, `GOALS`, `PLAN`, `ACTION`) with
//! [`TraceSink::add_data`]. Snapshots are JSON values so that later mutation of
//! the live plan cannot change what was recorded.

use std::fs::{self, File, OpenOptions};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::debug;

pub trait TraceSink {
    fn add_module(&mut self, cycle: u64, module: &str) -> Result<()>;
    fn add_data(&mut self, key: &str, value: Value) -> Result<()>;
}

/// One module invocation with the data it attached.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TraceRecord {
    pub cycle: u64,
    pub module: String,
    pub data: Vec<(String, Value)>,
}

impl TraceRecord {
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.data
            .iter()
            .find(|(name, _)| name == key)
            .map(|(_, value)| value)
    }
}

/// Trace sink that keeps every record in memory.
#[derive(Debug, Clone, Default)]
pub struct MemoryTrace {
    records: Vec<TraceRecord>,
}

impl MemoryTrace {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn records(&self) -> &[TraceRecord] {
        &self.records
    }
}

impl TraceSink for MemoryTrace {
    fn add_module(&mut self, cycle: u64, module: &str) -> Result<()> {
        self.records.push(TraceRecord {
            cycle,
            module: module.to_string(),
            data: Vec::new(),
        });
        Ok(())
    }

    fn add_data(&mut self, key: &str, value: Value) -> Result<()> {
        let record = self
            .records
            .last_mut()
            .context("trace data added before any module")?;
        record.data.push((key.to_string(), value));
        Ok(())
    }
}

/// Line written by [`JsonlTrace`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TraceLine {
    pub cycle: u64,
    pub module: String,
    pub key: String,
    pub value: Value,
}

/// Trace sink appending one JSON object per datum to a file.
pub struct JsonlTrace {
    path: PathBuf,
    writer: BufWriter<File>,
    current: Option<(u64, String)>,
}

impl JsonlTrace {
    pub fn create(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)
                .with_context(|| format!("create trace dir {}", parent.display()))?;
        }
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)
            .with_context(|| format!("open trace {}", path.display()))?;
        debug!(path = %path.display(), "trace file opened");
        Ok(Self {
            path: path.to_path_buf(),
            writer: BufWriter::new(file),
            current: None,
        })
    }
}

impl TraceSink for JsonlTrace {
    fn add_module(&mut self, cycle: u64, module: &str) -> Result<()> {
        self.current = Some((cycle, module.to_string()));
        self.writer
            .flush()
            .with_context(|| format!("flush trace {}", self.path.display()))
    }

    fn add_data(&mut self, key: &str, value: Value) -> Result<()> {
        let (cycle, module) = self
            .current
            .clone()
            .context("trace data added before any module")?;
        let line = TraceLine {
            cycle,
            module,
            key: key.to_string(),
            value,
        };
        let mut buf = serde_json::to_string(&line).context("serialize trace line")?;
        buf.push('\n');
        self.writer
            .write_all(buf.as_bytes())
            .with_context(|| format!("write trace {}", self.path.display()))
    }
}

impl Drop for JsonlTrace {
    fn drop(&mut self) {
        let _ = self.writer.flush();
    }
}

/// Read back a file written by [`JsonlTrace`].
pub fn read_trace(path: &Path) -> Result<Vec<TraceLine>> {
    let contents =
        fs::read_to_string(path).with_context(|| format!("read trace {}", path.display()))?;
    contents
        .lines()
        .filter(|line| !line.trim().is_empty())
        .map(|line| {
            serde_json::from_str(line).with_context(|| format!("parse trace {}", path.display()))
        })
        .collect()
}
