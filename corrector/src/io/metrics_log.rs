//! Per-iteration metrics persisted after a run (`experiment_logs.json` by default).

use std::fs;
use std::path::Path;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::core::termination::Termination;
use crate::core::types::{Action, ErrorKind};

/// One record per completed loop iteration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IterationRecord {
    /// 1-based position in the validation log.
    pub step: usize,
    pub attempt: u32,
    pub score: f64,
    pub error_kind: ErrorKind,
    pub action: Action,
    /// Wall-clock time of execute + validate, excluding any backoff wait.
    pub duration_secs: f64,
}

/// Everything written for one workflow run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetricsReport {
    pub task: String,
    pub outcome: Termination,
    pub efficiency: f64,
    pub steps: Vec<IterationRecord>,
}

/// Summary printed by `corrector report`.
#[derive(Debug, Clone, PartialEq)]
pub struct MetricsSummary {
    pub steps: usize,
    pub outcome: Termination,
    pub efficiency: f64,
    pub first: Option<IterationRecord>,
    pub last: Option<IterationRecord>,
    pub total_duration_secs: f64,
}

impl MetricsReport {
    pub fn summarize(&self) -> MetricsSummary {
        MetricsSummary {
            steps: self.steps.len(),
            outcome: self.outcome,
            efficiency: self.efficiency,
            first: self.steps.first().cloned(),
            last: self.steps.last().cloned(),
            total_duration_secs: self.steps.iter().map(|s| s.duration_secs).sum(),
        }
    }
}

pub fn write_metrics(path: &Path, report: &MetricsReport) -> Result<()> {
    let mut buf = serde_json::to_string_pretty(report).context("serialize metrics")?;
    buf.push('\n');
    super::write_atomic(path, &buf)
}

pub fn load_metrics(path: &Path) -> Result<MetricsReport> {
    let contents = fs::read_to_string(path).with_context(|| format!("read {}", path.display()))?;
    serde_json::from_str(&contents).with_context(|| format!("parse {}", path.display()))
}
