//! CLI command implementations.

use std::io::Read;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result, bail};
use tracing::{debug, info, warn};

use crate::agents::executor::{BackendExecutor, ExecOutcome, Executor};
use crate::agents::planner::Planner;
use crate::agents::validator::BackendValidator;
use crate::core::termination::Termination;
use crate::exit_codes;
use crate::io::backend::{Backend, CommandBackend};
use crate::io::config::{CorrectorConfig, load_config, write_config};
use crate::io::metrics_log::{MetricsReport, load_metrics, write_metrics};
use crate::workflow::{CancelToken, Orchestrator, WorkflowOutcome};

const PROBE_PROMPT: &str = "Say 'API is working' if you can read this.";

/// Write the default config file unless one exists (or `force`).
pub fn init_config(config_path: &Path, force: bool) -> Result<()> {
    if !force && config_path.exists() {
        println!(
            "init: {} exists (use --force to overwrite)",
            config_path.display()
        );
        return Ok(());
    }
    write_config(config_path, &CorrectorConfig::default())?;
    println!("init: wrote {}", config_path.display());
    Ok(())
}

/// Use `task` if given, else read it from `input`. Blank tasks are rejected.
pub fn resolve_task<R: Read>(task: Option<String>, mut input: R) -> Result<String> {
    let raw = match task {
        Some(task) => task,
        None => {
            let mut buf = String::new();
            input.read_to_string(&mut buf).context("read task from stdin")?;
            buf
        }
    };
    let task = raw.trim();
    if task.is_empty() {
        bail!("task must be non-empty");
    }
    Ok(task.to_string())
}

/// Run the self-correcting workflow for `task` and write its metrics.
///
/// Returns the process exit code: [`exit_codes::OK`] when a result was
/// accepted, [`exit_codes::FAILED`] otherwise.
///
/// The binary installs no signal handler: an interrupt ends the process
/// without writing metrics. Cooperative cancellation is available to library
/// callers through [`run_workflow`] and its [`CancelToken`].
pub fn run_task(config_path: &Path, task: &str, metrics_path: Option<PathBuf>) -> Result<i32> {
    let cfg = load_config(config_path)?;
    let backend = CommandBackend::new(&cfg.backend);
    let outcome = run_workflow(&cfg, &backend, task, CancelToken::new())?;

    let metrics_path = metrics_path.unwrap_or_else(|| cfg.metrics_path.clone());
    write_metrics(&metrics_path, &outcome.report)
        .with_context(|| format!("write metrics {}", metrics_path.display()))?;
    debug!(path = %metrics_path.display(), "metrics written");

    let workflow = &outcome.workflow;
    match workflow.termination {
        Termination::Accepted => println!(
            "run: accepted after {} attempt(s)",
            workflow.state.attempt_count
        ),
        Termination::MaxRetries => {
            println!("run: failed, max retries ({}) reached", cfg.max_retries);
        }
        Termination::Cancelled => println!("run: cancelled"),
    }
    println!("run: efficiency={:.4}", workflow.efficiency);
    println!("{}", workflow.final_result);

    Ok(if workflow.is_success() {
        exit_codes::OK
    } else {
        exit_codes::FAILED
    })
}

/// Workflow result plus the metrics collected while it ran.
pub struct RunOutput {
    pub workflow: WorkflowOutcome,
    pub report: MetricsReport,
}

/// Plan (optionally), then drive the correction loop against `backend`.
pub fn run_workflow<B: Backend>(
    cfg: &CorrectorConfig,
    backend: &B,
    task: &str,
    cancel: CancelToken,
) -> Result<RunOutput> {
    cfg.validate()?;
    let policy = cfg.policy();

    let plan = if cfg.plan_first {
        match Planner::new(backend).create_plan(task) {
            Ok(plan) => {
                info!(bytes = plan.len(), "plan created");
                Some(plan)
            }
            Err(err) => {
                warn!(err = %format!("{err:#}"), "planning failed, continuing without plan");
                None
            }
        }
    } else {
        None
    };

    let executor =
        BackendExecutor::new(backend, policy.initial_rate_limit_delay_secs).with_plan(plan);
    let validator = BackendValidator::new(
        backend,
        policy.acceptance_threshold,
        policy.initial_rate_limit_delay_secs,
    );
    let orchestrator = Orchestrator::new(policy, executor, validator).with_cancel(cancel);

    let mut steps = Vec::new();
    let workflow = orchestrator.run_with(task, |record| {
        println!(
            "attempt {}: score={:.3} kind={} action={} ({:.1}s)",
            record.attempt, record.score, record.error_kind, record.action, record.duration_secs
        );
        steps.push(record.clone());
    });

    let report = MetricsReport {
        task: task.to_string(),
        outcome: workflow.termination,
        efficiency: workflow.efficiency,
        steps,
    };
    Ok(RunOutput { workflow, report })
}

/// Baseline: a single execution with no validation or correction.
pub fn run_once(config_path: &Path, task: &str) -> Result<i32> {
    let cfg = load_config(config_path)?;
    let backend = CommandBackend::new(&cfg.backend);
    let outcome =
        BackendExecutor::new(&backend, cfg.initial_rate_limit_delay_secs).execute(task, None);
    println!("{outcome}");
    Ok(match outcome {
        ExecOutcome::Completed(_) => exit_codes::OK,
        ExecOutcome::Throttled { .. } | ExecOutcome::Failed(_) => exit_codes::FAILED,
    })
}

/// Check that the configured backend answers.
pub fn probe(config_path: &Path) -> Result<()> {
    let cfg = load_config(config_path)?;
    let reply = CommandBackend::new(&cfg.backend)
        .generate(PROBE_PROMPT)
        .context("probe backend")?;
    println!("probe: {reply}");
    Ok(())
}

/// Summarize a metrics file.
pub fn report(metrics_path: &Path) -> Result<()> {
    let summary = load_metrics(metrics_path)?.summarize();
    println!(
        "report: {} steps from {}",
        summary.steps,
        metrics_path.display()
    );
    println!("report: outcome={}", summary.outcome.as_str());
    if let Some(first) = summary.first {
        println!(
            "report: first attempt={} score={:.3} kind={} action={}",
            first.attempt, first.score, first.error_kind, first.action
        );
    }
    if let Some(last) = summary.last {
        println!(
            "report: last attempt={} score={:.3} kind={} action={}",
            last.attempt, last.score, last.error_kind, last.action
        );
    }
    println!("report: total_duration_secs={:.2}", summary.total_duration_secs);
    println!("report: efficiency={:.4}", summary.efficiency);
    Ok(())
}
