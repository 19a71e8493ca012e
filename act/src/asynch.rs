//! Asynchronous act phase: many actions in flight, completion polled each cycle.

use anyhow::Result;
use serde_json::Value;
use tracing::{debug, info, instrument, warn};

use crate::core::drive::{DriveReport, FailureReason, drive_plan};
use crate::core::goal_graph::{GoalGraph, World};
use crate::phase::{ActPhase, CycleOutcome, Memory};
use crate::simple::render_goals;

/// Drives the first plan matching the current goals.
///
/// Only one plan is considered per goal set. A plan that is already finished
/// is reported and left alone even if another matching plan could run.
#[derive(Debug, Clone, Default)]
pub struct AsyncAct;

impl AsyncAct {
    pub const NAME: &'static str = "AsyncAct";

    pub fn new() -> Self {
        Self
    }
}

impl<G: GoalGraph, W: World> ActPhase<G, W> for AsyncAct {
    fn name(&self) -> &'static str {
        Self::NAME
    }

    #[instrument(skip(self, memory))]
    fn run(&mut self, cycle: u64, memory: &mut Memory<G, W>) -> Result<CycleOutcome> {
        let goals = memory.current_goals();
        if goals.is_empty() {
            debug!("no active goals; act phase will do nothing");
            return Ok(CycleOutcome::Idle);
        }

        let plan_id = match memory.goal_graph.matching_plan(&goals) {
            Ok(Some(plan_id)) => plan_id,
            Ok(None) => {
                debug!(goals = %render_goals(&goals), "no current plan; skipping act phase");
                return Ok(CycleOutcome::NoPlan);
            }
            Err(err) => {
                warn!(error = %format!("{err:#}"), "error loading plan; skipping act phase");
                return Ok(CycleOutcome::Skipped);
            }
        };
        let Some(plan) = memory.goal_graph.plan_mut(plan_id) else {
            warn!(plan = %plan_id, "matched plan vanished from goal graph; skipping act phase");
            return Ok(CycleOutcome::Skipped);
        };
        if plan.finished() {
            // Settles fire-and-forget actions still in flight; nothing new starts.
            log_report(&drive_plan(plan));
            info!(plan = %plan_id, "plan has already been completed");
            return Ok(CycleOutcome::PlanFinished(plan_id));
        }

        let report = drive_plan(plan);
        let snapshot = plan.snapshot();
        log_report(&report);

        let trimmed = memory.actions.push(report.started.clone());
        if trimmed > 0 {
            debug!(trimmed, retained = memory.actions.len(), "trimmed stale actions");
        }
        memory.record_trace(
            cycle,
            Self::NAME,
            vec![
                ("GOALS", serde_json::to_value(&goals)?),
                ("PLAN", serde_json::to_value(&snapshot)?),
                ("ACTION", serde_json::to_value(&report.started)?),
            ],
        );
        if let Some(index) = report.blocked_at {
            memory.record_trace_data("BLOCKED", Value::from(index));
        }

        Ok(match report.blocked_at {
            Some(index) => CycleOutcome::Blocked {
                plan: plan_id,
                index,
                actions: report.started,
            },
            None => CycleOutcome::Acted {
                plan: Some(plan_id),
                actions: report.started,
            },
        })
    }
}

fn log_report(report: &DriveReport) {
    for record in &report.started {
        info!(action = %record, "beginning action execution");
    }
    for index in &report.completed {
        info!(index, "action completed");
    }
    for failure in &report.failed {
        match &failure.reason {
            FailureReason::MissingCapability => warn!(
                action = %failure.operator,
                "action has no executable body; it cannot be executed"
            ),
            FailureReason::Poll(error) => warn!(
                action = %failure.operator,
                %error,
                "completion check failed; marking action failed"
            ),
            FailureReason::Execute(error) => warn!(
                action = %failure.operator,
                %error,
                "execution failed; marking action failed"
            ),
        }
    }
    if let Some(index) = report.blocked_at {
        debug!(index, "waiting on blocking action");
    }
}
