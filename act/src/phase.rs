//! Shared plumbing for act-phase variants: the per-run memory each cycle
//! reads and writes, the [`ActPhase`] trait, and cycle outcomes.

use std::fmt;

use anyhow::Result;
use serde_json::Value;
use tracing::warn;

use crate::core::action::ActionRecord;
use crate::core::action_log::ActionLog;
use crate::core::goal_graph::{GoalGraph, World};
use crate::core::plan::PlanId;
use crate::core::types::Goal;
use crate::io::instruction::Instruction;
use crate::io::trace::TraceSink;

/// Explicit context passed into every cycle.
///
/// Holds the goal graph, the goal and world-state histories supplied by the
/// control loop, the action log and an optional trace sink.
pub struct Memory<G, W> {
    pub goal_graph: G,
    pub actions: ActionLog,
    goals: Vec<Vec<Goal>>,
    states: Vec<W>,
    trace: Option<Box<dyn TraceSink>>,
}

impl<G: GoalGraph, W: World> Memory<G, W> {
    pub fn new(goal_graph: G, actions: ActionLog) -> Self {
        Self {
            goal_graph,
            actions,
            goals: Vec::new(),
            states: Vec::new(),
            trace: None,
        }
    }

    pub fn with_trace(mut self, trace: Box<dyn TraceSink>) -> Self {
        self.trace = Some(trace);
        self
    }

    /// Record the goals selected for the coming cycle.
    pub fn push_goals(&mut self, goals: Vec<Goal>) {
        self.goals.push(goals);
    }

    /// Goals for the current cycle, if the control loop supplied any.
    pub fn latest_goals(&self) -> Option<&[Goal]> {
        self.goals.last().map(Vec::as_slice)
    }

    /// Current goals with absence treated as "no goals".
    pub fn current_goals(&self) -> Vec<Goal> {
        match self.latest_goals() {
            Some(goals) => goals.to_vec(),
            None => Vec::new(),
        }
    }

    pub fn push_state(&mut self, state: W) {
        self.states.push(state);
    }

    pub fn latest_state(&self) -> Option<&W> {
        self.states.last()
    }

    pub fn trace_enabled(&self) -> bool {
        self.trace.is_some()
    }

    pub fn trace_mut(&mut self) -> Option<&mut (dyn TraceSink + 'static)> {
        self.trace.as_deref_mut()
    }

    /// Attach data to the current module record, if tracing is enabled.
    ///
    /// A sink error is logged and otherwise ignored.
    pub fn record_trace_data(&mut self, key: &str, value: Value) {
        let Some(trace) = self.trace_mut() else {
            return;
        };
        if let Err(err) = trace.add_data(key, value) {
            warn!(key, error = %format!("{err:#}"), "failed to write trace data");
        }
    }

    /// Write one module record with its data, if tracing is enabled.
    ///
    /// A sink error is logged and the rest of the record is dropped.
    pub fn record_trace(&mut self, cycle: u64, module: &str, data: Vec<(&str, Value)>) {
        let Some(trace) = self.trace_mut() else {
            return;
        };
        let written = trace.add_module(cycle, module).and_then(|()| {
            data.into_iter()
                .try_for_each(|(key, value)| trace.add_data(key, value))
        });
        if let Err(err) = written {
            warn!(cycle, module, error = %format!("{err:#}"), "failed to write trace record");
        }
    }
}

/// What a single act-phase cycle did.
#[derive(Debug, Clone, PartialEq)]
pub enum CycleOutcome {
    /// Nothing to act on: no active goals, or no pending instruction.
    Idle,
    /// The goal graph or world state could not be read; nothing was done.
    Skipped,
    /// No plan matched the current goals.
    NoPlan,
    /// The selected plan had already run to completion.
    PlanFinished(PlanId),
    /// Actions were selected or started this cycle.
    Acted {
        plan: Option<PlanId>,
        actions: Vec<ActionRecord>,
    },
    /// A blocking action at `index` is not complete; the plan waits there.
    Blocked {
        plan: PlanId,
        index: usize,
        actions: Vec<ActionRecord>,
    },
    /// The terminate instruction arrived; the control loop should stop.
    Terminate(Instruction),
}

impl CycleOutcome {
    /// Actions selected or started this cycle.
    pub fn actions(&self) -> &[ActionRecord] {
        match self {
            CycleOutcome::Acted { actions, .. } | CycleOutcome::Blocked { actions, .. } => actions,
            _ => &[],
        }
    }

    pub fn is_terminate(&self) -> bool {
        matches!(self, CycleOutcome::Terminate(_))
    }
}

impl fmt::Display for CycleOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CycleOutcome::Idle => write!(f, "idle"),
            CycleOutcome::Skipped => write!(f, "skipped"),
            CycleOutcome::NoPlan => write!(f, "no plan"),
            CycleOutcome::PlanFinished(plan) => write!(f, "{plan} already finished"),
            CycleOutcome::Acted { actions, .. } if actions.is_empty() => write!(f, "no action"),
            CycleOutcome::Acted { actions, .. } => write!(f, "acted: {}", join(actions)),
            CycleOutcome::Blocked {
                plan,
                index,
                actions,
            } => {
                write!(f, "{plan} waiting on step {index}")?;
                if !actions.is_empty() {
                    write!(f, " (started: {})", join(actions))?;
                }
                Ok(())
            }
            CycleOutcome::Terminate(instruction) => {
                write!(f, "terminate ({})", instruction.action)
            }
        }
    }
}

fn join(actions: &[ActionRecord]) -> String {
    actions
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(", ")
}

/// One act-phase variant, invoked once per control-loop cycle.
pub trait ActPhase<G: GoalGraph, W: World> {
    /// Module name used in trace records.
    fn name(&self) -> &'static str;

    fn run(&mut self, cycle: u64, memory: &mut Memory<G, W>) -> Result<CycleOutcome>;
}
