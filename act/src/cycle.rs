//! Multi-cycle driver for an act phase.

use anyhow::{Context, Result};
use tracing::{debug, info};

use crate::core::goal_graph::{GoalGraph, World};
use crate::core::types::Goal;
use crate::io::instruction::Instruction;
use crate::phase::{ActPhase, CycleOutcome, Memory};

/// Reason why `run_cycles` stopped.
#[derive(Debug, Clone, PartialEq)]
pub enum LoopStop {
    /// `max_cycles` cycles ran.
    CycleLimit,
    /// The phase surfaced the terminate instruction.
    Terminated(Instruction),
}

/// Summary of a driver invocation.
#[derive(Debug, Clone, PartialEq)]
pub struct RunSummary {
    pub cycles_run: u64,
    /// Actions across every cycle's batch.
    pub actions_taken: usize,
    pub stop: LoopStop,
}

impl RunSummary {
    pub fn terminated(&self) -> bool {
        matches!(self.stop, LoopStop::Terminated(_))
    }
}

/// Invoke `phase` once per cycle for up to `max_cycles` cycles.
///
/// Before each cycle `next_goals` supplies the goals pushed into memory and
/// `next_state`, when it returns a value, the world state. Cycles are numbered
/// from 1. Stops early when the phase returns [`CycleOutcome::Terminate`]; any
/// phase error aborts the run.
pub fn run_cycles<G, W, A, N, S, F>(
    phase: &mut A,
    memory: &mut Memory<G, W>,
    max_cycles: u64,
    mut next_goals: N,
    mut next_state: S,
    mut on_cycle: F,
) -> Result<RunSummary>
where
    G: GoalGraph,
    W: World,
    A: ActPhase<G, W> + ?Sized,
    N: FnMut(&Memory<G, W>) -> Vec<Goal>,
    S: FnMut(&Memory<G, W>) -> Option<W>,
    F: FnMut(u64, &CycleOutcome),
{
    let mut actions_taken = 0usize;
    for cycle in 1..=max_cycles {
        let goals = next_goals(memory);
        memory.push_goals(goals);
        if let Some(state) = next_state(memory) {
            memory.push_state(state);
        }

        let outcome = phase
            .run(cycle, memory)
            .with_context(|| format!("{} cycle {cycle}", phase.name()))?;
        actions_taken += outcome.actions().len();
        debug!(cycle, %outcome, "cycle finished");
        on_cycle(cycle, &outcome);

        if let CycleOutcome::Terminate(instruction) = outcome {
            info!(cycle, action = %instruction.action, "terminated by instruction");
            return Ok(RunSummary {
                cycles_run: cycle,
                actions_taken,
                stop: LoopStop::Terminated(instruction),
            });
        }
    }
    Ok(RunSummary {
        cycles_run: max_cycles,
        actions_taken,
        stop: LoopStop::CycleLimit,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::action_log::ActionLog;
    use crate::core::goal_graph::{DeclaredGoalsWorld, MemoryGoalGraph};
    use crate::dispatch::DispatchAct;
    use crate::io::config::DispatchConfig;
    use crate::io::instruction::InstructionQueue;
    use crate::io::slot::InstructionSlot;
    use crate::simple::SimpleAct;
    use crate::test_support::{RecordingPublisher, plan_of};

    #[test]
    fn stops_at_cycle_limit() {
        let goals = vec![Goal::with_object("holding", "cup")];
        let mut graph = MemoryGoalGraph::new();
        graph.insert_plan(plan_of(&goals, &["reach(cup)", "grab(cup)"]));
        let mut memory = Memory::new(graph, ActionLog::default());
        let mut seen = Vec::new();

        let summary = run_cycles(
            &mut SimpleAct::default(),
            &mut memory,
            3,
            |_| goals.clone(),
            |_| Some(DeclaredGoalsWorld::default()),
            |cycle, outcome| seen.push(format!("{cycle}: {outcome}")),
        )
        .expect("run");

        assert_eq!(summary.stop, LoopStop::CycleLimit);
        assert_eq!(summary.cycles_run, 3);
        assert_eq!(summary.actions_taken, 2);
        assert_eq!(
            seen,
            vec![
                "1: acted: reach(cup)",
                "2: acted: grab(cup)",
                "3: plan-0 already finished",
            ]
        );
        assert_eq!(memory.actions.len(), 3);
    }

    #[test]
    fn stops_early_on_terminate() {
        let slot = InstructionSlot::new();
        slot.store(
            &InstructionQueue::parse(
                r#"{"plan": [{"action": "Move"}, {"action": "Land"}, {"action": "Move"}]}"#,
            )
            .expect("queue"),
        )
        .expect("store");
        let publisher = RecordingPublisher::new();
        let mut act = DispatchAct::new(slot, publisher.clone(), DispatchConfig::default());
        let mut memory: Memory<MemoryGoalGraph, DeclaredGoalsWorld> =
            Memory::new(MemoryGoalGraph::new(), ActionLog::default());

        let summary = run_cycles(&mut act, &mut memory, 10, |_| Vec::new(), |_| None, |_, _| {})
            .expect("run");

        assert!(summary.terminated());
        assert_eq!(summary.cycles_run, 2);
        assert_eq!(summary.actions_taken, 1);
        assert_eq!(publisher.published().len(), 1);
    }
}
