//! Synchronous act phases: one plan step per cycle.
//!
//! [`SimpleAct`] picks the plan that achieves the most current goals under
//! simulation. [`FirstPlanAct`] takes the first unfinished matching plan and
//! discards finished plans it passes over. Both hand out the step at the
//! plan's cursor, log it as a single-action batch and advance the cursor.

use anyhow::Result;
use serde_json::Value;
use tracing::{debug, info, instrument, trace, warn};

use crate::core::goal_graph::{GoalGraph, World};
use crate::core::plan::{Plan, PlanId};
use crate::core::selector::{best_plan, first_unfinished_plan};
use crate::core::types::Goal;
use crate::phase::{ActPhase, CycleOutcome, Memory};

/// Best-plan-by-coverage variant.
///
/// When no plan achieves any current goal, every current goal is removed from
/// the goal graph: a goal nothing can achieve this cycle is abandoned.
#[derive(Debug, Clone)]
pub struct SimpleAct {
    max_plan_print_size: usize,
}

impl SimpleAct {
    pub const NAME: &'static str = "SimpleAct";

    pub fn new(max_plan_print_size: usize) -> Self {
        Self {
            max_plan_print_size,
        }
    }
}

impl Default for SimpleAct {
    fn default() -> Self {
        Self::new(5)
    }
}

impl<G: GoalGraph, W: World> ActPhase<G, W> for SimpleAct {
    fn name(&self) -> &'static str {
        Self::NAME
    }

    #[instrument(skip(self, memory))]
    fn run(&mut self, cycle: u64, memory: &mut Memory<G, W>) -> Result<CycleOutcome> {
        let goals = memory.current_goals();
        let Some(world) = memory.latest_state() else {
            warn!("no world state available; skipping act phase");
            return Ok(CycleOutcome::Skipped);
        };

        let selection = match best_plan(&memory.goal_graph, world, &goals) {
            Ok(selection) => selection,
            Err(err) => {
                warn!(error = %format!("{err:#}"), "error loading plans; skipping act phase");
                return Ok(CycleOutcome::Skipped);
            }
        };
        for candidate in &selection.evaluated {
            if candidate.achieved.len() < goals.len() {
                debug!(
                    plan = %candidate.plan,
                    achieved = %render_goals(&candidate.achieved),
                    "retrieved plan does not achieve all goals; trying another"
                );
            }
        }
        match selection.plan() {
            None => info!("no valid plan found that achieves any current goals"),
            Some(plan) if !selection.achieves_all() => info!(
                %plan,
                achieved = %render_goals(selection.achieved()),
                "best plan does not achieve all goals"
            ),
            Some(_) => {}
        }

        let world_snapshot = world_snapshot(memory);
        let plan_id = selection.plan();
        record_selection(memory, cycle, Self::NAME, world_snapshot, &goals, plan_id)?;

        let Some(plan_id) = plan_id else {
            info!("no action selected this cycle");
            memory.actions.push(Vec::new());
            for goal in &goals {
                info!(%goal, "abandoning goal with no achieving plan");
                memory.goal_graph.remove_goal(goal);
            }
            memory.record_trace_data("ACTION", Value::Null);
            return Ok(CycleOutcome::NoPlan);
        };

        take_next_step(memory, plan_id, self.max_plan_print_size)
    }
}

/// First-unfinished-plan variant.
///
/// Finished plans encountered while scanning are removed from the goal graph.
/// Goals are never removed when no plan is found.
#[derive(Debug, Clone)]
pub struct FirstPlanAct {
    max_plan_print_size: usize,
}

impl FirstPlanAct {
    pub const NAME: &'static str = "FirstPlanAct";

    pub fn new(max_plan_print_size: usize) -> Self {
        Self {
            max_plan_print_size,
        }
    }
}

impl Default for FirstPlanAct {
    fn default() -> Self {
        Self::new(10)
    }
}

impl<G: GoalGraph, W: World> ActPhase<G, W> for FirstPlanAct {
    fn name(&self) -> &'static str {
        Self::NAME
    }

    #[instrument(skip(self, memory))]
    fn run(&mut self, cycle: u64, memory: &mut Memory<G, W>) -> Result<CycleOutcome> {
        let goals = memory.current_goals();
        let first = match first_unfinished_plan(&mut memory.goal_graph, &goals) {
            Ok(first) => first,
            Err(err) => {
                warn!(error = %format!("{err:#}"), "error loading plans; skipping act phase");
                return Ok(CycleOutcome::Skipped);
            }
        };
        for removed in &first.removed {
            info!(plan = %removed, "removed finished plan");
        }
        if first.plan.is_none() {
            info!(goals = %render_goals(&goals), "could not find an unfinished plan");
        }

        let world_snapshot = world_snapshot(memory);
        record_selection(memory, cycle, Self::NAME, world_snapshot, &goals, first.plan)?;

        let Some(plan_id) = first.plan else {
            info!("no action selected this cycle");
            memory.actions.push(Vec::new());
            memory.record_trace_data("ACTION", Value::Null);
            return Ok(CycleOutcome::NoPlan);
        };

        take_next_step(memory, plan_id, self.max_plan_print_size)
    }
}

/// Hand out the step at the plan's cursor and advance past it.
fn take_next_step<G: GoalGraph, W: World>(
    memory: &mut Memory<G, W>,
    plan_id: PlanId,
    max_plan_print_size: usize,
) -> Result<CycleOutcome> {
    let Some(plan) = memory.goal_graph.plan_mut(plan_id) else {
        warn!(plan = %plan_id, "selected plan vanished from goal graph; skipping act phase");
        return Ok(CycleOutcome::Skipped);
    };
    let Some(record) = plan.next_step().map(|action| action.record()) else {
        info!(plan = %plan_id, "plan to achieve goals has already been completed; taking no action");
        memory.actions.push(Vec::new());
        memory.record_trace_data("ACTION", Value::Null);
        return Ok(CycleOutcome::PlanFinished(plan_id));
    };

    log_selection(plan, &record.to_string(), max_plan_print_size);
    plan.advance();

    let trimmed = memory.actions.push(vec![record.clone()]);
    if trimmed > 0 {
        debug!(trimmed, retained = memory.actions.len(), "trimmed stale actions");
    }
    memory.record_trace_data("ACTION", serde_json::to_value(&record)?);

    Ok(CycleOutcome::Acted {
        plan: Some(plan_id),
        actions: vec![record],
    })
}

pub(crate) fn log_selection(plan: &Plan, action: &str, max_plan_print_size: usize) {
    info!(action, "action selected");
    if plan.len() > max_plan_print_size {
        debug!(action, steps = plan.len(), "selected action from long plan");
        trace!("plan:\n{plan}");
    } else {
        debug!("selected action {action} from plan:\n{plan}");
    }
}

pub(crate) fn world_snapshot<G: GoalGraph, W: World>(memory: &Memory<G, W>) -> Value {
    if !memory.trace_enabled() {
        return Value::Null;
    }
    memory
        .latest_state()
        .map(W::snapshot)
        .unwrap_or(Value::Null)
}

pub(crate) fn record_selection<G: GoalGraph, W: World>(
    memory: &mut Memory<G, W>,
    cycle: u64,
    module: &str,
    world: Value,
    goals: &[Goal],
    plan: Option<PlanId>,
) -> Result<()> {
    if !memory.trace_enabled() {
        return Ok(());
    }
    let plan = match plan.and_then(|id| memory.goal_graph.plan(id)) {
        Some(plan) => serde_json::to_value(plan.snapshot())?,
        None => Value::Null,
    };
    memory.record_trace(
        cycle,
        module,
        vec![
            ("WORLD", world),
            ("GOALS", serde_json::to_value(goals)?),
            ("PLAN", plan),
        ],
    );
    Ok(())
}

pub(crate) fn render_goals(goals: &[Goal]) -> String {
    goals
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(", ")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::action_log::ActionLog;
    use crate::core::goal_graph::{DeclaredGoalsWorld, MemoryGoalGraph};
    use crate::test_support::{FailingGraph, FailingTrace, ScriptedWorld, SharedTrace, plan_of};

    fn goals(names: &[&str]) -> Vec<Goal> {
        names
            .iter()
            .map(|name| Goal::with_object("holding", *name))
            .collect()
    }

    #[test]
    fn missing_world_state_skips_cycle() {
        let mut memory: Memory<MemoryGoalGraph, DeclaredGoalsWorld> =
            Memory::new(MemoryGoalGraph::new(), ActionLog::default());
        memory.push_goals(goals(&["cup"]));
        let outcome = SimpleAct::default().run(1, &mut memory).expect("run");
        assert_eq!(outcome, CycleOutcome::Skipped);
        assert!(memory.actions.is_empty());
    }

    #[test]
    fn picks_plan_achieving_most_goals() {
        let requested = goals(&["cup", "ball"]);
        let mut graph = MemoryGoalGraph::new();
        graph.insert_plan(plan_of(&requested, &["grab_one(cup)"]));
        let both = graph.insert_plan(plan_of(&requested, &["grab_both(cup, ball)"]));
        let mut memory = Memory::new(graph, ActionLog::default());
        memory.push_goals(requested.clone());
        memory.push_state(
            ScriptedWorld::new()
                .achieves("grab_one", &requested[..1])
                .achieves("grab_both", &requested),
        );

        let outcome = SimpleAct::default().run(1, &mut memory).expect("run");
        assert_eq!(
            outcome,
            CycleOutcome::Acted {
                plan: Some(both),
                actions: memory.actions.last().expect("batch").clone(),
            }
        );
        assert_eq!(outcome.actions()[0].to_string(), "grab_both(cup, ball)");
    }

    #[test]
    fn partial_plan_still_selected() {
        let requested = goals(&["cup", "ball"]);
        let mut graph = MemoryGoalGraph::new();
        let id = graph.insert_plan(plan_of(&requested, &["grab(cup)", "grab(ball)"]));
        let mut memory = Memory::new(graph, ActionLog::default());
        memory.push_goals(requested.clone());
        memory.push_state(ScriptedWorld::new().achieves("grab", &requested[..1]));

        SimpleAct::default().run(1, &mut memory).expect("run");
        assert_eq!(memory.goal_graph.plan(id).expect("plan").cursor(), 1);
        assert_eq!(memory.goal_graph.goals(), requested.as_slice());
    }

    #[test]
    fn trace_gets_world_goals_plan_and_action() {
        let requested = goals(&["cup"]);
        let mut graph = MemoryGoalGraph::new();
        graph.insert_plan(plan_of(&requested, &["pickup(cup)"]));
        let trace = SharedTrace::new();
        let mut memory =
            Memory::new(graph, ActionLog::default()).with_trace(Box::new(trace.clone()));
        memory.push_goals(requested);
        memory.push_state(DeclaredGoalsWorld {
            facts: vec!["on(cup, table)".to_string()],
        });

        SimpleAct::default().run(5, &mut memory).expect("run");

        let records = trace.records();
        assert_eq!(records.len(), 1);
        let keys: Vec<&str> = records[0].data.iter().map(|(key, _)| key.as_str()).collect();
        assert_eq!(keys, vec!["WORLD", "GOALS", "PLAN", "ACTION"]);
        assert_eq!(
            records[0].get("WORLD"),
            Some(&serde_json::json!({"facts": ["on(cup, table)"]}))
        );
        assert_eq!(records[0].get("PLAN").expect("plan")["cursor"], 0);
    }

    #[test]
    fn first_plan_act_skips_finished_plans_and_keeps_goals() {
        let requested = goals(&["cup"]);
        let mut graph = MemoryGoalGraph::new();
        let done = graph.insert_plan(plan_of(&requested, &["look(cup)"]));
        let next = graph.insert_plan(plan_of(&requested, &["grab(cup)"]));
        graph.plan_mut(done).expect("plan").advance();
        let mut memory: Memory<MemoryGoalGraph, DeclaredGoalsWorld> =
            Memory::new(graph, ActionLog::default());
        memory.push_goals(requested.clone());

        let outcome = FirstPlanAct::default().run(1, &mut memory).expect("run");
        assert_eq!(outcome.actions()[0].to_string(), "grab(cup)");
        assert!(memory.goal_graph.plan(done).is_none());

        let outcome = FirstPlanAct::default().run(2, &mut memory).expect("run");
        assert_eq!(outcome, CycleOutcome::NoPlan);
        assert!(memory.goal_graph.plan(next).is_none());
        assert_eq!(memory.goal_graph.goals(), requested.as_slice());
        assert_eq!(memory.actions.len(), 2);
    }

    #[test]
    fn plan_lookup_failure_skips_cycle() {
        let mut memory: Memory<FailingGraph, DeclaredGoalsWorld> =
            Memory::new(FailingGraph::new(), ActionLog::default());
        memory.push_goals(goals(&["cup"]));
        memory.push_state(DeclaredGoalsWorld::default());

        let outcome = SimpleAct::default().run(1, &mut memory).expect("run");
        assert_eq!(outcome, CycleOutcome::Skipped);
        assert!(memory.actions.is_empty());
        assert!(memory.goal_graph.removed_goals().is_empty());

        let outcome = FirstPlanAct::default().run(2, &mut memory).expect("run");
        assert_eq!(outcome, CycleOutcome::Skipped);
        assert!(memory.actions.is_empty());
    }

    #[test]
    fn trace_sink_failure_does_not_stop_the_step() {
        let requested = goals(&["cup"]);
        let mut graph = MemoryGoalGraph::new();
        let id = graph.insert_plan(plan_of(&requested, &["pickup(cup)"]));
        let mut memory = Memory::new(graph, ActionLog::default()).with_trace(Box::new(FailingTrace));
        memory.push_goals(requested);
        memory.push_state(DeclaredGoalsWorld::default());

        let outcome = SimpleAct::default().run(1, &mut memory).expect("run");
        assert_eq!(outcome.actions()[0].to_string(), "pickup(cup)");
        assert_eq!(memory.goal_graph.plan(id).expect("plan").cursor(), 1);
    }
}
