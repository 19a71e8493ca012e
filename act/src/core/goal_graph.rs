//! Goal graph and world collaborator interfaces.
//!
//! The act phase never builds plans itself. It queries a [`GoalGraph`] for
//! plans that match the current goals and asks a [`World`] which goals a plan
//! would achieve. [`MemoryGoalGraph`] and [`DeclaredGoalsWorld`] are simple
//! in-memory implementations used by the CLI and tests.

use anyhow::Result;
use serde_json::Value;

use crate::core::plan::{Plan, PlanId};
use crate::core::types::Goal;

/// Owner of goals and the candidate plans that satisfy them.
pub trait GoalGraph {
    /// First plan whose goals cover every goal in `goals`.
    fn matching_plan(&self, goals: &[Goal]) -> Result<Option<PlanId>>;
    /// Every plan whose goals cover `goals`, in the graph's iteration order.
    fn all_matching_plans(&self, goals: &[Goal]) -> Result<Vec<PlanId>>;
    fn plan(&self, id: PlanId) -> Option<&Plan>;
    fn plan_mut(&mut self, id: PlanId) -> Option<&mut Plan>;
    fn remove_goal(&mut self, goal: &Goal);
    fn remove_plan(&mut self, id: PlanId);
}

/// World-state capability used to simulate plans.
pub trait World {
    /// Goals from `goals` that executing `plan` would achieve.
    fn goals_achieved(&self, plan: &Plan, goals: &[Goal]) -> Vec<Goal>;
    /// Owned copy of the state for trace records.
    fn snapshot(&self) -> Value {
        Value::Null
    }
}

/// Insertion-ordered goal graph held entirely in memory.
#[derive(Debug, Default)]
pub struct MemoryGoalGraph {
    goals: Vec<Goal>,
    plans: Vec<(PlanId, Plan)>,
    next_id: u64,
}

impl MemoryGoalGraph {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert_goal(&mut self, goal: Goal) {
        if !self.goals.contains(&goal) {
            self.goals.push(goal);
        }
    }

    /// Add a plan and register its goals. Returns the plan's handle.
    pub fn insert_plan(&mut self, plan: Plan) -> PlanId {
        for goal in plan.goals() {
            self.insert_goal(goal.clone());
        }
        let id = PlanId(self.next_id);
        self.next_id += 1;
        self.plans.push((id, plan));
        id
    }

    pub fn goals(&self) -> &[Goal] {
        &self.goals
    }

    pub fn plan_ids(&self) -> Vec<PlanId> {
        self.plans.iter().map(|(id, _)| *id).collect()
    }

    fn covers(plan: &Plan, goals: &[Goal]) -> bool {
        goals.iter().all(|goal| plan.goals().contains(goal))
    }
}

impl GoalGraph for MemoryGoalGraph {
    fn matching_plan(&self, goals: &[Goal]) -> Result<Option<PlanId>> {
        Ok(self
            .plans
            .iter()
            .find(|(_, plan)| Self::covers(plan, goals))
            .map(|(id, _)| *id))
    }

    fn all_matching_plans(&self, goals: &[Goal]) -> Result<Vec<PlanId>> {
        Ok(self
            .plans
            .iter()
            .filter(|(_, plan)| Self::covers(plan, goals))
            .map(|(id, _)| *id)
            .collect())
    }

    fn plan(&self, id: PlanId) -> Option<&Plan> {
        self.plans
            .iter()
            .find(|(plan_id, _)| *plan_id == id)
            .map(|(_, plan)| plan)
    }

    fn plan_mut(&mut self, id: PlanId) -> Option<&mut Plan> {
        self.plans
            .iter_mut()
            .find(|(plan_id, _)| *plan_id == id)
            .map(|(_, plan)| plan)
    }

    fn remove_goal(&mut self, goal: &Goal) {
        self.goals.retain(|existing| existing != goal);
    }

    fn remove_plan(&mut self, id: PlanId) {
        self.plans.retain(|(plan_id, _)| *plan_id != id);
    }
}

/// World that trusts each plan's declared goals.
///
/// A plan achieves exactly the requested goals it was built for. `facts` is
/// carried along for trace output only.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DeclaredGoalsWorld {
    pub facts: Vec<String>,
}

impl World for DeclaredGoalsWorld {
    fn goals_achieved(&self, plan: &Plan, goals: &[Goal]) -> Vec<Goal> {
        goals
            .iter()
            .filter(|goal| plan.goals().contains(goal))
            .cloned()
            .collect()
    }

    fn snapshot(&self) -> Value {
        serde_json::json!({ "facts": self.facts })
    }
}
