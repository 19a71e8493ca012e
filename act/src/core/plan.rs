//! Ordered, steppable plans.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::core::action::{Action, ActionRecord};
use crate::core::types::{ActionStatus, Goal};

/// Handle for a plan owned by a goal graph.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct PlanId(pub u64);

impl fmt::Display for PlanId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "plan-{}", self.0)
    }
}

/// An ordered sequence of actions with a monotone cursor.
///
/// The cursor points at the next step to hand out. It only moves forward.
#[derive(Debug)]
pub struct Plan {
    goals: Vec<Goal>,
    actions: Vec<Action>,
    cursor: usize,
}

impl Plan {
    pub fn new(goals: Vec<Goal>, actions: Vec<Action>) -> Self {
        Self {
            goals,
            actions,
            cursor: 0,
        }
    }

    /// Goals this plan was built to achieve.
    pub fn goals(&self) -> &[Goal] {
        &self.goals
    }

    pub fn actions(&self) -> &[Action] {
        &self.actions
    }

    pub fn len(&self) -> usize {
        self.actions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.actions.is_empty()
    }

    pub fn cursor(&self) -> usize {
        self.cursor
    }

    pub fn get(&self, index: usize) -> Option<&Action> {
        self.actions.get(index)
    }

    pub fn get_mut(&mut self, index: usize) -> Option<&mut Action> {
        self.actions.get_mut(index)
    }

    /// True when the cursor has passed the last action or every action is complete.
    pub fn finished(&self) -> bool {
        self.cursor >= self.actions.len()
            || self
                .actions
                .iter()
                .all(|action| action.status() == ActionStatus::Complete)
    }

    /// The action at the cursor, or `None` once the plan is finished.
    pub fn next_step(&self) -> Option<&Action> {
        if self.finished() {
            return None;
        }
        self.actions.get(self.cursor)
    }

    /// Move the cursor forward by one. Saturates at the end of the plan.
    pub fn advance(&mut self) {
        if self.cursor < self.actions.len() {
            self.cursor += 1;
        }
    }

    pub fn records(&self) -> Vec<ActionRecord> {
        self.actions.iter().map(Action::record).collect()
    }

    /// Serializable snapshot used by trace sinks.
    pub fn snapshot(&self) -> PlanSnapshot {
        PlanSnapshot {
            goals: self.goals.clone(),
            actions: self.records(),
            cursor: self.cursor,
            finished: self.finished(),
        }
    }
}

impl fmt::Display for Plan {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (index, action) in self.actions.iter().enumerate() {
            let marker = if index == self.cursor { "*" } else { " " };
            writeln!(f, "  {marker} {action}")?;
        }
        Ok(())
    }
}

/// Owned copy of a plan's state at one point in time.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlanSnapshot {
    pub goals: Vec<Goal>,
    pub actions: Vec<ActionRecord>,
    pub cursor: usize,
    pub finished: bool,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::types::Operator;

    fn plan_of(names: &[&str]) -> Plan {
        let actions = names
            .iter()
            .map(|name| Action::new(Operator::new(*name, ["cup"])))
            .collect();
        Plan::new(vec![Goal::with_object("holding", "cup")], actions)
    }

    #[test]
    fn advance_moves_cursor_until_finished() {
        let mut plan = plan_of(&["reach", "grab"]);
        assert_eq!(plan.next_step().map(|a| a.operator().name.as_str()), Some("reach"));
        plan.advance();
        assert_eq!(plan.cursor(), 1);
        assert_eq!(plan.next_step().map(|a| a.operator().name.as_str()), Some("grab"));
        plan.advance();
        assert!(plan.finished());
        assert!(plan.next_step().is_none());
    }

    #[test]
    fn advance_saturates_at_end() {
        let mut plan = plan_of(&["grab"]);
        plan.advance();
        plan.advance();
        assert_eq!(plan.cursor(), 1);
        assert!(plan.next_step().is_none());
    }

    #[test]
    fn all_complete_counts_as_finished_even_with_cursor_at_start() {
        let mut plan = plan_of(&["reach", "grab"]);
        for index in 0..plan.len() {
            plan.get_mut(index)
                .expect("action")
                .set_status(ActionStatus::Complete);
        }
        assert_eq!(plan.cursor(), 0);
        assert!(plan.finished());
        assert!(plan.next_step().is_none());
    }

    #[test]
    fn empty_plan_is_finished() {
        let plan = plan_of(&[]);
        assert!(plan.finished());
    }

    #[test]
    fn display_marks_cursor() {
        let mut plan = plan_of(&["reach", "grab"]);
        plan.advance();
        assert_eq!(plan.to_string(), "    reach(cup)\n  * grab(cup)\n");
    }
}
