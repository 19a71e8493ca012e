//! Scenario files for driving the act phase from the command line.
//!
//! A scenario seeds the in-memory goal graph, the world snapshot and,
//! optionally, the pending instruction queue:
//!
//! ```json
//! {
//!   "goals": [{"objective": "holding", "directObject": "cup"}],
//!   "plans": [{"actions": ["block_until_seen(cup)", {"op": "grab(cup)", "blocks": true, "completes_after": 2}]}],
//!   "instructions": {"plan": [{"action": "Move"}, {"action": "Land"}]}
//! }
//! ```

use std::fs;
use std::path::Path;

use anyhow::{Context, Result, anyhow};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, info};

use crate::core::action::{Action, Executable};
use crate::core::goal_graph::{DeclaredGoalsWorld, MemoryGoalGraph};
use crate::core::plan::Plan;
use crate::core::types::{Goal, Operator};
use crate::io::instruction::InstructionQueue;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Scenario {
    /// Goals handed to the act phase each cycle.
    #[serde(default)]
    pub goals: Vec<Goal>,
    /// World facts, carried into trace output.
    #[serde(default)]
    pub facts: Vec<String>,
    #[serde(default)]
    pub plans: Vec<PlanSpec>,
    /// Initial instruction queue for the dispatch variant.
    #[serde(default)]
    pub instructions: Option<Value>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlanSpec {
    /// Goals the plan achieves. Empty means "the scenario goals".
    #[serde(default)]
    pub goals: Vec<Goal>,
    pub actions: Vec<ActionSpec>,
}

/// Either `"name(args)"` or an object with options.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ActionSpec {
    Call(String),
    Detailed(ActionDetail),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActionDetail {
    pub op: String,
    #[serde(default)]
    pub blocks: bool,
    /// Polls after execution before the simulated actuator reports completion.
    #[serde(default = "default_completes_after")]
    pub completes_after: u32,
    /// `false` builds an action without an executable body.
    #[serde(default = "default_executable")]
    pub executable: bool,
}

fn default_completes_after() -> u32 {
    1
}

fn default_executable() -> bool {
    true
}

/// In-memory state built from a scenario.
#[derive(Debug)]
pub struct LoadedScenario {
    pub goals: Vec<Goal>,
    pub graph: MemoryGoalGraph,
    pub world: DeclaredGoalsWorld,
    pub queue: Option<InstructionQueue>,
}

pub fn load_scenario(path: &Path) -> Result<Scenario> {
    let contents = fs::read_to_string(path)
        .with_context(|| format!("read scenario {}", path.display()))?;
    let scenario: Scenario = serde_json::from_str(&contents)
        .with_context(|| format!("parse scenario {}", path.display()))?;
    debug!(
        path = %path.display(),
        goals = scenario.goals.len(),
        plans = scenario.plans.len(),
        "scenario loaded"
    );
    Ok(scenario)
}

impl Scenario {
    pub fn build(&self) -> Result<LoadedScenario> {
        let mut graph = MemoryGoalGraph::new();
        for goal in &self.goals {
            graph.insert_goal(goal.clone());
        }
        for (index, plan_spec) in self.plans.iter().enumerate() {
            let plan = plan_spec
                .build(&self.goals)
                .with_context(|| format!("plans[{index}]"))?;
            graph.insert_plan(plan);
        }
        let queue = self
            .instructions
            .clone()
            .map(InstructionQueue::from_value)
            .transpose()
            .context("instructions")?;
        Ok(LoadedScenario {
            goals: self.goals.clone(),
            graph,
            world: DeclaredGoalsWorld {
                facts: self.facts.clone(),
            },
            queue,
        })
    }
}

impl PlanSpec {
    fn build(&self, default_goals: &[Goal]) -> Result<Plan> {
        if self.actions.is_empty() {
            return Err(anyhow!("plan has no actions"));
        }
        let goals = if self.goals.is_empty() {
            default_goals.to_vec()
        } else {
            self.goals.clone()
        };
        let actions = self
            .actions
            .iter()
            .map(ActionSpec::build)
            .collect::<Result<Vec<_>>>()?;
        Ok(Plan::new(goals, actions))
    }
}

impl ActionSpec {
    fn build(&self) -> Result<Action> {
        let detail = match self {
            ActionSpec::Call(op) => ActionDetail {
                op: op.clone(),
                blocks: false,
                completes_after: default_completes_after(),
                executable: true,
            },
            ActionSpec::Detailed(detail) => detail.clone(),
        };
        let operator = Operator::parse(&detail.op).map_err(|err| anyhow!(err))?;
        let action = if detail.executable {
            let body = SimulatedBody::new(operator.to_string(), detail.completes_after);
            Action::with_body(operator, Box::new(body))
        } else {
            Action::new(operator)
        };
        Ok(action.blocking(detail.blocks))
    }
}

/// Stand-in actuator that finishes a fixed number of polls after starting.
#[derive(Debug, Clone)]
pub struct SimulatedBody {
    label: String,
    completes_after: u32,
    started: bool,
    polls: u32,
}

impl SimulatedBody {
    pub fn new(label: impl Into<String>, completes_after: u32) -> Self {
        Self {
            label: label.into(),
            completes_after,
            started: false,
            polls: 0,
        }
    }
}

impl Executable for SimulatedBody {
    fn execute(&mut self) -> Result<()> {
        info!(action = %self.label, "simulated actuator started");
        self.started = true;
        Ok(())
    }

    fn check_complete(&mut self) -> Result<bool> {
        if !self.started {
            return Ok(false);
        }
        self.polls += 1;
        Ok(self.polls >= self.completes_after)
    }
}
