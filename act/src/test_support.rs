//! Test-only doubles for the act-phase collaborators.

use std::cell::RefCell;
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use anyhow::{Result, anyhow};
use serde_json::Value;
use tempfile::TempDir;

use crate::core::action::{Action, Executable};
use crate::core::goal_graph::{GoalGraph, World};
use crate::core::plan::{Plan, PlanId};
use crate::core::types::{Goal, Operator};
use crate::io::publish::Publisher;
use crate::io::trace::{MemoryTrace, TraceRecord, TraceSink};

/// World whose simulation results are scripted per plan.
///
/// Plans are identified by the name of their first operator. Plans with no
/// script achieve nothing.
#[derive(Debug, Default)]
pub struct ScriptedWorld {
    achieved: HashMap<String, Vec<Goal>>,
    evaluations: RefCell<Vec<String>>,
}

impl ScriptedWorld {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn achieves(mut self, first_operator: &str, goals: &[Goal]) -> Self {
        self.achieved
            .insert(first_operator.to_string(), goals.to_vec());
        self
    }

    /// First-operator names of the plans simulated so far, in order.
    pub fn evaluations(&self) -> Vec<String> {
        self.evaluations.borrow().clone()
    }
}

impl World for ScriptedWorld {
    fn goals_achieved(&self, plan: &Plan, goals: &[Goal]) -> Vec<Goal> {
        let key = plan
            .get(0)
            .map(|action| action.operator().name.clone())
            .unwrap_or_default();
        self.evaluations.borrow_mut().push(key.clone());
        self.achieved
            .get(&key)
            .map(|achieved| {
                achieved
                    .iter()
                    .filter(|goal| goals.contains(goal))
                    .cloned()
                    .collect()
            })
            .unwrap_or_default()
    }

    fn snapshot(&self) -> Value {
        serde_json::json!({ "scripted": self.achieved.len() })
    }
}

#[derive(Debug, Default)]
struct ProbeCounts {
    executions: u32,
    polls: u32,
}

/// Shared counters observing a [`ScriptedBody`] after it moves into a plan.
#[derive(Debug, Clone, Default)]
pub struct BodyProbe {
    counts: Arc<Mutex<ProbeCounts>>,
}

impl BodyProbe {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn executions(&self) -> u32 {
        self.counts.lock().expect("probe lock").executions
    }

    pub fn polls(&self) -> u32 {
        self.counts.lock().expect("probe lock").polls
    }
}

/// Executable body that reports completion on a fixed poll.
///
/// Every `check_complete` call counts, including polls made before `execute`.
#[derive(Debug)]
pub struct ScriptedBody {
    complete_on_poll: u32,
    polls: u32,
    execute_error: Option<String>,
    poll_error: Option<String>,
    probe: BodyProbe,
}

impl ScriptedBody {
    pub fn completes_on(poll: u32, probe: &BodyProbe) -> Self {
        Self {
            complete_on_poll: poll,
            polls: 0,
            execute_error: None,
            poll_error: None,
            probe: probe.clone(),
        }
    }

    pub fn failing_execute(mut self, message: &str) -> Self {
        self.execute_error = Some(message.to_string());
        self
    }

    pub fn failing_poll(mut self, message: &str) -> Self {
        self.poll_error = Some(message.to_string());
        self
    }
}

impl Executable for ScriptedBody {
    fn execute(&mut self) -> Result<()> {
        self.probe.counts.lock().expect("probe lock").executions += 1;
        match &self.execute_error {
            Some(message) => Err(anyhow!(message.clone())),
            None => Ok(()),
        }
    }

    fn check_complete(&mut self) -> Result<bool> {
        self.probe.counts.lock().expect("probe lock").polls += 1;
        if let Some(message) = &self.poll_error {
            return Err(anyhow!(message.clone()));
        }
        self.polls += 1;
        Ok(self.polls >= self.complete_on_poll)
    }
}

/// Action driven by a scripted body. `op` uses `name(args)` notation.
pub fn async_action(op: &str, body: ScriptedBody) -> Action {
    let operator = Operator::parse(op).expect("operator");
    Action::with_body(operator, Box::new(body))
}

/// Plan of body-less actions for synchronous variants.
pub fn plan_of(goals: &[Goal], ops: &[&str]) -> Plan {
    let actions = ops
        .iter()
        .map(|op| Action::new(Operator::parse(op).expect("operator")))
        .collect();
    Plan::new(goals.to_vec(), actions)
}

/// Publisher that keeps every message; clones share the same buffer.
///
/// While a failure is set, `publish` returns it and records nothing.
#[derive(Debug, Clone, Default)]
pub struct RecordingPublisher {
    sent: Arc<Mutex<Vec<(String, String)>>>,
    failure: Arc<Mutex<Option<String>>>,
}

impl RecordingPublisher {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every publish fail with `message` until [`Self::recover`].
    pub fn fail_with(&self, message: &str) {
        *self.failure.lock().expect("publisher lock") = Some(message.to_string());
    }

    pub fn recover(&self) {
        *self.failure.lock().expect("publisher lock") = None;
    }

    /// `(destination, body)` pairs in publish order.
    pub fn published(&self) -> Vec<(String, String)> {
        self.sent.lock().expect("publisher lock").clone()
    }

    /// Published bodies parsed as JSON.
    pub fn bodies(&self) -> Vec<Value> {
        self.published()
            .iter()
            .map(|(_, body)| serde_json::from_str(body).expect("json body"))
            .collect()
    }
}

impl Publisher for RecordingPublisher {
    fn publish(&mut self, destination: &str, body: &str) -> Result<()> {
        if let Some(message) = self.failure.lock().expect("publisher lock").clone() {
            return Err(anyhow!(message));
        }
        self.sent
            .lock()
            .expect("publisher lock")
            .push((destination.to_string(), body.to_string()));
        Ok(())
    }
}

/// In-memory trace that stays readable after being boxed into a memory.
#[derive(Debug, Clone, Default)]
pub struct SharedTrace {
    inner: Arc<Mutex<MemoryTrace>>,
}

impl SharedTrace {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn records(&self) -> Vec<TraceRecord> {
        self.inner.lock().expect("trace lock").records().to_vec()
    }
}

impl TraceSink for SharedTrace {
    fn add_module(&mut self, cycle: u64, module: &str) -> Result<()> {
        self.inner
            .lock()
            .expect("trace lock")
            .add_module(cycle, module)
    }

    fn add_data(&mut self, key: &str, value: Value) -> Result<()> {
        self.inner.lock().expect("trace lock").add_data(key, value)
    }
}

/// Trace sink whose every write fails.
#[derive(Debug, Clone, Copy, Default)]
pub struct FailingTrace;

impl TraceSink for FailingTrace {
    fn add_module(&mut self, _cycle: u64, _module: &str) -> Result<()> {
        Err(anyhow!("trace sink closed"))
    }

    fn add_data(&mut self, _key: &str, _value: Value) -> Result<()> {
        Err(anyhow!("trace sink closed"))
    }
}

/// Goal graph whose plan lookups always fail.
///
/// Holds no plans, so direct plan access finds nothing.
#[derive(Debug, Clone, Default)]
pub struct FailingGraph {
    removed_goals: Vec<Goal>,
}

impl FailingGraph {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn removed_goals(&self) -> &[Goal] {
        &self.removed_goals
    }
}

impl GoalGraph for FailingGraph {
    fn matching_plan(&self, _goals: &[Goal]) -> Result<Option<PlanId>> {
        Err(anyhow!("goal graph unavailable"))
    }

    fn all_matching_plans(&self, _goals: &[Goal]) -> Result<Vec<PlanId>> {
        Err(anyhow!("goal graph unavailable"))
    }

    fn plan(&self, _id: PlanId) -> Option<&Plan> {
        None
    }

    fn plan_mut(&mut self, _id: PlanId) -> Option<&mut Plan> {
        None
    }

    fn remove_goal(&mut self, goal: &Goal) {
        self.removed_goals.push(goal.clone());
    }

    fn remove_plan(&mut self, _id: PlanId) {}
}

/// Temporary working directory holding a `scenario.json`.
pub struct ScenarioDir {
    dir: TempDir,
}

impl ScenarioDir {
    pub fn new(scenario: &Value) -> Result<Self> {
        let dir = tempfile::tempdir()?;
        let body = serde_json::to_string_pretty(scenario)?;
        fs::write(dir.path().join("scenario.json"), body)?;
        Ok(Self { dir })
    }

    pub fn root(&self) -> &Path {
        self.dir.path()
    }

    pub fn scenario_path(&self) -> PathBuf {
        self.dir.path().join("scenario.json")
    }

    /// Write an extra file relative to the root.
    pub fn write(&self, name: &str, contents: &str) -> Result<PathBuf> {
        let path = self.dir.path().join(name);
        fs::write(&path, contents)?;
        Ok(path)
    }
}
