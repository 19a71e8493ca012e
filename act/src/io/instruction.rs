//! Actuator instructions and the queue wire format.
//!
//! The queue is a JSON object `{"plan": [ {"action": "...", ...}, ... ]}`.
//! Fields other than `action` are carried through untouched.

use std::sync::LazyLock;

use anyhow::{Context, Result, anyhow};
use jsonschema::Validator;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::core::action::ActionRecord;
use crate::core::types::{ActionStatus, Operator};

const QUEUE_SCHEMA: &str = include_str!("../../schemas/instruction_queue.schema.json");

static QUEUE_VALIDATOR: LazyLock<Result<Validator, String>> = LazyLock::new(|| {
    let schema: Value = serde_json::from_str(QUEUE_SCHEMA).map_err(|err| err.to_string())?;
    jsonschema::validator_for(&schema).map_err(|err| err.to_string())
});

/// One instruction for the external actuator.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Instruction {
    pub action: String,
    #[serde(flatten)]
    pub fields: Map<String, Value>,
}

impl Instruction {
    pub fn new(action: impl Into<String>) -> Self {
        Self {
            action: action.into(),
            fields: Map::new(),
        }
    }

    /// `{"action": name, "args": [...]}` for a planned operator.
    pub fn from_operator(operator: &Operator) -> Self {
        let mut instruction = Self::new(operator.name.clone());
        if !operator.args.is_empty() {
            instruction.fields.insert(
                "args".to_string(),
                Value::Array(operator.args.iter().cloned().map(Value::String).collect()),
            );
        }
        instruction
    }

    pub fn is_sentinel(&self, terminate_action: &str) -> bool {
        self.action == terminate_action
    }

    /// Operator view: string entries of `args` become arguments.
    pub fn operator(&self) -> Operator {
        let args = match self.fields.get("args") {
            Some(Value::Array(items)) => items
                .iter()
                .map(|item| match item {
                    Value::String(text) => text.clone(),
                    other => other.to_string(),
                })
                .collect(),
            _ => Vec::new(),
        };
        Operator {
            name: self.action.clone(),
            args,
        }
    }

    /// Log entry for an instruction that was handed to the actuator.
    pub fn record(&self) -> ActionRecord {
        ActionRecord {
            operator: self.operator(),
            blocks: false,
            status: ActionStatus::InProgress,
        }
    }

    pub fn to_wire(&self) -> Result<String> {
        serde_json::to_string(self).context("serialize instruction")
    }
}

/// Ordered instructions waiting to be sent.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct InstructionQueue {
    pub plan: Vec<Instruction>,
}

impl InstructionQueue {
    pub fn new(plan: Vec<Instruction>) -> Self {
        Self { plan }
    }

    /// Parse and validate the wire format.
    pub fn parse(raw: &str) -> Result<Self> {
        let value: Value = serde_json::from_str(raw).context("parse instruction queue")?;
        Self::from_value(value)
    }

    pub fn from_value(value: Value) -> Result<Self> {
        let validator = QUEUE_VALIDATOR
            .as_ref()
            .map_err(|err| anyhow!("invalid instruction queue schema: {err}"))?;
        let messages = validator
            .iter_errors(&value)
            .map(|err| err.to_string())
            .collect::<Vec<_>>();
        if !messages.is_empty() {
            return Err(anyhow!(
                "instruction queue validation failed: {}",
                messages.join("; ")
            ));
        }
        serde_json::from_value(value).context("deserialize instruction queue")
    }

    pub fn to_wire(&self) -> Result<String> {
        serde_json::to_string(self).context("serialize instruction queue")
    }

    /// Remove and return the first instruction.
    pub fn pop_front(&mut self) -> Option<Instruction> {
        if self.plan.is_empty() {
            return None;
        }
        Some(self.plan.remove(0))
    }

    pub fn is_empty(&self) -> bool {
        self.plan.is_empty()
    }
}
