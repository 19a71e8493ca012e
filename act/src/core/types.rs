//! Shared value types for act-phase logic.
//!
//! Goals and operators are plain values: they compare, hash and serialize
//! deterministically so that selection and logging stay reproducible.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Serialize};

/// A goal handed to the act phase by the control loop.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Goal {
    pub objective: String,
    #[serde(
        rename = "directObject",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub direct_object: Option<String>,
    /// Any further goal attributes, kept verbatim.
    #[serde(flatten, default, skip_serializing_if = "BTreeMap::is_empty")]
    pub attributes: BTreeMap<String, String>,
}

impl Goal {
    pub fn new(objective: impl Into<String>) -> Self {
        Self {
            objective: objective.into(),
            direct_object: None,
            attributes: BTreeMap::new(),
        }
    }

    pub fn with_object(objective: impl Into<String>, direct_object: impl Into<String>) -> Self {
        Self {
            direct_object: Some(direct_object.into()),
            ..Self::new(objective)
        }
    }
}

impl fmt::Display for Goal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.direct_object {
            Some(object) => write!(f, "{}({})", self.objective, object),
            None => write!(f, "{}", self.objective),
        }
    }
}

/// Printable identity of a planned step: `name(arg1, arg2)`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Operator {
    pub name: String,
    #[serde(default)]
    pub args: Vec<String>,
}

static OPERATOR_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^\s*([A-Za-z_][A-Za-z0-9_\-]*)\s*(?:\(([^()]*)\))?\s*$").unwrap()
});

impl Operator {
    pub fn new<I, S>(name: impl Into<String>, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            name: name.into(),
            args: args.into_iter().map(Into::into).collect(),
        }
    }

    /// Parse `name(arg1, arg2)`, `name()` or a bare `name`.
    pub fn parse(raw: &str) -> Result<Self, String> {
        let captures = OPERATOR_RE
            .captures(raw)
            .ok_or_else(|| format!("invalid operator '{raw}' (expected name(arg, ...))"))?;
        let name = captures[1].to_string();
        let args = match captures.get(2) {
            Some(list) if !list.as_str().trim().is_empty() => list
                .as_str()
                .split(',')
                .map(|arg| arg.trim().to_string())
                .collect::<Vec<_>>(),
            _ => Vec::new(),
        };
        if args.iter().any(String::is_empty) {
            return Err(format!("invalid operator '{raw}': empty argument"));
        }
        Ok(Self { name, args })
    }
}

impl fmt::Display for Operator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}({})", self.name, self.args.join(", "))
    }
}

/// Execution status of an action.
///
/// `NotStarted -> InProgress -> Complete | Failed`. A `NotStarted` action may
/// also jump straight to `Complete` or `Failed`. `Complete` and `Failed` are
/// terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActionStatus {
    #[default]
    NotStarted,
    InProgress,
    Complete,
    Failed,
}

impl ActionStatus {
    pub fn is_terminal(self) -> bool {
        matches!(self, ActionStatus::Complete | ActionStatus::Failed)
    }

    fn rank(self) -> u8 {
        match self {
            ActionStatus::NotStarted => 0,
            ActionStatus::InProgress => 1,
            ActionStatus::Complete | ActionStatus::Failed => 2,
        }
    }

    /// True if moving from `self` to `next` respects the status lattice.
    pub fn can_become(self, next: ActionStatus) -> bool {
        if self.is_terminal() {
            return self == next;
        }
        next.rank() >= self.rank()
    }
}
