//! Polling state machine for plans whose actions complete asynchronously.
//!
//! One call to [`drive_plan`] is one cycle: it never waits. Actions report
//! completion through [`Executable::check_complete`] on a later cycle.
//!
//! [`Executable::check_complete`]: crate::core::action::Executable::check_complete

use crate::core::action::{Action, ActionRecord};
use crate::core::plan::Plan;
use crate::core::types::{ActionStatus, Operator};

/// Why an action was marked failed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FailureReason {
    /// The action has no executable body.
    MissingCapability,
    /// `check_complete` returned an error.
    Poll(String),
    /// `execute` returned an error.
    Execute(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ActionFailure {
    pub index: usize,
    pub operator: Operator,
    pub reason: FailureReason,
}

/// What one drive of a plan did.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct DriveReport {
    /// Actions whose `execute` was called this cycle, in plan order.
    pub started: Vec<ActionRecord>,
    /// Indices of actions observed complete this cycle.
    pub completed: Vec<usize>,
    pub failed: Vec<ActionFailure>,
    /// Index of the blocking action the cursor is waiting on, if any.
    pub blocked_at: Option<usize>,
}

/// Drive `plan` forward by one cycle.
///
/// In-flight actions behind the cursor are polled first so fire-and-forget
/// completions are still observed. Then, from the cursor: poll, start if not
/// started, and advance while the action is complete or non-blocking. A
/// blocking action that is not complete (including one that failed) holds the
/// cursor.
pub fn drive_plan(plan: &mut Plan) -> DriveReport {
    let mut report = DriveReport::default();

    for index in 0..plan.cursor() {
        let Some(action) = plan.get_mut(index) else {
            break;
        };
        if action.status() == ActionStatus::InProgress {
            poll(action, index, &mut report);
        }
    }
    if plan.finished() {
        return report;
    }

    loop {
        let index = plan.cursor();
        let Some(action) = plan.get_mut(index) else {
            break;
        };
        if !action.status().is_terminal() {
            poll(action, index, &mut report);
        }
        if action.status() == ActionStatus::NotStarted {
            start(action, index, &mut report);
        }
        if action.status() == ActionStatus::Complete || !action.blocks() {
            plan.advance();
        } else {
            report.blocked_at = Some(index);
            break;
        }
    }
    report
}

fn poll(action: &mut Action, index: usize, report: &mut DriveReport) {
    let polled = match action.body_mut() {
        Some(body) => body.check_complete(),
        None => {
            fail(action, index, FailureReason::MissingCapability, report);
            return;
        }
    };
    match polled {
        Ok(true) => {
            action.set_status(ActionStatus::Complete);
            report.completed.push(index);
        }
        Ok(false) => {}
        Err(err) => fail(action, index, FailureReason::Poll(format!("{err:#}")), report),
    }
}

fn start(action: &mut Action, index: usize, report: &mut DriveReport) {
    let executed = match action.body_mut() {
        Some(body) => body.execute(),
        None => {
            fail(action, index, FailureReason::MissingCapability, report);
            return;
        }
    };
    match executed {
        Ok(()) => {
            action.set_status(ActionStatus::InProgress);
            report.started.push(action.record());
        }
        Err(err) => fail(action, index, FailureReason::Execute(format!("{err:#}")), report),
    }
}

fn fail(action: &mut Action, index: usize, reason: FailureReason, report: &mut DriveReport) {
    if action.set_status(ActionStatus::Failed) {
        report.failed.push(ActionFailure {
            index,
            operator: action.operator().clone(),
            reason,
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::types::Goal;
    use crate::test_support::{BodyProbe, ScriptedBody, async_action};

    fn plan_of(actions: Vec<Action>) -> Plan {
        Plan::new(vec![Goal::with_object("holding", "cup")], actions)
    }

    #[test]
    fn blocking_action_holds_cursor_until_complete() {
        let probe = BodyProbe::new();
        let mut plan = plan_of(vec![
            async_action("block_until_seen(cup)", ScriptedBody::completes_on(3, &probe))
                .blocking(true),
            async_action("grab(cup)", ScriptedBody::completes_on(2, &BodyProbe::new())),
        ]);

        let first = drive_plan(&mut plan);
        assert_eq!(first.blocked_at, Some(0));
        assert_eq!(first.started.len(), 1);
        assert_eq!(plan.cursor(), 0);

        let second = drive_plan(&mut plan);
        assert_eq!(second.blocked_at, Some(0));
        assert!(second.started.is_empty());
        assert_eq!(plan.cursor(), 0);

        let third = drive_plan(&mut plan);
        assert_eq!(third.completed, vec![0]);
        assert_eq!(plan.cursor(), 2);
        assert_eq!(probe.executions(), 1);
        assert_eq!(probe.polls(), 3);
    }

    #[test]
    fn non_blocking_actions_start_in_one_cycle() {
        let mut plan = plan_of(vec![
            async_action("look(cup)", ScriptedBody::completes_on(5, &BodyProbe::new())),
            async_action("reach(cup)", ScriptedBody::completes_on(5, &BodyProbe::new())),
        ]);
        let report = drive_plan(&mut plan);
        let started: Vec<String> = report.started.iter().map(ToString::to_string).collect();
        assert_eq!(started, vec!["look(cup)", "reach(cup)"]);
        assert_eq!(report.blocked_at, None);
        assert!(plan.finished());
        assert!(
            report
                .started
                .iter()
                .all(|record| record.status == ActionStatus::InProgress)
        );
    }

    #[test]
    fn missing_capability_fails_and_loop_continues() {
        let mut plan = plan_of(vec![
            Action::new(Operator::new("wave", ["hand"])),
            async_action("grab(cup)", ScriptedBody::completes_on(2, &BodyProbe::new())),
        ]);
        let report = drive_plan(&mut plan);
        assert_eq!(report.failed.len(), 1);
        assert_eq!(report.failed[0].index, 0);
        assert_eq!(report.failed[0].reason, FailureReason::MissingCapability);
        assert_eq!(plan.get(0).expect("action").status(), ActionStatus::Failed);
        assert_eq!(report.started.len(), 1);
        assert_eq!(plan.cursor(), 2);
    }

    #[test]
    fn failed_blocking_action_halts_plan() {
        let mut plan = plan_of(vec![
            Action::new(Operator::new("wait_for", ["cup"])).blocking(true),
            async_action("grab(cup)", ScriptedBody::completes_on(1, &BodyProbe::new())),
        ]);
        assert_eq!(drive_plan(&mut plan).blocked_at, Some(0));
        let again = drive_plan(&mut plan);
        assert_eq!(again.blocked_at, Some(0));
        assert!(again.failed.is_empty());
        assert_eq!(plan.cursor(), 0);
    }

    #[test]
    fn execute_error_marks_action_failed() {
        let probe = BodyProbe::new();
        let mut plan = plan_of(vec![async_action(
            "grab(cup)",
            ScriptedBody::completes_on(2, &probe).failing_execute("gripper offline"),
        )]);
        let report = drive_plan(&mut plan);
        assert_eq!(
            report.failed[0].reason,
            FailureReason::Execute("gripper offline".to_string())
        );
        assert!(report.started.is_empty());
        assert_eq!(probe.executions(), 1);
    }

    #[test]
    fn poll_error_fails_action_before_it_starts() {
        let probe = BodyProbe::new();
        let mut plan = plan_of(vec![async_action(
            "grab(cup)",
            ScriptedBody::completes_on(1, &probe).failing_poll("sensor lost"),
        )]);
        let report = drive_plan(&mut plan);
        assert_eq!(
            report.failed[0].reason,
            FailureReason::Poll("sensor lost".to_string())
        );
        assert_eq!(probe.executions(), 0);
        assert_eq!(plan.cursor(), 1);
    }

    #[test]
    fn in_flight_actions_behind_cursor_are_repolled() {
        let probe = BodyProbe::new();
        let mut plan = plan_of(vec![
            async_action("look(cup)", ScriptedBody::completes_on(2, &probe)),
            async_action("grab(cup)", ScriptedBody::completes_on(3, &BodyProbe::new()))
                .blocking(true),
        ]);
        drive_plan(&mut plan);
        assert_eq!(plan.cursor(), 1);
        let report = drive_plan(&mut plan);
        assert_eq!(report.completed, vec![0]);
        assert_eq!(plan.get(0).expect("action").status(), ActionStatus::Complete);
        assert_eq!(probe.executions(), 1);
    }

    #[test]
    fn completed_actions_are_never_polled_again() {
        let probe = BodyProbe::new();
        let mut plan = plan_of(vec![
            async_action("grab(cup)", ScriptedBody::completes_on(2, &probe)).blocking(true),
        ]);
        drive_plan(&mut plan);
        drive_plan(&mut plan);
        assert!(plan.finished());
        let polls = probe.polls();
        drive_plan(&mut plan);
        assert_eq!(probe.polls(), polls);
    }

    #[test]
    fn finished_plan_still_settles_trailing_actions() {
        let probe = BodyProbe::new();
        let mut plan = plan_of(vec![async_action(
            "reach(cup)",
            ScriptedBody::completes_on(2, &probe),
        )]);
        let first = drive_plan(&mut plan);
        assert_eq!(first.started.len(), 1);
        assert!(plan.finished());

        let second = drive_plan(&mut plan);
        assert!(second.started.is_empty());
        assert_eq!(second.completed, vec![0]);
        assert_eq!(plan.get(0).expect("action").status(), ActionStatus::Complete);
        assert_eq!(probe.executions(), 1);
    }
}
