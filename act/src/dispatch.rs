//! Act phases that hand instructions to an external actuator over a
//! [`Publisher`].
//!
//! [`DispatchAct`] forwards a queue that another component wrote into the
//! shared [`InstructionSlot`]. [`PublishingAct`] converts the next step of the
//! matching plan into an instruction. Both stop the control loop with
//! [`CycleOutcome::Terminate`] when the configured sentinel action comes up.

use anyhow::Result;
use serde_json::Value;
use tracing::{debug, info, instrument, warn};

use crate::core::goal_graph::{GoalGraph, World};
use crate::io::config::DispatchConfig;
use crate::io::instruction::Instruction;
use crate::io::publish::Publisher;
use crate::io::slot::InstructionSlot;
use crate::phase::{ActPhase, CycleOutcome, Memory};
use crate::simple::{log_selection, record_selection, render_goals, world_snapshot};

/// Forwards one pending instruction per cycle from the shared slot.
///
/// The slot stays locked while the instruction is published, and the
/// instruction leaves the queue only once the publish succeeds. A failed
/// publish skips the cycle and the same instruction is retried next cycle.
pub struct DispatchAct<P> {
    slot: InstructionSlot,
    publisher: P,
    config: DispatchConfig,
}

impl<P: Publisher> DispatchAct<P> {
    pub const NAME: &'static str = "DispatchAct";

    pub fn new(slot: InstructionSlot, publisher: P, config: DispatchConfig) -> Self {
        Self {
            slot,
            publisher,
            config,
        }
    }

    pub fn publisher(&self) -> &P {
        &self.publisher
    }
}

impl<G: GoalGraph, W: World, P: Publisher> ActPhase<G, W> for DispatchAct<P> {
    fn name(&self) -> &'static str {
        Self::NAME
    }

    #[instrument(skip(self, memory))]
    fn run(&mut self, cycle: u64, memory: &mut Memory<G, W>) -> Result<CycleOutcome> {
        let mut slot = match self.slot.lock() {
            Ok(slot) => slot,
            Err(err) => {
                warn!(error = %format!("{err:#}"), "instruction slot unavailable; skipping act phase");
                return Ok(CycleOutcome::Skipped);
            }
        };
        let mut queue = match slot.queue() {
            Ok(Some(queue)) => queue,
            Ok(None) => {
                debug!("no pending instruction");
                return Ok(CycleOutcome::Idle);
            }
            Err(err) => {
                warn!(error = %format!("{err:#}"), "discarding unreadable instruction queue");
                return Ok(CycleOutcome::Skipped);
            }
        };
        let Some(instruction) = queue.plan.first().cloned() else {
            debug!("instruction queue is empty");
            return Ok(CycleOutcome::Idle);
        };

        memory.record_trace(
            cycle,
            Self::NAME,
            vec![("ACTION", serde_json::to_value(&instruction)?)],
        );
        if instruction.is_sentinel(&self.config.terminate_action) {
            queue.pop_front();
            slot.replace(&queue)?;
            info!(action = %instruction.action, "terminate instruction received");
            return Ok(CycleOutcome::Terminate(instruction));
        }

        let body = instruction.to_wire()?;
        if let Err(err) = self.publisher.publish(&self.config.destination, &body) {
            warn!(
                action = %instruction.action,
                destination = %self.config.destination,
                error = %format!("{err:#}"),
                "failed to send instruction; leaving it queued"
            );
            return Ok(CycleOutcome::Skipped);
        }
        queue.pop_front();
        slot.replace(&queue)?;
        drop(slot);
        info!(
            action = %instruction.action,
            destination = %self.config.destination,
            remaining = queue.plan.len(),
            "sent instruction"
        );

        let record = instruction.record();
        let trimmed = memory.actions.push(vec![record.clone()]);
        if trimmed > 0 {
            debug!(trimmed, retained = memory.actions.len(), "trimmed stale actions");
        }
        Ok(CycleOutcome::Acted {
            plan: None,
            actions: vec![record],
        })
    }
}

/// Publishes the next step of the first matching plan as an instruction.
///
/// The sentinel step is published before the phase reports termination, so
/// the actuator sees it too. It is neither logged nor stepped past.
pub struct PublishingAct<P> {
    publisher: P,
    config: DispatchConfig,
    max_plan_print_size: usize,
}

impl<P: Publisher> PublishingAct<P> {
    pub const NAME: &'static str = "PublishingAct";

    pub fn new(publisher: P, config: DispatchConfig, max_plan_print_size: usize) -> Self {
        Self {
            publisher,
            config,
            max_plan_print_size,
        }
    }

    pub fn publisher(&self) -> &P {
        &self.publisher
    }
}

impl<G: GoalGraph, W: World, P: Publisher> ActPhase<G, W> for PublishingAct<P> {
    fn name(&self) -> &'static str {
        Self::NAME
    }

    #[instrument(skip(self, memory))]
    fn run(&mut self, cycle: u64, memory: &mut Memory<G, W>) -> Result<CycleOutcome> {
        let goals = memory.current_goals();
        let plan_id = match memory.goal_graph.matching_plan(&goals) {
            Ok(plan_id) => plan_id,
            Err(err) => {
                warn!(error = %format!("{err:#}"), "error loading plan; skipping act phase");
                return Ok(CycleOutcome::Skipped);
            }
        };
        if plan_id.is_none() {
            info!(goals = %render_goals(&goals), "no valid plan found that achieves any current goals");
        }

        let world = world_snapshot(memory);
        record_selection(memory, cycle, Self::NAME, world, &goals, plan_id)?;

        let Some(plan_id) = plan_id else {
            info!("no action selected this cycle");
            memory.actions.push(Vec::new());
            memory.record_trace_data("ACTION", Value::Null);
            return Ok(CycleOutcome::NoPlan);
        };
        let Some(plan) = memory.goal_graph.plan_mut(plan_id) else {
            warn!(plan = %plan_id, "matched plan vanished from goal graph; skipping act phase");
            return Ok(CycleOutcome::Skipped);
        };
        let Some(record) = plan.next_step().map(|action| action.record()) else {
            info!(plan = %plan_id, "plan to achieve goals has already been completed; taking no action");
            memory.actions.push(Vec::new());
            memory.record_trace_data("ACTION", Value::Null);
            return Ok(CycleOutcome::PlanFinished(plan_id));
        };

        let instruction = Instruction::from_operator(&record.operator);
        if let Err(err) = self
            .publisher
            .publish(&self.config.destination, &instruction.to_wire()?)
        {
            warn!(
                action = %instruction.action,
                destination = %self.config.destination,
                error = %format!("{err:#}"),
                "failed to send instruction; step stays at the cursor"
            );
            return Ok(CycleOutcome::Skipped);
        }
        if instruction.is_sentinel(&self.config.terminate_action) {
            info!(action = %instruction.action, "terminate instruction sent");
            return Ok(CycleOutcome::Terminate(instruction));
        }

        log_selection(plan, &record.to_string(), self.max_plan_print_size);
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
}
