//! Plan selection over the candidates a goal graph reports.

use anyhow::Result;

use crate::core::goal_graph::{GoalGraph, World};
use crate::core::plan::PlanId;
use crate::core::types::Goal;

/// Goals a single candidate achieved under simulation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CandidateScore {
    pub plan: PlanId,
    pub achieved: Vec<Goal>,
}

/// Outcome of [`best_plan`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BestPlan {
    /// Candidates in evaluation order. Stops at the first full achiever.
    pub evaluated: Vec<CandidateScore>,
    /// Index into `evaluated` of the chosen candidate.
    pub chosen: Option<usize>,
    /// Number of goals requested.
    pub goal_count: usize,
}

impl BestPlan {
    pub fn plan(&self) -> Option<PlanId> {
        self.chosen.map(|index| self.evaluated[index].plan)
    }

    pub fn achieved(&self) -> &[Goal] {
        match self.chosen {
            Some(index) => &self.evaluated[index].achieved,
            None => &[],
        }
    }

    pub fn achieves_all(&self) -> bool {
        self.chosen.is_some() && self.achieved().len() == self.goal_count
    }
}

/// Pick the candidate under which the world achieves the most goals.
///
/// Candidates are visited in the graph's order. The best candidate is only
/// replaced on a strictly larger achieved count, so ties keep the earlier
/// plan. The scan stops as soon as a candidate achieves every goal. A
/// candidate that achieves nothing is never chosen.
pub fn best_plan<G, W>(graph: &G, world: &W, goals: &[Goal]) -> Result<BestPlan>
where
    G: GoalGraph + ?Sized,
    W: World + ?Sized,
{
    let mut result = BestPlan {
        evaluated: Vec::new(),
        chosen: None,
        goal_count: goals.len(),
    };
    let mut best_count = 0usize;

    for id in graph.all_matching_plans(goals)? {
        let Some(plan) = graph.plan(id) else {
            continue;
        };
        let achieved = world.goals_achieved(plan, goals);
        let count = achieved.len();
        result.evaluated.push(CandidateScore { plan: id, achieved });
        if count > best_count {
            best_count = count;
            result.chosen = Some(result.evaluated.len() - 1);
        }
        if count == goals.len() {
            break;
        }
    }

    Ok(result)
}

/// Outcome of [`first_unfinished_plan`].
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct FirstPlan {
    pub plan: Option<PlanId>,
    /// Finished plans removed from the graph during the scan.
    pub removed: Vec<PlanId>,
}

/// Return the first matching plan that is not finished.
///
/// Finished plans met before it are removed from the graph as part of the
/// scan, so this query mutates `graph`.
pub fn first_unfinished_plan<G>(graph: &mut G, goals: &[Goal]) -> Result<FirstPlan>
where
    G: GoalGraph + ?Sized,
{
    let mut result = FirstPlan::default();
    for id in graph.all_matching_plans(goals)? {
        let Some(plan) = graph.plan(id) else {
            continue;
        };
        if plan.finished() {
            graph.remove_plan(id);
            result.removed.push(id);
            continue;
        }
        result.plan = Some(id);
        break;
    }
    Ok(result)
}
