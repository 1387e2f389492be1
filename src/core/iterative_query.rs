//! Convergence rules of an iterative node lookup.

use tracing::{debug, trace};

use crate::common::{find_closest_one, Id, Node};
use crate::{Error, Result};

/// An iterative process of concurrently sending find requests to the closest
/// known nodes to the target, adding the nodes they return to the routing
/// table, and repeating until the closest known node stops changing.
///
/// This only holds the decision logic, the driver feeds it the result of a
/// local find after every round, and performs the visits it asks for.
#[derive(Debug)]
pub(crate) struct IterativeQuery {
    target: Id,
    /// Closest node before the current round.
    closest: Option<Node>,
    rounds: usize,
}

#[derive(Debug, PartialEq)]
pub(crate) enum Step {
    /// The lookup is over.
    Done(Node),
    /// Send a find request to each of these nodes, wait for all of them, and
    /// call [IterativeQuery::next] again.
    Visit(Vec<Node>),
}

impl IterativeQuery {
    pub fn new(target: Id) -> Self {
        trace!(?target, "New lookup");

        Self {
            target,
            closest: None,
            rounds: 0,
        }
    }

    // === Getters ===

    pub fn rounds(&self) -> usize {
        self.rounds
    }

    // === Public Methods ===

    /// Decide the next step given the current local candidates.
    pub fn next(&mut self, candidates: Vec<Node>) -> Result<Step> {
        let Some(closest) = find_closest_one(&self.target, &candidates) else {
            // Every candidate got removed since the last round.
            return self.closest.take().map(Step::Done).ok_or(Error::NotFound);
        };

        if candidates.len() == 1 && closest.id == self.target {
            return Ok(self.done(closest));
        }

        if let Some(previous) = &self.closest {
            if previous.id == closest.id {
                return Ok(self.done(closest));
            }
        }

        if closest.id == self.target {
            // Nothing can be closer than the target itself.
            return Ok(self.done(closest));
        }

        self.closest = Some(closest);
        self.rounds += 1;

        Ok(Step::Visit(candidates))
    }

    // === Private Methods ===

    fn done(&self, closest: Node) -> Step {
        debug!(
            target = ?self.target,
            closest = ?closest.id,
            rounds = self.rounds,
            "Done lookup"
        );

        Step::Done(closest)
    }
}
