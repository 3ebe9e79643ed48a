//! Routing table for the patient state machine.
//!
//! The table only connects the ED pathway: OR, ICU, observation, transfer-out
//! and the elevator queue exist as tracked nodes but nothing routes into them,
//! so their metrics stay at zero.

use crate::distributions::RandomStream;
use crate::ecs::FacilityNode;

/// Probability that an ED patient is sent to imaging rather than straight to the ward.
pub const IMAGING_BRANCH_PROBABILITY: f64 = 0.5;

/// Transit/service time bounds in minutes.
pub const MIN_STEP_MINUTES: f64 = 10.0;
pub const MAX_STEP_MINUTES: f64 = 60.0;

/// Outgoing edge of a node.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Route {
    To(FacilityNode),
    /// `u < p` takes `then`, otherwise `otherwise`.
    Branch {
        then: FacilityNode,
        otherwise: FacilityNode,
    },
    /// No successor: the patient leaves the system here.
    Exit,
}

impl FacilityNode {
    pub fn route(self) -> Route {
        match self {
            FacilityNode::Arrival => Route::To(FacilityNode::TriageQueue),
            FacilityNode::TriageQueue => Route::To(FacilityNode::TriageService),
            FacilityNode::TriageService => Route::To(FacilityNode::EdQueue),
            FacilityNode::EdQueue => Route::To(FacilityNode::EdService),
            FacilityNode::EdService => Route::Branch {
                then: FacilityNode::ImagingQueue,
                otherwise: FacilityNode::Ward,
            },
            FacilityNode::ImagingQueue => Route::To(FacilityNode::ImagingService),
            FacilityNode::ImagingService => Route::To(FacilityNode::ResultReviewQueue),
            FacilityNode::ResultReviewQueue => Route::To(FacilityNode::ResultReviewService),
            FacilityNode::ResultReviewService => Route::To(FacilityNode::Ward),
            FacilityNode::Ward => Route::To(FacilityNode::Discharge),
            FacilityNode::Obs
            | FacilityNode::OrQueue
            | FacilityNode::InOr
            | FacilityNode::IcuWait
            | FacilityNode::Icu
            | FacilityNode::Discharge
            | FacilityNode::TransferOut
            | FacilityNode::ElevatorQueue => Route::Exit,
        }
    }
}

impl Route {
    /// Successor along this edge, drawing once only at a branch. `None` for [Route::Exit].
    pub fn resolve(self, rng: &mut RandomStream) -> Option<FacilityNode> {
        match self {
            Route::To(next) => Some(next),
            Route::Branch { then, otherwise } => {
                if rng.next_f64() < IMAGING_BRANCH_PROBABILITY {
                    Some(then)
                } else {
                    Some(otherwise)
                }
            }
            Route::Exit => None,
        }
    }
}

/// Picks the successor of `node`.
pub fn next_node(node: FacilityNode, rng: &mut RandomStream) -> Option<FacilityNode> {
    node.route().resolve(rng)
}

/// Nodes reachable from `arrival` through the routing table.
pub fn reachable_nodes() -> Vec<FacilityNode> {
    let mut seen = vec![FacilityNode::Arrival];
    let mut frontier = vec![FacilityNode::Arrival];
    while let Some(node) = frontier.pop() {
        let successors = match node.route() {
            Route::To(next) => vec![next],
            Route::Branch { then, otherwise } => vec![then, otherwise],
            Route::Exit => Vec::new(),
        };
        for next in successors {
            if !seen.contains(&next) {
                seen.push(next);
                frontier.push(next);
            }
        }
    }
    seen.sort();
    seen
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn deterministic_edges_draw_nothing() {
        let mut rng = RandomStream::new(1);
        assert_eq!(
            next_node(FacilityNode::Arrival, &mut rng),
            Some(FacilityNode::TriageQueue)
        );
        assert_eq!(
            next_node(FacilityNode::Ward, &mut rng),
            Some(FacilityNode::Discharge)
        );
        assert_eq!(next_node(FacilityNode::Discharge, &mut rng), None);
        assert_eq!(rng.draws(), 0);
    }

    #[test]
    fn ed_branch_draws_once_and_takes_both_paths() {
        let mut rng = RandomStream::new(1);
        let mut imaging = 0;
        let mut ward = 0;
        for _ in 0..1000 {
            match next_node(FacilityNode::EdService, &mut rng) {
                Some(FacilityNode::ImagingQueue) => imaging += 1,
                Some(FacilityNode::Ward) => ward += 1,
                other => panic!("unexpected successor {other:?}"),
            }
        }
        assert_eq!(rng.draws(), 1000);
        assert!(imaging > 400 && ward > 400);
    }

    #[test]
    fn surgical_and_critical_care_nodes_are_unreachable() {
        let reachable = reachable_nodes();
        for node in [
            FacilityNode::OrQueue,
            FacilityNode::InOr,
            FacilityNode::IcuWait,
            FacilityNode::Icu,
            FacilityNode::Obs,
            FacilityNode::TransferOut,
            FacilityNode::ElevatorQueue,
        ] {
            assert!(!reachable.contains(&node), "{node} should be unreachable");
        }
        assert!(reachable.contains(&FacilityNode::Discharge));
        assert_eq!(reachable.len(), 11);
    }
}
