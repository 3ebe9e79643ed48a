//! Telemetry / KPIs: per-node live counters, snapshot time series, death log.

use std::collections::BTreeMap;

use bevy_ecs::prelude::Resource;
use serde::{Deserialize, Serialize};

use crate::distributions::{GeneratorKind, RandomStream};
use crate::ecs::{FacilityNode, PatientId, StaffRole};
use crate::error::{SimError, SimResult};

/// Wait samples retained per node.
pub const WAIT_RESERVOIR_CAPACITY: usize = 4096;

/// Congestion thresholds.
pub const RED_UTILIZATION: f64 = 0.95;
pub const RED_P95_WAIT_MINUTES: f64 = 10.0;
pub const ORANGE_UTILIZATION: f64 = 0.85;

/// Uniform sample of every wait (minutes) a node has ever recorded.
///
/// Exact until [WAIT_RESERVOIR_CAPACITY] samples; after that each new sample
/// replaces a random slot with probability `capacity / seen` (Algorithm R), so
/// the retained samples stay representative of the whole history. Replacement
/// uses a private stream and never touches the run's [RandomStream].
#[derive(Debug, Clone)]
pub struct WaitReservoir {
    samples: Vec<f64>,
    seen: u64,
    rng: RandomStream,
}

impl Default for WaitReservoir {
    fn default() -> Self {
        Self::with_seed(0)
    }
}

impl WaitReservoir {
    pub fn with_seed(seed: u64) -> Self {
        Self {
            samples: Vec::new(),
            seen: 0,
            rng: RandomStream::with_generator(seed, GeneratorKind::Splitmix64),
        }
    }

    pub fn record(&mut self, wait: f64) {
        self.seen += 1;
        if self.samples.len() < WAIT_RESERVOIR_CAPACITY {
            self.samples.push(wait);
            return;
        }
        let slot = (self.rng.next_f64() * self.seen as f64) as usize;
        if let Some(kept) = self.samples.get_mut(slot) {
            *kept = wait;
        }
    }

    /// Samples currently retained.
    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    /// Samples ever recorded.
    pub fn seen(&self) -> u64 {
        self.seen
    }

    pub fn p95(&self) -> f64 {
        let mut values = self.samples.clone();
        percentile_95(&mut values)
    }
}

/// Value at index `floor(0.95 * n)` of the ascending samples; 0 when empty.
pub fn percentile_95(values: &mut [f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    let index = ((values.len() as f64 * 0.95).floor() as usize).min(values.len() - 1);
    let (_, nth, _) = values.select_nth_unstable_by(index, f64::total_cmp);
    *nth
}

/// Live counters for one node.
#[derive(Debug, Clone, Default)]
pub struct NodeState {
    /// Non-terminal patients currently at the node.
    pub occupancy: usize,
    pub waits: WaitReservoir,
    pub deaths: usize,
}

#[derive(Debug, Clone, Resource)]
pub struct NodeStats {
    nodes: [NodeState; FacilityNode::COUNT],
}

impl Default for NodeStats {
    fn default() -> Self {
        Self {
            nodes: std::array::from_fn(|i| NodeState {
                waits: WaitReservoir::with_seed(i as u64),
                ..NodeState::default()
            }),
        }
    }
}

impl NodeStats {
    pub fn get(&self, node: FacilityNode) -> &NodeState {
        &self.nodes[node.index()]
    }

    pub fn enter(&mut self, node: FacilityNode) {
        self.nodes[node.index()].occupancy += 1;
    }

    pub fn leave(&mut self, node: FacilityNode) -> SimResult<()> {
        let state = &mut self.nodes[node.index()];
        state.occupancy = state
            .occupancy
            .checked_sub(1)
            .ok_or(SimError::NegativeQueue { node })?;
        Ok(())
    }

    pub fn record_wait(&mut self, node: FacilityNode, wait: f64) {
        self.nodes[node.index()].waits.record(wait);
    }

    pub fn record_death(&mut self, node: FacilityNode) {
        self.nodes[node.index()].deaths += 1;
    }

    pub fn total_occupancy(&self) -> usize {
        self.nodes.iter().map(|n| n.occupancy).sum()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CongestionColor {
    Green,
    Orange,
    Red,
}

impl CongestionColor {
    pub fn classify(utilization: f64, p95_wait: f64) -> Self {
        if utilization > RED_UTILIZATION && p95_wait > RED_P95_WAIT_MINUTES {
            CongestionColor::Red
        } else if utilization > ORANGE_UTILIZATION {
            CongestionColor::Orange
        } else {
            CongestionColor::Green
        }
    }
}

/// Queue length over capacity, with capacity floored at 1.
pub fn utilization(queue_length: usize, capacity: u32) -> f64 {
    queue_length as f64 / f64::from(capacity.max(1))
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NodeMetrics {
    pub node: FacilityNode,
    pub queue_length: usize,
    pub utilization: f64,
    pub p95_wait: f64,
    pub deaths: usize,
    pub color: CongestionColor,
}

/// System-wide metrics at one simulated instant (minutes).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SimSnapshot {
    pub time: f64,
    pub nodes: Vec<NodeMetrics>,
    pub total_patients: u64,
    pub total_deaths: usize,
    pub active_staff: BTreeMap<StaffRole, usize>,
}

impl SimSnapshot {
    pub fn node(&self, node: FacilityNode) -> Option<&NodeMetrics> {
        self.nodes.iter().find(|m| m.node == node)
    }
}

/// Append-only snapshot series for a run.
#[derive(Debug, Default, Resource)]
pub struct SimSnapshots {
    pub snapshots: Vec<SimSnapshot>,
}

/// A sustained red interval at one node, in simulated minutes.
///
/// Starts at the first red snapshot and ends at the next snapshot that is not
/// red, or at the last snapshot if the node is still red when the series ends.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BottleneckEpisode {
    pub node: FacilityNode,
    pub start: f64,
    pub end: f64,
    pub duration: f64,
}

/// Every bottleneck episode in a snapshot series, ordered by start time.
pub fn bottleneck_episodes(snapshots: &[SimSnapshot]) -> Vec<BottleneckEpisode> {
    let mut episodes = Vec::new();
    for &node in FacilityNode::ALL.iter() {
        let mut open: Option<f64> = None;
        for snapshot in snapshots {
            let red = snapshot
                .node(node)
                .is_some_and(|m| m.color == CongestionColor::Red);
            match (open, red) {
                (None, true) => open = Some(snapshot.time),
                (Some(start), false) => {
                    episodes.push(BottleneckEpisode {
                        node,
                        start,
                        end: snapshot.time,
                        duration: snapshot.time - start,
                    });
                    open = None;
                }
                _ => {}
            }
        }
        if let (Some(start), Some(last)) = (open, snapshots.last()) {
            episodes.push(BottleneckEpisode {
                node,
                start,
                end: last.time,
                duration: last.time - start,
            });
        }
    }
    episodes.sort_by(|a, b| a.start.total_cmp(&b.start));
    episodes
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeathRecord {
    pub patient_id: PatientId,
    pub time: f64,
    pub location: FacilityNode,
    pub reason: String,
}

#[derive(Debug, Default, Resource)]
pub struct DeathLog {
    pub records: Vec<DeathRecord>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn p95_picks_floor_index() {
        let mut waits = WaitReservoir::default();
        for wait in [15.0, 100.0, 5.0, 10.0, 10.0] {
            waits.record(wait);
        }
        // floor(5 * 0.95) = 4 -> largest sample
        assert_eq!(waits.p95(), 100.0);
    }

    #[test]
    fn p95_of_nothing_is_zero() {
        assert_eq!(WaitReservoir::default().p95(), 0.0);
    }

    #[test]
    fn early_waits_still_count_after_capacity_is_exceeded() {
        let mut waits = WaitReservoir::default();
        for _ in 0..5000 {
            waits.record(100.0);
        }
        for _ in 0..WAIT_RESERVOIR_CAPACITY {
            waits.record(1.0);
        }
        assert_eq!(waits.len(), WAIT_RESERVOIR_CAPACITY);
        assert_eq!(waits.seen(), 5000 + WAIT_RESERVOIR_CAPACITY as u64);
        // 5000 of 9096 samples are 100, so the 95th percentile is 100.
        assert_eq!(waits.p95(), 100.0);
    }

    #[test]
    fn reservoir_keeps_a_proportional_mix() {
        let mut waits = WaitReservoir::with_seed(3);
        for i in 0..40_000 {
            waits.record(if i < 20_000 { 1.0 } else { 2.0 });
        }
        let ones = waits.samples.iter().filter(|&&w| w == 1.0).count();
        let share = ones as f64 / WAIT_RESERVOIR_CAPACITY as f64;
        assert!((share - 0.5).abs() < 0.05, "share {share}");
    }

    fn series(reds: &[(f64, &[FacilityNode])]) -> Vec<SimSnapshot> {
        reds.iter()
            .map(|&(time, red)| SimSnapshot {
                time,
                nodes: FacilityNode::ALL
                    .iter()
                    .map(|&node| NodeMetrics {
                        node,
                        queue_length: 0,
                        utilization: 0.0,
                        p95_wait: 0.0,
                        deaths: 0,
                        color: if red.contains(&node) {
                            CongestionColor::Red
                        } else {
                            CongestionColor::Green
                        },
                    })
                    .collect(),
                total_patients: 0,
                total_deaths: 0,
                active_staff: BTreeMap::new(),
            })
            .collect()
    }

    #[test]
    fn episodes_span_from_first_red_to_first_non_red() {
        use FacilityNode::{EdQueue, TriageQueue};
        let snapshots = series(&[
            (0.0, &[]),
            (5.0, &[EdQueue]),
            (10.0, &[EdQueue, TriageQueue]),
            (15.0, &[]),
            (20.0, &[EdQueue]),
        ]);
        let episodes = bottleneck_episodes(&snapshots);
        assert_eq!(
            episodes,
            vec![
                BottleneckEpisode {
                    node: EdQueue,
                    start: 5.0,
                    end: 15.0,
                    duration: 10.0
                },
                BottleneckEpisode {
                    node: TriageQueue,
                    start: 10.0,
                    end: 15.0,
                    duration: 5.0
                },
                // still red when the series ends
                BottleneckEpisode {
                    node: EdQueue,
                    start: 20.0,
                    end: 20.0,
                    duration: 0.0
                },
            ]
        );
        assert!(bottleneck_episodes(&[]).is_empty());
    }

    #[test]
    fn color_thresholds() {
        assert_eq!(CongestionColor::classify(0.96, 11.0), CongestionColor::Red);
        assert_eq!(CongestionColor::classify(0.90, 2.0), CongestionColor::Orange);
        assert_eq!(CongestionColor::classify(0.96, 5.0), CongestionColor::Orange);
        assert_eq!(CongestionColor::classify(0.5, 50.0), CongestionColor::Green);
    }

    #[test]
    fn utilization_floors_capacity() {
        assert_eq!(utilization(3, 0), 3.0);
        assert_eq!(utilization(0, 0), 0.0);
        assert_eq!(utilization(5, 20), 0.25);
    }

    #[test]
    fn leaving_an_empty_node_is_an_invariant_violation() {
        let mut stats = NodeStats::default();
        stats.enter(FacilityNode::Ward);
        assert!(stats.leave(FacilityNode::Ward).is_ok());
        assert_eq!(
            stats.leave(FacilityNode::Ward),
            Err(SimError::NegativeQueue {
                node: FacilityNode::Ward
            })
        );
    }
}
