use std::collections::BTreeMap;

use bevy_ecs::prelude::{Query, Res, ResMut};

use crate::clock::SimulationClock;
use crate::ecs::{FacilityNode, StaffAgent, StaffState};
use crate::resources::ResourceLedger;
use crate::systems::PatientCounter;
use crate::telemetry::{
    utilization, CongestionColor, DeathLog, NodeMetrics, NodeStats, SimSnapshot, SimSnapshots,
};

/// Builds the metrics of every tracked node from the live counters.
pub fn node_metrics(stats: &NodeStats, ledger: &ResourceLedger) -> Vec<NodeMetrics> {
    FacilityNode::ALL
        .iter()
        .map(|&node| {
            let state = stats.get(node);
            let utilization = utilization(state.occupancy, ledger.node_capacity(node));
            let p95_wait = state.waits.p95();
            NodeMetrics {
                node,
                queue_length: state.occupancy,
                utilization,
                p95_wait,
                deaths: state.deaths,
                color: CongestionColor::classify(utilization, p95_wait),
            }
        })
        .collect()
}

pub fn capture_snapshot_system(
    clock: Res<SimulationClock>,
    stats: Res<NodeStats>,
    ledger: Res<ResourceLedger>,
    counter: Res<PatientCounter>,
    deaths: Res<DeathLog>,
    agents: Query<&StaffAgent>,
    mut snapshots: ResMut<SimSnapshots>,
) {
    let mut active_staff = BTreeMap::new();
    for agent in agents.iter().filter(|a| a.state == StaffState::OnDuty) {
        *active_staff.entry(agent.id.role).or_insert(0) += 1;
    }

    snapshots.snapshots.push(SimSnapshot {
        time: clock.now(),
        nodes: node_metrics(&stats, &ledger),
        total_patients: counter.total(),
        total_deaths: deaths.records.len(),
        active_staff,
    });
}
