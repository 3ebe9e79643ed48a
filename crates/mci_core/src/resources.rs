//! Service capacity per resource pool, and which pools serve which node.

use std::collections::BTreeMap;

use bevy_ecs::prelude::Resource;
use serde::{Deserialize, Serialize};

use crate::ecs::FacilityNode;
use crate::scenario::Scenario;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResourcePool {
    Triage,
    Ed,
    Ct,
    Ultrasound,
    Xray,
    ResultReview,
    Or,
    Icu,
    Ward,
    Obs,
    Elevator,
}

impl ResourcePool {
    pub const ALL: [ResourcePool; 11] = [
        ResourcePool::Triage,
        ResourcePool::Ed,
        ResourcePool::Ct,
        ResourcePool::Ultrasound,
        ResourcePool::Xray,
        ResourcePool::ResultReview,
        ResourcePool::Or,
        ResourcePool::Icu,
        ResourcePool::Ward,
        ResourcePool::Obs,
        ResourcePool::Elevator,
    ];

    /// Daytime staffing level.
    pub fn base_capacity(self) -> u32 {
        match self {
            ResourcePool::Triage => 4,
            ResourcePool::Ed => 20,
            ResourcePool::Ct => 1,
            ResourcePool::Ultrasound => 4,
            ResourcePool::Xray => 2,
            ResourcePool::ResultReview => 4,
            ResourcePool::Or => 8,
            ResourcePool::Icu => 44,
            ResourcePool::Ward => 256,
            ResourcePool::Obs => 20,
            ResourcePool::Elevator => 2,
        }
    }

    /// Night shift only runs a skeleton triage and ED.
    pub fn night_capacity(self) -> u32 {
        match self {
            ResourcePool::Triage => 1,
            ResourcePool::Ed => 2,
            other => other.base_capacity(),
        }
    }
}

impl FacilityNode {
    /// Pools whose combined capacity serves this node.
    pub fn pools(self) -> &'static [ResourcePool] {
        match self {
            FacilityNode::TriageQueue | FacilityNode::TriageService => &[ResourcePool::Triage],
            FacilityNode::EdQueue | FacilityNode::EdService => &[ResourcePool::Ed],
            FacilityNode::ImagingQueue | FacilityNode::ImagingService => &[
                ResourcePool::Ct,
                ResourcePool::Ultrasound,
                ResourcePool::Xray,
            ],
            FacilityNode::ResultReviewQueue | FacilityNode::ResultReviewService => {
                &[ResourcePool::ResultReview]
            }
            FacilityNode::OrQueue | FacilityNode::InOr => &[ResourcePool::Or],
            FacilityNode::IcuWait | FacilityNode::Icu => &[ResourcePool::Icu],
            FacilityNode::Ward => &[ResourcePool::Ward],
            FacilityNode::Obs => &[ResourcePool::Obs],
            FacilityNode::ElevatorQueue => &[ResourcePool::Elevator],
            // Unstaffed: capacity floors to 1, so utilization is the raw queue length.
            FacilityNode::Arrival | FacilityNode::Discharge | FacilityNode::TransferOut => &[],
        }
    }
}

#[derive(Debug, Clone, PartialEq, Resource, Serialize, Deserialize)]
pub struct ResourceLedger {
    capacities: BTreeMap<ResourcePool, u32>,
}

impl ResourceLedger {
    pub fn for_scenario(scenario: Scenario) -> Self {
        let capacities = ResourcePool::ALL
            .iter()
            .map(|&pool| {
                let capacity = match scenario {
                    Scenario::Daytime => pool.base_capacity(),
                    Scenario::Nighttime => pool.night_capacity(),
                };
                (pool, capacity)
            })
            .collect();
        Self { capacities }
    }

    pub fn capacity(&self, pool: ResourcePool) -> u32 {
        self.capacities.get(&pool).copied().unwrap_or(0)
    }

    /// Combined capacity of the pools serving `node`; 0 for nodes without pools.
    pub fn node_capacity(&self, node: FacilityNode) -> u32 {
        node.pools().iter().map(|&pool| self.capacity(pool)).sum()
    }

    pub fn increment(&mut self, pool: ResourcePool) {
        *self.capacities.entry(pool).or_insert(0) += 1;
    }

    pub fn set_capacity(&mut self, pool: ResourcePool, capacity: u32) {
        self.capacities.insert(pool, capacity);
    }
}
