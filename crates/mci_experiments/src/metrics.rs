//! Per-replication summaries and their aggregation across a batch.

use std::time::Duration;

use mci_core::ecs::{FacilityNode, Patient};
use mci_core::runner::RunOutput;
use mci_core::scenario::{Scenario, ScenarioConfig};
use mci_core::telemetry::BottleneckEpisode;
use serde::{Deserialize, Serialize};

/// Nodes listed in [RunSummary::top_bottlenecks].
pub const TOP_BOTTLENECKS: usize = 5;

/// Total red time of one node over a run, in minutes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NodeRedDuration {
    pub node: FacilityNode,
    pub minutes: f64,
}

/// Headline numbers of one completed replication.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunSummary {
    pub run_index: usize,
    pub seed: u64,
    pub scenario: Scenario,
    /// Labels of the policies that were active, e.g. `["p1"]`.
    pub policies: Vec<String>,
    pub total_patients: u64,
    pub total_deaths: usize,
    /// Mean cumulative waiting-area time per patient, in minutes.
    pub avg_wait_time: f64,
    pub bottleneck_episodes: usize,
    /// Nodes with the longest total red time, longest first.
    pub top_bottlenecks: Vec<NodeRedDuration>,
    /// Wall-clock time of the replication.
    pub duration_ms: u64,
}

impl RunSummary {
    pub fn from_output(
        run_index: usize,
        config: &ScenarioConfig,
        output: &RunOutput,
        elapsed: Duration,
    ) -> Self {
        Self {
            run_index,
            seed: output.seed,
            scenario: config.scenario,
            policies: config.policies.active_labels(),
            total_patients: output.patients.len() as u64,
            total_deaths: output.deaths.len(),
            avg_wait_time: average_wait(&output.patients),
            bottleneck_episodes: output.bottlenecks.len(),
            top_bottlenecks: longest_red_nodes(&output.bottlenecks, TOP_BOTTLENECKS),
            duration_ms: u64::try_from(elapsed.as_millis()).unwrap_or(u64::MAX),
        }
    }
}

pub fn average_wait(patients: &[Patient]) -> f64 {
    if patients.is_empty() {
        return 0.0;
    }
    patients.iter().map(|p| p.total_wait_time).sum::<f64>() / patients.len() as f64
}

/// Red time summed per node, keeping the `limit` longest. Nodes that never
/// turned red, or only for a single snapshot, are left out.
pub fn longest_red_nodes(episodes: &[BottleneckEpisode], limit: usize) -> Vec<NodeRedDuration> {
    let mut totals: Vec<NodeRedDuration> = FacilityNode::ALL
        .iter()
        .map(|&node| NodeRedDuration {
            node,
            minutes: episodes
                .iter()
                .filter(|e| e.node == node)
                .map(|e| e.duration)
                .sum(),
        })
        .filter(|total| total.minutes > 0.0)
        .collect();
    totals.sort_by(|a, b| b.minutes.total_cmp(&a.minutes));
    totals.truncate(limit);
    totals
}

/// Result of one replication slot in a batch.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum ReplicationStatus {
    Completed(RunSummary),
    Failed {
        run_index: usize,
        seed: u64,
        message: String,
    },
    /// Skipped or abandoned after cancellation was requested.
    Cancelled { run_index: usize, seed: u64 },
}

impl ReplicationStatus {
    pub fn run_index(&self) -> usize {
        match self {
            ReplicationStatus::Completed(summary) => summary.run_index,
            ReplicationStatus::Failed { run_index, .. }
            | ReplicationStatus::Cancelled { run_index, .. } => *run_index,
        }
    }

    pub fn summary(&self) -> Option<&RunSummary> {
        match self {
            ReplicationStatus::Completed(summary) => Some(summary),
            _ => None,
        }
    }
}

/// Means over completed replications; failures and cancellations only show up in the counts.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AggregateMetrics {
    pub runs: usize,
    pub completed: usize,
    pub failed: usize,
    pub cancelled: usize,
    pub mean_total_patients: f64,
    pub mean_total_deaths: f64,
    pub mean_avg_wait_time: f64,
    pub mean_bottleneck_episodes: f64,
}

impl AggregateMetrics {
    pub fn from_replications(replications: &[ReplicationStatus]) -> Self {
        let summaries: Vec<&RunSummary> = replications.iter().filter_map(|r| r.summary()).collect();
        let failed = replications
            .iter()
            .filter(|r| matches!(r, ReplicationStatus::Failed { .. }))
            .count();
        let cancelled = replications
            .iter()
            .filter(|r| matches!(r, ReplicationStatus::Cancelled { .. }))
            .count();

        let mean = |value: fn(&RunSummary) -> f64| {
            if summaries.is_empty() {
                0.0
            } else {
                summaries.iter().map(|s| value(s)).sum::<f64>() / summaries.len() as f64
            }
        };

        Self {
            runs: replications.len(),
            completed: summaries.len(),
            failed,
            cancelled,
            mean_total_patients: mean(|s| s.total_patients as f64),
            mean_total_deaths: mean(|s| s.total_deaths as f64),
            mean_avg_wait_time: mean(|s| s.avg_wait_time),
            mean_bottleneck_episodes: mean(|s| s.bottleneck_episodes as f64),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MonteCarloReport {
    pub config: ScenarioConfig,
    pub base_seed: u64,
    /// One entry per replication, ordered by run index.
    pub replications: Vec<ReplicationStatus>,
    pub aggregate: AggregateMetrics,
}

impl MonteCarloReport {
    pub fn new(config: ScenarioConfig, base_seed: u64, mut replications: Vec<ReplicationStatus>) -> Self {
        replications.sort_by_key(ReplicationStatus::run_index);
        let aggregate = AggregateMetrics::from_replications(&replications);
        Self {
            config,
            base_seed,
            replications,
            aggregate,
        }
    }

    pub fn summaries(&self) -> impl Iterator<Item = &RunSummary> {
        self.replications.iter().filter_map(ReplicationStatus::summary)
    }

    pub fn was_cancelled(&self) -> bool {
        self.aggregate.cancelled > 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn episode(node: FacilityNode, start: f64, end: f64) -> BottleneckEpisode {
        BottleneckEpisode {
            node,
            start,
            end,
            duration: end - start,
        }
    }

    fn summary(run_index: usize, patients: u64, deaths: usize, wait: f64) -> RunSummary {
        RunSummary {
            run_index,
            seed: run_index as u64,
            scenario: Scenario::Daytime,
            policies: Vec::new(),
            total_patients: patients,
            total_deaths: deaths,
            avg_wait_time: wait,
            bottleneck_episodes: 1,
            top_bottlenecks: Vec::new(),
            duration_ms: 3,
        }
    }

    #[test]
    fn red_time_is_summed_per_node_and_ranked() {
        use FacilityNode::{EdQueue, Icu, TriageQueue, Ward};
        let episodes = vec![
            episode(EdQueue, 5.0, 15.0),
            episode(TriageQueue, 10.0, 40.0),
            episode(EdQueue, 20.0, 45.0),
            episode(Ward, 50.0, 50.0),
            episode(Icu, 60.0, 65.0),
        ];
        let top = longest_red_nodes(&episodes, 2);
        assert_eq!(
            top,
            vec![
                NodeRedDuration {
                    node: EdQueue,
                    minutes: 35.0
                },
                NodeRedDuration {
                    node: TriageQueue,
                    minutes: 30.0
                },
            ]
        );
        // zero-length episodes contribute no red time
        assert!(longest_red_nodes(&episodes, 10)
            .iter()
            .all(|total| total.node != Ward));
    }

    #[test]
    fn aggregate_excludes_failures_and_cancellations() {
        let replications = vec![
            ReplicationStatus::Completed(summary(0, 100, 2, 10.0)),
            ReplicationStatus::Failed {
                run_index: 1,
                seed: 1,
                message: "boom".to_string(),
            },
            ReplicationStatus::Completed(summary(2, 300, 4, 30.0)),
            ReplicationStatus::Cancelled { run_index: 3, seed: 3 },
        ];
        let aggregate = AggregateMetrics::from_replications(&replications);
        assert_eq!(aggregate.runs, 4);
        assert_eq!(aggregate.completed, 2);
        assert_eq!(aggregate.failed, 1);
        assert_eq!(aggregate.cancelled, 1);
        assert_eq!(aggregate.mean_total_patients, 200.0);
        assert_eq!(aggregate.mean_total_deaths, 3.0);
        assert_eq!(aggregate.mean_avg_wait_time, 20.0);
        assert_eq!(aggregate.mean_bottleneck_episodes, 1.0);
    }

    #[test]
    fn empty_aggregate_is_zero() {
        let aggregate = AggregateMetrics::from_replications(&[]);
        assert_eq!(aggregate, AggregateMetrics::default());
    }

    #[test]
    fn report_orders_replications_by_index() {
        let report = MonteCarloReport::new(
            ScenarioConfig::default(),
            9,
            vec![
                ReplicationStatus::Completed(summary(2, 1, 0, 0.0)),
                ReplicationStatus::Completed(summary(0, 1, 0, 0.0)),
                ReplicationStatus::Cancelled { run_index: 1, seed: 10 },
            ],
        );
        let order: Vec<usize> = report.replications.iter().map(|r| r.run_index()).collect();
        assert_eq!(order, vec![0, 1, 2]);
        assert_eq!(report.summaries().count(), 2);
        assert!(report.was_cancelled());
    }
}
