use std::sync::atomic::AtomicBool;

use bevy_ecs::prelude::World;

use mci_core::clock::Event;
use mci_core::distributions::{GeneratorKind, LCG_MODULUS};
use mci_core::ecs::{FacilityNode, Patient};
use mci_core::error::{ConfigError, SimError};
use mci_core::resources::{ResourceLedger, ResourcePool};
use mci_core::runner::SimulationRun;
use mci_core::scenario::Scenario;
use mci_core::telemetry::{CongestionColor, NodeStats};
use mci_core::test_helpers::{reference_config, run_to_completion, short_config};

#[test]
fn same_seed_and_config_reproduce_the_run() {
    let config = short_config();
    let a = run_to_completion(&config, 17);
    let b = run_to_completion(&config, 17);
    assert_eq!(a.snapshots, b.snapshots);
    assert_eq!(a.deaths, b.deaths);
    assert_eq!(a.patients, b.patients);

    let c = run_to_completion(&config, 18);
    assert_ne!(a.patients, c.patients);
}

#[test]
fn splitmix_generator_is_deterministic_too() {
    let config = short_config().with_generator(GeneratorKind::Splitmix64);
    let a = run_to_completion(&config, 5);
    let b = run_to_completion(&config, 5);
    assert_eq!(a.snapshots, b.snapshots);
    assert_eq!(a.deaths, b.deaths);
}

#[test]
fn executed_events_never_go_back_in_time() {
    let run = SimulationRun::new(&short_config(), 23).expect("init");
    let mut last = f64::NEG_INFINITY;
    let mut mismatches = 0;
    let output = run
        .run_with_hook(None, |world: &World, event: &Event| {
            assert!(event.timestamp >= last, "time went backwards");
            last = event.timestamp;

            let in_flow = world
                .iter_entities()
                .filter_map(|e| e.get::<Patient>())
                .filter(|p| !p.is_terminal())
                .count();
            if world.resource::<NodeStats>().total_occupancy() != in_flow {
                mismatches += 1;
            }
        })
        .expect("run");
    assert!(output.events_processed > 0);
    assert_eq!(mismatches, 0);
}

#[test]
fn every_patient_is_accounted_for() {
    for stop_at_horizon in [false, true] {
        let config = short_config().with_stop_at_horizon(stop_at_horizon);
        let output = run_to_completion(&config, 31);
        let last = output.snapshots.last().expect("snapshots");
        let total = output.patients.len();
        assert_eq!(
            total,
            output.discharged() + output.deaths.len() + output.in_flow()
        );
        // no arrivals after the horizon tick
        assert_eq!(last.total_patients as usize, total);
        assert!(last.total_deaths <= output.deaths.len());
        if stop_at_horizon {
            assert!(output.final_time <= config.horizon_minutes());
        } else {
            assert_eq!(output.in_flow(), 0);
        }
    }
}

#[test]
fn deaths_match_the_log_and_node_counters() {
    let config = short_config().with_mortality_rate(0.2);
    let output = run_to_completion(&config, 8);
    assert!(!output.deaths.is_empty());
    let dead = output.patients.iter().filter(|p| p.is_dead()).count();
    assert_eq!(dead, output.deaths.len());

    let last = output.snapshots.last().expect("snapshots");
    let node_deaths: usize = last.nodes.iter().map(|n| n.deaths).sum();
    assert!(node_deaths <= output.deaths.len());
    assert!(output.deaths.iter().all(|d| d.reason == "Overload"));
}

#[test]
fn utilization_is_never_negative_and_capacity_is_floored() {
    let mut run = SimulationRun::new(&short_config(), 2).expect("init");
    run.world_mut()
        .resource_mut::<ResourceLedger>()
        .set_capacity(ResourcePool::Triage, 0);
    let output = run.run().expect("run");

    for snapshot in &output.snapshots {
        assert_eq!(snapshot.nodes.len(), FacilityNode::COUNT);
        for metrics in &snapshot.nodes {
            assert!(metrics.utilization >= 0.0);
            assert!(metrics.utilization.is_finite());
        }
        let triage = snapshot.node(FacilityNode::TriageQueue).expect("triage");
        assert_eq!(triage.utilization, triage.queue_length as f64);
    }
}

#[test]
fn nighttime_staff_arrive_and_show_up_in_snapshots() {
    let config = short_config()
        .with_scenario(Scenario::Nighttime)
        .with_horizon_hours(4.0);
    let output = run_to_completion(&config, 4);
    let first = output.snapshots.first().expect("first");
    assert!(first.active_staff.is_empty());
    let last = output.snapshots.last().expect("last");
    let on_duty: usize = last.active_staff.values().sum();
    assert!(on_duty > 0, "some staff should have arrived within four hours");
    assert!(on_duty <= 16);
}

#[test]
fn invalid_config_is_rejected_before_scheduling() {
    let config = short_config().with_multipliers(1.0, -2.0, 1.0);
    let err = SimulationRun::new(&config, 1).err();
    assert_eq!(
        err,
        Some(SimError::Config(ConfigError::NonPositiveMultiplier {
            name: "k2",
            value: -2.0
        }))
    );
}

#[test]
fn cancellation_is_observed_between_events() {
    let run = SimulationRun::new(&short_config(), 1).expect("init");
    let cancel = AtomicBool::new(true);
    assert_eq!(run.run_with_cancel(&cancel).err(), Some(SimError::Cancelled));
}

#[test]
fn reference_scenario_matches_expected_shape() {
    let output = run_to_completion(&reference_config(), 1);

    let first = output.snapshots.first().expect("first snapshot");
    assert_eq!(first.time, 0.0);
    assert_eq!(first.total_patients, 0);
    // 72 h every 5 minutes, both ends included
    assert_eq!(output.snapshots.len(), 865);

    let unreachable = [
        FacilityNode::OrQueue,
        FacilityNode::Icu,
        FacilityNode::Obs,
        FacilityNode::ElevatorQueue,
    ];
    for patient in &output.patients {
        assert!(
            patient.path.iter().all(|node| !unreachable.contains(node)),
            "{} visited an unreachable node",
            patient.id
        );
        assert_eq!(patient.path[0], FacilityNode::Arrival);
    }
    for snapshot in &output.snapshots {
        for node in unreachable {
            let metrics = snapshot.node(node).expect("tracked node");
            assert_eq!(metrics.queue_length, 0);
            assert_eq!(metrics.color, CongestionColor::Green);
        }
    }
    assert!(output.patients.len() > 10_000);
    assert_eq!(output.in_flow(), 0);
    // a full reference horizon cycles the default LCG several times
    assert!(output.random_draws > LCG_MODULUS);
}

#[test]
fn bottleneck_episodes_line_up_with_red_snapshots() {
    let output = run_to_completion(&reference_config(), 1);
    let color_at = |node: FacilityNode, time: f64| {
        output
            .snapshots
            .iter()
            .find(|s| s.time == time)
            .and_then(|s| s.node(node))
            .map(|m| m.color)
    };
    let last_time = output.snapshots.last().expect("last").time;

    for episode in &output.bottlenecks {
        assert!(episode.start <= episode.end);
        assert_eq!(episode.duration, episode.end - episode.start);
        assert_eq!(color_at(episode.node, episode.start), Some(CongestionColor::Red));
        if episode.end < last_time {
            assert_ne!(color_at(episode.node, episode.end), Some(CongestionColor::Red));
        }
    }
    assert!(output
        .bottlenecks
        .windows(2)
        .all(|w| w[0].start <= w[1].start));

    let red_starts = FacilityNode::ALL
        .iter()
        .map(|&node| {
            output
                .snapshots
                .windows(2)
                .filter(|w| {
                    let red = |i: usize| {
                        w[i].node(node).map(|m| m.color) == Some(CongestionColor::Red)
                    };
                    !red(0) && red(1)
                })
                .count()
        })
        .sum::<usize>();
    // the t = 0 snapshot is empty, so every episode begins after a non-red one
    assert_eq!(output.bottlenecks.len(), red_starts);
}
