//! JSON export of batch reports and single-run outputs.

use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

use mci_core::runner::RunOutput;
use serde::Serialize;

use crate::error::ExperimentError;
use crate::metrics::MonteCarloReport;

fn write_json<T: Serialize>(value: &T, path: &Path) -> Result<(), ExperimentError> {
    let mut writer = BufWriter::new(File::create(path)?);
    serde_json::to_writer_pretty(&mut writer, value)?;
    writer.flush()?;
    Ok(())
}

pub fn export_report_json(report: &MonteCarloReport, path: &Path) -> Result<(), ExperimentError> {
    write_json(report, path)
}

/// Writes snapshots, bottleneck episodes, death log and patient records of one run.
pub fn export_run_output_json(output: &RunOutput, path: &Path) -> Result<(), ExperimentError> {
    write_json(output, path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metrics::{NodeRedDuration, ReplicationStatus, RunSummary};
    use mci_core::ecs::FacilityNode;
    use mci_core::scenario::{Scenario, ScenarioConfig};

    #[test]
    fn report_round_trips_through_a_file() {
        let summary = RunSummary {
            run_index: 0,
            seed: 4,
            scenario: Scenario::Nighttime,
            policies: vec!["p2".to_string()],
            total_patients: 120,
            total_deaths: 3,
            avg_wait_time: 41.5,
            bottleneck_episodes: 2,
            top_bottlenecks: vec![NodeRedDuration {
                node: FacilityNode::EdQueue,
                minutes: 25.0,
            }],
            duration_ms: 15,
        };
        let report = MonteCarloReport::new(
            ScenarioConfig::default(),
            4,
            vec![ReplicationStatus::Completed(summary)],
        );

        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("report.json");
        export_report_json(&report, &path).expect("export");

        let text = std::fs::read_to_string(&path).expect("read");
        assert!(text.contains("\"baselineEDDaily\""));
        assert!(text.contains("\"status\": \"completed\""));
        let parsed: MonteCarloReport = serde_json::from_str(&text).expect("parse");
        assert_eq!(parsed, report);
    }

    #[test]
    fn missing_directory_is_an_io_error() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("nope").join("report.json");
        let report = MonteCarloReport::new(ScenarioConfig::default(), 1, Vec::new());
        assert!(matches!(
            export_report_json(&report, &path),
            Err(ExperimentError::Io(_))
        ));
    }
}
