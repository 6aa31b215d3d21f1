//! JSON run report: options, metric summaries, and threshold outcomes.

use std::collections::BTreeMap;
use std::path::Path;

use chrono::Utc;
use clap::ValueEnum as _;
use serde::Serialize;

use crate::cli::Cli;
use crate::metrics::{MetricSummary, ThresholdResult};

#[derive(Debug, Serialize)]
pub struct Report {
    pub generated_at: String,
    pub options: Options,
    pub metrics: BTreeMap<String, MetricSummary>,
    pub thresholds: Vec<ThresholdResult>,
    pub passed: bool,
}

#[derive(Debug, Serialize)]
pub struct Options {
    pub scenario: String,
    pub vus: usize,
    pub duration_secs: u64,
    pub api_url: String,
    pub ws_url: String,
}

impl Report {
    pub fn new(
        cli: &Cli,
        metrics: BTreeMap<String, MetricSummary>,
        thresholds: Vec<ThresholdResult>,
    ) -> Self {
        let passed = thresholds.iter().all(|t| t.ok);
        Self {
            generated_at: Utc::now().to_rfc3339(),
            options: Options {
                scenario: cli
                    .scenario
                    .to_possible_value()
                    .map(|v| v.get_name().to_string())
                    .unwrap_or_default(),
                vus: cli.vus,
                duration_secs: cli.duration_mins * 60,
                api_url: cli.api_url.clone(),
                ws_url: cli.ws_url.clone(),
            },
            metrics,
            thresholds,
            passed,
        }
    }

    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self)
    }

    pub fn write(&self, path: &Path) -> anyhow::Result<()> {
        std::fs::write(path, self.to_json()?)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;

    fn sample_report() -> Report {
        let cli = Cli::parse_from(["palaver-bench", "--scenario", "simple", "--vus", "1"]);
        Report::new(&cli, BTreeMap::new(), Vec::new())
    }

    #[test]
    fn empty_threshold_set_passes() {
        let report = sample_report();
        assert!(report.passed);
        assert_eq!(report.options.scenario, "simple");
    }

    #[test]
    fn writes_parseable_json() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("report.json");
        sample_report().write(&path).unwrap();

        let text = std::fs::read_to_string(&path).unwrap();
        let value: serde_json::Value = serde_json::from_str(&text).unwrap();
        assert_eq!(value["options"]["vus"], 1);
        assert_eq!(value["passed"], true);
    }
}
