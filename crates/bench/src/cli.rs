use std::path::PathBuf;

use clap::{Parser, ValueEnum};
use palaver::config;

/// Which load shape to run.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, ValueEnum)]
pub enum Scenario {
    /// Mixed population: active users, a trickle of signups, lurkers,
    /// and a traffic spike partway through.
    #[default]
    Realistic,
    /// The full active-user flow at constant concurrency.
    Bench,
    /// Same flow as `bench` at a tenth of the concurrency, for smoke runs.
    BenchLight,
    /// One VU, signup and read-only probing. Useful as a health check.
    Simple,
}

#[derive(Parser, Debug)]
#[command(name = "palaver-bench")]
#[command(about = "Load generator for the Palaver chat API")]
#[command(version)]
pub struct Cli {
    /// Load shape to run
    #[arg(long, value_enum, default_value_t = Scenario::Realistic)]
    pub scenario: Scenario,

    /// Peak concurrent virtual users
    #[arg(long, default_value_t = 50)]
    pub vus: usize,

    /// Run duration in minutes
    #[arg(long, default_value_t = 5)]
    pub duration_mins: u64,

    /// REST gateway base URL
    #[arg(long, default_value = config::DEFAULT_API_URL)]
    pub api_url: String,

    /// WebSocket gateway URL
    #[arg(long, default_value = config::DEFAULT_WS_URL)]
    pub ws_url: String,

    /// Also write the JSON report to this path
    #[arg(long)]
    pub output: Option<PathBuf>,

    /// Increase verbosity (-v info, -vv debug)
    #[arg(short, long, action = clap::ArgAction::Count)]
    pub verbose: u8,
}

impl Cli {
    pub fn duration(&self) -> std::time::Duration {
        std::time::Duration::from_secs(self.duration_mins * 60)
    }
}
