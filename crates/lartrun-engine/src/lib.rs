#![doc = include_str!("../README.md")]

pub mod config;
pub mod explorer;
pub mod harness;
pub mod preprocess;
pub mod process;

pub use config::{Architecture, BenchmarkFlags, Config, ConfigError, PropertyFile};
pub use explorer::{
    DecisionPathExplorer, ExplorationSummary, ExplorerOptions, ExploreError, PathExecutor,
    ProcessExecutor,
};
pub use harness::{Harness, HarnessError, HarnessOptions, HarnessOutcome, WitnessMode};
pub use process::{ProcessError, ProcessRunner, RunHandle, RunSpec};
