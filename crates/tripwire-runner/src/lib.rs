/// Scenario runner for tripwire
///
/// Loads scenario files, replays them against the in-memory host and
/// reports every activation. Also hosts the logging setup shared by the
/// binaries.
pub mod logging;
pub mod paths;
pub mod runner;
pub mod scenario;

pub use runner::{run_scenario, ActivationRecord, ScenarioReport, ScenarioRunner};
pub use scenario::{Scenario, ScenarioError, Step};
