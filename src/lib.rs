//! terrawalk - forget walks over saved plans and JSON state files
//!
//! The node protocol and walk driver live in `terrawalk-graph`; this crate
//! wires them to configuration, plan files and the CLI.

pub mod config;
pub mod planfile;
pub mod runner;

pub use config::{ProviderEntry, TerrawalkConfig, WalkConfig, DEFAULT_CONFIG_FILE};
pub use planfile::{PlanFile, PLAN_FORMAT_VERSION};
pub use runner::{build_forget_graph, run_forget, ForgetOptions, ForgetReport};
