//! GeoCopilot Common - shared types, configuration and prompt logic.
//!
//! Nothing in this crate performs I/O beyond reading the config file.

pub mod config;
pub mod narrative;
pub mod prompts;
pub mod schemas;
pub mod types;

pub use config::*;
pub use narrative::*;
pub use prompts::*;
pub use schemas::*;
pub use types::*;
