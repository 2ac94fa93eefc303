//! Command-line front end for semantic book search.
//!
//! # Usage
//!
//! ```bash
//! semsearch add --title Dune --description "A desert planet, spice, prophecy."
//! semsearch search "space opera" --limit 5
//! ```
//!
//! Results are printed to stdout as JSON; logs go to stderr.

pub mod cli;
pub mod commands;
pub mod settings;

pub use cli::{Cli, Commands};
pub use commands::{build_service, execute, init_logging, run};
pub use settings::Settings;
