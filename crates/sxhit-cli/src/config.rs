//! Run configuration for the CLI.
//!
//! Values are merged with the precedence: command-line flag, then `-S key=value`,
//! then the TOML run file, then [`defaults::DefaultsConfig`].

pub mod builder;
pub mod defaults;
pub mod file;
pub mod models;

pub use builder::{build_run_config, build_scoring_config};
pub use models::AppConfig;
