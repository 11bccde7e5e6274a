//! CLI command implementations for ohm-exporter.
//!
//! This module provides implementations for all CLI subcommands:
//! - `check`: Configuration validation and a one-shot source check
//! - `config`: Configuration file generation
//! - `test`: Fetch and classify without serving
//! - `sensors`: Classification table listing
//! - `generate`: Synthetic sensor tree generation

pub mod check;
pub mod config;
pub mod generate;
pub mod sensors;

// Re-export command functions
pub use check::command_check;
pub use config::command_config;
pub use generate::command_generate_testdata;
pub use sensors::command_sensors;
pub use test::command_test;
