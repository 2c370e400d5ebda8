//! CLI command implementations for oss-pm-exporter.
//!
//! - `check`: configuration and environment validation
//! - `config`: configuration file generation
//! - `collect`: one PM cycle, samples printed
//! - `report`: aggregation report printed
//! - `generate`: synthetic PM dumps

pub mod check;
pub mod collect;
pub mod config;
pub mod generate;
pub mod report;

// Re-export command functions
pub use check::command_check;
pub use collect::command_collect;
pub use config::command_config;
pub use generate::command_generate_testdata;
pub use report::command_report;
