//! CLI command implementations

pub mod download;
pub mod error;

pub use download::{Cli, ContractArgs};
pub use error::CliError;
