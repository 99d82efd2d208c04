//! Stepwise CLI - inspect, validate, plan and run store migrations.

pub mod commands;
pub mod config;

pub use commands::CliError;
pub use config::{Args, Command, MigrateArgs, MigrateConfig, StoreArgs, TargetArgs};
