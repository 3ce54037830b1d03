//! CLI module for enft

pub mod app;
pub mod commands;

pub use app::EnftApp;
pub use commands::{Cli, Commands};
