//! Drive Sweeper - a disk-space retention daemon
//!
//! This crate provides functionality for:
//! - Watching the free-space ratio of configured volumes
//! - Deleting or relocating aged entries when a volume runs low
//! - A timestamped, retried activity log of every decision

pub mod activity_log;
pub mod cli;
pub mod commands;
pub mod config;
pub mod error;
pub mod monitor;

// Re-export commonly used types
pub use config::Config;
pub use error::{Result, SweeperError};
