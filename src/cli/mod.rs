//! Command-line interface for music-fetcher.
//!
//! This module provides CLI commands for downloading by id or URL and for
//! searching a module's catalog.

mod commands;

pub use commands::{Cli, Commands, parse_url, run_command};
