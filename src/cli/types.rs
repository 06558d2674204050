//! CLI type definitions
//!
//! This module contains the clap structure that defines the CLI interface.

use clap::{ArgAction, Parser};
use std::path::PathBuf;

use super::commands::rotate::RotateArgs;

#[derive(Parser, Debug)]
#[command(name = "iam-key-rotator")]
#[command(about = "Rotates AWS IAM access keys for the specified profile(s)", long_about = None)]
#[command(version)]
pub struct Cli {
    #[command(flatten)]
    pub rotate: RotateArgs,

    /// Configuration file (YAML)
    #[arg(short, long, value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// Output in JSON format
    #[arg(short, long)]
    pub json: bool,

    /// Increase log verbosity (-v debug, -vv trace)
    #[arg(short, long, action = ArgAction::Count)]
    pub verbose: u8,
}
