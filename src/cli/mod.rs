use clap::{Parser, Subcommand};
use std::path::PathBuf;

pub mod commands;

#[derive(Parser)]
#[command(name = "butterfly", version, about = "Application transformation engine")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,

    /// Enable verbose output
    #[arg(long, global = true)]
    pub verbose: bool,
}

#[derive(Subcommand)]
pub enum Command {
    /// Apply a registered transformation template to an application folder
    Transform(TransformArgs),
    /// List the registered transformation templates
    Templates,
}

#[derive(clap::Args)]
pub struct TransformArgs {
    /// Application folder to transform
    #[arg(value_name = "SOURCE")]
    pub source: PathBuf,

    /// Name of the registered template to apply
    #[arg(long, value_name = "NAME")]
    pub template: String,

    /// Folder the transformed copy is created under (default: system temp)
    #[arg(long, value_name = "DIR")]
    pub output: Option<PathBuf>,

    /// Compress the transformed folder into a sibling zip archive
    #[arg(long)]
    pub zip: bool,

    /// Transform the source folder in place instead of copying it
    #[arg(long)]
    pub in_place: bool,

    /// Write the JSON report to this file
    #[arg(long, value_name = "FILE")]
    pub report: Option<PathBuf>,

    /// Abort the whole transformation after this many seconds
    #[arg(long, value_name = "SECONDS")]
    pub timeout: Option<u64>,
}
