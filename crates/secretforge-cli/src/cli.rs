use std::path::PathBuf;

use clap::{Parser, Subcommand, ValueEnum};

#[derive(Parser)]
#[command(name = "secretforge")]
#[command(about = "secretforge CLI: derive secrets from config maps and secrets")]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Configuration file (defaults to ./secretforge.toml when present)
    #[arg(short, long, global = true, env = "SECRETFORGE_CONFIG")]
    pub config: Option<PathBuf>,

    /// Output format for generated secrets
    #[arg(short, long, global = true)]
    pub format: Option<OutputFormat>,

    /// Log at debug level regardless of configuration
    #[arg(short, long, global = true)]
    pub verbose: bool,
}

#[derive(Clone, Copy, ValueEnum, Default)]
pub enum OutputFormat {
    #[default]
    Yaml,
    Json,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Render the secret a DerivedSecret manifest would produce
    Render(RenderArgs),
    /// Reconcile every DerivedSecret found in a set of manifests
    Reconcile(ReconcileArgs),
    /// Load and validate the configuration, then print it
    CheckConfig,
}

#[derive(clap::Args)]
pub struct RenderArgs {
    /// Manifest holding the DerivedSecret
    #[arg(short, long)]
    pub file: PathBuf,
    /// Manifests (files or directories) holding the referenced ConfigMaps and Secrets
    #[arg(short, long = "sources", num_args = 1..)]
    pub sources: Vec<PathBuf>,
}

#[derive(clap::Args)]
pub struct ReconcileArgs {
    /// Manifest files or directories with ConfigMaps, Secrets and DerivedSecrets
    #[arg(short = 'd', long = "manifests", num_args = 1.., required = true)]
    pub paths: Vec<PathBuf>,
    /// Only print the status table, not the resulting secrets
    #[arg(long)]
    pub status_only: bool,
}
