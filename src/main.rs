// SPDX-License-Identifier: GPL-3.0-only

use camera_session::format_picker::FormatConstraint;
use clap::{Parser, Subcommand};
use std::path::PathBuf;

mod cli;

#[derive(Parser)]
#[command(name = "camera-session")]
#[command(about = "Declarative camera configuration on top of stateful camera sessions")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// List the formats offered by the simulated cameras
    List,

    /// Pick the best capture format under prioritized constraints
    Select {
        /// JSON array of formats, inline or as a file path
        #[arg(short, long)]
        formats: String,

        /// Constraint, most important first (aspect=16:9, resolution=1920x1080,
        /// fps=60, stabilization=cinematic|any)
        #[arg(short, long = "constraint")]
        constraints: Vec<FormatConstraint>,
    },

    /// Run a scripted session against the simulated camera
    Simulate {
        /// Session config file (default: ~/.config/camera-session/session.json)
        #[arg(short, long)]
        config: Option<PathBuf>,
    },
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize logging
    // Set RUST_LOG environment variable to control log level
    // Examples: RUST_LOG=debug, RUST_LOG=camera_session=debug, RUST_LOG=info
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
        )
        .with_target(true)
        .with_level(true)
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::List => cli::list_formats(),
        Commands::Select {
            formats,
            constraints,
        } => cli::select_format(&formats, constraints),
        Commands::Simulate { config } => cli::simulate(config),
    }
}
