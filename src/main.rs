//! rune-compose - Docker Compose specification resolver
//!
//! This is the CLI entry point. It loads a compose project and prints the
//! resolved specification or the service startup order.

use anyhow::Context;
use clap::{Parser, Subcommand, ValueEnum};
use rune_compose::compose::{ComposeProject, ProcessEnv, ProjectOptions};
use std::path::PathBuf;
use std::process::ExitCode;
use tracing_subscriber::EnvFilter;

/// rune-compose - resolve Docker Compose files
#[derive(Parser)]
#[command(name = "rune-compose")]
#[command(author = "Evoker Industries")]
#[command(version)]
#[command(about = "Resolve Docker Compose files into a normalized model and startup order", long_about = None)]
struct Cli {
    /// Enable debug logging
    #[arg(short, long, global = true)]
    debug: bool,

    /// Compose files, merged in order
    #[arg(short, long, global = true)]
    file: Vec<PathBuf>,

    /// Project name
    #[arg(short, long, global = true)]
    project_name: Option<String>,

    /// Alternate working directory
    #[arg(long, global = true)]
    project_directory: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Validate and print the resolved compose specification
    Config {
        /// Only validate, don't print anything
        #[arg(short, long)]
        quiet: bool,
        /// Print service names only
        #[arg(long)]
        services: bool,
        /// Output format
        #[arg(long, value_enum, default_value_t = OutputFormat::Yaml)]
        format: OutputFormat,
    },

    /// Print services in startup order
    Order {
        /// Print shutdown order instead
        #[arg(short, long)]
        reverse: bool,
    },
}

#[derive(Clone, Copy, ValueEnum)]
enum OutputFormat {
    Yaml,
    Json,
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    // Initialize logging
    let default_level = if cli.debug { "debug" } else { "info" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    match run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {:#}", e);
            ExitCode::FAILURE
        }
    }
}

fn run(cli: Cli) -> anyhow::Result<()> {
    let options = ProjectOptions {
        files: cli.file,
        project_dir: cli.project_directory,
        project_name: cli.project_name,
    };

    let project = ComposeProject::load(&options, &ProcessEnv)
        .context("Failed to load compose project")?;

    match cli.command {
        Commands::Config {
            quiet,
            services,
            format,
        } => {
            for warning in project.spec.warnings() {
                tracing::warn!("{}", warning);
            }

            if quiet {
                return Ok(());
            }

            if services {
                for name in project.spec.services.keys() {
                    println!("{}", name);
                }
                return Ok(());
            }

            let rendered = match format {
                OutputFormat::Yaml => project.spec.to_yaml(),
                OutputFormat::Json => project.spec.to_json(),
            }
            .context("Failed to render compose specification")?;
            print!("{}", rendered);
            if !rendered.ends_with('\n') {
                println!();
            }
        }

        Commands::Order { reverse } => {
            let order = if reverse {
                project.shutdown_order()
            } else {
                project.startup_order
            };
            for name in order {
                println!("{}", name);
            }
        }
    }

    Ok(())
}
