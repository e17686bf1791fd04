use anyhow::{bail, Result};
use clap::{Parser, Subcommand};
use coordination::{BuildStatus, FailedDependencyPolicy};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::info;

use vforge::app::{list_models, run_design, Collaborators};
use vforge::config::{AppConfig, DEFAULT_CONFIG_PATH};
use vforge::gate::StdinGate;
use vforge::render::{ConsoleRenderer, RenderOptions};

/// Command-line arguments
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Path to the YAML configuration file
    #[arg(long, global = true, default_value = DEFAULT_CONFIG_PATH)]
    config: PathBuf,

    /// Log at debug level unless RUST_LOG says otherwise
    #[arg(short, long, global = true, default_value_t = false)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Generate, simulate and validate a Verilog module from a description
    Design {
        /// Description of the hardware module to build
        prompt: String,

        /// Ollama model to use (overrides config)
        #[arg(long)]
        model: Option<String>,

        /// Maximum self-correction attempts per module (overrides config)
        #[arg(long)]
        max_retries: Option<u32>,

        /// Build the requirement as a single module without planning
        #[arg(long, default_value_t = false)]
        no_plan: bool,

        /// Pause after each failed attempt for manual edits
        #[arg(short, long, default_value_t = false)]
        interactive: bool,

        /// continue_degraded or short_circuit (overrides config)
        #[arg(long)]
        on_failed_dependency: Option<FailedDependencyPolicy>,

        /// Do not show diffs between artifact versions
        #[arg(long, default_value_t = false)]
        no_diffs: bool,
    },

    /// Check that the Ollama server is reachable and list its models
    Check,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let default_level = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| default_level.into()),
        )
        .with_writer(std::io::stderr)
        .init();

    let mut config = AppConfig::load(&cli.config)?;

    match cli.command {
        Command::Check => {
            info!(url = %config.ollama_url, "Checking Ollama connection");
            let models = list_models(&config).await?;
            println!("Ollama is running at {}", config.ollama_url);
            println!("Available models:");
            for model in &models {
                println!("  {model}");
            }
            Ok(())
        }
        Command::Design {
            prompt,
            model,
            max_retries,
            no_plan,
            interactive,
            on_failed_dependency,
            no_diffs,
        } => {
            if let Some(model) = model {
                config.model = model;
            }
            if let Some(max_retries) = max_retries {
                config.max_retries = max_retries;
            }
            if let Some(policy) = on_failed_dependency {
                config.failed_dependency_policy = policy;
            }
            if no_plan {
                config.plan = false;
            }
            if no_diffs {
                config.show_diffs = false;
            }

            println!("Goal: {prompt}\nModel: {}", config.model);

            let renderer = ConsoleRenderer::stdout(RenderOptions {
                show_diffs: config.show_diffs,
                ..Default::default()
            });
            let mut collaborators = Collaborators::from_config(&config, Arc::new(renderer))?;
            if interactive {
                collaborators = collaborators.with_gate(Arc::new(StdinGate::stdin()));
            }

            let run = run_design(&config, &prompt, collaborators).await?;
            if let Some(path) = &run.saved_to {
                println!("Saved design to: {}", path.display());
            }
            let failed = run.report.failed_units();
            if !failed.is_empty() {
                println!("Unverified modules: {}", failed.join(", "));
            }

            if let Some((unit, reason)) = run.report.aborted() {
                bail!("Build aborted at module '{unit}': {reason}");
            }
            match run.report.status {
                BuildStatus::Verified => Ok(()),
                status => bail!("Build finished with status {status}"),
            }
        }
    }
}
