mod error;
mod input;

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use chatflow_workflow::{EngineConfig, Simulator, Workflow, WorkflowSession};

use crate::error::SimulateError;

#[derive(Parser)]
#[command(name = "chatflow-simulate", version, about = "Replay a message through a workflow")]
struct Cli {
    /// Path to the workflow document
    workflow: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run one inbound message from the trigger and print the trace
    Run {
        /// Message text, or a JSON object with contact/message/sender
        message: String,
        /// JSON file of scripted step outputs, keyed by step ID or name
        #[arg(short, long)]
        script: Option<PathBuf>,
    },
    /// Print validation errors and warnings
    Validate,
}

#[tokio::main]
async fn main() -> chatflow_core::Result<(), SimulateError> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let config = EngineConfig::from_env().map_err(|e| SimulateError::Config {
        details: e.to_string(),
    })?;
    let workflow = Workflow::load(&cli.workflow).map_err(|e| SimulateError::Workflow {
        details: e.to_string(),
    })?;
    info!(workflow_id = %workflow.id, steps = workflow.steps().len(), "loaded workflow");

    match cli.command {
        Commands::Validate => {
            let report = workflow.validate();
            for issue in &report.issues {
                if issue.is_error() {
                    println!("error: {issue}");
                } else {
                    println!("warning: {issue}");
                }
            }
            if report.is_runnable() {
                println!("runnable");
            }
        }
        Commands::Run { message, script } => {
            let report = workflow.validate();
            for issue in report.warnings() {
                warn!(%issue, "workflow warning");
            }

            let executor = input::load_script(script.as_deref())?;
            let simulator = Simulator::new(config.simulation.clone());
            let mut session = WorkflowSession::with_config(workflow, &config);

            let trace = simulator
                .run(&mut session, &executor, input::parse_inbound(&message))
                .await
                .map_err(|e| SimulateError::Run {
                    details: e.to_string(),
                })?;

            let json = serde_json::to_string_pretty(&trace).map_err(|e| SimulateError::Run {
                details: e.to_string(),
            })?;
            println!("{json}");
        }
    }
    Ok(())
}
