mod config;
mod sim_agent;

use clap::{Parser, Subcommand};
use config::MaestroConfig;
use maestro_orchestrator::{default_phases, Orchestrator, Phase, Task};
use sim_agent::SimulatedAgent;
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "maestro", about = "Maestro — multi-agent workflow orchestrator")]
struct Cli {
    /// Path to config file
    #[arg(short, long, default_value = "maestro.toml")]
    config: PathBuf,

    /// Emit logs as JSON lines
    #[arg(long)]
    log_json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run one workflow against the configured agents and print the result
    Run {
        /// Top-level task description
        description: String,
        /// Task id (generated when omitted)
        #[arg(long)]
        id: Option<String>,
        /// Task type, used to pick a decomposition pipeline
        #[arg(long = "type", default_value = "FEATURE")]
        task_type: String,
        /// Lower runs first
        #[arg(long, default_value_t = 0)]
        priority: i32,
        /// Pretty-print the JSON result
        #[arg(long)]
        pretty: bool,
    },
    /// Show decomposition pipelines
    Pipelines,
    /// List configured agents
    Agents,
}

fn init_tracing(json: bool) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr);
    if json {
        builder.json().init();
    } else {
        builder.init();
    }
}

fn print_phases(phases: &[Phase]) {
    for phase in phases {
        if phase.depends_on.is_empty() {
            println!("    {:<16} {}", phase.suffix, phase.task_type);
        } else {
            println!(
                "    {:<16} {:<12} after {}",
                phase.suffix,
                phase.task_type,
                phase.depends_on.join(", ")
            );
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<ExitCode> {
    let cli = Cli::parse();
    init_tracing(cli.log_json);

    let config: MaestroConfig = config::load_config(&cli.config).await?;

    match cli.command {
        Commands::Run {
            description,
            id,
            task_type,
            priority,
            pretty,
        } => {
            let orchestrator = Orchestrator::from_config(config.orchestrator)?;
            for agent in &config.agents {
                orchestrator.register_agent(Arc::new(SimulatedAgent::from_config(agent)));
            }

            let id = id.unwrap_or_else(|| format!("task-{}", uuid::Uuid::new_v4().simple()));
            let task = Task::new(id, task_type, description).with_priority(priority);
            info!(task_id = %task.id, agents = config.agents.len(), "Running workflow");

            let result = orchestrator.execute_workflow(task).await;
            let output = if pretty {
                serde_json::to_string_pretty(&result)?
            } else {
                serde_json::to_string(&result)?
            };
            println!("{output}");

            if result.is_success() {
                Ok(ExitCode::SUCCESS)
            } else {
                Ok(ExitCode::FAILURE)
            }
        }
        Commands::Pipelines => {
            for pipeline in &config.orchestrator.pipelines {
                println!("{}:", pipeline.task_type);
                print_phases(&pipeline.phases);
            }
            println!("default (all other types):");
            print_phases(&default_phases());
            Ok(ExitCode::SUCCESS)
        }
        Commands::Agents => {
            if config.agents.is_empty() {
                println!("No agents configured.");
                println!("Declare agents in maestro.toml under [[agents]]");
            } else {
                println!("Configured agents:");
                for agent in &config.agents {
                    println!(
                        "  {} ({}) — {}",
                        agent.id,
                        agent.agent_type,
                        agent.capabilities.join(", ")
                    );
                }
                println!("\nTotal: {} agent(s)", config.agents.len());
            }
            Ok(ExitCode::SUCCESS)
        }
    }
}
