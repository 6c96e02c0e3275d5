//! question-forge - command line entry point.
//!
//! Creates tasks and drives them through the editorial stages. Every command
//! prints JSON on stdout; logs go to stderr.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use clap::{Parser, Subcommand};
use question_forge::{
    config::{Config, Provider},
    llm,
    materials::DirectorySource,
    store::{self, TaskStoreType},
    Stage, TaskId, WorkflowEngine,
};
use serde::Serialize;
use tracing::{info, warn};

#[derive(Parser, Debug)]
#[command(
    name = "question-forge",
    version,
    about = "Draft and review multiple-choice questions with a generative text service."
)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Create a task and run every stage.
    Run(InputArgs),
    /// Create a task without running any stage.
    Create(InputArgs),
    /// Run one stage of an existing task.
    Advance {
        task_id: TaskId,
        /// content, rt, de or validator
        stage: Stage,
    },
    /// Show the state of a task.
    Status { task_id: TaskId },
    /// Show where a completed task's outputs were saved.
    Results { task_id: TaskId },
}

#[derive(clap::Args, Debug)]
struct InputArgs {
    /// File with one learning objective per line
    #[arg(long)]
    objectives: PathBuf,
    /// File with the theory text the questions are based on
    #[arg(long)]
    theory: PathBuf,
}

impl InputArgs {
    async fn read(&self) -> anyhow::Result<(String, String)> {
        let objectives = tokio::fs::read_to_string(&self.objectives)
            .await
            .with_context(|| format!("reading {}", self.objectives.display()))?;
        let theory = tokio::fs::read_to_string(&self.theory)
            .await
            .with_context(|| format!("reading {}", self.theory.display()))?;
        Ok((objectives, theory))
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "question_forge=info".into()),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let config = Config::from_env()?;
    info!(
        provider = ?config.provider,
        store = ?config.task_store,
        fallback = config.standin_fallback,
        "Loaded configuration"
    );

    let engine = build_engine(&config).await?;

    match cli.command {
        Command::Run(args) => {
            let (objectives, theory) = args.read().await?;
            let id = engine.create_task(&objectives, &theory).await?;
            let stages = engine.run_pipeline(id).await?;
            print_json(&serde_json::json!({
                "task_id": id,
                "stages": stages,
                "results": engine.results(id).await?,
            }))
        }
        Command::Create(args) => {
            if config.task_store == TaskStoreType::Memory {
                warn!("TASK_STORE=memory: the task will not outlive this process");
            }
            let (objectives, theory) = args.read().await?;
            let id = engine.create_task(&objectives, &theory).await?;
            print_json(&serde_json::json!({ "task_id": id }))
        }
        Command::Advance { task_id, stage } => {
            let outcome = engine.advance(task_id, stage).await;
            print_json(&outcome)?;
            if !outcome.success {
                std::process::exit(1);
            }
            Ok(())
        }
        Command::Status { task_id } => print_json(&engine.status(task_id).await?),
        Command::Results { task_id } => print_json(&engine.results(task_id).await?),
    }
}

async fn build_engine(config: &Config) -> anyhow::Result<WorkflowEngine> {
    if matches!(config.provider, Provider::DeepSeek | Provider::OpenRouter)
        && config.api_key.is_none()
    {
        warn!("LLM_API_KEY is not set; requests will be rejected by the provider");
    }

    let service = llm::create_service(config);
    let store = store::create_task_store(
        config.task_store,
        config.data_dir.clone(),
        config.output_dir.clone(),
    )
    .await
    .map_err(anyhow::Error::msg)?;
    let source = DirectorySource::new(config.templates_dir.clone(), config.data_dir.clone());

    Ok(
        WorkflowEngine::new(service, Arc::from(store), Arc::new(source))
            .with_budgets(config.budgets),
    )
}

fn print_json<T: Serialize>(value: &T) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}
