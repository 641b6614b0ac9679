//! tasklog: inspect task lifecycle logs, or run a small demo that writes some.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use serde_json::{Map, Value, json};

use tasklog_core::app::{Actor, StubBroker, TaskLogsMiddleware};
use tasklog_core::config::{BackendConfig, TaskLogsConfig, load_config};
use tasklog_core::domain::{JobId, LogRecord, LogType, TaskId};
use tasklog_core::observability::LogCounts;
use tasklog_core::ports::{LogBackend, LogReader};

#[derive(Parser)]
#[command(name = "tasklog")]
#[command(about = "Read and write task lifecycle logs", long_about = None)]
#[command(version)]
struct Cli {
    /// YAML config file
    #[arg(long, env = "TASK_LOGS_CONFIG")]
    config: Option<PathBuf>,

    /// Use a flat-file backend at this path
    #[arg(long, conflicts_with = "elasticsearch_url")]
    file: Option<PathBuf>,

    /// Use an Elasticsearch backend at this URL
    #[arg(long)]
    elasticsearch_url: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Every record, newest first
    All,

    /// Records of one type (enqueued, dequeued, completed, exception, failed)
    Type { log_type: LogType },

    /// Every record of one job
    Job { job_id: String },

    /// Free-text search
    Search { query: String },

    /// Distinct task names
    Tasks,

    /// Record counts per type
    Stats,

    /// Run a few jobs through a stub broker and print what was logged
    Demo,
}

impl Cli {
    fn resolve_config(&self) -> Result<TaskLogsConfig> {
        let config = match &self.config {
            Some(path) => load_config(path)
                .with_context(|| format!("loading config from {}", path.display()))?,
            None => TaskLogsConfig::default(),
        };
        let mut config = config.with_env_overrides();

        if let Some(path) = &self.file {
            config.backend = BackendConfig::File { path: path.clone() };
        }
        if let Some(url) = &self.elasticsearch_url {
            config.backend = BackendConfig::elasticsearch(url.clone());
        }
        Ok(config)
    }
}

fn print_records(records: &[LogRecord]) -> Result<()> {
    for record in records {
        println!("{}", serde_json::to_string(record)?);
    }
    Ok(())
}

async fn run_demo(config: &TaskLogsConfig, backend: Arc<dyn LogBackend>) -> Result<()> {
    let mut broker = StubBroker::new().with_max_retries(1);
    broker.add_middleware(Arc::new(
        TaskLogsMiddleware::new(Arc::clone(&backend)).with_nack_record(config.nack_record),
    ));

    broker.declare_actor(
        Actor::from_fn("greet", |args: &[Value], _: &Map<String, Value>| {
            let name = args.first().and_then(Value::as_str).unwrap_or("world");
            Ok(json!(format!("Hello, {name}!")))
        })
        .with_queue("demo")
        .with_task_path("demo.greet"),
    )?;
    broker.declare_actor(
        Actor::from_fn("explode", |_: &[Value], _: &Map<String, Value>| {
            Err("intentional failure".into())
        })
        .with_queue("demo")
        .with_task_path("demo.explode"),
    )?;
    broker.declare_actor(
        Actor::from_fn("silent", |_: &[Value], _: &Map<String, Value>| Ok(Value::Null))
            .with_queue("demo")
            .with_log(false),
    )?;

    let mut jobs: Vec<JobId> = Vec::new();
    for (actor, args) in [
        ("greet", vec![json!("tasklog")]),
        ("explode", vec![]),
        ("silent", vec![]),
    ] {
        let message = broker
            .send(&TaskId::new(actor), args, Map::new())
            .await?;
        tracing::info!(job_id = %message.message_id, actor, "sent");
        jobs.push(message.message_id);
    }
    broker.join().await?;

    for job_id in &jobs {
        print_records(&backend.find_job(job_id).await?)?;
    }
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();
    let config = cli.resolve_config()?;
    let backend = config
        .connect()
        .await
        .with_context(|| format!("connecting {} backend", config.backend.kind()))?;

    match cli.command {
        Commands::All => print_records(&backend.all().await?)?,
        Commands::Type { log_type } => {
            print_records(&backend.logs_by_type(Some(log_type)).await?)?
        }
        Commands::Job { job_id } => print_records(&backend.find_job(&JobId::new(job_id)).await?)?,
        Commands::Search { query } => print_records(&backend.search(&query).await?)?,
        Commands::Tasks => {
            for task in backend.list_tasks().await? {
                println!("{task}");
            }
        }
        Commands::Stats => {
            let counts = LogCounts::collect(backend.as_ref()).await?;
            println!("{}", serde_json::to_string_pretty(&counts)?);
        }
        Commands::Demo => run_demo(&config, backend).await?,
    }
    Ok(())
}
