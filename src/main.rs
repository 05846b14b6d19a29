//! Article Builder CLI
//!
//! Runs the queue worker and exposes the producer side of the task queue
//! (enqueue, status, list, prune). `assemble` runs the article assembler
//! offline on a file.

use anyhow::{Context, Result};
use article_builder::db::{create_pool_from_env, PgArticleStore};
use article_builder::worker::{setup_signal_handler, TaskProcessor, TaskRunner, WorkerConfig};
use article_builder::{
    assemble, build_orchestrator, connect_queue, AppConfig, PipelineError, SanitizeMode,
    TaskRecord,
};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::info;
use tracing_subscriber::{EnvFilter, FmtSubscriber};

#[derive(Parser)]
#[command(name = "article-builder")]
#[command(about = "Generate SEO articles from queued keywords")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Run as worker, draining the article queue
    Worker {
        /// Process one task and exit (for testing)
        #[arg(long)]
        once: bool,

        /// Task timeout in seconds (default: 300)
        #[arg(short, long, default_value = "300")]
        timeout: u64,
    },

    /// Enqueue one generation task per keyword
    Enqueue {
        /// Keyword IDs
        #[arg(short, long, required = true, num_args = 1.., value_delimiter = ',')]
        keyword: Vec<i64>,

        /// Category IDs to link the articles to
        #[arg(short, long, value_delimiter = ',')]
        category: Vec<i64>,

        /// Owner user ID
        #[arg(short, long)]
        user: Option<i64>,

        /// Explicit task ID (single keyword only)
        #[arg(long)]
        id: Option<String>,
    },

    /// Show the latest status of a task
    Status {
        /// Task ID
        id: String,
    },

    /// List a user's tasks, oldest first
    List {
        /// Owner user ID
        #[arg(short, long)]
        user: i64,
    },

    /// Remove expired task IDs from the task set
    Prune,

    /// Assemble an article from a raw Markdown file and print it as JSON
    Assemble {
        /// File holding raw generated text
        #[arg(short, long)]
        file: PathBuf,

        /// Storage filter: unicode or latin1
        #[arg(short, long, default_value = "unicode")]
        sanitize: String,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Load .env file if present
    dotenvy::dotenv().ok();

    // Initialize logging, RUST_LOG wins over --verbose
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(if cli.verbose { "debug" } else { "info" }));
    let subscriber = FmtSubscriber::builder().with_env_filter(filter).finish();
    tracing::subscriber::set_global_default(subscriber)?;

    match cli.command {
        Commands::Worker { once, timeout } => {
            info!("Initializing worker...");
            let config = AppConfig::from_env()?;

            let queue = Arc::new(connect_queue(&config.queue).await?);
            let pool = create_pool_from_env().await?;
            info!("Database connection established");

            let worker_config = WorkerConfig::from_app(&config)
                .task_timeout(Duration::from_secs(timeout))
                .build();

            let orchestrator = build_orchestrator(&config.ai)?;
            let processor = TaskProcessor::new(
                Arc::new(PgArticleStore::new(pool)),
                orchestrator,
                worker_config.clone(),
            );
            let runner = TaskRunner::new(queue.clone(), worker_config, processor);

            // Setup graceful shutdown
            let cancel = CancellationToken::new();
            setup_signal_handler(cancel.clone());

            if once {
                info!("Pending tasks: {}", queue.pending_count().await?);
                match runner.run_once(cancel).await? {
                    Some(task) => {
                        println!("Task {} finished: {}", task.id, task.status);
                        if let Some(error) = &task.error {
                            println!("  Error: {}", error);
                        }
                    }
                    None => println!("Cancelled before a task arrived"),
                }
            } else {
                runner.run(cancel).await?;
            }
        }

        Commands::Enqueue {
            keyword,
            category,
            user,
            id,
        } => {
            let config = AppConfig::from_env()?;
            let queue = connect_queue(&config.queue).await?;

            if let Some(id) = id {
                if keyword.len() != 1 {
                    anyhow::bail!("--id needs exactly one --keyword");
                }
                let mut task = TaskRecord::with_id(id, keyword[0], category, user);
                queue.enqueue(&mut task).await?;
                println!("{}", task.id);
            } else {
                let mut failures = 0;
                for (keyword_id, result) in keyword
                    .iter()
                    .zip(queue.batch_enqueue(&keyword, &category, user).await)
                {
                    match result {
                        Ok(task_id) => println!("{}", task_id),
                        Err(e) => {
                            failures += 1;
                            eprintln!("Keyword {}: {}", keyword_id, e);
                        }
                    }
                }
                if failures > 0 {
                    anyhow::bail!("{} of {} enqueues failed", failures, keyword.len());
                }
            }
        }

        Commands::Status { id } => {
            let config = AppConfig::from_env()?;
            let queue = connect_queue(&config.queue).await?;

            match queue.get_status(&id).await {
                Ok(task) => println!("{}", serde_json::to_string_pretty(&task)?),
                Err(e @ (PipelineError::NotFound(_) | PipelineError::Expired(_))) => {
                    eprintln!("{}", e);
                    std::process::exit(1);
                }
                Err(e) => return Err(e.into()),
            }
        }

        Commands::List { user } => {
            let config = AppConfig::from_env()?;
            let queue = connect_queue(&config.queue).await?;

            let tasks = queue.list_for_owner(user).await?;
            println!("{}", serde_json::to_string_pretty(&tasks)?);
        }

        Commands::Prune => {
            let config = AppConfig::from_env()?;
            let queue = connect_queue(&config.queue).await?;

            let removed = queue.prune_expired().await?;
            println!("Pruned {} expired task ids", removed);
            println!("Pending tasks: {}", queue.pending_count().await?);
        }

        Commands::Assemble { file, sanitize } => {
            let mode: SanitizeMode = sanitize.parse().map_err(anyhow::Error::msg)?;
            let raw = std::fs::read(&file)
                .with_context(|| format!("Failed to read {}", file.display()))?;

            let article = assemble(&raw, mode, chrono::Utc::now());
            println!("{}", serde_json::to_string_pretty(&article)?);
        }
    }

    Ok(())
}
