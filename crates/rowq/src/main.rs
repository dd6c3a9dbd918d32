//! Command-line interface for rowq: manage the schema, queues and elements.
//!
//! ## What
//!
//! - Schema commands: install, verify, uninstall.
//! - Queue commands: create, list, inspect, purge, delete and clean up queues.
//! - Element commands: enqueue payloads, take one, complete or requeue it by id.
//!
//! ## How
//!
//! Configuration comes from `--dsn`, `--config`, `ROWQ_*` environment variables or a
//! `rowq.yaml` in the working directory. See `--help` for details.
//!
//! ### Example
//!
//! ```sh
//! rowq --dsn sqlite:///tmp/jobs.db admin install
//! rowq --dsn sqlite:///tmp/jobs.db queue create emails
//! rowq --dsn sqlite:///tmp/jobs.db element enqueue --queue emails --payload '{"to": "ops"}'
//! rowq --dsn sqlite:///tmp/jobs.db element take --queue emails
//! ```
use clap::{Parser, Subcommand};
use rowq::config::Config;
use rowq::store::Store;
use serde::Serialize;
use tabled::Tabled;
use tracing_subscriber::fmt::writer::BoxMakeWriter;

use std::fs::File;
use std::process;

mod output;

use crate::output::OutputWriter;

#[derive(Parser)]
#[command(name = "rowq")]
#[command(about = "A work queue on a shared relational table")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Database URL (highest priority, overrides all other config sources)
    #[arg(long, short = 'd')]
    dsn: Option<String>,

    /// Config file path (overrides environment variables and defaults)
    #[arg(long, short = 'c')]
    config: Option<String>,

    /// Log destination: stderr or file path
    #[arg(long, default_value = "stderr")]
    log_dest: String,

    /// Log level: error, warn, info, debug, trace
    #[arg(long, default_value = "info")]
    log_level: String,

    /// Output format: json, table
    #[arg(long, default_value = "table")]
    format: String,

    /// Output destination: stdout or file path
    #[arg(long, default_value = "stdout")]
    out: String,
}

#[derive(Subcommand)]
enum Commands {
    /// Schema Commands
    Admin {
        #[command(subcommand)]
        admin_command: AdminCommands,
    },
    /// Queue Commands
    Queue {
        #[command(subcommand)]
        queue_command: QueueCommands,
    },
    /// Element Commands
    Element {
        #[command(subcommand)]
        element_command: ElementCommands,
    },
}

#[derive(Subcommand)]
enum AdminCommands {
    /// Create the queue and element tables
    Install,
    /// Verify the tables exist and are consistent
    Verify,
    /// Drop both tables and everything in them
    Uninstall,
}

#[derive(Subcommand)]
enum QueueCommands {
    /// Create a new queue
    Create {
        /// Name of the queue
        name: String,
    },
    /// List all queues
    List,
    /// Get a queue by name
    Get {
        /// Name of the queue
        name: String,
    },
    /// Delete a queue and its elements
    Delete {
        /// Name of the queue to delete
        name: String,
    },
    /// Remove all elements from a queue
    Purge {
        /// Name of the queue to purge
        name: String,
    },
    /// Show queue metrics
    Metrics {
        /// Name of the queue (if not provided, shows all queues)
        name: Option<String>,
    },
    /// Count the elements of a queue
    Count {
        /// Name of the queue
        name: String,
    },
    /// Requeue elements locked for longer than the timeout
    Cleanup {
        /// Name of the queue
        name: String,
        /// Lock age in seconds after which an element is considered abandoned
        #[arg(long)]
        timeout: u64,
    },
}

#[derive(Subcommand)]
enum ElementCommands {
    /// Add an element to a queue
    Enqueue {
        /// Name of the queue
        #[arg(long, short = 'q')]
        queue: String,
        /// JSON payload
        #[arg(long, short = 'p')]
        payload: String,
    },
    /// Retrieve and lock the next available element
    Take {
        /// Name of the queue
        #[arg(long, short = 'q')]
        queue: String,
        /// Skip elements requeued more often than this
        #[arg(long)]
        max_requeue: Option<u32>,
    },
    /// Mark an element as done and remove it
    Success {
        /// Name of the queue
        #[arg(long, short = 'q')]
        queue: String,
        /// Element ID
        id: i64,
    },
    /// Release a locked element back to the queue
    Requeue {
        /// Name of the queue
        #[arg(long, short = 'q')]
        queue: String,
        /// Element ID
        id: i64,
    },
}

/// What the element commands print.
#[derive(Serialize, Tabled)]
struct ElementView {
    element_id: i64,
    requeue_count: i64,
    data: serde_json::Value,
}

impl From<&rowq::Element<'_>> for ElementView {
    fn from(element: &rowq::Element<'_>) -> Self {
        Self {
            element_id: element.id(),
            requeue_count: element.requeue_count(),
            data: element.data().clone(),
        }
    }
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    if let Err(e) = init_tracing(&cli.log_level, &cli.log_dest) {
        eprintln!("Failed to initialize logging: {}", e);
        process::exit(1);
    }

    if let Err(e) = run_cli(cli).await {
        tracing::error!("Error: {}", e);
        process::exit(1);
    }
}

fn init_tracing(log_level: &str, log_dest: &str) -> anyhow::Result<()> {
    let level = match log_level.to_lowercase().as_str() {
        "error" => tracing::Level::ERROR,
        "warn" => tracing::Level::WARN,
        "info" => tracing::Level::INFO,
        "debug" => tracing::Level::DEBUG,
        "trace" => tracing::Level::TRACE,
        other => {
            eprintln!("Unknown log level '{}', defaulting to INFO", other);
            tracing::Level::INFO
        }
    };

    let (writer, ansi) = if log_dest == "stderr" {
        (BoxMakeWriter::new(std::io::stderr), true)
    } else {
        let file = File::create(log_dest)
            .map_err(|e| anyhow::anyhow!("Failed to create log file '{}': {}", log_dest, e))?;
        (BoxMakeWriter::new(std::sync::Mutex::new(file)), false)
    };

    let subscriber = tracing_subscriber::fmt()
        .with_max_level(level)
        .with_writer(writer)
        .with_ansi(ansi)
        .finish();

    tracing::subscriber::set_global_default(subscriber)?;
    Ok(())
}

/// Load configuration, connect, and dispatch to the command handlers.
///
/// Configuration priority:
/// 1. --dsn CLI argument
/// 2. --config CLI argument
/// 3. ROWQ_CONFIG_FILE environment variable
/// 4. ROWQ_DSN and the other environment variables
/// 5. Default config files (rowq.yaml, rowq.yml)
async fn run_cli(cli: Cli) -> anyhow::Result<()> {
    let config = Config::load_with_options(cli.dsn, cli.config)
        .map_err(|e| anyhow::anyhow!("Failed to load configuration: {}", e))?;

    let store = rowq::connect_with_config(&config).await?;

    let writer = OutputWriter::from_format(&cli.format);
    let mut out_writer: Box<dyn std::io::Write> = match cli.out.as_str() {
        "stdout" => Box::new(std::io::stdout()),
        _ => Box::new(File::create(&cli.out)?),
    };
    let out: &mut dyn std::io::Write = out_writer.as_mut();

    match cli.command {
        Commands::Admin { admin_command } => handle_admin_commands(&store, admin_command).await?,
        Commands::Queue { queue_command } => {
            handle_queue_commands(&store, queue_command, writer, out).await?
        }
        Commands::Element { element_command } => {
            handle_element_commands(&store, element_command, writer, out).await?
        }
    }
    Ok(())
}

async fn handle_admin_commands(
    store: &(impl Store + Clone + 'static),
    command: AdminCommands,
) -> anyhow::Result<()> {
    match command {
        AdminCommands::Install => {
            tracing::info!("Installing rowq tables ...");
            rowq::admin(store).install().await?;
            tracing::info!("Installation completed successfully");
        }

        AdminCommands::Verify => {
            tracing::info!("Verifying rowq installation...");
            rowq::admin(store).verify().await?;
            tracing::info!("Verification completed successfully");
        }

        AdminCommands::Uninstall => {
            tracing::info!("Removing rowq tables ...");
            rowq::admin(store).uninstall().await?;
            tracing::info!("Uninstall completed successfully");
        }
    }
    Ok(())
}

async fn handle_queue_commands(
    store: &(impl Store + Clone + 'static),
    command: QueueCommands,
    writer: OutputWriter,
    out: &mut dyn std::io::Write,
) -> anyhow::Result<()> {
    match command {
        QueueCommands::Create { name } => {
            tracing::info!("Creating queue '{}' ...", &name);
            let queue = rowq::admin(store).create_queue(&name).await?;
            writer.write_item(&queue, out)?;
        }

        QueueCommands::List => {
            tracing::info!("Listing all queues...");
            let queues = rowq::admin(store).list_queues().await?;
            writer.write_list(&queues, out)?;
        }

        QueueCommands::Get { name } => {
            tracing::info!("Getting queue '{}'...", name);
            let queue = rowq::admin(store).get_queue(&name).await?;
            writer.write_item(&queue, out)?;
        }

        QueueCommands::Delete { name } => {
            tracing::info!("Deleting queue '{}'...", name);
            rowq::admin(store).delete_queue(&name).await?;
            tracing::info!("Queue '{}' deleted successfully", name);
        }

        QueueCommands::Purge { name } => {
            tracing::info!("Purging queue '{}'...", name);
            let purged = rowq::admin(store).purge_queue(&name).await?;
            writeln!(out, "Purged {} elements from queue '{}'", purged, name)?;
        }

        QueueCommands::Metrics { name } => {
            if let Some(queue_name) = name {
                tracing::info!("Getting metrics for queue '{}'...", queue_name);
                let metrics = rowq::admin(store).queue_metrics(&queue_name).await?;
                writer.write_item(&metrics, out)?;
            } else {
                tracing::info!("Getting metrics for all queues...");
                let metrics = rowq::admin(store).all_queue_metrics().await?;
                writer.write_list(&metrics, out)?;
            }
        }

        QueueCommands::Count { name } => {
            let queue = rowq::queue(&name).skip_cleanup().open(store).await?;
            writeln!(out, "{}", queue.count().await?)?;
        }

        QueueCommands::Cleanup { name, timeout } => {
            tracing::info!("Requeuing elements of '{}' locked longer than {}s...", name, timeout);
            let queue = rowq::queue(&name).skip_cleanup().open(store).await?;
            let requeued: Vec<ElementView> = queue
                .cleanup(timeout)
                .await?
                .iter()
                .map(ElementView::from)
                .collect();
            tracing::info!("Requeued {} elements", requeued.len());
            writer.write_list(&requeued, out)?;
        }
    }
    Ok(())
}

async fn handle_element_commands(
    store: &(impl Store + Clone + 'static),
    command: ElementCommands,
    writer: OutputWriter,
    out: &mut dyn std::io::Write,
) -> anyhow::Result<()> {
    match command {
        ElementCommands::Enqueue { queue, payload } => {
            let data: serde_json::Value = serde_json::from_str(&payload)
                .map_err(|e| anyhow::anyhow!("Payload is not valid JSON: {}", e))?;
            let queue = rowq::queue(&queue).open(store).await?;
            let element_id = queue.enqueue(&data).await?;
            tracing::info!("Enqueued element {} to '{}'", element_id, queue.name());
            writeln!(out, "{}", element_id)?;
        }

        ElementCommands::Take { queue, max_requeue } => {
            let builder = rowq::queue(&queue);
            let builder = match max_requeue {
                Some(limit) => builder.max_requeue_count(limit),
                None => builder,
            };
            let queue = builder.open(store).await?;

            // Keep scanning past elements other consumers lock first.
            while let Some(element) = queue.next().await? {
                if element.lock().await? {
                    tracing::info!("Locked element {}", element.id());
                    writer.write_item(&ElementView::from(&element), out)?;
                    return Ok(());
                }
            }
            tracing::info!("No element available in '{}'", queue.name());
        }

        ElementCommands::Success { queue, id } => {
            let queue = rowq::queue(&queue).skip_cleanup().open(store).await?;
            match queue.get_element_by_id(id).await? {
                Some(element) => {
                    let completion = element.complete().await?;
                    writeln!(out, "Element {}: {:?}", id, completion)?;
                }
                None => {
                    tracing::warn!("Element {} not found in '{}'", id, queue.name());
                    writeln!(out, "Element {} not found", id)?;
                }
            }
        }

        ElementCommands::Requeue { queue, id } => {
            let queue = rowq::queue(&queue).skip_cleanup().open(store).await?;
            match queue.get_element_by_id(id).await? {
                Some(mut element) => {
                    if element.requeue().await? {
                        writer.write_item(&ElementView::from(&element), out)?;
                    } else {
                        writeln!(out, "Element {} was not locked", id)?;
                    }
                }
                None => {
                    tracing::warn!("Element {} not found in '{}'", id, queue.name());
                    writeln!(out, "Element {} not found", id)?;
                }
            }
        }
    }
    Ok(())
}
