//! Command-line front end for the local-first todo list.
//!
//! ```bash
//! todo add "Buy milk" --priority high
//! todo list
//! todo toggle 3f2a
//! todo --online sync
//! ```

use std::path::PathBuf;
use std::sync::Arc;

use chrono::{DateTime, NaiveDate, Utc};
use clap::{Parser, Subcommand};
use tracing::warn;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use uuid::Uuid;

use todo_client::config::ClientConfig;
use todo_client::remote::{Connectivity, HttpTodoApi, NoopTodoApi, RemoteTodoApi, StaticConnectivity};
use todo_client::store::JsonFileStore;
use todo_client::{
    ClientError, LocalTodoService, Mode, Priority, SyncOutcome, SyncReport, TodoCoordinator,
    TodoRecord,
};

#[derive(Parser)]
#[command(name = "todo")]
#[command(about = "Local-first todo list with optional server sync")]
struct Cli {
    /// Route commands through the server instead of the local store
    #[arg(long, global = true)]
    online: bool,

    /// Path of the local JSON store (overrides TODO_STORE_PATH)
    #[arg(long, global = true)]
    store: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// List todos
    List,

    /// Add a todo
    Add {
        title: String,
        #[arg(short, long, default_value = "medium")]
        priority: Priority,
        /// Due date as YYYY-MM-DD or RFC 3339
        #[arg(short, long)]
        due: Option<String>,
    },

    /// Flip a todo between open and done
    Toggle {
        /// Todo id or a unique prefix of it
        id: String,
    },

    /// Delete a todo
    Rm {
        /// Todo id or a unique prefix of it
        id: String,
    },

    /// Delete every completed todo
    ClearCompleted,

    /// Run a sync pass against the server
    Sync,

    /// Replace local todos with the server's
    Pull,

    /// Push every local todo to the server
    Push,

    /// Show mode and pending changes
    Status,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    let mut config = ClientConfig::from_env()?;
    if let Some(store) = cli.store.clone() {
        config.store_path = store;
    }

    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG")
                .unwrap_or_else(|_| format!("todo_client={}", config.log_level)),
        ))
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let store = Arc::new(JsonFileStore::new(config.store_path.clone()));
    let local = Arc::new(LocalTodoService::new(store));

    let (remote, connectivity): (Arc<dyn RemoteTodoApi>, Arc<dyn Connectivity>) =
        match &config.api_token {
            Some(token) => {
                let api = Arc::new(HttpTodoApi::new(&config.api_url, Some(token.clone()))?);
                let remote: Arc<dyn RemoteTodoApi> = api.clone();
                let connectivity: Arc<dyn Connectivity> = api;
                (remote, connectivity)
            }
            None => {
                warn!("TODO_API_TOKEN is not set; server commands are unavailable");
                let remote: Arc<dyn RemoteTodoApi> = Arc::new(NoopTodoApi);
                let connectivity: Arc<dyn Connectivity> = Arc::new(StaticConnectivity::new(false));
                (remote, connectivity)
            }
        };

    let coordinator = TodoCoordinator::new(local, remote, connectivity, config.conflict_policy);

    let needs_server = cli.online
        || matches!(cli.command, Commands::Sync | Commands::Pull | Commands::Push);
    if needs_server {
        if let Some(report) = coordinator.go_online().await? {
            print_report(&report);
            if matches!(cli.command, Commands::Sync) {
                return Ok(());
            }
        }
    }

    match cli.command {
        Commands::List => {
            let todos = coordinator.list().await?;
            if todos.is_empty() {
                println!("No todos.");
            }
            let now = Utc::now();
            for todo in &todos {
                print_todo(todo, now);
            }
        }
        Commands::Add {
            title,
            priority,
            due,
        } => {
            let due_date = due.as_deref().map(parse_due).transpose()?;
            let todo = coordinator.create(&title, priority, due_date).await?;
            println!("Added {}", short_id(todo.id));
        }
        Commands::Toggle { id } => {
            let id = resolve_id(&coordinator, &id).await?;
            let todo = coordinator.toggle(id).await?;
            let state = if todo.is_completed { "done" } else { "open" };
            println!("{} is now {}", short_id(todo.id), state);
        }
        Commands::Rm { id } => {
            let id = resolve_id(&coordinator, &id).await?;
            coordinator.delete(id).await?;
            println!("Deleted {}", short_id(id));
        }
        Commands::ClearCompleted => {
            let cleared = coordinator.clear_completed().await?;
            println!("Cleared {} completed todos", cleared);
        }
        Commands::Sync => print_report(&coordinator.sync_now().await?),
        Commands::Pull => print_report(&coordinator.full_download().await?),
        Commands::Push => print_report(&coordinator.full_upload().await?),
        Commands::Status => {
            let mode = match coordinator.mode() {
                Mode::Offline => "offline",
                Mode::Online => "online",
            };
            println!("mode: {}", mode);
            println!("pending changes: {}", coordinator.pending_count().await?);
            println!("store: {}", config.store_path.display());
            println!("policy: {}", config.conflict_policy);
        }
    }

    Ok(())
}

fn print_todo(todo: &TodoRecord, now: DateTime<Utc>) {
    let check = if todo.is_completed { "x" } else { " " };
    let sync = if todo.is_synced { "" } else { " *" };
    let due = match todo.due_date {
        Some(due) if todo.is_overdue(now) => format!(" (overdue {})", due.format("%Y-%m-%d")),
        Some(due) => format!(" (due {})", due.format("%Y-%m-%d")),
        None => String::new(),
    };
    println!(
        "[{}] {} {:<6} {}{}{}",
        check,
        short_id(todo.id),
        todo.priority,
        todo.title,
        due,
        sync
    );
}

fn print_report(report: &SyncReport) {
    match &report.outcome {
        SyncOutcome::NoChanges => println!("Already up to date."),
        SyncOutcome::Success => println!(
            "Uploaded {}, downloaded {}, resolved {} conflicts",
            report.local_changes_uploaded,
            report.server_changes_downloaded,
            report.conflicts_resolved
        ),
        SyncOutcome::Failed(message) => println!(
            "Sync failed after uploading {}: {}",
            report.local_changes_uploaded, message
        ),
    }
    for conflict in &report.unresolved_conflicts {
        println!(
            "Unresolved: {} local={:?} server={:?}",
            short_id(conflict.local.id),
            conflict.local.title,
            conflict.remote.title
        );
    }
}

fn short_id(id: Uuid) -> String {
    id.simple().to_string()[..8].to_string()
}

async fn resolve_id(coordinator: &TodoCoordinator, input: &str) -> Result<Uuid, ClientError> {
    if let Ok(id) = Uuid::parse_str(input) {
        return Ok(id);
    }
    let prefix = input.replace('-', "").to_ascii_lowercase();
    let matches: Vec<Uuid> = coordinator
        .list()
        .await?
        .into_iter()
        .map(|t| t.id)
        .filter(|id| id.simple().to_string().starts_with(&prefix))
        .collect();
    match matches.as_slice() {
        [id] => Ok(*id),
        [] => Err(ClientError::InvalidInput(format!("no todo matches '{}'", input))),
        _ => Err(ClientError::InvalidInput(format!("'{}' matches more than one todo", input))),
    }
}

fn parse_due(input: &str) -> Result<DateTime<Utc>, ClientError> {
    if let Ok(date) = DateTime::parse_from_rfc3339(input) {
        return Ok(date.with_timezone(&Utc));
    }
    NaiveDate::parse_from_str(input, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(23, 59, 59))
        .map(|dt| dt.and_utc())
        .ok_or_else(|| ClientError::InvalidInput(format!("invalid due date '{}'", input)))
}
