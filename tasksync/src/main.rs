//! `tasksync`: offline-first task manager.
//!
//! Every command works offline: changes are saved locally and queued until
//! the backend is reachable again. Configuration via CLI flags, environment
//! variables, or config file (`~/.config/tasksync/config.toml`).
//!
//! ```bash
//! # Add and list tasks
//! tasksync add "Write report" --due 2026-11-01T09:00:00Z
//! tasksync list --search report --status not_started --sort due
//!
//! # Share tasks between devices through a synced directory
//! tasksync --remote-dir ~/Sync/tasks sync
//!
//! # Work offline, then replay queued changes
//! tasksync --offline toggle <ID>
//! tasksync pending
//! tasksync sync
//! ```

use std::path::Path;
use std::process::ExitCode;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use clap::{Parser, Subcommand};
use tracing_appender::non_blocking::WorkerGuard;

use tasksync::backend::file::FileBackend;
use tasksync::config::{CliArgs, ClientConfig};
use tasksync::connectivity::manual::ManualProbe;
use tasksync::connectivity::tcp::TcpProbe;
use tasksync::connectivity::{ConnectivityMonitor, ConnectivityProbe};
use tasksync::session::{SessionStore, SessionToken};
use tasksync::storage::StorageError;
use tasksync::storage::file::FileStore;
use tasksync::sync::SyncError;
use tasksync::tasks::{NewTask, SortKey, TaskError, TaskPatch, TaskQuery, TaskService};
use tasksync_model::task::{Task, TaskId, TaskStatus};
use tasksync_model::user::UserProfile;

#[derive(Parser, Debug)]
#[command(version, about = "Offline-first task manager")]
struct Cli {
    #[command(flatten)]
    args: CliArgs,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Create a task.
    Add {
        /// Task title.
        title: String,
        /// Longer description.
        #[arg(short, long, default_value = "")]
        description: String,
        /// Deadline (RFC 3339).
        #[arg(long)]
        due: Option<DateTime<Utc>>,
    },
    /// List tasks, optionally searched, filtered and sorted.
    List {
        /// Case-insensitive text searched in title and description.
        #[arg(short, long)]
        search: Option<String>,
        /// Only tasks with this status (`not_started`, `in_progress`, `completed`).
        #[arg(long)]
        status: Option<TaskStatus>,
        /// Sort order (`assigned`, `due`, `title`).
        #[arg(long, default_value = "assigned")]
        sort: SortKey,
    },
    /// Show one task in full.
    Show {
        /// Task identifier.
        id: TaskId,
    },
    /// Change fields of a task.
    Edit {
        /// Task identifier.
        id: TaskId,
        /// New title.
        #[arg(long)]
        title: Option<String>,
        /// New description.
        #[arg(short, long)]
        description: Option<String>,
        /// New deadline (RFC 3339).
        #[arg(long, conflicts_with = "clear_due")]
        due: Option<DateTime<Utc>>,
        /// Remove the deadline.
        #[arg(long)]
        clear_due: bool,
    },
    /// Flip a task between not started and completed.
    Toggle {
        /// Task identifier.
        id: TaskId,
    },
    /// Set the status of a task.
    Status {
        /// Task identifier.
        id: TaskId,
        /// New status.
        status: TaskStatus,
    },
    /// Delete a task.
    Delete {
        /// Task identifier.
        id: TaskId,
    },
    /// Replay queued changes and pull remote ones.
    Sync {
        /// Only replay queued changes; skip pulling.
        #[arg(long)]
        push_only: bool,
    },
    /// List changes waiting for the backend.
    Pending,
    /// Probe connectivity in the background and sync whenever it returns.
    Watch,
    /// Remember the signed-in user.
    Login {
        /// User identifier; owns the tasks created from now on.
        id: String,
        /// Email address.
        #[arg(long)]
        email: String,
        /// Display name.
        #[arg(long, default_value = "")]
        name: String,
        /// Session token for the backend.
        #[arg(long, env = "TASKSYNC_TOKEN", hide_env_values = true)]
        token: Option<String>,
    },
    /// Forget the signed-in user and token.
    Logout,
    /// Show the signed-in user.
    Whoami,
}

/// Errors surfaced to the terminal.
#[derive(Debug, thiserror::Error)]
enum CliError {
    #[error(transparent)]
    Task(#[from] TaskError),
    #[error(transparent)]
    Storage(#[from] StorageError),
    #[error("task not found: {0}")]
    NotFound(TaskId),
    #[error("watch interrupted: {0}")]
    Signal(std::io::Error),
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    let _log_guard = init_logging(&cli.args.log_level, cli.args.log_file.as_deref());

    // An explicitly named file must load; a broken default file only loses
    // its own values, flags and environment still apply.
    let config = match ClientConfig::load(&cli.args) {
        Ok(c) => c,
        Err(e) if cli.args.config.is_some() => {
            tracing::error!(error = %e, "config file unusable");
            eprintln!("error: {e}");
            return ExitCode::FAILURE;
        }
        Err(e) => {
            tracing::warn!(error = %e, "ignoring default config file");
            eprintln!("warning: ignoring config file: {e}");
            ClientConfig::from_cli(&cli.args)
        }
    };
    tracing::debug!(data_dir = %config.data_dir.display(), offline = config.offline, "tasksync starting");

    let result = if config.offline {
        run(cli.command, &config, ManualProbe::new(false)).await
    } else if let Some(addr) = config.probe_addr.clone() {
        run(cli.command, &config, TcpProbe::new(addr, config.probe_timeout)).await
    } else {
        run(cli.command, &config, ManualProbe::new(true)).await
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!(error = %e, "command failed");
            eprintln!("error: {e}");
            ExitCode::FAILURE
        }
    }
}

/// Initialize logging.
///
/// Logs go to `file_path` through a non-blocking writer when given, to
/// stderr otherwise. Returns a [`WorkerGuard`] that must be held until
/// shutdown to ensure all buffered log entries are flushed.
fn init_logging(level: &str, file_path: Option<&Path>) -> Option<WorkerGuard> {
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(level));

    let Some(log_path) = file_path else {
        tracing_subscriber::fmt()
            .with_writer(std::io::stderr)
            .with_env_filter(env_filter)
            .init();
        return None;
    };

    let log_dir = log_path.parent()?;
    let file_name = log_path.file_name()?.to_str()?;

    let file_appender = tracing_appender::rolling::never(log_dir, file_name);
    let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);

    tracing_subscriber::fmt()
        .with_writer(non_blocking)
        .with_env_filter(env_filter)
        .with_ansi(false)
        .init();

    Some(guard)
}

/// Open the stores, build the service and execute `command`.
async fn run<P: ConnectivityProbe + 'static>(
    command: Command,
    config: &ClientConfig,
    probe: P,
) -> Result<(), CliError> {
    let kv = Arc::new(FileStore::open(&config.data_dir).await?);
    let secure = Arc::new(FileStore::open_private(&config.secure_dir).await?);
    let session = SessionStore::new(Arc::clone(&kv), secure, config.format);

    match command {
        Command::Login {
            id,
            email,
            name,
            token,
        } => {
            let user = UserProfile {
                id,
                email,
                display_name: name,
            };
            session.save_user(&user).await?;
            if let Some(token) = token {
                session.save_token(&SessionToken::new(token)).await?;
            }
            println!("signed in as {}", user.label());
            return Ok(());
        }
        Command::Logout => {
            session.sign_out().await?;
            println!("signed out");
            return Ok(());
        }
        Command::Whoami => {
            match session.load_user().await? {
                Some(user) => println!("{} <{}> ({})", user.label(), user.email, user.id),
                None => println!("not signed in; acting as {}", config.default_user),
            }
            return Ok(());
        }
        _ => {}
    }

    let user_id = session
        .load_user()
        .await?
        .map_or_else(|| config.default_user.clone(), |u| u.id);

    // Without a shared directory the backend lives next to the local data,
    // so queued changes still have somewhere to go.
    let remote_root = config
        .remote_dir
        .clone()
        .unwrap_or_else(|| config.data_dir.join("remote"));
    if config.remote_dir.is_none() {
        tokio::fs::create_dir_all(&remote_root)
            .await
            .map_err(|e| StorageError::Unavailable(format!("{}: {e}", remote_root.display())))?;
    }
    let backend = Arc::new(FileBackend::new(remote_root));
    let monitor = Arc::new(ConnectivityMonitor::new(probe));
    let service = Arc::new(
        TaskService::open(kv, backend, Arc::clone(&monitor), config.service_settings(user_id)).await,
    );

    match command {
        Command::Add {
            title,
            description,
            due,
        } => {
            let task = service
                .create_task(NewTask {
                    title,
                    description,
                    due_date: due,
                })
                .await?;
            println!("{}", task.id);
        }
        Command::List {
            search,
            status,
            sort,
        } => {
            let query = TaskQuery {
                text: search,
                status,
                sort,
            };
            for task in service.filter_tasks(&query).await {
                println!("{}", summary_line(&task));
            }
        }
        Command::Show { id } => {
            let task = service.get_task(&id).await.ok_or(CliError::NotFound(id))?;
            print_task(&task);
        }
        Command::Edit {
            id,
            title,
            description,
            due,
            clear_due,
        } => {
            let patch = TaskPatch {
                title,
                description,
                status: None,
                due_date: if clear_due { Some(None) } else { due.map(Some) },
            };
            let task = service.update_task(&id, patch).await?;
            println!("{}", summary_line(&task));
        }
        Command::Toggle { id } => {
            let task = service.toggle_task_complete(&id).await?;
            println!("{}", summary_line(&task));
        }
        Command::Status { id, status } => {
            let task = service.change_status(&id, status).await?;
            println!("{}", summary_line(&task));
        }
        Command::Delete { id } => {
            service.delete_task(&id).await?;
            println!("deleted {id}");
        }
        Command::Sync { push_only } => {
            let result = if push_only {
                service.sync().await
            } else {
                service.refresh().await
            };
            match result {
                Ok(report) => println!(
                    "synced: {} applied, {} dropped, {} still queued",
                    report.applied, report.dropped, report.retained
                ),
                Err(TaskError::Sync(SyncError::NoConnection)) => {
                    let pending = service.pending_actions().await?.len();
                    println!("offline: {pending} change(s) queued");
                }
                Err(e) => return Err(e.into()),
            }
        }
        Command::Pending => {
            let actions = service.pending_actions().await?;
            if actions.is_empty() {
                println!("nothing queued");
            }
            for action in actions {
                println!(
                    "{}  {:<6}  {}  {}",
                    action.created_at.format("%Y-%m-%d %H:%M:%S"),
                    action.kind().to_string(),
                    action.task_id(),
                    action.id
                );
            }
        }
        Command::Watch => {
            let auto_sync = service.spawn_auto_sync();
            let poller = monitor.spawn_poller(config.poll_interval);
            println!("watching connectivity every {:?}; Ctrl-C to stop", config.poll_interval);
            let signal = tokio::signal::ctrl_c().await;
            poller.abort();
            auto_sync.abort();
            signal.map_err(CliError::Signal)?;
        }
        Command::Login { .. } | Command::Logout | Command::Whoami => {}
    }
    Ok(())
}

fn summary_line(task: &Task) -> String {
    let mark = if task.completed { "x" } else { " " };
    let due = task
        .due_date
        .map(|d| format!("  due {}", d.format("%Y-%m-%d")))
        .unwrap_or_default();
    format!(
        "[{mark}] {}  {:<11}  {}{due}",
        task.id,
        task.status.to_string(),
        task.title
    )
}

fn print_task(task: &Task) {
    println!("id:          {}", task.id);
    println!("title:       {}", task.title);
    if !task.description.is_empty() {
        println!("description: {}", task.description);
    }
    println!("status:      {}", task.status);
    println!("assigned:    {}", task.assigned_date.to_rfc3339());
    if let Some(due) = task.due_date {
        println!("due:         {}", due.to_rfc3339());
    }
    println!("updated:     {}", task.updated_at.to_rfc3339());
    println!("owner:       {}", task.user_id);
    println!("revision:    {}", task.revision);
}
