use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use std::env;
use std::path::PathBuf;

use taproot::commands;
use taproot::TaskStore;

#[derive(Parser)]
#[command(name = "tap")]
#[command(about = "A hierarchical task tracker with pomodoro sessions")]
#[command(version)]
struct Cli {
    /// Acting user id (owner scope for every operation)
    #[arg(short, long, env = "TAPROOT_USER", default_value_t = 1, global = true)]
    user: i64,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Initialize taproot in the current directory
    Init,

    /// Create a new task
    Create {
        /// Task title
        title: String,
        /// Task description
        #[arg(short, long)]
        description: Option<String>,
        /// Priority (high, medium, low)
        #[arg(short, long)]
        priority: Option<String>,
        /// Parent task ID (omit for a root task)
        #[arg(long)]
        parent: Option<i64>,
        /// Color tag, e.g. #ff8800
        #[arg(long)]
        color: Option<String>,
        /// Estimated duration in seconds
        #[arg(short, long)]
        estimate: Option<i64>,
    },

    /// List tasks (roots, or children of --parent)
    List {
        /// Show children of this task instead of roots
        #[arg(long)]
        parent: Option<i64>,
        /// Filter by status (pending, in_progress, completed, blocked)
        #[arg(short, long)]
        status: Option<String>,
    },

    /// Show task details with its breadcrumb
    Show {
        /// Task ID
        id: i64,
    },

    /// Update task attributes
    Update {
        /// Task ID
        id: i64,
        /// New title
        #[arg(short, long)]
        title: Option<String>,
        /// New description
        #[arg(short, long)]
        description: Option<String>,
        /// New priority (high, medium, low)
        #[arg(short, long)]
        priority: Option<String>,
        /// New status (pending, in_progress, completed, blocked)
        #[arg(short, long)]
        status: Option<String>,
        /// New color tag
        #[arg(long)]
        color: Option<String>,
        /// New estimated duration in seconds
        #[arg(short, long)]
        estimate: Option<i64>,
    },

    /// Move a task under a new parent (or to the root)
    Move {
        /// Task ID
        id: i64,
        /// New parent ID; omit to make the task a root
        #[arg(long)]
        parent: Option<i64>,
    },

    /// Soft-delete a task and its subtree
    Delete {
        /// Task ID
        id: i64,
        /// Skip confirmation
        #[arg(short, long)]
        force: bool,
    },

    /// Restore a soft-deleted task and its cascade
    Restore {
        /// Task ID
        id: i64,
    },

    /// Print the subtree below a task
    Tree {
        /// Task ID
        id: i64,
    },

    /// Print the ancestor chain of a task
    Crumbs {
        /// Task ID
        id: i64,
    },

    /// Show the mutation history of a task
    History {
        /// Task ID
        id: i64,
        /// Maximum entries to show
        #[arg(short, long, default_value_t = 20)]
        limit: i64,
        /// Entries to skip
        #[arg(short, long, default_value_t = 0)]
        offset: i64,
    },

    /// Pomodoro session management
    Session {
        #[command(subcommand)]
        action: SessionCommands,
    },
}

#[derive(Subcommand)]
enum SessionCommands {
    /// Start a new session
    Start {
        /// Planned duration in seconds
        #[arg(short, long, default_value_t = 1500)]
        duration: i64,
        /// Session type (work, short_break, long_break)
        #[arg(short, long, default_value = "work")]
        kind: String,
    },
    /// Complete a session
    Complete {
        /// Session ID
        id: i64,
        /// Actual duration in seconds (defaults to elapsed time)
        #[arg(short, long)]
        actual: Option<i64>,
        /// Why the session was interrupted, if it was
        #[arg(short, long)]
        reason: Option<String>,
    },
    /// List sessions
    List {
        /// Only completed (true) or only running (false)
        #[arg(short, long)]
        completed: Option<bool>,
        /// Filter by type (work, short_break, long_break)
        #[arg(short, long)]
        kind: Option<String>,
        /// Only sessions starting at or after this time (RFC 3339 or YYYY-MM-DD)
        #[arg(long)]
        after: Option<String>,
        /// Only sessions starting at or before this time (RFC 3339 or YYYY-MM-DD)
        #[arg(long)]
        before: Option<String>,
    },
    /// Attach a task to a session
    Attach {
        /// Session ID
        session: i64,
        /// Task ID
        task: i64,
        /// Seconds spent on the task during this session
        #[arg(long)]
        spent: Option<i64>,
        /// Free-form notes
        #[arg(short, long)]
        notes: Option<String>,
    },
    /// Detach a task from a session
    Detach {
        /// Session ID
        session: i64,
        /// Task ID
        task: i64,
    },
    /// Soft-delete a session and its task links
    Delete {
        /// Session ID
        id: i64,
    },
    /// Restore a soft-deleted session
    Restore {
        /// Session ID
        id: i64,
    },
}

fn find_taproot_dir() -> Result<PathBuf> {
    let mut current = env::current_dir()?;

    loop {
        let candidate = current.join(".taproot");
        if candidate.exists() && candidate.is_dir() {
            return Ok(candidate);
        }

        if !current.pop() {
            bail!("Not a taproot directory (or any parent). Run 'tap init' first.");
        }
    }
}

fn get_store() -> Result<TaskStore> {
    let taproot_dir = find_taproot_dir()?;
    let db_path = taproot_dir.join("tasks.db");
    TaskStore::open(&db_path).context("Failed to open task store")
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let user = cli.user;

    match cli.command {
        Commands::Init => {
            let cwd = env::current_dir()?;
            commands::init::run(&cwd)
        }

        Commands::Create {
            title,
            description,
            priority,
            parent,
            color,
            estimate,
        } => {
            let mut store = get_store()?;
            commands::create::run(
                &mut store,
                user,
                &title,
                description,
                priority.as_deref(),
                parent,
                color,
                estimate,
            )
        }

        Commands::List { parent, status } => {
            let store = get_store()?;
            commands::list::run(&store, user, parent, status.as_deref())
        }

        Commands::Show { id } => {
            let store = get_store()?;
            commands::show::run(&store, user, id)
        }

        Commands::Update {
            id,
            title,
            description,
            priority,
            status,
            color,
            estimate,
        } => {
            let mut store = get_store()?;
            commands::update::run(
                &mut store,
                user,
                id,
                title,
                description,
                priority.as_deref(),
                status.as_deref(),
                color,
                estimate,
            )
        }

        Commands::Move { id, parent } => {
            let mut store = get_store()?;
            commands::mv::run(&mut store, user, id, parent)
        }

        Commands::Delete { id, force } => {
            let mut store = get_store()?;
            commands::delete::run(&mut store, user, id, force)
        }

        Commands::Restore { id } => {
            let mut store = get_store()?;
            commands::delete::restore(&mut store, user, id)
        }

        Commands::Tree { id } => {
            let store = get_store()?;
            commands::tree::run(&store, user, id)
        }

        Commands::Crumbs { id } => {
            let store = get_store()?;
            commands::crumbs::run(&store, user, id)
        }

        Commands::History { id, limit, offset } => {
            let store = get_store()?;
            commands::history::run(&store, user, id, limit, offset)
        }

        Commands::Session { action } => {
            let mut store = get_store()?;
            match action {
                SessionCommands::Start { duration, kind } => {
                    commands::session::start(&mut store, user, duration, &kind)
                }
                SessionCommands::Complete { id, actual, reason } => {
                    commands::session::complete(&mut store, user, id, actual, reason)
                }
                SessionCommands::List { completed, kind, after, before } => {
                    commands::session::list(
                        &store,
                        user,
                        completed,
                        kind.as_deref(),
                        after.as_deref(),
                        before.as_deref(),
                    )
                }
                SessionCommands::Attach { session, task, spent, notes } => {
                    commands::session::attach(&mut store, user, session, task, spent, notes)
                }
                SessionCommands::Detach { session, task } => {
                    commands::session::detach(&mut store, user, session, task)
                }
                SessionCommands::Delete { id } => {
                    commands::session::delete(&mut store, user, id)
                }
                SessionCommands::Restore { id } => {
                    commands::session::restore(&mut store, user, id)
                }
            }
        }
    }
}
