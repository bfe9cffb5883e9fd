use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use recollect::cli::{hook, list, related, search, show, stats, sync};
use recollect::config::Config;
use recollect::error::Result;

#[derive(Parser)]
#[command(name = "recollect")]
#[command(about = "Local search and recall over AI coding-assistant session logs")]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Config file path
    #[arg(short, long, default_value = "recollect.yaml")]
    config: String,
}

#[derive(Subcommand)]
enum Commands {
    /// Extract session logs into the store
    Sync {
        /// Explicit log files to sync (default: discover under the source root)
        paths: Vec<PathBuf>,

        /// Sync a single session by identifier
        #[arg(long, conflicts_with = "paths")]
        session: Option<String>,

        /// Re-extract even if a file looks unchanged
        #[arg(long)]
        force: bool,
    },

    /// Full-text search over stored messages
    Search {
        /// Query: bare terms, "quoted phrases", OR / AND / NOT, trailing-* prefix
        query: String,

        /// Filter by project name (substring match)
        #[arg(short, long)]
        project: Option<String>,

        /// Filter by role (user or assistant)
        #[arg(short, long)]
        role: Option<String>,

        /// Only messages at or after this time (RFC 3339 or YYYY-MM-DD)
        #[arg(long)]
        since: Option<String>,

        /// Only messages before this time
        #[arg(long)]
        before: Option<String>,

        /// Maximum number of hits
        #[arg(short, long)]
        limit: Option<usize>,
    },

    /// Sessions related to a session, topic, or project
    Related {
        /// Entity type: session, topic, project, or message
        source_type: String,

        /// Entity identifier
        source_id: String,
    },

    /// List stored sessions
    List {
        /// Filter by project name (substring match)
        #[arg(short, long)]
        project: Option<String>,
    },

    /// Show one session as a reconstructed thread
    Show {
        /// Session ID
        session: String,
    },

    /// Show store statistics
    Stats {
        /// Run a full integrity check first (slow on large stores)
        #[arg(long)]
        check: bool,
    },

    /// Host-tool lifecycle hook (never fails the caller)
    Hook {
        /// Session ID; read from a JSON stdin payload when omitted
        session_id: Option<String>,

        /// Spawn the sync detached and return immediately
        #[arg(long)]
        background: bool,
    },
}

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let config = Config::load(&cli.config).unwrap_or_default();

    match run(cli.command, &config) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("error: {err}");
            // Bad input gets a distinct exit code from internal failures so
            // scripts can tell them apart.
            if err.is_user_error() {
                ExitCode::from(2)
            } else {
                ExitCode::from(1)
            }
        }
    }
}

fn run(command: Commands, config: &Config) -> Result<()> {
    match command {
        Commands::Sync {
            paths,
            session,
            force,
        } => sync::run(config, paths, session, force),
        Commands::Search {
            query,
            project,
            role,
            since,
            before,
            limit,
        } => search::run(config, &query, project, role, since, before, limit),
        Commands::Related {
            source_type,
            source_id,
        } => related::run(config, &source_type, &source_id),
        Commands::List { project } => list::run(config, project),
        Commands::Show { session } => show::run(config, &session),
        Commands::Stats { check } => stats::run(config, check),
        Commands::Hook {
            session_id,
            background,
        } => hook::run(config, session_id, background),
    }
}
