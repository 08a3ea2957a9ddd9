//! FindME CLI
//!
//! Command-line interface for browsing and moderating submissions.

mod commands;

use clap::{Parser, Subcommand};
use findme_core::{Role, SubmissionStatus};
use tracing::Level;
use tracing_subscriber::FmtSubscriber;

/// findme - missing-persons platform client
#[derive(Parser, Debug)]
#[command(name = "findme")]
#[command(version, about, long_about = None)]
struct Cli {
    /// Daemon API address
    #[arg(long, default_value = "http://localhost:8000", global = true)]
    api: String,

    /// Bearer token for authenticated commands
    #[arg(long, env = "FINDME_TOKEN", global = true)]
    token: Option<String>,

    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// List public submissions
    List {
        /// Page number, starting at 1
        #[arg(long, default_value_t = 1)]
        page: usize,

        /// Submissions per page
        #[arg(long, default_value_t = 20)]
        limit: usize,

        /// List your own submissions instead (requires --token)
        #[arg(long)]
        mine: bool,
    },

    /// Show a submission
    Show {
        /// Submission ID
        id: i64,
    },

    /// Resolve an age-progressed photo
    Age {
        /// Submission ID
        id: i64,

        /// Years to simulate (defaults to the time since filing)
        #[arg(long)]
        years: Option<u32>,
    },

    /// Show the admin dashboard summary
    Summary,

    /// Change a submission's status (admin)
    Moderate {
        /// Submission ID
        id: i64,

        /// New status (pending, published, rejected, found_alive, found_dead)
        status: SubmissionStatus,
    },

    /// Delete a submission
    Delete {
        /// Submission ID
        id: i64,
    },

    /// List approved comments on a submission
    Comments {
        /// Submission ID
        submission_id: i64,
    },

    /// List user accounts (admin)
    Users {
        #[arg(long, default_value_t = 1)]
        page: usize,

        #[arg(long, default_value_t = 50)]
        limit: usize,
    },

    /// Assign a role to a user (admin)
    SetRole {
        /// User ID
        id: i64,

        /// Role name (user, admin)
        role: Role,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Initialize logging
    let log_level = if cli.verbose {
        Level::DEBUG
    } else {
        Level::WARN
    };

    let subscriber = FmtSubscriber::builder()
        .with_max_level(log_level)
        .with_target(false)
        .finish();
    let _ = tracing::subscriber::set_global_default(subscriber);

    let client = commands::ApiClient::new(&cli.api, cli.token);

    match cli.command {
        Commands::List { page, limit, mine } => {
            commands::list(&client, page, limit, mine).await?;
        }
        Commands::Show { id } => {
            commands::show(&client, id).await?;
        }
        Commands::Age { id, years } => {
            commands::age(&client, id, years).await?;
        }
        Commands::Summary => {
            commands::summary(&client).await?;
        }
        Commands::Moderate { id, status } => {
            commands::moderate(&client, id, status).await?;
        }
        Commands::Delete { id } => {
            commands::delete(&client, id).await?;
        }
        Commands::Comments { submission_id } => {
            commands::comments(&client, submission_id).await?;
        }
        Commands::Users { page, limit } => {
            commands::users(&client, page, limit).await?;
        }
        Commands::SetRole { id, role } => {
            commands::set_role(&client, id, role).await?;
        }
    }

    Ok(())
}
