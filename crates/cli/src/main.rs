//! Storeforge CLI - Database migrations and domain management tools.
//!
//! # Usage
//!
//! ```bash
//! # Run database migrations
//! sf-cli migrate
//!
//! # Connect a hostname for owner 42
//! sf-cli domains add --owner 42 shop.example.com
//!
//! # Re-check every owner's pending domains
//! sf-cli domains refresh
//! ```
//!
//! # Commands
//!
//! - `migrate` - Run database migrations
//! - `domains` - Inspect and manage merchant domains

#![cfg_attr(not(test), forbid(unsafe_code))]

use clap::{Parser, Subcommand};

mod commands;

#[derive(Parser)]
#[command(name = "sf-cli")]
#[command(author, version, about = "Storeforge CLI tools")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run database migrations
    Migrate,
    /// Manage custom domains
    Domains {
        #[command(subcommand)]
        action: DomainAction,
    },
}

#[derive(Subcommand)]
enum DomainAction {
    /// List an owner's domains
    List {
        #[arg(short, long)]
        owner: i32,
    },
    /// Connect a hostname
    Add {
        #[arg(short, long)]
        owner: i32,

        /// Hostname as typed by the merchant (normalized before storing)
        hostname: String,
    },
    /// Re-check pending domains (every owner if `--owner` is omitted)
    Refresh {
        #[arg(short, long)]
        owner: Option<i32>,

        /// Also re-check domains whose last check failed
        #[arg(long)]
        include_errors: bool,
    },
    /// Re-check one domain and fail unless it is verified
    Verify {
        #[arg(short, long)]
        owner: i32,
        id: i32,
    },
    /// Re-fetch the DNS records a domain still needs
    Requirements {
        #[arg(short, long)]
        owner: i32,
        id: i32,
    },
    /// Make a verified domain the owner's primary
    SetPrimary {
        #[arg(short, long)]
        owner: i32,
        id: i32,
    },
    /// Delete a domain
    Delete {
        #[arg(short, long)]
        owner: i32,
        id: i32,
    },
    /// Publish a theme to a verified domain
    Publish {
        #[arg(short, long)]
        owner: i32,
        id: i32,

        #[arg(long)]
        theme_id: String,

        #[arg(long)]
        theme_name: String,
    },
    /// Stop serving a theme on a domain
    Unpublish {
        #[arg(short, long)]
        owner: i32,
        id: i32,
    },
    /// Show which theme a domain serves
    Status {
        #[arg(short, long)]
        owner: i32,
        id: i32,
    },
}

#[tokio::main]
async fn main() {
    // Logs go to stderr so JSON output stays pipeable
    tracing_subscriber::fmt().with_writer(std::io::stderr).init();

    let cli = Cli::parse();

    let result: Result<(), Box<dyn std::error::Error>> = run(cli).await;

    if let Err(e) = result {
        tracing::error!("Command failed: {e}");
        std::process::exit(1);
    }
}

async fn run(cli: Cli) -> Result<(), Box<dyn std::error::Error>> {
    match cli.command {
        Commands::Migrate => commands::migrate::run().await?,
        Commands::Domains { action } => match action {
            DomainAction::List { owner } => commands::domains::list(owner).await?,
            DomainAction::Add { owner, hostname } => {
                commands::domains::add(owner, &hostname).await?;
            }
            DomainAction::Refresh {
                owner,
                include_errors,
            } => commands::domains::refresh(owner, include_errors).await?,
            DomainAction::Verify { owner, id } => commands::domains::verify(owner, id).await?,
            DomainAction::Requirements { owner, id } => {
                commands::domains::requirements(owner, id).await?;
            }
            DomainAction::SetPrimary { owner, id } => {
                commands::domains::set_primary(owner, id).await?;
            }
            DomainAction::Delete { owner, id } => commands::domains::delete(owner, id).await?,
            DomainAction::Publish {
                owner,
                id,
                theme_id,
                theme_name,
            } => commands::domains::publish(owner, id, theme_id, theme_name).await?,
            DomainAction::Unpublish { owner, id } => {
                commands::domains::unpublish(owner, id).await?;
            }
            DomainAction::Status { owner, id } => commands::domains::status(owner, id).await?,
        },
    }
    Ok(())
}
