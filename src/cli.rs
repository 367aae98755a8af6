use std::net::SocketAddr;
use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

#[derive(Debug, Parser)]
#[command(author, version, about)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Run the catalog web server.
    Serve(ServeArgs),
    /// Manage catalog records from the command line.
    Admin {
        #[command(subcommand)]
        command: AdminCommand,
    },
}

#[derive(Debug, Args)]
pub struct ServeArgs {
    #[arg(long, default_value = "127.0.0.1:8080")]
    pub addr: SocketAddr,

    /// SQLite database file (created on first run).
    #[arg(long, default_value = "book-tracker.db")]
    pub db: PathBuf,

    /// Directory of cover blobs, served under /media.
    #[arg(long, default_value = "media")]
    pub media_dir: PathBuf,
}

#[derive(Debug, Subcommand)]
pub enum AdminCommand {
    /// List records of a managed resource.
    List(AdminListArgs),
    /// Show the managed resources and their columns.
    Resources,
    Category {
        #[command(subcommand)]
        command: CategoryCommand,
    },
}

#[derive(Debug, Args)]
pub struct AdminListArgs {
    #[arg(long, default_value = "book-tracker.db")]
    pub db: PathBuf,

    /// One of the resources shown by `admin resources`.
    pub resource: String,

    /// Emit records as JSON instead of a table.
    #[arg(long)]
    pub json: bool,
}

#[derive(Debug, Subcommand)]
pub enum CategoryCommand {
    /// Create a category. Categories have no user-facing flow; this is
    /// the only way one enters the catalog.
    Add(CategoryAddArgs),
}

#[derive(Debug, Args)]
pub struct CategoryAddArgs {
    #[arg(long, default_value = "book-tracker.db")]
    pub db: PathBuf,

    pub name: String,
}
