use chrono::NaiveDate;
use clap::{Parser, Subcommand};
use std::net::SocketAddr;

#[derive(Parser, Debug)]
#[command(name = "logvault")]
#[command(about = "Log retention, archival and live streaming", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Run the HTTP server and the background jobs
    Serve(ServeArgs),
    /// Run one retention pass now
    Cleanup(CleanupArgs),
    /// Inspect archived logs
    #[command(subcommand)]
    Archives(ArchiveCommands),
}

#[derive(clap::Args, Debug)]
pub struct ServeArgs {
    /// Address to bind the HTTP server to (defaults to server.bind_addr)
    #[arg(long)]
    pub address: Option<SocketAddr>,
}

#[derive(clap::Args, Debug)]
pub struct CleanupArgs {
    /// Only report how many entries are past the retention window
    #[arg(long)]
    pub dry_run: bool,
}

#[derive(Subcommand, Debug)]
pub enum ArchiveCommands {
    /// List every archive
    List,
    /// Archives dated within an inclusive range
    Search {
        #[arg(long)]
        start: NaiveDate,
        #[arg(long)]
        end: NaiveDate,
    },
    /// Print the entries stored in one archive
    Restore { filename: String },
    /// Archive count, size and age
    Metrics,
}
