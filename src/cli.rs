//! CLI surface: one subcommand per subsystem (§1.1 ambient config note).

use clap::{Parser, Subcommand};

#[derive(Parser, Debug)]
#[command(name = "diet-ingest", about = "Legislative-data ingestion and serving platform")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Fetch index/detail pages for one or both chambers.
    Fetch {
        #[arg(long, value_enum)]
        chamber: Option<ChamberArg>,
    },
    /// Run the merge + validate + track pipeline over fetched records.
    Ingest,
    /// Serve the HTTP API.
    Serve,
    /// Run the five-phase migration orchestrator once.
    Migrate,
    /// Print task queue statistics.
    Queue,
}

#[derive(clap::ValueEnum, Clone, Debug)]
pub enum ChamberArg {
    A,
    B,
}
