//! `markbook` binary: imports submission archives into the book store

use clap::{Parser, Subcommand};

mod commands;

/// Exit status when the run finished but some student or copy failed
const EXIT_INCOMPLETE: i32 = 2;

#[derive(Debug, Parser)]
#[command(name = "markbook")]
#[command(about = "Import submission archives and reconcile them with stored books")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Import a submission archive into a task
    Import(commands::import::ImportArgs),
}

fn main() {
    let cli = Cli::parse();

    let result = match cli.command {
        Commands::Import(args) => commands::import::execute(args),
    };

    match result {
        Ok(true) => {}
        Ok(false) => std::process::exit(EXIT_INCOMPLETE),
        Err(err) => {
            eprintln!("Error [{}]: {err}", err.code());
            err.detail().into_iter().for_each(|d| eprintln!("  {d}"));
            std::process::exit(1);
        }
    }
}
