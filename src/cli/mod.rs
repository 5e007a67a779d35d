//! Command-line surface: three subcommands over one binary — `serve` runs
//! the crawler/search server, `index` and `search` are thin HTTP clients
//! against it.

pub mod commands;

use clap::{Parser, Subcommand};

#[derive(Parser, Debug)]
#[command(name = "brightwave", about = "A miniature web search engine")]
pub struct Cli {
    /// Verbose logging (equivalent to RUST_LOG=brightwave=info).
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Run the crawler workers and the HTTP+JSON interface.
    Serve(commands::ServeArgs),
    /// Seed a crawl against a running `serve` process.
    Index(commands::IndexArgs),
    /// Query a running `serve` process.
    Search(commands::SearchArgs),
}

/// Cheap pre-parse check for `-v`/`--verbose`, used to pick the default log
/// filter before `tracing_subscriber` (and therefore before full `clap`
/// parsing, which may print help and exit) is initialized.
pub fn is_verbose() -> bool {
    std::env::args().any(|a| a == "-v" || a == "--verbose")
}

pub async fn run() -> anyhow::Result<()> {
    let cli = Cli::parse();
    match cli.command {
        Command::Serve(args) => commands::serve(args).await,
        Command::Index(args) => commands::index(args).await,
        Command::Search(args) => commands::search(args).await,
    }
}
