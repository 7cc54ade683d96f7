//! CardForge CLI - generate and process card artwork from the command line

mod commands;

use anyhow::Result;
use clap::{Parser, Subcommand};
use commands::{batch, image};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

#[derive(Parser)]
#[command(name = "cardforge")]
#[command(about = "Batch AI artwork generation and processing for card games", long_about = None)]
#[command(version)]
struct Cli {
    /// Log debug output (overridden by RUST_LOG)
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Generate artwork for every card in a card file
    Generate(batch::GenerateArgs),

    /// Show task counts for a theme
    Status {
        /// Theme the batch was generated for
        #[arg(long)]
        theme: String,

        /// Output format (text or json)
        #[arg(long, default_value = "text")]
        format: String,
    },

    /// Reset failed tasks and run the batch again
    Retry(batch::RetryArgs),

    /// Approve or reject a generated card
    Review {
        #[arg(long)]
        theme: String,

        /// Card id
        card: String,

        /// New status (approved, rejected, review, pending)
        #[arg(long, value_parser = batch::parse_review_status)]
        status: cardforge_gen::TaskStatus,
    },

    /// Delete all tasks and the checkpoint of a theme
    Clear {
        #[arg(long)]
        theme: String,
    },

    /// Crop, resize and frame generated artwork
    Process(batch::ProcessArgs),

    /// Image inspection
    #[command(subcommand)]
    Image(image::ImageCommands),
}

fn init_tracing(verbose: bool) {
    let default_level = if verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    // A second init (e.g. from tests) is harmless.
    let _ = tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_target(false).with_writer(std::io::stderr))
        .try_init();
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    match cli.command {
        Commands::Generate(args) => batch::generate(args),
        Commands::Status { theme, format } => batch::status(&theme, &format),
        Commands::Retry(args) => batch::retry(args),
        Commands::Review { theme, card, status } => batch::review(&theme, &card, status),
        Commands::Clear { theme } => batch::clear(&theme),
        Commands::Process(args) => batch::process(args),
        Commands::Image(cmd) => image::run(cmd),
    }
}
