use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

mod commands;

#[derive(Parser)]
#[command(name = "stillpoint", version, about = "Stillpoint meditation timer")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run a meditation session in the terminal
    Run(commands::run::RunArgs),
    /// Show when guided narration sections will play
    Schedule(commands::schedule::ScheduleArgs),
    /// Configuration management
    Config {
        #[command(subcommand)]
        action: commands::config::ConfigAction,
    },
    /// Word timing cache management
    Cache {
        #[command(subcommand)]
        action: commands::cache::CacheAction,
    },
}

fn init_logging() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .try_init();
}

fn main() {
    init_logging();
    let cli = Cli::parse();
    let result = match cli.command {
        Commands::Run(args) => commands::run::run(args),
        Commands::Schedule(args) => commands::schedule::run(args),
        Commands::Config { action } => commands::config::run(action),
        Commands::Cache { action } => commands::cache::run(action).map_err(Into::into),
    };

    if let Err(e) = result {
        eprintln!("error: {e}");
        std::process::exit(1);
    }
}
