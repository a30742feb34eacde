mod classifier;
mod cli;
mod corrections;
mod db;
mod error;
mod fmt;
mod importer;
mod models;
mod normalizer;
mod pipeline;
mod quarantine;
mod reports;
mod settings;

use clap::Parser;

use cli::{Cli, Commands, ReportCommands};

fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn")).init();

    let cli = Cli::parse();

    let result = match cli.command {
        Commands::Init {
            data_dir,
            extracts_dir,
        } => cli::init::run(data_dir, extracts_dir),
        Commands::Bootstrap => cli::bootstrap::run(),
        Commands::Run { extracts_dir } => cli::run::run(extracts_dir),
        Commands::Status => cli::status::run(),
        Commands::Pending { reason } => cli::pending::run(&reason),
        Commands::Classify { code } => cli::classify::run(&code),
        Commands::Report { command } => match command {
            ReportCommands::Mix { by } => cli::report::mix(by.into()),
            ReportCommands::TopClients { limit } => cli::report::top_clients(limit),
            ReportCommands::Evolution { from, to } => cli::report::evolution(from, to),
        },
    };

    if let Err(e) = result {
        eprintln!("Error: {e}");
        std::process::exit(1);
    }
}
