// src/main.rs — redraft entry point

use clap::Parser;

use redraft::cli::{self, Cli, Commands};
use redraft::infra::config::Config;
use redraft::infra::logger;

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    logger::init_logging(&cli.log_level);

    if let Err(e) = run(cli).await {
        eprintln!("error: {e}");
        std::process::exit(1);
    }
}

async fn run(cli: Cli) -> anyhow::Result<()> {
    // Falls back to defaults if no config.toml
    let config = match cli.config {
        Some(ref path) => Config::load_from(std::path::Path::new(path))?,
        None => Config::load()?,
    };
    let db_path = config.store.db_path();

    match cli.command {
        Commands::Run(args) => cli::run::run_rewrite(args, &config).await,
        Commands::Serve {
            port,
            host,
            no_store,
        } => cli::serve::run_serve(&config, host, port, no_store).await,
        Commands::History {
            session,
            gradable,
            limit,
            json,
        } => cli::history::list_history(&db_path, session.as_deref(), gradable, limit, json),
        Commands::Show { request_id, json } => {
            cli::history::show_request(&db_path, &request_id, json)
        }
        Commands::Migrate { status, rollback } => {
            cli::migrate::run_migrate(&db_path, status, rollback)
        }
    }
}
