//! Finsight CLI - Bank statement analyzer
//!
//! Usage:
//!   finsight init                                 Initialize database
//!   finsight user add --name N --username U --email E
//!   finsight import --file STATEMENT --user U      Import (auto-detects bank from CSV)
//!   finsight stats --user U                       Totals and cash flow
//!   finsight serve --port 5000                    Start web server

mod cli;
mod commands;

#[cfg(test)]
mod tests;

use anyhow::Result;
use clap::Parser;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use cli::*;

#[tokio::main]
async fn main() -> Result<()> {
    // Keys and paths may come from a .env file
    dotenvy::dotenv().ok();

    let cli = Cli::parse();

    // Set up logging
    // Priority: RUST_LOG env var > --verbose flag > default (info)
    let filter = if std::env::var("RUST_LOG").is_ok() {
        EnvFilter::from_default_env()
    } else if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::new("info")
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_target(false).compact())
        .init();

    match cli.command {
        Commands::Init => commands::cmd_init(&cli.db, cli.no_encrypt),
        Commands::User { action } => {
            let db = commands::open_db(&cli.db, cli.no_encrypt)?;
            match action {
                UserAction::Add {
                    name,
                    username,
                    email,
                } => {
                    let password = commands::read_password()?;
                    commands::cmd_user_add(&db, &name, &username, &email, &password)
                }
                UserAction::List => commands::cmd_user_list(&db),
            }
        }
        Commands::Import { file, user, bank } => {
            let db = commands::open_db(&cli.db, cli.no_encrypt)?;
            commands::cmd_import(&db, &file, &user, bank.as_deref()).map(|_| ())
        }
        Commands::Stats { user } => {
            let db = commands::open_db(&cli.db, cli.no_encrypt)?;
            commands::cmd_stats(&db, &user)
        }
        Commands::Anomalies { user } => {
            let db = commands::open_db(&cli.db, cli.no_encrypt)?;
            commands::cmd_anomalies(&db, &user)
        }
        Commands::Projections { user } => {
            let db = commands::open_db(&cli.db, cli.no_encrypt)?;
            let today = chrono::Local::now().date_naive();
            commands::cmd_projections(&db, &user, today)
        }
        Commands::Recurring { user } => {
            let db = commands::open_db(&cli.db, cli.no_encrypt)?;
            commands::cmd_recurring(&db, &user)
        }
        Commands::Report { user, output } => {
            let db = commands::open_db(&cli.db, cli.no_encrypt)?;
            commands::cmd_report(&db, &user, &output)
        }
        Commands::Train { user } => {
            let db = commands::open_db(&cli.db, cli.no_encrypt)?;
            commands::cmd_train(&db, &user, &commands::model_path()).map(|_| ())
        }
        Commands::Serve {
            port,
            host,
            static_dir,
        } => {
            commands::cmd_serve(
                &cli.db,
                &host,
                port,
                cli.no_encrypt,
                static_dir.as_deref(),
            )
            .await
        }
    }
}
