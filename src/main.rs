use std::path::{Path, PathBuf};
use std::process::ExitCode;

use clap::{Parser, Subcommand};
use tracing::{error, info};

use corkboard::auth::{register, RegistrationRequest};
use corkboard::{App, Config, Database, Result};

#[derive(Parser)]
#[command(name = "corkboard")]
#[command(about = "Collaborative boards and pins", long_about = None)]
struct Cli {
    /// Path to the TOML configuration file.
    #[arg(short, long, default_value = "config.toml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Manage accounts.
    User {
        #[command(subcommand)]
        command: UserCommands,
    },
    /// Create or upgrade the database schema.
    Migrate,
}

#[derive(Subcommand)]
enum UserCommands {
    /// Register a new account.
    Add {
        id: String,
        name: String,
        password: String,
    },
    /// Delete an account with its boards and pins.
    Delete { id: String },
}

fn load_config(path: &Path) -> Config {
    match Config::load_with_env(path) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Failed to load {}: {e}", path.display());
            eprintln!("Using default configuration.");
            let mut config = Config::default();
            config.apply_env_overrides();
            config
        }
    }
}

async fn run(cli: Cli, config: Config) -> Result<()> {
    match cli.command {
        Commands::Migrate => {
            let db = Database::open(&config.database.path).await?;
            info!(version = db.schema_version().await?, "Database ready");
            db.close().await;
        }
        Commands::User { command } => {
            let app = App::open(config).await?;
            match command {
                UserCommands::Add { id, name, password } => {
                    let request = RegistrationRequest::new(id, name, password);
                    let user = register(app.db(), request).await?;
                    println!("Created user '{}'", user.id);
                }
                UserCommands::Delete { id } => {
                    app.delete_account(&id).await?;
                    println!("Deleted user '{id}'");
                }
            }
            app.shutdown().await;
        }
    }
    Ok(())
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    let config = load_config(&cli.config);

    if let Err(e) = corkboard::logging::init(&config.logging) {
        eprintln!("Failed to initialize logging: {e}");
        // Fall back to console-only logging
        let _ = corkboard::logging::init_console_only(&config.logging.level);
    }

    match run(cli, config).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!(error = %e, "Command failed");
            eprintln!("error: {e}");
            ExitCode::FAILURE
        }
    }
}
