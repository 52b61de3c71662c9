use clap::{Parser, Subcommand};
use serde::Serialize;
use serde_json::Value;
use std::path::{Path, PathBuf};
use tracing::error;

use vcstore::{open_repository, FindFilter, RepositoryConfig, RootError, RootResult};
use vcstore_core::{Credential, CredentialId, Meta};

/// vcstore: store verifiable credentials and match them by example
#[derive(Parser, Debug)]
#[command(name = "vcstore", version, about, long_about = None)]
struct Cli {
    /// Path to config file
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Write the default configuration file
    Init,

    /// Store a credential read from a JSON file ("-" for stdin)
    Insert {
        file: PathBuf,

        /// Credential this one was derived from
        #[arg(long)]
        parent_id: Option<String>,

        /// Whether wallets should display this credential
        #[arg(long)]
        displayable: Option<bool>,
    },

    /// Print the credential with the given id
    Get { id: String },

    /// List credentials, optionally filtered
    Find {
        /// Credential type; repeat for any of several types
        #[arg(long = "type")]
        types: Vec<String>,

        #[arg(long)]
        parent_id: Option<String>,

        #[arg(long)]
        displayable: Option<bool>,
    },

    /// Delete the credential with the given id
    Delete { id: String },

    /// Run a QueryByExample request read from a JSON file ("-" for stdin)
    Match { query: PathBuf },
}

fn init_tracing(verbose: bool) {
    use tracing_subscriber::EnvFilter;

    let filter = if verbose {
        EnvFilter::new("vcstore=debug,vcstore_vault=debug,vcstore_core=debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("vcstore=info"))
    };

    // stdout carries the JSON results
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

fn config_path(path: Option<&PathBuf>) -> PathBuf {
    path.cloned()
        .unwrap_or_else(RepositoryConfig::default_config_path)
}

fn read_json(path: &Path) -> RootResult<Value> {
    let text = if path == Path::new("-") {
        std::io::read_to_string(std::io::stdin())?
    } else {
        std::fs::read_to_string(path)?
    };
    Ok(serde_json::from_str(&text)?)
}

fn print_json<T: Serialize>(value: &T) -> RootResult<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    if let Err(e) = run(cli).await {
        match &e {
            RootError::Store(store_err) => error!(kind = store_err.kind(), "{}", e),
            _ => error!("{}", e),
        }
        std::process::exit(1);
    }
}

async fn run(cli: Cli) -> RootResult<()> {
    let path = config_path(cli.config.as_ref());
    let config = RepositoryConfig::load(&path)?;

    match cli.command {
        Commands::Init => {
            config.save(&path)?;
            println!("Configuration written to {}", path.display());
            Ok(())
        }
        Commands::Insert {
            file,
            parent_id,
            displayable,
        } => {
            let credential = Credential::new(read_json(&file)?);
            let meta = Meta {
                parent_id,
                displayable,
                ..Meta::default()
            };
            let repo = open_repository(&config).await?;
            print_json(&repo.insert(credential, Some(meta)).await?)
        }
        Commands::Get { id } => {
            let repo = open_repository(&config).await?;
            print_json(&repo.get(&CredentialId::new(id)).await?)
        }
        Commands::Find {
            types,
            parent_id,
            displayable,
        } => {
            let filter = FindFilter {
                types,
                parent_id,
                displayable,
            };
            let repo = open_repository(&config).await?;
            print_json(&repo.find(&filter).await?)
        }
        Commands::Delete { id } => {
            let repo = open_repository(&config).await?;
            let removed = repo.delete(&CredentialId::new(id)).await?;
            print_json(&serde_json::json!({ "deleted": removed }))
        }
        Commands::Match { query } => {
            let request = read_json(&query)?;
            let repo = open_repository(&config).await?;
            print_json(&repo.match_query(&request).await?)
        }
    }
}
