//! tmcloud CLI
//!
//! # Commands
//!
//! - `login` / `logout` / `whoami` - Device-flow sign-in and identity
//! - `token` - Manage stored per-organization tokens
//! - `documents` - List remote documents
//! - `validate` / `push` - Sync a local document with the catalog

mod cli;

use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::process::ExitCode;

/// Sync threat model documents with tmcloud.
#[derive(Parser)]
#[command(name = "tmcloud")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// API base URL, overriding TMCLOUD_API_URL
    #[arg(global = true, long)]
    api_url: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Sign in with the device flow
    Login {
        /// Store the token only for this organization (id or slug)
        #[arg(short, long)]
        org: Option<String>,
    },

    /// Remove stored tokens
    Logout {
        /// Organization to sign out of (defaults to the default organization)
        #[arg(short, long, conflicts_with = "all")]
        org: Option<String>,

        /// Remove every stored token
        #[arg(short, long)]
        all: bool,
    },

    /// Show who a stored token belongs to
    Whoami {
        #[arg(short, long)]
        org: Option<String>,
    },

    /// Manage stored tokens
    Token {
        #[command(subcommand)]
        command: TokenCommands,
    },

    /// List documents in an organization
    Documents {
        #[arg(short, long)]
        org: Option<String>,
    },

    /// Check a local document against the catalog
    Validate {
        /// Document to check
        file: PathBuf,

        #[arg(short, long)]
        org: Option<String>,
    },

    /// Create or update the remote copy of a local document
    Push {
        /// Document to push
        file: PathBuf,

        #[arg(short, long)]
        org: Option<String>,

        /// Do not write the new document name back into the file
        #[arg(long)]
        no_update_local: bool,
    },
}

#[derive(Subcommand)]
enum TokenCommands {
    /// List stored tokens
    List,

    /// Store a token obtained elsewhere
    Add {
        token: String,

        /// Store the token only for this organization (id or slug)
        #[arg(short, long)]
        org: Option<String>,
    },

    /// Show or set the default organization
    Default {
        /// Organization id, slug or name to make the default
        org: Option<String>,
    },
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    tmcloud::config::init_runtime();

    let mut settings = tmcloud::config::Settings::from_env();
    if let Some(url) = cli.api_url {
        settings.api_url = url.trim_end_matches('/').to_string();
    }

    let result = match cli::App::new(settings) {
        Ok(app) => run(&app, cli.command).await,
        Err(e) => Err(e),
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {}", e);
            if let Some(hint) = cli::hint(&e) {
                eprintln!("{}", hint);
            }
            ExitCode::FAILURE
        }
    }
}

async fn run(app: &cli::App, command: Commands) -> tmcloud::Result<()> {
    match command {
        Commands::Login { org } => cli::auth::login(app, org.as_deref()).await,
        Commands::Logout { org, all } => cli::auth::logout(app, org.as_deref(), all),
        Commands::Whoami { org } => cli::auth::whoami(app, org.as_deref()).await,
        Commands::Token { command } => match command {
            TokenCommands::List => cli::tokens::list(app),
            TokenCommands::Add { token, org } => cli::tokens::add(app, &token, org.as_deref()).await,
            TokenCommands::Default { org } => cli::tokens::default(app, org.as_deref()),
        },
        Commands::Documents { org } => cli::sync::documents(app, org.as_deref()).await,
        Commands::Validate { file, org } => cli::sync::validate(app, &file, org.as_deref()).await,
        Commands::Push {
            file,
            org,
            no_update_local,
        } => cli::sync::push(app, &file, org.as_deref(), !no_update_local).await,
    }
}
