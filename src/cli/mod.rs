pub mod client;
pub mod commands;
pub mod utils;

use clap::{Parser, Subcommand};
use serde::{Deserialize, Serialize};

#[derive(Parser)]
#[command(name = "school")]
#[command(about = "School CLI - administration for the School API")]
#[command(version)]
pub struct Cli {
    #[arg(long, global = true, help = "Output in human-readable text format")]
    pub text: bool,

    #[arg(long, global = true, help = "Output in JSON format")]
    pub json: bool,

    #[arg(
        long,
        global = true,
        env = "SCHOOL_API_URL",
        default_value = "http://localhost:3000",
        help = "Base URL of the School API server"
    )]
    pub server: String,

    #[arg(long, global = true, env = "SCHOOL_API_TOKEN", hide_env_values = true, help = "Bearer token for API calls")]
    pub token: Option<String>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    #[command(about = "Mint a signed token with the configured JWT secret")]
    Token {
        #[command(subcommand)]
        cmd: commands::token::TokenCommands,
    },

    #[command(about = "Apply database migrations")]
    Migrate,

    #[command(about = "Check server health")]
    Health,

    #[command(about = "Term operations")]
    Term {
        #[command(subcommand)]
        cmd: commands::term::TermCommands,
    },

    #[command(about = "System mode management")]
    System {
        #[command(subcommand)]
        cmd: commands::system::SystemCommands,
    },
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum OutputFormat {
    Text,
    Json,
}

impl OutputFormat {
    pub fn from_cli(cli: &Cli) -> Self {
        if cli.json {
            OutputFormat::Json
        } else {
            OutputFormat::Text
        }
    }
}

pub async fn run(cli: Cli) -> anyhow::Result<()> {
    let output_format = OutputFormat::from_cli(&cli);
    let client = client::ApiClient::new(&cli.server, cli.token.clone());

    match cli.command {
        Commands::Token { cmd } => commands::token::handle(cmd, output_format).await,
        Commands::Migrate => commands::migrate::handle(output_format).await,
        Commands::Health => commands::health::handle(&client, output_format).await,
        Commands::Term { cmd } => commands::term::handle(cmd, &client, output_format).await,
        Commands::System { cmd } => commands::system::handle(cmd, &client, output_format).await,
    }
}
