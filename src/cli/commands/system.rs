use clap::Subcommand;
use serde_json::json;

use crate::cli::client::ApiClient;
use crate::cli::utils::output_success;
use crate::cli::OutputFormat;

const STATE_PATH: &str = "/api/admin/system/state";

#[derive(Subcommand)]
pub enum SystemCommands {
    #[command(about = "Show the current system mode")]
    State,

    #[command(about = "Enter maintenance mode (grade changes are rejected)")]
    Maintenance,

    #[command(about = "Return to active mode")]
    Activate,
}

pub async fn handle(cmd: SystemCommands, client: &ApiClient, output_format: OutputFormat) -> anyhow::Result<()> {
    let state = match cmd {
        SystemCommands::State => client.get(STATE_PATH).await?,
        SystemCommands::Maintenance => client.patch(STATE_PATH, json!({ "maintenance": true })).await?,
        SystemCommands::Activate => client.patch(STATE_PATH, json!({ "maintenance": false })).await?,
    };

    let mode = state.get("mode").and_then(|v| v.as_str()).unwrap_or("UNKNOWN").to_string();
    output_success(&output_format, &format!("System is {}", mode), Some(state))
}
