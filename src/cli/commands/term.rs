use clap::Subcommand;

use crate::cli::client::ApiClient;
use crate::cli::utils::output_success;
use crate::cli::OutputFormat;

#[derive(Subcommand)]
pub enum TermCommands {
    #[command(about = "Close the current term: finalize grades and advance eligible students")]
    Close,
}

pub async fn handle(cmd: TermCommands, client: &ApiClient, output_format: OutputFormat) -> anyhow::Result<()> {
    match cmd {
        TermCommands::Close => {
            let summary = client.post("/api/admin/system/end-quarter", None).await?;
            let advanced = summary.get("studentsAdvanced").and_then(|v| v.as_u64()).unwrap_or(0);
            output_success(
                &output_format,
                &format!("Term closed, {} student(s) advanced", advanced),
                Some(summary),
            )
        }
    }
}
