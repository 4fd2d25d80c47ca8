use crate::cli::client::ApiClient;
use crate::cli::utils::output_success;
use crate::cli::OutputFormat;

pub async fn handle(client: &ApiClient, output_format: OutputFormat) -> anyhow::Result<()> {
    let data = client.get("/health").await?;
    output_success(&output_format, &format!("Server {} is healthy", client.url("")), Some(data))
}
