use anyhow::Context;
use clap::Args;
use serde_json::Value;

use crate::cli::utils::{output_error, output_fields, output_success};
use crate::cli::OutputFormat;
use crate::config;

#[derive(Args, Debug)]
pub struct HealthArgs {
    #[arg(long, help = "Server base URL (defaults to the configured host and port)")]
    pub url: Option<String>,
}

fn base_url(args: &HealthArgs) -> String {
    match &args.url {
        Some(url) => url.trim_end_matches('/').to_string(),
        None => {
            let server = &config::config().server;
            let host = if server.host == "0.0.0.0" { "127.0.0.1" } else { server.host.as_str() };
            format!("http://{}:{}", host, server.port)
        }
    }
}

pub async fn handle(args: HealthArgs, output_format: OutputFormat) -> anyhow::Result<()> {
    let url = format!("{}/health", base_url(&args));
    let response = reqwest::get(&url).await.with_context(|| format!("request to {} failed", url))?;
    let status = response.status();
    let body: Value = response.json().await.context("health response was not JSON")?;

    if !status.is_success() {
        output_error(&output_format, &format!("{} returned {}", url, status), Some("UNHEALTHY"))?;
        anyhow::bail!("server unhealthy");
    }

    match output_format {
        OutputFormat::Json => output_success(&output_format, "Server is healthy", Some(body)),
        OutputFormat::Text => {
            let text = |pointer: &str| body.pointer(pointer).map(|v| v.to_string()).unwrap_or_default();
            output_success(&output_format, &format!("{} is healthy", url), None)?;
            output_fields(&[
                ("version", text("/version")),
                ("environment", text("/environment")),
                ("uptime", text("/uptime")),
                ("database", text("/database/status")),
            ]);
            Ok(())
        }
    }
}
