use anyhow::{Context, Result};
use serde::Serialize;
use tracing::{error, info};

mod config;
mod engine;
mod meta;
mod models;
mod notifier;
mod utils;

use crate::config::{Catalog, Settings};
use crate::engine::Prober;

#[tokio::main]
async fn main() -> Result<()> {
    utils::setup_console();

    // stdout carries the report only.
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env()
            .add_directive(tracing::Level::INFO.into()))
        .with_writer(std::io::stderr)
        .init();

    let settings = Settings::from_env();

    let catalog = match Catalog::load(&settings.sites_file) {
        Ok(catalog) => catalog,
        Err(e) => {
            error!(error = %e, "Catalog unavailable, aborting run");
            println!("{}", e.to_failure_document());
            std::process::exit(1);
        }
    };
    info!(sites = %settings.sites_file.display(), sinks = settings.webhook_urls.len(), "Catalog loaded");

    let http_client = reqwest::Client::builder()
        .build()
        .context("Failed to create HTTP client")?;

    let prober = Prober::new(http_client.clone(), settings.max_concurrency);
    let report = prober.run(&catalog).await;

    println!("{}", to_pretty_json(&report)?);

    notifier::deliver(&http_client, &settings.webhook_urls, &report).await;
    Ok(())
}

fn to_pretty_json<T: Serialize>(value: &T) -> Result<String> {
    let mut out = Vec::new();
    let formatter = serde_json::ser::PrettyFormatter::with_indent(b"    ");
    let mut serializer = serde_json::Serializer::with_formatter(&mut out, formatter);
    value.serialize(&mut serializer).context("Failed to serialize report")?;
    String::from_utf8(out).context("Report is not valid UTF-8")
}
