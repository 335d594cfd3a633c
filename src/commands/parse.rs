//! Parse command - resolve, summarize and embed dashboard queries

use std::path::Path;
use std::sync::Arc;

use anyhow::Result;
use colored::Colorize;

use crate::core::config::HubConfig;
use crate::core::dashboard::Dashboard;
use crate::providers::OpenAiClient;
use crate::search::builder::{write_cache, IndexBuilder};

/// Run the parse phase: dashboard definition in, cache artifact out.
pub fn run(dashboard_path: &Path, output: &Path, json: bool) -> Result<()> {
    let config = HubConfig::from_env()?;
    let client = Arc::new(OpenAiClient::from_config(&config)?);

    let dashboard = Dashboard::load(dashboard_path)?;

    if !json {
        println!(
            "{} Parsing dashboard: {}",
            "→".dimmed(),
            dashboard_path.display()
        );
    }

    let builder = IndexBuilder::new(client.clone(), client, &config);
    let runtime = tokio::runtime::Runtime::new()?;
    let entries = runtime.block_on(builder.build_entries(&dashboard))?;

    write_cache(output, &entries)?;

    if json {
        println!(
            "{}",
            serde_json::json!({
                "parsed": entries.len(),
                "tiles": dashboard.tiles.len(),
                "output": output.display().to_string(),
            })
        );
    } else {
        println!(
            "{} Parsed {} of {} tiles",
            "✓".green().bold(),
            entries.len().to_string().cyan(),
            dashboard.tiles.len()
        );
        println!("  {} Cache saved to: {}", "→".dimmed(), output.display());
    }

    Ok(())
}
