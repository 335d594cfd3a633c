//! Index command - load query entries into the vector index

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::Result;
use colored::Colorize;

use crate::core::config::HubConfig;
use crate::core::dashboard::Dashboard;
use crate::providers::OpenAiClient;
use crate::search::builder::{read_cache, IndexBuilder};
use crate::search::vectordb::QueryIndex;

/// Run the index command.
///
/// With `--dashboard` the full pipeline runs (resolve, summarize,
/// embed); otherwise entries come from the parse-phase cache.
pub fn run(
    cache: &Path,
    dashboard: Option<PathBuf>,
    status_only: bool,
    json: bool,
) -> Result<()> {
    let config = HubConfig::from_env()?;

    if status_only {
        return show_status(&config, json);
    }

    let entries = match dashboard {
        Some(path) => {
            let client = Arc::new(OpenAiClient::from_config(&config)?);
            let builder = IndexBuilder::new(client.clone(), client, &config);
            let dashboard = Dashboard::load(&path)?;
            let runtime = tokio::runtime::Runtime::new()?;
            runtime.block_on(builder.build_entries(&dashboard))?
        }
        None => read_cache(cache)?,
    };

    if let Some(parent) = config.index_db.parent() {
        std::fs::create_dir_all(parent)?;
    }

    let mut index = QueryIndex::open(&config.index_db, config.metric)?;
    let count = index.rebuild(&entries)?;

    if json {
        println!(
            "{}",
            serde_json::json!({
                "indexed": count,
                "index_db": config.index_db.display().to_string(),
            })
        );
    } else {
        println!(
            "{} Indexed {} queries",
            "✓".green().bold(),
            count.to_string().cyan()
        );
        println!(
            "  {} Index saved to: {}",
            "→".dimmed(),
            config.index_db.display()
        );
    }

    Ok(())
}

fn show_status(config: &HubConfig, json: bool) -> Result<()> {
    if !config.index_db.exists() {
        if json {
            println!("{}", serde_json::json!({ "exists": false }));
        } else {
            println!(
                "{} Index not found. Run {} first.",
                "!".yellow().bold(),
                "queryhub index".cyan()
            );
        }
        return Ok(());
    }

    let index = QueryIndex::open(&config.index_db, config.metric)?;
    let stats = index.stats()?;

    if json {
        println!(
            "{}",
            serde_json::json!({
                "exists": index.exists()?,
                "record_count": stats.record_count,
                "dimension": stats.dimension,
                "built_at": stats.built_at,
            })
        );
    } else {
        println!("{}", "Index Status".bold());
        println!();
        println!(
            "  {} {} queries indexed",
            "→".dimmed(),
            stats.record_count.to_string().cyan()
        );
        if let Some(dimension) = stats.dimension {
            println!("  {} Vector dimension: {}", "→".dimmed(), dimension);
        }
        if let Some(ts) = stats.built_at {
            let built = chrono::DateTime::from_timestamp(ts, 0)
                .map(|d| d.format("%Y-%m-%d %H:%M:%S").to_string())
                .unwrap_or_else(|| "Unknown".to_string());
            println!("  {} Last built: {}", "→".dimmed(), built);
        }
    }

    Ok(())
}
