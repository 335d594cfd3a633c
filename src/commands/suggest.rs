//! Suggest command - semantic retrieval over the query index

use std::sync::Arc;

use anyhow::Result;
use colored::Colorize;

use crate::core::config::HubConfig;
use crate::providers::OpenAiClient;
use crate::search::library::QueryLibrary;

pub fn run(purpose: &str, keywords: &[String], limit: Option<usize>, json: bool) -> Result<()> {
    let mut config = HubConfig::from_env()?;
    if let Some(limit) = limit {
        config.suggestion_limit = limit;
    }

    let client = Arc::new(OpenAiClient::from_config(&config)?);
    let library = QueryLibrary::new(client, &config);

    let runtime = tokio::runtime::Runtime::new()?;
    let response = runtime.block_on(library.suggest(purpose, keywords));

    if json {
        println!("{}", serde_json::to_string_pretty(&response)?);
        return Ok(());
    }

    if let Some(error) = &response.error {
        println!("{} {}", "!".yellow().bold(), error);
        return Ok(());
    }

    if response.queries.is_empty() {
        println!("{} No matching queries for: {}", "→".dimmed(), purpose.cyan());
        return Ok(());
    }

    println!(
        "{} {} suggestions for: {}",
        "→".dimmed(),
        response.queries.len(),
        purpose.cyan()
    );
    println!();

    for (i, suggestion) in response.queries.iter().enumerate() {
        println!(
            "{}. {}",
            (i + 1).to_string().bold(),
            suggestion.title.cyan()
        );
        println!("   {}", suggestion.description.dimmed());

        // Show the first line of the query as a teaser.
        if let Some(first_line) = suggestion.query.lines().next() {
            let teaser = if suggestion.query.lines().count() > 1 {
                format!("{} …", first_line)
            } else {
                first_line.to_string()
            };
            println!("   {}", teaser);
        }
        println!();
    }

    Ok(())
}
