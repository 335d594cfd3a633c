mod commands;
mod core;
mod error;
#[cfg(feature = "mcp")]
mod mcp;
mod providers;
mod search;

use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "queryhub")]
#[command(about = "Dashboard query library tools with AI-powered retrieval", long_about = None)]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Resolve, summarize and embed dashboard queries into a cache artifact
    Parse {
        /// Dashboard definition JSON file
        dashboard: PathBuf,
        #[arg(long, help = "Cache output path", default_value = commands::DEFAULT_CACHE)]
        output: PathBuf,
        #[arg(long, help = "JSON output")]
        json: bool,
    },
    /// Load query entries into the vector index
    Index {
        #[arg(long, help = "Cache artifact to load", default_value = commands::DEFAULT_CACHE)]
        cache: PathBuf,
        #[arg(long, help = "Build directly from a dashboard definition")]
        dashboard: Option<PathBuf>,
        #[arg(long, help = "Show index status only")]
        status: bool,
        #[arg(long, help = "JSON output")]
        json: bool,
    },
    /// Suggest indexed queries for a purpose
    Suggest {
        purpose: String,
        #[arg(
            long,
            short,
            help = "Keywords associated with the purpose",
            value_delimiter = ','
        )]
        keywords: Vec<String>,
        #[arg(long, short, help = "Limit results")]
        limit: Option<usize>,
        #[arg(long, help = "JSON output")]
        json: bool,
    },

    /// Start MCP server for client integration
    #[cfg(feature = "mcp")]
    Mcp {
        #[arg(long, help = "Show client configuration instructions")]
        install: bool,
    },
}

fn main() -> anyhow::Result<()> {
    init_logging();

    let cli = Cli::parse();

    match cli.command {
        Commands::Parse {
            dashboard,
            output,
            json,
        } => commands::parse::run(&dashboard, &output, json),
        Commands::Index {
            cache,
            dashboard,
            status,
            json,
        } => commands::index::run(&cache, dashboard, status, json),
        Commands::Suggest {
            purpose,
            keywords,
            limit,
            json,
        } => commands::suggest::run(&purpose, &keywords, limit, json),

        #[cfg(feature = "mcp")]
        Commands::Mcp { install } => {
            if install {
                print_mcp_install_instructions();
                Ok(())
            } else {
                run_mcp_server()
            }
        }
    }
}

/// Logs go to stderr so the MCP stdio transport keeps stdout to itself.
fn init_logging() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

#[cfg(feature = "mcp")]
fn run_mcp_server() -> anyhow::Result<()> {
    let config = core::config::HubConfig::from_env()?;
    let runtime = tokio::runtime::Runtime::new()?;
    runtime.block_on(mcp::run_mcp_server(config))
}

#[cfg(feature = "mcp")]
fn print_mcp_install_instructions() {
    use colored::Colorize;

    let binary_path = std::env::current_exe()
        .map(|p| p.to_string_lossy().to_string())
        .unwrap_or_else(|_| "queryhub".to_string());

    println!("{}", "MCP Server Installation Guide".bold().cyan());
    println!();
    println!("Add the following to your MCP client configuration:");
    println!();
    println!(
        r#"{{
  "mcpServers": {{
    "queryhub": {{
      "command": "{}",
      "args": ["mcp"]
    }}
  }}
}}"#,
        binary_path
    );
    println!();
    println!("{}", "Available tools:".bold());
    println!(
        "  • {} - Suggest indexed queries for a purpose",
        "get_query_suggestions".green()
    );
    println!(
        "  • {} - Rebuild the index from a dashboard definition",
        "build_query_index".green()
    );
    println!(
        "  • {} - Execute a KQL query against the cluster",
        "execute_query".green()
    );
    println!(
        "  • {} - Fetch VM CPU utilization metrics",
        "vm_cpu_utilization".green()
    );
    println!(
        "  • {} - Retrieve right-size advisor recommendations",
        "advisor_recommendations".green()
    );
}
