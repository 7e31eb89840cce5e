use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing::info;

use browser_tools_mcp::describe::DEFAULT_DESCRIBER_URL;
use browser_tools_mcp::{mcp, schema};

#[derive(Parser)]
#[command(name = "browser-tools-mcp")]
#[command(about = "Browser automation tools for AI agents, served over MCP")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Start as an MCP (Model Context Protocol) server over stdio
    Mcp {
        /// Base URL of the Ollama service used by analyze_screenshot
        #[arg(long, default_value = DEFAULT_DESCRIBER_URL)]
        describer_url: String,
    },

    /// Print the tool manifest and exit
    Tools {
        /// Output format: text or json
        #[arg(short, long, default_value = "text")]
        format: String,
    },
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Mcp { describer_url } => {
            info!(describer_url = %describer_url, "starting MCP server");
            let rt = tokio::runtime::Runtime::new()?;
            rt.block_on(mcp::run_mcp_server(&describer_url))
        }
        Commands::Tools { format } => print_tools(&format),
    }
}

fn print_tools(format: &str) -> Result<()> {
    let output = match format {
        "json" => serde_json::to_string_pretty(&mcp::tool_manifest())?,
        _ => schema::list_tools()
            .iter()
            .map(|def| {
                let mut line = format!("{}: {}", def.name, def.description);
                for field in def.fields {
                    let marker = if field.required { " (required)" } else { "" };
                    line.push_str(&format!("\n    {}{marker}: {}", field.name, field.description));
                }
                line
            })
            .collect::<Vec<_>>()
            .join("\n"),
    };
    println!("{output}");
    Ok(())
}
