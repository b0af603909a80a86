mod client;
mod commands;
mod output;

use clap::{Parser, Subcommand};
use client::{Credentials, TarotClient};
use output::{OutputConfig, OutputFormat};
use std::process;

/// Default server address, matching the server's default port
const DEFAULT_SERVER_URL: &str = "http://localhost:8008";

/// CLI for the Tarot API: dataset and image maintenance, plus a small server client
#[derive(Parser, Debug)]
#[clap(name = "tarot-cli", about = "CLI for the Tarot API")]
struct Cli {
    /// Server URL to connect to
    #[clap(long, env = "TAROT_URL", default_value = DEFAULT_SERVER_URL, global = true)]
    server_url: String,

    /// API key for servers with authentication enabled
    #[clap(long, env = "API_KEY", global = true, hide_env_values = true)]
    api_key: Option<String>,

    /// HMAC secret used to sign requests when no API key is given
    #[clap(long, env = "HMAC_SECRET", global = true, hide_env_values = true)]
    hmac_secret: Option<String>,

    /// Output format
    #[clap(long, value_enum, default_value_t = OutputFormat::Human, global = true)]
    format: OutputFormat,

    /// Quiet mode: minimal output (just IDs or counts)
    #[clap(short, long, global = true)]
    quiet: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Manage the card dataset
    #[command(subcommand)]
    Data(commands::data::DataCommands),
    /// Manage the local image cache
    #[command(subcommand)]
    Images(commands::images::ImageCommands),
    #[command(flatten)]
    Server(commands::server::ServerCommands),
}

/// Formats an error for human-readable stderr output
fn format_error(err: &dyn std::error::Error) -> String {
    let err_string = err.to_string();

    if err_string.contains("error sending request")
        || err_string.contains("connection refused")
        || err_string.contains("Connection refused")
        || err_string.contains("tcp connect error")
    {
        return format!("Could not connect to server. Is tarot-api running?\n  {}", err_string);
    }

    err_string
}

#[tokio::main]
async fn main() {
    dotenv::dotenv().ok();

    let cli = Cli::parse();
    let output_config = OutputConfig {
        format: cli.format,
        quiet: cli.quiet,
    };

    let result = match cli.command {
        Commands::Data(cmd) => commands::data::execute(cmd, &output_config).await,
        Commands::Images(cmd) => commands::images::execute(cmd, &output_config).await,
        Commands::Server(cmd) => {
            let credentials = Credentials {
                api_key: cli.api_key,
                hmac_secret: cli.hmac_secret,
            };
            let client = TarotClient::new(cli.server_url, credentials);
            commands::server::execute(&client, cmd, &output_config).await
        }
    };

    if let Err(e) = result {
        eprintln!("Error: {}", format_error(e.as_ref()));
        process::exit(1);
    }
}
