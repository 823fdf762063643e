use clap::Parser;
use std::sync::Arc;
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use drivedocs_core::{
    build_google_connector,
    credentials::CredentialProvider,
    mcp_server::{JsonRpcHandler, McpServer},
    transport::StdioTransport,
};

mod cli;

use cli::{Cli, Commands};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // stdout carries MCP frames, so logs go to stderr
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "drivedocs_mcp=info,drivedocs_core=info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let cli = Cli::parse();
    let settings = cli.auth_settings();
    info!("Using credentials: {}", settings.describe_source());
    let credentials = Arc::new(CredentialProvider::new(settings));

    match cli.selected_command() {
        Commands::Login => {
            let grant = credentials.login().await?;
            if !grant.allows_write() {
                warn!("Configured scopes are read-only; write_document will be refused");
            }
            eprintln!("Authenticated. Token cached for later runs.");
            Ok(())
        }
        Commands::Serve => serve(credentials).await,
    }
}

async fn serve(credentials: Arc<CredentialProvider>) -> Result<(), Box<dyn std::error::Error>> {
    info!("Starting drivedocs MCP server");

    let connector = build_google_connector(credentials)?;
    let server = McpServer::new(Arc::new(connector));
    let handler = JsonRpcHandler::new(server);
    let transport = StdioTransport::new(handler);

    info!("MCP server ready, listening on stdio");

    tokio::select! {
        res = transport.run() => {
            if let Err(e) = res {
                error!("Transport error: {}", e);
                return Err(e.into());
            }
            info!("stdin closed, shutting down");
        }
        _ = tokio::signal::ctrl_c() => {
            info!("Interrupted, shutting down");
        }
    }

    Ok(())
}
