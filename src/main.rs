use std::sync::Arc;

use anyhow::Context;
use clap::{Parser, Subcommand};

use lead_assist::config::{ClientConfig, GatewayConfig};
use lead_assist::error::Result;
use lead_assist::gateway::{Gateway, GatewayState, gateway_routes};
use lead_assist::intake::SiteSurface;
use lead_assist::llm::{ModelSelector, Providers};
use lead_assist::orchestrator::{HttpGatewayClient, Orchestrator};

#[derive(Parser)]
#[command(name = "lead-assist")]
#[command(about = "AI lead qualification: model gateway and terminal chat")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the model gateway
    Serve {
        /// Override LEAD_ASSIST_HOST
        #[arg(long)]
        host: Option<String>,

        /// Override LEAD_ASSIST_PORT
        #[arg(long)]
        port: Option<u16>,
    },

    /// Chat with the assistant in the terminal
    Chat {
        /// Gateway endpoint (overrides LEAD_ASSIST_GATEWAY_URL)
        #[arg(long)]
        gateway_url: Option<String>,

        /// Backend to start with: gemini or grok
        #[arg(long)]
        model: Option<ModelSelector>,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    match cli.command {
        Commands::Serve { host, port } => serve(host, port).await.context("gateway failed"),
        Commands::Chat { gateway_url, model } => {
            chat(gateway_url, model).await.context("chat session failed")
        }
    }
}

async fn serve(host: Option<String>, port: Option<u16>) -> Result<()> {
    let mut config = GatewayConfig::from_env()?;
    if let Some(host) = host {
        config.host = host;
    }
    if let Some(port) = port {
        config.port = port;
    }

    let gateway = Gateway::new(Providers::from_config(&config));
    let app = gateway_routes(GatewayState {
        gateway: Arc::new(gateway),
        allowed_origin: config.allowed_origin.clone(),
    });

    let addr = config.bind_addr();
    let listener = tokio::net::TcpListener::bind(&addr).await?;

    eprintln!("Lead Assist gateway v{}", env!("CARGO_PKG_VERSION"));
    eprintln!("   Proxy:  http://{addr}{}", lead_assist::config::GATEWAY_PATH);
    eprintln!("   Health: http://{addr}/health");
    match config.allowed_origin {
        Some(ref origin) => eprintln!("   Origin: {origin}"),
        None => eprintln!("   Origin: any"),
    }
    tracing::info!(addr = %addr, "Gateway listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            tokio::signal::ctrl_c().await.ok();
            tracing::info!("Shutting down gateway");
        })
        .await?;
    Ok(())
}

async fn chat(gateway_url: Option<String>, model: Option<ModelSelector>) -> Result<()> {
    let mut config = ClientConfig::from_env()?;
    if let Some(url) = gateway_url {
        config.gateway_url = url;
    }
    if let Some(model) = model {
        config.model = model;
    }

    eprintln!("Lead Assist chat ({})", config.model.display_name());
    eprintln!("   Gateway: {}", config.gateway_url);
    eprintln!("   Pick a suggestion by number. /model, /reset, /form, /online, /quit.");

    let surface = Arc::new(SiteSurface::new());
    let orchestrator = Arc::new(Orchestrator::new(
        Arc::new(HttpGatewayClient::new(config.gateway_url)),
        surface.clone(),
        config.model,
        config.handoff,
    ));

    lead_assist::cli::run(orchestrator, surface).await?;
    Ok(())
}
