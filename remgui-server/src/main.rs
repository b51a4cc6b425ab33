//! remgui-server — entry point.
//!
//! ```text
//! remgui-server                   Listen on the configured port
//! remgui-server --port 9000       Override the listen port
//! remgui-server --config <path>   Load a custom config TOML
//! remgui-server --gen-config      Write default config to stdout
//! remgui-server --client <addr>   Also dial a client listening for us
//! ```

use std::path::PathBuf;

use clap::Parser;
use tracing::info;
use tracing_subscriber::EnvFilter;

use remgui_server::config::ServerConfig;
use remgui_server::server::Server;

// ── CLI ──────────────────────────────────────────────────────────

#[derive(Parser, Debug)]
#[command(name = "remgui-server", about = "Remote UI streaming server")]
struct Cli {
    /// Path to configuration TOML file.
    #[arg(short, long, default_value = "remgui-server.toml")]
    config: PathBuf,

    /// Override the listen port from the config.
    #[arg(short, long)]
    port: Option<u16>,

    /// Print the default configuration to stdout and exit.
    #[arg(long)]
    gen_config: bool,

    /// Address of a client waiting for a reverse connection
    /// (host:port). May be given more than once.
    #[arg(long = "client")]
    clients: Vec<String>,
}

// ── Main ─────────────────────────────────────────────────────────

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    // --gen-config: dump defaults and exit.
    if cli.gen_config {
        let text = toml::to_string_pretty(&ServerConfig::default())?;
        println!("{text}");
        return Ok(());
    }

    // Load config.
    let mut config = ServerConfig::load(&cli.config);
    if let Some(port) = cli.port {
        config.network.listen_port = port;
    }

    // Init tracing.
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&config.logging.level));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    info!("remgui-server v{}", env!("CARGO_PKG_VERSION"));
    info!("listen port: {}", config.network.listen_port);
    info!("client slots: {}", config.network.max_clients);

    let server = Server::new(config);
    let stop = server.stop_handle();

    // Ctrl-C handler.
    tokio::spawn(async move {
        tokio::signal::ctrl_c().await.ok();
        info!("Ctrl-C received, shutting down");
        stop.store(false, std::sync::atomic::Ordering::SeqCst);
    });

    // Reverse connections requested on the command line.
    for addr in &cli.clients {
        if let Err(e) = server.connect_to_client(addr.as_str()).await {
            tracing::warn!("reverse connect to {addr} failed: {e}");
        }
    }

    server.run().await?;

    Ok(())
}
