/// Endpoint Keyring - frontend client identity service
use anyhow::Context as _;
use endpoint_keyring::{
    config::{LoggingConfig, ServerConfig, DEFAULT_LOG_FILTER},
    server, AppContext,
};
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load configuration
    let config = ServerConfig::from_env().context("Failed to load configuration")?;

    // Initialize logging
    init_tracing(&config.logging);

    // Print banner
    print_banner();

    // Create application context
    let ctx = AppContext::new(config)
        .await
        .context("Failed to initialize keyring")?;

    // Ctrl-C cancels the shared token; the server and background tasks follow
    let shutdown = ctx.shutdown.clone();
    tokio::spawn(async move {
        match tokio::signal::ctrl_c().await {
            Ok(()) => info!("Shutdown requested"),
            Err(e) => warn!("Failed to listen for Ctrl-C: {}", e),
        }
        shutdown.cancel();
    });

    // Start server
    let result = server::serve(ctx.clone()).await;

    ctx.shutdown().await;
    info!("Background tasks stopped");

    result.context("Server failed")?;
    Ok(())
}

fn init_tracing(logging: &LoggingConfig) {
    let filter = EnvFilter::try_new(&logging.level).unwrap_or_else(|_| DEFAULT_LOG_FILTER.into());

    let (json, text) = if logging.json {
        (Some(tracing_subscriber::fmt::layer().json()), None)
    } else {
        (None, Some(tracing_subscriber::fmt::layer()))
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(json)
        .with(text)
        .init();
}

fn print_banner() {
    println!(
        r#"
    ==========================================
      Endpoint Keyring
      Client identity frontend v{}
    ==========================================
        "#,
        env!("CARGO_PKG_VERSION")
    );
}
