pub mod server;
pub mod tracing;

use crate::adapter::daily_file::DailyFilePersister;
use crate::config;
use crate::error::IngestError;
use crate::port::BatchPersister;
use crate::session::SessionConfig;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

/// Application entry point. Initializes tracing, configuration, and starts the ingestion server.
pub async fn run() -> Result<(), IngestError> {
    // Handle healthcheck subcommand (for Docker healthcheck in distroless image)
    let mut args = std::env::args().skip(1);
    if args.next().as_deref() == Some("healthcheck") {
        let result = match args.next().map(|port| port.parse::<u16>()) {
            Some(Ok(port)) => crate::healthcheck_with_port(port).await,
            Some(Err(e)) => {
                eprintln!("Invalid healthcheck port: {e}");
                std::process::exit(1)
            }
            None => crate::healthcheck().await,
        };
        match result {
            Ok(()) => std::process::exit(0),
            Err(e) => {
                eprintln!("{e}");
                std::process::exit(1)
            }
        }
    }

    let settings = config::get_configuration()?;
    tracing::init_tracing(settings.log_format);
    ::tracing::info!(
        base_dir = %settings.base_dir.display(),
        flush_interval = ?settings.flush_interval(),
        idle_timeout = ?settings.idle_timeout(),
        max_connections = settings.max_connections,
        "Loaded settings"
    );

    let persister: Arc<dyn BatchPersister> = Arc::new(DailyFilePersister::new(&settings.base_dir));
    let listener = server::bind(&settings.bind_address()).await?;

    // Cancelled by SIGINT/SIGTERM; every session derives its shutdown token from it.
    let shutdown_token = CancellationToken::new();
    let signal_token = shutdown_token.clone();
    tokio::spawn(async move {
        server::shutdown_signal().await;
        signal_token.cancel();
    });

    server::serve(
        listener,
        SessionConfig::from(&settings),
        persister,
        settings.max_connections,
        shutdown_token,
    )
    .await
}
