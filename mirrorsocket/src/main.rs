//! `mirrorsocket` binary: one plain and one TLS echo server, until Ctrl-C.

use mirrorsocket::prelude::*;
use mirrorsocket::server::logging::init_logging;
use std::process::ExitCode;

#[tokio::main]
async fn main() -> ExitCode {
    if let Err(e) = init_logging() {
        eprintln!("failed to initialize logging: {}", e);
        return ExitCode::FAILURE;
    }

    match run().await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!("{}", e);
            ExitCode::FAILURE
        }
    }
}

async fn run() -> Result<()> {
    let http = EchoServer::plain(ServerConfig::from_env(ServerKind::Plain)?)?;

    // Key generation is CPU-bound; keep it off the runtime threads.
    let https_config = ServerConfig::from_env(ServerKind::Secure)?;
    let https = tokio::task::spawn_blocking(move || EchoServer::secure(https_config))
        .await
        .map_err(|e| LifecycleError::Join(e.to_string()))??;

    tokio::try_join!(http.start(), https.start())?;

    tokio::signal::ctrl_c().await?;
    tracing::info!("Shutting down");

    let (http_stopped, https_stopped) = tokio::join!(http.stop(), https.stop());
    http_stopped.and(https_stopped)
}
