use tokio::signal;
use tokio_util::sync::CancellationToken;

/// Returns a `CancellationToken` that is cancelled when the process receives
/// SIGINT (Ctrl-C) or, on unix, SIGTERM. Subsystems monitor the token and
/// drain gracefully.
pub fn shutdown_token() -> CancellationToken {
    let token = CancellationToken::new();
    let trigger = token.clone();

    tokio::spawn(async move {
        #[cfg(unix)]
        {
            let mut sigterm = match signal::unix::signal(signal::unix::SignalKind::terminate()) {
                Ok(sig) => sig,
                Err(e) => {
                    tracing::error!(error = %e, "failed to install SIGTERM handler");
                    return;
                }
            };
            tokio::select! {
                _ = signal::ctrl_c() => {
                    tracing::info!("interrupt received, shutting down");
                }
                _ = sigterm.recv() => {
                    tracing::info!("termination requested, shutting down");
                }
            }
        }
        #[cfg(not(unix))]
        {
            if signal::ctrl_c().await.is_ok() {
                tracing::info!("interrupt received, shutting down");
            }
        }

        trigger.cancel();
    });

    token
}
