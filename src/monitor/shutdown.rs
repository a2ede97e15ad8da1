use tokio::select;
use tokio_util::sync::CancellationToken;

/// Cancels the token when the process is asked to stop. The probe child is
/// terminated with SIGTERM by the monitor, so on unix both Ctrl-C and
/// SIGTERM must trip the token for the graceful path to work.
pub async fn detect_shutdown(cancelation: CancellationToken) {
    #[cfg(unix)]
    {
        let mut term = match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
        {
            Ok(v) => v,
            Err(e) => {
                tracing::error!("Failed to install SIGTERM handler: {e}");
                let _ = tokio::signal::ctrl_c().await;
                cancelation.cancel();
                return;
            }
        };
        select! {
            _ = tokio::signal::ctrl_c() => {},
            _ = term.recv() => {},
        };
        cancelation.cancel();
    }
    #[cfg(not(unix))]
    {
        select! {
            _ = tokio::signal::ctrl_c() => {
                cancelation.cancel();
            },
        };
    }
}
