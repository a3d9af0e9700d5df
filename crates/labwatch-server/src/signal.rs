use labwatch_scheduler::SchedulerHandle;
use tokio::signal;
use tracing::{info, warn};

/// 等待 SIGINT / SIGTERM，然后请求调度器停止
pub async fn stop_on_signal(handle: SchedulerHandle) {
    match wait_for_signal().await {
        Ok(name) => info!(signal = name, "Shutdown signal received"),
        Err(e) => {
            warn!(error = %e, "Failed to listen for shutdown signals");
            return;
        }
    }
    handle.stop().await;
}

#[cfg(unix)]
async fn wait_for_signal() -> std::io::Result<&'static str> {
    use signal::unix::{signal, SignalKind};

    let mut sigterm = signal(SignalKind::terminate())?;
    let mut sigint = signal(SignalKind::interrupt())?;

    tokio::select! {
        _ = sigterm.recv() => Ok("SIGTERM"),
        _ = sigint.recv() => Ok("SIGINT"),
    }
}

#[cfg(not(unix))]
async fn wait_for_signal() -> std::io::Result<&'static str> {
    signal::ctrl_c().await?;
    Ok("Ctrl+C")
}
