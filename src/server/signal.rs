// Signal handling module
//
// Supported signals:
// - SIGHUP:  Rescan the resource root
// - SIGTERM: Graceful shutdown
// - SIGINT:  Graceful shutdown (Ctrl+C)

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::Notify;

use crate::center::ResourceCenter;
use crate::logger;

/// Signal handler state
pub struct SignalHandler {
    /// Shutdown signal (SIGTERM, SIGINT)
    pub shutdown: Arc<Notify>,
    /// Whether shutdown has been requested
    pub shutdown_requested: Arc<AtomicBool>,
}

impl SignalHandler {
    pub fn new() -> Self {
        Self {
            shutdown: Arc::new(Notify::new()),
            shutdown_requested: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Mark shutdown and wake everything waiting on it
    pub fn request_shutdown(&self) {
        self.shutdown_requested.store(true, Ordering::SeqCst);
        self.shutdown.notify_waiters();
    }

    pub fn is_shutdown_requested(&self) -> bool {
        self.shutdown_requested.load(Ordering::SeqCst)
    }
}

impl Default for SignalHandler {
    fn default() -> Self {
        Self::new()
    }
}

/// Rescan off the async workers; new and changed files are picked up,
/// entries younger than the reload interval are kept.
fn rescan(center: &Arc<ResourceCenter>) {
    let center = Arc::clone(center);
    tokio::task::spawn_blocking(move || {
        let count = center.initialize();
        logger::log_info(&format!("[Signal] Rescan finished, {count} resources"));
    });
}

/// Start signal handlers (Unix only)
///
/// | Signal  | Action          |
/// |---------|-----------------|
/// | SIGHUP  | Rescan root     |
/// | SIGTERM | Graceful stop   |
/// | SIGINT  | Graceful stop   |
#[cfg(unix)]
pub fn start_signal_handler(handler: Arc<SignalHandler>, center: Arc<ResourceCenter>) {
    use tokio::signal::unix::{signal, SignalKind};

    tokio::spawn(async move {
        let registered = (
            signal(SignalKind::hangup()),
            signal(SignalKind::terminate()),
            signal(SignalKind::interrupt()),
        );
        let (mut sighup, mut sigterm, mut sigint) = match registered {
            (Ok(hup), Ok(term), Ok(int)) => (hup, term, int),
            (Err(e), _, _) | (_, Err(e), _) | (_, _, Err(e)) => {
                logger::log_error(&format!("Failed to register signal handlers: {e}"));
                return;
            }
        };
        logger::log_debug(&format!(
            "[Signal] Handlers registered for process {}",
            std::process::id()
        ));

        loop {
            tokio::select! {
                _ = sighup.recv() => {
                    logger::log_info("[Signal] SIGHUP received, rescanning resources");
                    rescan(&center);
                }
                _ = sigterm.recv() => {
                    logger::log_info("[Signal] SIGTERM received, shutting down");
                    handler.request_shutdown();
                    break;
                }
                _ = sigint.recv() => {
                    logger::log_info("[Signal] SIGINT received, shutting down");
                    handler.request_shutdown();
                    break;
                }
            }
        }
    });
}

/// Non-Unix fallback: only Ctrl+C
#[cfg(not(unix))]
pub fn start_signal_handler(handler: Arc<SignalHandler>, _center: Arc<ResourceCenter>) {
    tokio::spawn(async move {
        if let Ok(()) = tokio::signal::ctrl_c().await {
            logger::log_info("[Signal] Ctrl+C received, shutting down");
            handler.request_shutdown();
        }
    });
}
