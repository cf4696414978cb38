//! Cooperative cancellation (spec §9's re-architecture of process-global
//! signal handlers into "a scoped cancellation token passed into backfill,
//! daemon, and build loops. Polled between windows / cycles / batches.").
//!
//! Grounded on `nautechsystems-nautilus_trader`'s `watch_live_blocks.rs`
//! signal-listener task, simplified from `Notify` (wakes a blocked waiter)
//! to a plain flag, since every caller here only needs to *poll* between
//! iterations, never block on the signal itself.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

#[derive(Clone, Default)]
pub struct ShutdownToken {
    flag: Arc<AtomicBool>,
}

impl ShutdownToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn should_stop(&self) -> bool {
        self.flag.load(Ordering::Relaxed)
    }

    pub fn trigger(&self) {
        self.flag.store(true, Ordering::Relaxed);
    }

    /// Spawns a listener task that flips the token on SIGINT/SIGTERM.
    #[cfg(unix)]
    pub fn install() -> Self {
        let token = Self::new();
        let triggered = token.clone();
        tokio::spawn(async move {
            let mut sigterm = tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
                .expect("failed to install SIGTERM listener");
            let mut sigint = tokio::signal::unix::signal(tokio::signal::unix::SignalKind::interrupt())
                .expect("failed to install SIGINT listener");
            tokio::select! {
                _ = sigterm.recv() => {}
                _ = sigint.recv() => {}
            }
            tracing::info!("shutdown signal received — finishing current batch before exit");
            triggered.trigger();
        });
        token
    }

    #[cfg(not(unix))]
    pub fn install() -> Self {
        let token = Self::new();
        let triggered = token.clone();
        tokio::spawn(async move {
            let _ = tokio::signal::ctrl_c().await;
            tracing::info!("shutdown signal received — finishing current batch before exit");
            triggered.trigger();
        });
        token
    }
}
