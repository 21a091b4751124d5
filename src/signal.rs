//! Signal handling for graceful shutdown.
//!
//! This module provides centralized Ctrl+C handling for GymGate. A shared
//! `AtomicBool` records that shutdown was requested, and a `tokio::sync::Notify`
//! wakes any task currently awaiting [`ShutdownHandler::cancelled`], which is how
//! pending record store calls get abandoned.
//!
//! # Usage
//!
//! ```rust,no_run
//! use gymgate::signal::install_handler;
//!
//! let handler = install_handler().expect("Failed to install signal handler");
//!
//! if handler.is_shutdown_requested() {
//!     println!("Shutdown requested, cleaning up...");
//! }
//! ```
//!
//! # Exit Codes
//!
//! When a signal is received:
//! - The shutdown flag is set to `true` and waiters are woken
//! - A message "Interrupted. Cleaning up..." is printed to stderr
//! - The application should exit with code 130 (128 + SIGINT)

use std::io::Write;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, OnceLock};
use tokio::sync::Notify;

/// Exit code for SIGINT (Ctrl+C) interruption.
/// This follows Unix convention: 128 + signal number (SIGINT = 2).
pub const EXIT_CODE_INTERRUPTED: i32 = 130;

/// Centralized shutdown handler.
///
/// Cloning shares the underlying flag and notifier.
#[derive(Debug, Clone)]
pub struct ShutdownHandler {
    flag: Arc<AtomicBool>,
    notify: Arc<Notify>,
}

impl ShutdownHandler {
    /// Create a new shutdown handler with no shutdown requested.
    #[must_use]
    pub fn new() -> Self {
        Self {
            flag: Arc::new(AtomicBool::new(false)),
            notify: Arc::new(Notify::new()),
        }
    }

    /// Check if shutdown has been requested.
    #[must_use]
    pub fn is_shutdown_requested(&self) -> bool {
        self.flag.load(Ordering::SeqCst)
    }

    /// Request shutdown and wake every task waiting in [`Self::cancelled`].
    pub fn request_shutdown(&self) {
        self.flag.store(true, Ordering::SeqCst);
        self.notify.notify_waiters();
    }

    /// Resolve once shutdown has been requested.
    ///
    /// Returns immediately if it already was.
    pub async fn cancelled(&self) {
        loop {
            // Register before checking the flag so a concurrent request is not missed
            let notified = self.notify.notified();
            if self.is_shutdown_requested() {
                return;
            }
            notified.await;
        }
    }

    /// Reset the shutdown flag to `false`.
    ///
    /// This is primarily useful for testing scenarios where you want to
    /// reuse a handler.
    pub fn reset(&self) {
        self.flag.store(false, Ordering::SeqCst);
    }
}

impl Default for ShutdownHandler {
    fn default() -> Self {
        Self::new()
    }
}

/// Error type for signal handler installation.
#[derive(Debug, thiserror::Error)]
pub enum SignalError {
    /// Failed to install the Ctrl+C handler.
    #[error("Failed to install signal handler: {0}")]
    InstallFailed(#[from] ctrlc::Error),
}

static GLOBAL_HANDLER: OnceLock<ShutdownHandler> = OnceLock::new();

/// Install a Ctrl+C handler that requests shutdown on interrupt.
///
/// Call once, early in startup. If a handler is already installed (e.g. when
/// tests call `run_app()` repeatedly) the existing one is reset and returned,
/// and if the hook cannot be registered at all an unhooked handler is returned
/// that still supports manual [`ShutdownHandler::request_shutdown`].
///
/// # Errors
///
/// Currently always succeeds; the `Result` is kept for callers that match on it.
pub fn install_handler() -> Result<ShutdownHandler, SignalError> {
    if let Some(handler) = GLOBAL_HANDLER.get() {
        handler.reset();
        return Ok(handler.clone());
    }

    let handler = ShutdownHandler::new();
    let hooked = handler.clone();

    match ctrlc::set_handler(move || {
        hooked.request_shutdown();

        // stderr is line-buffered, flush explicitly
        let _ = writeln!(std::io::stderr(), "\nInterrupted. Cleaning up...");
        let _ = std::io::stderr().flush();

        log::info!("Shutdown signal received");
    }) {
        Ok(()) => {
            let _ = GLOBAL_HANDLER.set(handler.clone());
            Ok(handler)
        }
        Err(_) => {
            if let Some(handler) = GLOBAL_HANDLER.get() {
                handler.reset();
                Ok(handler.clone())
            } else {
                log::debug!("Ctrl+C handler already registered, using unhooked handler");
                let fallback = ShutdownHandler::new();
                let _ = GLOBAL_HANDLER.set(fallback.clone());
                Ok(fallback)
            }
        }
    }
}
