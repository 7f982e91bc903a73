//! Ctrl-C / SIGTERM handling.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

/// Install a handler that raises the returned flag on the first signal and
/// exits the process on the second.
pub fn install_signal_handler() -> Result<Arc<AtomicBool>, ctrlc::Error> {
    let shutdown = Arc::new(AtomicBool::new(false));
    let flag = shutdown.clone();

    ctrlc::set_handler(move || {
        if flag.swap(true, Ordering::SeqCst) {
            tracing::warn!("second signal received, exiting immediately");
            std::process::exit(1);
        }
        tracing::info!("shutdown signal received, terminating kernel");
    })?;

    Ok(shutdown)
}
