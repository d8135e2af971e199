use std::sync::{
    Arc,
    atomic::{AtomicBool, Ordering},
};
use tracing::{info, warn};

/// Set once Ctrl-C is pressed; the batch runner checks it between books.
#[derive(Clone, Debug, Default)]
pub struct InterruptFlag {
    raised: Arc<AtomicBool>,
}

impl InterruptFlag {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a flag raised by the process Ctrl-C handler.
    pub fn install() -> Self {
        let flag = Self::new();
        let handler = flag.clone();
        if let Err(err) = ctrlc::set_handler(move || {
            info!("Received Ctrl+C; stopping after the current book");
            handler.raise();
        }) {
            warn!("Failed to install Ctrl+C signal handler: {err}");
        }
        flag
    }

    pub fn raise(&self) {
        self.raised.store(true, Ordering::Release);
    }

    pub fn is_raised(&self) -> bool {
        self.raised.load(Ordering::Acquire)
    }
}
