// src/session.rs

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::info;

/// Cooperative run flag shared by the producer, the processing loop and the
/// signal handler. Loops poll it once per iteration.
#[derive(Debug)]
pub struct Session {
    running: AtomicBool,
}

impl Session {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            running: AtomicBool::new(true),
        })
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::Acquire)
    }

    pub fn stop(&self) {
        if self.running.swap(false, Ordering::AcqRel) {
            info!("Session stop requested");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stop_is_sticky() {
        let session = Session::new();
        assert!(session.is_running());
        session.stop();
        session.stop();
        assert!(!session.is_running());
    }
}
