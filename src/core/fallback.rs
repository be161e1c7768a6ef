//! Last-resort channel for the pipeline's own diagnostics
//!
//! Sink failures, rejected records and shutdown problems cannot be logged
//! through the pipeline that produced them; they go here instead.

use std::sync::Arc;

/// Receives one diagnostic line per call
pub type FallbackHandler = Arc<dyn Fn(&str) + Send + Sync>;

/// Default handler: one line per diagnostic on stderr
pub fn stderr_fallback() -> FallbackHandler {
    Arc::new(|message: &str| eprintln!("{}", message))
}

/// Extract a printable message from a caught panic payload
pub(crate) fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "Unknown panic".to_string()
    }
}
