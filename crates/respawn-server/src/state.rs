use std::sync::atomic::AtomicBool;
use std::sync::Arc;

use respawn_core::Reconciler;

/// Shared application state passed to all route handlers.
#[derive(Clone)]
pub struct AppState {
    pub reconciler: Arc<Reconciler>,
    /// Readiness flag owned by the reconciler's scheduler; the only state
    /// the liveness endpoint exposes.
    pub ready: Arc<AtomicBool>,
}

impl AppState {
    pub fn new(reconciler: Arc<Reconciler>) -> Self {
        let ready = reconciler.readiness();
        AppState { reconciler, ready }
    }
}
