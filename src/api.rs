//! HTTP API for the fire session workflow

mod handlers;
mod types;

pub use handlers::create_router;
#[allow(unused_imports)] // Public API re-exports
pub use types::*;

use crate::runtime::WorkflowRuntime;
use std::sync::Arc;

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    pub runtime: Arc<WorkflowRuntime>,
}

impl AppState {
    pub fn new(runtime: WorkflowRuntime) -> Self {
        Self {
            runtime: Arc::new(runtime),
        }
    }
}
