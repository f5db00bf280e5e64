//! Crate entrypoint wiring together configuration, the Cloudflare client,
//! the resolution watcher, and the rebind orchestrator.

pub mod api;
pub mod cloudflare;
pub mod config;
pub mod error;
pub mod rebind;
pub mod resolve;

use config::AppConfig;
use rebind::RebindOrchestrator;
use resolve::ResolutionWatcher;

use std::sync::Arc;

/// Complete application dependencies shared across sessions.
pub struct AppState {
    pub config: AppConfig,
    pub watcher: ResolutionWatcher,
    pub rebind: RebindOrchestrator,
}

/// Arc-wrapped version of `AppState` passed into Axum extensions.
pub type SharedState = Arc<AppState>;
