//! services/api/src/web/state.rs
//!
//! Defines the application's shared state.

use crate::config::Config;
use solaudit_core::ports::{AnalysisService, HistoryStore, MailTransport};
use solaudit_core::session::SessionOrchestrator;
use std::sync::Arc;

/// The shared application state, created once at startup and passed to all handlers.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub history: Arc<dyn HistoryStore>,
    pub analysis: Arc<dyn AnalysisService>,
    pub mailer: Arc<dyn MailTransport>,
}

impl AppState {
    /// Builds a session orchestrator over the shared port handles.
    /// Orchestrators are cheap and constructed per request; sessions
    /// share nothing but the history store.
    pub fn orchestrator(&self) -> SessionOrchestrator {
        SessionOrchestrator::new(
            self.analysis.clone(),
            self.history.clone(),
            self.mailer.clone(),
            self.config.max_contract_bytes,
        )
    }
}
