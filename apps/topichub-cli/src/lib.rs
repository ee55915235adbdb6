//! Wiring shared by the `topichub` and `topichub-server` binaries.

use std::sync::Arc;

use topichub_compute::{DisabledAnalyzer, HeuristicAnalyzer, KeywordLabeler, LocalCompute};
use topichub_core::config::Settings;
use topichub_core::traits::SuggestionAnalyzer;
use topichub_session::{InMemoryCheckpointStore, InMemorySessionRepository, SessionService, TracingAuditLog};
use tracing_subscriber::EnvFilter;

/// Installs the fmt subscriber; `RUST_LOG` overrides the `info` default.
pub fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt().with_env_filter(filter).with_target(false).init();
}

/// Builds the service with the in-process collaborators.
pub fn build_service(settings: Settings) -> SessionService {
    let analyzer: Arc<dyn SuggestionAnalyzer> = if settings.suggestions.enabled {
        Arc::new(HeuristicAnalyzer::default())
    } else {
        Arc::new(DisabledAnalyzer)
    };
    let repo = Arc::new(InMemorySessionRepository::new(&settings.session));
    let checkpoints = Arc::new(InMemoryCheckpointStore::new(settings.checkpoints.max_depth));
    SessionService::new(Arc::new(settings), repo, Arc::new(LocalCompute::new()))
        .with_analyzer(analyzer)
        .with_checkpoints(checkpoints)
        .with_audit(Arc::new(TracingAuditLog))
        .with_labeler(Arc::new(KeywordLabeler))
}
