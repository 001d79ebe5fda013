use crate::config::Config;
use crate::extraction::PdfExtractor;
use crate::llm_client::CompletionClient;
use crate::session::store::SessionStore;

/// Shared application state injected into all route handlers via Axum extractors.
#[derive(Clone)]
pub struct AppState {
    pub llm: CompletionClient,
    pub extractor: PdfExtractor,
    /// In-memory sessions. Nothing survives a restart.
    pub sessions: SessionStore,
    pub config: Config,
}

impl AppState {
    pub fn new(config: Config) -> Self {
        Self {
            llm: CompletionClient::new(config.completion_url.clone(), config.api_key.clone()),
            extractor: PdfExtractor::new(config.extract_temp_dir.clone()),
            sessions: SessionStore::default(),
            config,
        }
    }
}
