use crate::config::Config;
use crate::conversation_state::ConversationStore;
use crate::llm::TextGenerator;
use crate::notify::Notifier;
use crate::repository::CandidateRepository;
use crate::telephony::CallPlacer;

use std::sync::Arc;

pub struct AppState {
    pub config: Config,
    // call sid => interview session
    pub conversations: ConversationStore,
    pub generator: Arc<dyn TextGenerator>,
    pub repository: Arc<dyn CandidateRepository>,
    pub notifier: Arc<dyn Notifier>,
    pub telephony: Arc<dyn CallPlacer>,
}

impl AppState {
    /// Absolute url for a webhook path, rooted at the configured public base url.
    pub fn public_url(&self, path: &str) -> String {
        format!("{}{}", self.config.public_base_url, path)
    }
}
