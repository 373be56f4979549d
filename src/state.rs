use std::sync::Arc;

use crate::config::AppConfig;
use crate::notify::{LogNotifier, Notifier};
use crate::routes::auth::Sessions;
use crate::store::ContentStore;

/// Shared handles passed to every handler.
#[derive(Clone)]
pub struct AppState {
    pub store: Arc<ContentStore>,
    pub config: Arc<AppConfig>,
    pub sessions: Arc<Sessions>,
    pub notifier: Arc<dyn Notifier>,
}

impl AppState {
    pub fn new(store: ContentStore, config: AppConfig) -> Self {
        Self {
            store: Arc::new(store),
            config: Arc::new(config),
            sessions: Arc::new(Sessions::default()),
            notifier: Arc::new(LogNotifier),
        }
    }

    pub fn with_notifier(mut self, notifier: Arc<dyn Notifier>) -> Self {
        self.notifier = notifier;
        self
    }
}
