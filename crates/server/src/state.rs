use std::sync::Arc;

use catcharr_core::{
    Config, DownloadQueue, History, OffScheduleCache, SanitizedConfig, SearchResolver,
    SynonymStore,
};

/// Shared application state
pub struct AppState {
    config: Config,
    resolver: SearchResolver,
    queue: Arc<DownloadQueue>,
    history: Arc<dyn History>,
    synonyms: Arc<SynonymStore>,
    offschedule: Arc<OffScheduleCache>,
}

impl AppState {
    pub fn new(
        config: Config,
        resolver: SearchResolver,
        queue: Arc<DownloadQueue>,
        history: Arc<dyn History>,
        synonyms: Arc<SynonymStore>,
        offschedule: Arc<OffScheduleCache>,
    ) -> Self {
        Self {
            config,
            resolver,
            queue,
            history,
            synonyms,
            offschedule,
        }
    }

    pub fn sanitized_config(&self) -> SanitizedConfig {
        SanitizedConfig::from(&self.config)
    }

    pub fn resolver(&self) -> &SearchResolver {
        &self.resolver
    }

    pub fn queue(&self) -> &Arc<DownloadQueue> {
        &self.queue
    }

    pub fn history(&self) -> &dyn History {
        self.history.as_ref()
    }

    pub fn synonyms(&self) -> &SynonymStore {
        &self.synonyms
    }

    pub fn offschedule(&self) -> &OffScheduleCache {
        &self.offschedule
    }
}
