pub mod cache;
pub mod config;
pub mod history;
pub mod kvstore;
pub mod metrics;
pub mod notify;
pub mod offschedule;
pub mod procio;
pub mod queue;
pub mod reranker;
pub mod search;
pub mod synonyms;
pub mod testing;
pub mod upstream;

pub use cache::SearchResultCache;
pub use config::{
    load_config, load_config_from_str, validate_config, CliToolConfig, Config, ConfigError,
    DownloadConfig, QualityConfig, SanitizedConfig, SearchConfig, ServerConfig, StoreConfig,
    UpstreamConfig,
};
pub use history::{History, HistoryEntry, HistoryError, HistoryStatus, SqliteHistory};
pub use kvstore::{KvError, KvStore, MemoryKvStore, SqliteKvStore};
pub use notify::{LogSink, NotificationSink, Topic};
pub use offschedule::{
    spawn_refresh_loop, OffScheduleCache, OffScheduleDef, OffScheduleError,
};
pub use queue::{
    spawn_sweep_loop, sweep_stale_dirs, DownloadDetails, DownloadQueue, QueueEntry, QueueError,
    QueueStatus,
};
pub use search::{
    CliEngine, MediaKind, NativeEngine, SearchEngine, SearchFilters, SearchResolver,
    SearchResponse, SearchResult,
};
pub use synonyms::{Synonym, SynonymStore};
pub use upstream::{
    CatchupService, HttpCatchupService, ProgrammeDetails, ProgrammeHit, ProgrammeKind,
    UpstreamError,
};
