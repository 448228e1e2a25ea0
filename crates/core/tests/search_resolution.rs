//! Search resolution integration tests.
//!
//! These drive the full native path end to end: synonym resolution, the
//! TTL cache, the upstream catalogue engine with aggregate expansion, and
//! the terminal filter pass.

use std::sync::Arc;

use chrono::{Duration, Utc};

use catcharr_core::{
    testing::{fixtures, MemoryKvStore, MockCatchupService},
    upstream::ProgrammeRef,
    CatchupService, CliEngine, CliToolConfig, NativeEngine, OffScheduleCache, QualityConfig,
    SearchConfig, SearchEngine, SearchFilters, SearchResolver, SearchResultCache, Synonym,
    SynonymStore, upstream::ProgrammeKind,
};

struct TestHarness {
    resolver: SearchResolver,
    api: Arc<MockCatchupService>,
    synonyms: Arc<SynonymStore>,
}

impl TestHarness {
    fn new() -> Self {
        let store: Arc<dyn catcharr_core::KvStore> = Arc::new(MemoryKvStore::new());
        let api = Arc::new(MockCatchupService::new());
        let search_config = SearchConfig {
            results_per_page: 20,
            ..Default::default()
        };
        let offschedule = Arc::new(OffScheduleCache::new(
            Arc::clone(&store),
            Arc::clone(&api) as Arc<dyn CatchupService>,
        ));
        let cli: Arc<dyn SearchEngine> = Arc::new(CliEngine::new(
            CliToolConfig {
                path: "/bin/false".into(),
                search_args: vec![],
                download_args: vec![],
            },
            search_config.clone(),
            Arc::clone(&offschedule),
        ));
        let native: Arc<dyn SearchEngine> = Arc::new(NativeEngine::new(
            Arc::clone(&api) as Arc<dyn CatchupService>,
            Arc::clone(&cli),
            search_config.clone(),
            QualityConfig::default(),
        ));
        let synonyms = Arc::new(SynonymStore::new(Arc::clone(&store)));
        let cache = SearchResultCache::new(
            Arc::clone(&store),
            std::time::Duration::from_secs(search_config.cache_ttl_secs),
        );
        let resolver = SearchResolver::new(
            Arc::clone(&synonyms),
            cache,
            native,
            cli,
            offschedule,
            true,
        );
        Self {
            resolver,
            api,
            synonyms,
        }
    }

    /// Seed a series aggregate with `count` broadcast episodes.
    fn seed_series(&self, term: &str, brand_id: &str, show: &str, count: u32) {
        self.api.set_hits(
            term,
            vec![fixtures::programme_hit(brand_id, show, ProgrammeKind::Series)],
        );
        let mut refs = Vec::new();
        for e in 1..=count {
            let id = format!("{}e{:02}", brand_id, e);
            refs.push(ProgrammeRef {
                id: id.clone(),
                title: format!("Episode {}", e),
            });
            self.api.add_details(fixtures::episode_details(&id, show, 1, e));
        }
        self.api.add_episodes(brand_id, refs);
    }
}

#[tokio::test]
async fn test_search_hits_upstream_once_then_serves_from_cache() {
    let t = TestHarness::new();
    t.seed_series("taskmaster", "b0000001", "Taskmaster", 3);

    let first = t
        .resolver
        .search("Taskmaster", 1, &SearchFilters::default())
        .await;
    assert_eq!(first.results.len(), 3);
    assert_eq!(t.api.search_calls().len(), 1);

    let second = t
        .resolver
        .search("Taskmaster", 1, &SearchFilters::default())
        .await;
    assert_eq!(second.results.len(), 3);
    // Served from cache, upstream untouched.
    assert_eq!(t.api.search_calls().len(), 1);
}

#[tokio::test]
async fn test_cached_results_keep_their_publish_date() {
    let t = TestHarness::new();
    t.seed_series("taskmaster", "b0000001", "Taskmaster", 1);

    let first = t
        .resolver
        .search("taskmaster", 1, &SearchFilters::default())
        .await;
    let original = first.results[0].publish_date.unwrap();

    let cached = t
        .resolver
        .search("taskmaster", 1, &SearchFilters::default())
        .await;
    assert_eq!(cached.results[0].publish_date, Some(original));
}

#[tokio::test]
async fn test_future_broadcasts_are_filtered_out() {
    let t = TestHarness::new();
    t.api.set_hits(
        "newsnight",
        vec![fixtures::programme_hit(
            "b0000002",
            "Newsnight",
            ProgrammeKind::Series,
        )],
    );
    t.api.add_episodes(
        "b0000002",
        vec![
            ProgrammeRef {
                id: "b0000002e01".to_string(),
                title: "Episode 1".to_string(),
            },
            ProgrammeRef {
                id: "b0000002e02".to_string(),
                title: "Episode 2".to_string(),
            },
        ],
    );
    let mut aired = fixtures::episode_details("b0000002e01", "Newsnight", 1, 1);
    aired.first_broadcast = Some(Utc::now() - Duration::hours(2));
    t.api.add_details(aired);
    let mut scheduled = fixtures::episode_details("b0000002e02", "Newsnight", 1, 2);
    scheduled.first_broadcast = Some(Utc::now() + Duration::hours(2));
    t.api.add_details(scheduled);

    let response = t
        .resolver
        .search("newsnight", 1, &SearchFilters::default())
        .await;
    assert_eq!(response.results.len(), 1);
    assert_eq!(response.results[0].id, "b0000002e01");
}

#[tokio::test]
async fn test_synonym_rewrites_term_before_upstream() {
    let t = TestHarness::new();
    t.synonyms
        .upsert(Synonym {
            id: String::new(),
            from: "Doctor Who".to_string(),
            target: "Doctor Who (2005)".to_string(),
            exemptions: String::new(),
            season_offset: 0,
        })
        .unwrap();
    t.seed_series("doctor who (2005)", "b0000003", "Doctor Who (2005)", 2);

    let response = t
        .resolver
        .search("Doctor Who", 1, &SearchFilters::default())
        .await;
    assert_eq!(response.results.len(), 2);
    assert_eq!(t.api.search_calls(), vec!["Doctor Who (2005)".to_string()]);
}

#[tokio::test]
async fn test_synonym_season_offset_shifts_requested_series() {
    let t = TestHarness::new();
    t.synonyms
        .upsert(Synonym {
            id: String::new(),
            from: "Renamed Show".to_string(),
            target: "Original Show".to_string(),
            exemptions: String::new(),
            season_offset: 2,
        })
        .unwrap();
    // Upstream numbers this as series 3; the caller asks for series 1.
    t.api.set_hits(
        "original show",
        vec![fixtures::programme_hit(
            "b0000004",
            "Original Show",
            ProgrammeKind::Series,
        )],
    );
    t.api.add_episodes(
        "b0000004",
        vec![ProgrammeRef {
            id: "b0000004e01".to_string(),
            title: "Episode 1".to_string(),
        }],
    );
    t.api
        .add_details(fixtures::episode_details("b0000004e01", "Original Show", 3, 1));

    let filters = SearchFilters {
        season: Some(1),
        ..Default::default()
    };
    let response = t.resolver.search("Renamed Show", 1, &filters).await;
    assert_eq!(response.results.len(), 1);
    assert_eq!(response.results[0].series, Some(3));
}

#[tokio::test]
async fn test_embedded_episode_token_constrains_results() {
    let t = TestHarness::new();
    t.seed_series("taskmaster", "b0000001", "Taskmaster", 4);

    let response = t
        .resolver
        .search("Taskmaster S01E03", 1, &SearchFilters::default())
        .await;
    assert_eq!(response.results.len(), 1);
    assert_eq!(response.results[0].episode, Some(3));
    // The stripped term is what reached upstream.
    assert_eq!(t.api.search_calls(), vec!["Taskmaster".to_string()]);
}

#[tokio::test]
async fn test_upstream_outage_returns_empty_not_error() {
    let t = TestHarness::new();
    t.api.fail_searches(true);

    // Native fails, the CLI fallback points at /bin/false, and the
    // resolver swallows the error into an empty page.
    let response = t
        .resolver
        .search("taskmaster", 1, &SearchFilters::default())
        .await;
    assert!(response.results.is_empty());
    assert_eq!(response.pagination.total_results, 0);
}

#[tokio::test]
async fn test_distinct_filters_are_cached_separately() {
    let t = TestHarness::new();
    t.seed_series("taskmaster", "b0000001", "Taskmaster", 3);

    let unfiltered = t
        .resolver
        .search("taskmaster", 1, &SearchFilters::default())
        .await;
    assert_eq!(unfiltered.results.len(), 3);

    let filters = SearchFilters {
        episode: Some(2),
        ..Default::default()
    };
    let filtered = t.resolver.search("taskmaster", 1, &filters).await;
    assert_eq!(filtered.results.len(), 1);
    assert_eq!(filtered.results[0].episode, Some(2));
}
