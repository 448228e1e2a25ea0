//! CLI-driven search engine.
//!
//! Spawns the external search tool and parses its pipe-delimited
//! `RESULT|:|` records incrementally as output arrives. Used when native
//! search is disabled, for the `*` feed query, and as the fallback when the
//! upstream API fails. On a clean exit, matching off-schedule episodes are
//! merged in; a nonzero exit fails the search.

use std::collections::HashSet;
use std::process::Stdio;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::process::Command;
use tracing::{debug, warn};

use crate::config::{CliToolConfig, SearchConfig};
use crate::metrics;
use crate::offschedule::OffScheduleCache;
use crate::procio::spawn_line_reader;
use crate::synonyms::Synonym;

use super::title::{infer_kind, parse_display_title};
use super::types::{
    MediaKind, Pagination, SearchEngine, SearchError, SearchFilters, SearchResponse, SearchResult,
    SourceRequest,
};

const RESULT_TAG: &str = "RESULT";
const FIELD_SEP: &str = "|:|";

pub struct CliEngine {
    cli: CliToolConfig,
    search_config: SearchConfig,
    offschedule: Arc<OffScheduleCache>,
}

impl CliEngine {
    pub fn new(
        cli: CliToolConfig,
        search_config: SearchConfig,
        offschedule: Arc<OffScheduleCache>,
    ) -> Self {
        Self {
            cli,
            search_config,
            offschedule,
        }
    }

    fn build_args(&self, term: &str, synonym: Option<&Synonym>) -> Vec<String> {
        let mut args: Vec<String> = self
            .cli
            .search_args
            .iter()
            .map(|a| a.replace("{term}", term))
            .collect();
        if let Some(synonym) = synonym {
            let exemptions = synonym.exemption_list();
            if !exemptions.is_empty() {
                args.push("--exclude".to_string());
                args.push(exemptions.join(","));
            }
        }
        args
    }

    async fn run_search(
        &self,
        term: &str,
        synonym: Option<&Synonym>,
    ) -> Result<Vec<SearchResult>, SearchError> {
        let args = self.build_args(term, synonym);
        debug!(tool = %self.cli.path.display(), args = ?args, "Spawning search tool");

        let mut child = Command::new(&self.cli.path)
            .args(&args)
            .stdout(Stdio::piped())
            .stderr(Stdio::null())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| SearchError::CliSpawn(e.to_string()))?;

        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| SearchError::CliSpawn("stdout not piped".to_string()))?;

        // Parse records as they arrive rather than buffering the full output.
        let mut lines = spawn_line_reader(stdout);
        let mut results = Vec::new();
        while let Some(line) = lines.recv().await {
            if let Some(result) = parse_result_line(&line, term) {
                results.push(result);
            }
        }

        let status = child
            .wait()
            .await
            .map_err(|e| SearchError::CliSpawn(e.to_string()))?;
        if !status.success() {
            return Err(SearchError::CliFailed(status.code().unwrap_or(-1)));
        }
        Ok(results)
    }

    /// Append off-schedule episodes matching `term`, dedup by id, honouring
    /// any season/episode constraint. Failures here degrade to no
    /// augmentation.
    fn merge_offschedule(
        &self,
        results: &mut Vec<SearchResult>,
        term: &str,
        filters: &SearchFilters,
    ) {
        let extra = match self.offschedule.search(term) {
            Ok(extra) => extra,
            Err(e) => {
                warn!(term = term, error = %e, "Off-schedule lookup failed");
                return;
            }
        };
        let present: HashSet<String> = results.iter().map(|r| r.id.clone()).collect();
        for item in extra {
            if !present.contains(&item.id) && filters.matches_episode(item.series, item.episode) {
                results.push(item);
            }
        }
    }
}

#[async_trait]
impl SearchEngine for CliEngine {
    fn name(&self) -> &str {
        "cli"
    }

    async fn search(
        &self,
        term: &str,
        synonym: Option<&Synonym>,
        page: usize,
        filters: &SearchFilters,
    ) -> Result<SearchResponse, SearchError> {
        metrics::SEARCHES_EXECUTED.with_label_values(&["cli"]).inc();
        let mut results = self.run_search(term, synonym).await?;
        self.merge_offschedule(&mut results, term, filters);

        let per_page = self.search_config.results_per_page.max(1);
        let total_results = results.len();
        let total_pages = total_results.div_ceil(per_page);
        let page = page.max(1);
        let start = (page - 1) * per_page;
        let results = if start < results.len() {
            results
                .drain(start..(start + per_page).min(total_results))
                .collect()
        } else {
            Vec::new()
        };

        Ok(SearchResponse {
            results,
            facets: Vec::new(),
            pagination: Pagination {
                page,
                total_pages,
                total_results,
            },
        })
    }
}

/// Parse one `RESULT|:|<pid>|:|<type>|:|<title>|:|<episode>|:|<channel>`
/// record. Lines without the tag or with too few fields are ignored.
fn parse_result_line(line: &str, term: &str) -> Option<SearchResult> {
    let mut fields = line.split(FIELD_SEP);
    if fields.next() != Some(RESULT_TAG) {
        return None;
    }
    let pid = fields.next()?.trim();
    let media_type = fields.next()?.trim();
    let name = fields.next()?.trim();
    if pid.is_empty() || name.is_empty() {
        return None;
    }
    let episode_field = fields.next().map(str::trim).unwrap_or_default();
    let channel = fields
        .next()
        .map(str::trim)
        .filter(|c| !c.is_empty())
        .map(String::from);

    // Series/episode structure lives inside the title strings.
    let display = if episode_field.is_empty() {
        name.to_string()
    } else {
        format!("{}: {}", name, episode_field)
    };
    let parsed = parse_display_title(&display);

    let kind = match media_type.to_lowercase().as_str() {
        "tv" => MediaKind::Tv,
        "movie" | "film" | "films" => MediaKind::Movie,
        _ => infer_kind(&parsed, None),
    };

    Some(SearchResult {
        id: pid.to_string(),
        title: parsed.show,
        channel,
        kind,
        series: parsed.series,
        episode: parsed.episode,
        episode_title: parsed.episode_title,
        size_bytes: None,
        publish_date: None,
        request: SourceRequest {
            term: term.to_string(),
            raw_line: Some(line.to_string()),
        },
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::kvstore::MemoryKvStore;
    use crate::testing::MockCatchupService;
    use std::path::PathBuf;

    fn offschedule() -> Arc<OffScheduleCache> {
        Arc::new(OffScheduleCache::new(
            Arc::new(MemoryKvStore::new()),
            Arc::new(MockCatchupService::new()),
        ))
    }

    fn shell_engine(script: &str) -> CliEngine {
        CliEngine::new(
            CliToolConfig {
                path: PathBuf::from("/bin/sh"),
                search_args: vec!["-c".to_string(), script.to_string()],
                download_args: vec![],
            },
            SearchConfig::default(),
            offschedule(),
        )
    }

    #[test]
    fn test_parse_result_line_full_record() {
        let line = "RESULT|:|m0000001|:|tv|:|Gladiators|:|Series 2 - Episode 3|:|BBC One";
        let result = parse_result_line(line, "gladiators").unwrap();
        assert_eq!(result.id, "m0000001");
        assert_eq!(result.title, "Gladiators");
        assert_eq!(result.series, Some(2));
        assert_eq!(result.episode, Some(3));
        assert_eq!(result.channel.as_deref(), Some("BBC One"));
        assert_eq!(result.kind, MediaKind::Tv);
        assert_eq!(result.request.raw_line.as_deref(), Some(line));
    }

    #[test]
    fn test_parse_result_line_ignores_untagged() {
        assert!(parse_result_line("INFO: scanning cache", "x").is_none());
        assert!(parse_result_line("", "x").is_none());
    }

    #[test]
    fn test_parse_result_line_minimal_fields() {
        let result = parse_result_line("RESULT|:|m0000002|:|tv|:|Panorama", "panorama").unwrap();
        assert_eq!(result.title, "Panorama");
        assert_eq!(result.series, None);
        assert!(result.channel.is_none());
    }

    #[test]
    fn test_build_args_substitutes_term_and_exemptions() {
        let engine = CliEngine::new(
            CliToolConfig {
                path: PathBuf::from("/usr/bin/fetcher"),
                search_args: vec!["search".to_string(), "{term}".to_string()],
                download_args: vec![],
            },
            SearchConfig::default(),
            offschedule(),
        );
        let synonym = Synonym {
            id: "1".to_string(),
            from: "Gladiators".to_string(),
            target: "Gladiators".to_string(),
            exemptions: "Celebrity, Kids".to_string(),
            season_offset: 0,
        };
        let args = engine.build_args("gladiators", Some(&synonym));
        assert_eq!(
            args,
            vec!["search", "gladiators", "--exclude", "Celebrity,Kids"]
        );
    }

    #[tokio::test]
    async fn test_search_parses_process_output() {
        let engine = shell_engine(
            "printf 'RESULT|:|m0000001|:|tv|:|Gladiators|:|Series 1 - Episode 1|:|BBC One\\n'; \
             printf 'noise line\\n'; \
             printf 'RESULT|:|m0000002|:|tv|:|Gladiators|:|Series 1 - Episode 2|:|BBC One\\n'",
        );
        let response = engine
            .search("gladiators", None, 1, &SearchFilters::default())
            .await
            .unwrap();
        assert_eq!(response.pagination.total_results, 2);
        assert_eq!(response.results[1].episode, Some(2));
    }

    #[tokio::test]
    async fn test_nonzero_exit_fails_search() {
        let engine = shell_engine("exit 3");
        let err = engine
            .search("gladiators", None, 1, &SearchFilters::default())
            .await;
        assert!(matches!(err, Err(SearchError::CliFailed(3))));
    }

    #[tokio::test]
    async fn test_missing_binary_is_spawn_error() {
        let engine = CliEngine::new(
            CliToolConfig {
                path: PathBuf::from("/nonexistent/fetcher"),
                search_args: vec![],
                download_args: vec![],
            },
            SearchConfig::default(),
            offschedule(),
        );
        let err = engine.search("x", None, 1, &SearchFilters::default()).await;
        assert!(matches!(err, Err(SearchError::CliSpawn(_))));
    }
}
