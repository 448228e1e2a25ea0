//! Synonym definitions and term resolution.
//!
//! A synonym maps an indexer-facing title to the name the upstream catalogue
//! actually uses, optionally shifting series numbers and pinning extra
//! search terms the engines must exclude. Resolution runs before any engine
//! is consulted and before the cache key is derived, so synonym writes
//! invalidate cached results for both the old and new targets synchronously.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, info};
use uuid::Uuid;

use crate::cache::invalidate_term;
use crate::kvstore::{KvError, KvStore};

const SYNONYM_PREFIX: &str = "synonym";

#[derive(Debug, Error)]
pub enum SynonymError {
    #[error("Store error: {0}")]
    Store(#[from] KvError),
    #[error("Synonym not found: {0}")]
    NotFound(String),
    #[error("Invalid synonym: {0}")]
    Invalid(String),
}

/// A stored mapping from a search title to the upstream catalogue title.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Synonym {
    pub id: String,
    /// The title as searched for, matched case-insensitively.
    pub from: String,
    /// The title the upstream catalogue knows.
    pub target: String,
    /// Comma-separated terms the engines must exclude from results.
    #[serde(default)]
    pub exemptions: String,
    /// Added to the searched series number before matching upstream.
    #[serde(default)]
    pub season_offset: i32,
}

impl Synonym {
    pub fn exemption_list(&self) -> Vec<String> {
        self.exemptions
            .split(',')
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .collect()
    }
}

/// Outcome of resolving a raw search term.
#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedTerm {
    /// The term the engines should search for.
    pub term: String,
    /// The synonym that matched, if any.
    pub synonym: Option<Synonym>,
}

/// Resolve a raw search term against the known synonyms.
///
/// A trailing standalone 4-digit token is stripped first (indexers append
/// release years to disambiguate reboots) unless the request carried an
/// explicit series number, in which case the digits may be a series name.
/// Synonym lookup tries the raw term before the stripped one, so a synonym
/// registered with the year intact wins over year stripping. A term equal
/// to either side of a synonym attaches it, so searches for the upstream
/// title still pick up its exemptions and season offset.
pub fn resolve_term(input: &str, has_explicit_series: bool, synonyms: &[Synonym]) -> ResolvedTerm {
    let trimmed = input.trim();

    if let Some(synonym) = find_synonym(trimmed, synonyms) {
        return ResolvedTerm {
            term: synonym.target.clone(),
            synonym: Some(synonym.clone()),
        };
    }

    let stripped = if has_explicit_series {
        trimmed.to_string()
    } else {
        strip_trailing_year(trimmed)
    };

    if let Some(synonym) = find_synonym(&stripped, synonyms) {
        return ResolvedTerm {
            term: synonym.target.clone(),
            synonym: Some(synonym.clone()),
        };
    }

    ResolvedTerm {
        term: stripped,
        synonym: None,
    }
}

fn find_synonym<'a>(term: &str, synonyms: &'a [Synonym]) -> Option<&'a Synonym> {
    synonyms
        .iter()
        .find(|s| s.from.eq_ignore_ascii_case(term) || s.target.eq_ignore_ascii_case(term))
}

fn strip_trailing_year(term: &str) -> String {
    let Some((head, tail)) = term.rsplit_once(' ') else {
        return term.to_string();
    };
    if tail.len() == 4 && tail.chars().all(|c| c.is_ascii_digit()) {
        head.trim_end().to_string()
    } else {
        term.to_string()
    }
}

/// Key-value backed synonym store. Writes invalidate the search result
/// cache for every term the change could have keyed.
pub struct SynonymStore {
    store: Arc<dyn KvStore>,
}

impl SynonymStore {
    pub fn new(store: Arc<dyn KvStore>) -> Self {
        Self { store }
    }

    fn key(id: &str) -> String {
        format!("{}:{}", SYNONYM_PREFIX, id)
    }

    pub fn list(&self) -> Result<Vec<Synonym>, SynonymError> {
        let keys = self.store.scan_keys(&format!("{}:*", SYNONYM_PREFIX))?;
        let mut synonyms = Vec::with_capacity(keys.len());
        for key in keys {
            if let Some(raw) = self.store.get(&key)? {
                let synonym: Synonym = serde_json::from_str(&raw)
                    .map_err(|e| SynonymError::Invalid(e.to_string()))?;
                synonyms.push(synonym);
            }
        }
        synonyms.sort_by(|a, b| a.from.to_lowercase().cmp(&b.from.to_lowercase()));
        Ok(synonyms)
    }

    pub fn get(&self, id: &str) -> Result<Synonym, SynonymError> {
        let raw = self
            .store
            .get(&Self::key(id))?
            .ok_or_else(|| SynonymError::NotFound(id.to_string()))?;
        serde_json::from_str(&raw).map_err(|e| SynonymError::Invalid(e.to_string()))
    }

    /// Insert or update a synonym. Cached search results keyed by the old
    /// from/target (when updating) and the new from/target are evicted
    /// before the write returns.
    pub fn upsert(&self, mut synonym: Synonym) -> Result<Synonym, SynonymError> {
        if synonym.from.trim().is_empty() || synonym.target.trim().is_empty() {
            return Err(SynonymError::Invalid(
                "from and target must be non-empty".to_string(),
            ));
        }

        if synonym.id.is_empty() {
            synonym.id = Uuid::new_v4().to_string();
        } else if let Ok(previous) = self.get(&synonym.id) {
            self.invalidate(&previous)?;
        }

        self.invalidate(&synonym)?;
        let payload = serde_json::to_string(&synonym)
            .map_err(|e| SynonymError::Invalid(e.to_string()))?;
        self.store.set(&Self::key(&synonym.id), &payload, None)?;
        info!(from = %synonym.from, target = %synonym.target, "Stored synonym");
        Ok(synonym)
    }

    pub fn delete(&self, id: &str) -> Result<(), SynonymError> {
        let synonym = self.get(id)?;
        self.invalidate(&synonym)?;
        self.store.del(&Self::key(id))?;
        info!(from = %synonym.from, "Deleted synonym");
        Ok(())
    }

    fn invalidate(&self, synonym: &Synonym) -> Result<(), SynonymError> {
        let evicted = invalidate_term(self.store.as_ref(), &synonym.from)?
            + invalidate_term(self.store.as_ref(), &synonym.target)?;
        if evicted > 0 {
            debug!(from = %synonym.from, evicted = evicted, "Synonym write evicted cache entries");
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::kvstore::MemoryKvStore;

    fn synonym(from: &str, target: &str) -> Synonym {
        Synonym {
            id: String::new(),
            from: from.to_string(),
            target: target.to_string(),
            exemptions: String::new(),
            season_offset: 0,
        }
    }

    #[test]
    fn test_resolve_strips_trailing_year() {
        let resolved = resolve_term("Gladiators 2024", false, &[]);
        assert_eq!(resolved.term, "Gladiators");
        assert!(resolved.synonym.is_none());
    }

    #[test]
    fn test_resolve_keeps_year_with_explicit_series() {
        let resolved = resolve_term("Gladiators 2024", true, &[]);
        assert_eq!(resolved.term, "Gladiators 2024");
    }

    #[test]
    fn test_resolve_keeps_non_year_digits() {
        let resolved = resolve_term("Taskmaster 15", false, &[]);
        assert_eq!(resolved.term, "Taskmaster 15");
    }

    #[test]
    fn test_synonym_with_year_wins_over_stripping() {
        let mut s = synonym("Gladiators 2024", "Gladiators");
        s.id = "1".to_string();
        let resolved = resolve_term("Gladiators 2024", false, &[s.clone()]);
        assert_eq!(resolved.term, "Gladiators");
        assert_eq!(resolved.synonym, Some(s));
    }

    #[test]
    fn test_synonym_match_is_case_insensitive() {
        let mut s = synonym("doctor who", "Doctor Who (2005)");
        s.id = "1".to_string();
        let resolved = resolve_term("Doctor Who", false, &[s]);
        assert_eq!(resolved.term, "Doctor Who (2005)");
    }

    #[test]
    fn test_synonym_matches_by_target_side() {
        let mut s = synonym("Gladiators 2024", "Gladiators");
        s.id = "1".to_string();
        s.exemptions = "Celebrity".to_string();
        let resolved = resolve_term("gladiators", false, &[s.clone()]);
        assert_eq!(resolved.term, "Gladiators");
        assert_eq!(resolved.synonym, Some(s));
    }

    #[test]
    fn test_synonym_matches_after_year_strip() {
        let mut s = synonym("Doctor Who", "Doctor Who (2005)");
        s.id = "1".to_string();
        let resolved = resolve_term("Doctor Who 2005", false, &[s]);
        assert_eq!(resolved.term, "Doctor Who (2005)");
    }

    #[test]
    fn test_exemption_list_splits_and_trims() {
        let mut s = synonym("a", "b");
        s.exemptions = "Celebrity, Christmas Special ,".to_string();
        assert_eq!(
            s.exemption_list(),
            vec!["Celebrity".to_string(), "Christmas Special".to_string()]
        );
    }

    #[test]
    fn test_upsert_assigns_id_and_round_trips() {
        let store = SynonymStore::new(Arc::new(MemoryKvStore::new()));
        let stored = store.upsert(synonym("Doctor Who", "Doctor Who (2005)")).unwrap();
        assert!(!stored.id.is_empty());
        assert_eq!(store.get(&stored.id).unwrap(), stored);
        assert_eq!(store.list().unwrap(), vec![stored]);
    }

    #[test]
    fn test_upsert_rejects_empty_fields() {
        let store = SynonymStore::new(Arc::new(MemoryKvStore::new()));
        assert!(matches!(
            store.upsert(synonym("", "x")),
            Err(SynonymError::Invalid(_))
        ));
    }

    #[test]
    fn test_upsert_invalidates_old_and_new_targets() {
        let kv = Arc::new(MemoryKvStore::new());
        let store = SynonymStore::new(kv.clone());
        let stored = store.upsert(synonym("Doctor Who", "Doctor Who (2005)")).unwrap();

        kv.set("search:doctor who (2005):1:sec", "{}", None).unwrap();
        kv.set("search:doctor who (2023):1:sec", "{}", None).unwrap();

        let mut updated = stored;
        updated.target = "Doctor Who (2023)".to_string();
        store.upsert(updated).unwrap();

        assert!(kv.get("search:doctor who (2005):1:sec").unwrap().is_none());
        assert!(kv.get("search:doctor who (2023):1:sec").unwrap().is_none());
    }

    #[test]
    fn test_delete_invalidates_and_removes() {
        let kv = Arc::new(MemoryKvStore::new());
        let store = SynonymStore::new(kv.clone());
        let stored = store.upsert(synonym("Gladiators", "Gladiators (2024)")).unwrap();

        kv.set("search:gladiators:1:sec", "{}", None).unwrap();
        store.delete(&stored.id).unwrap();

        assert!(kv.get("search:gladiators:1:sec").unwrap().is_none());
        assert!(matches!(
            store.get(&stored.id),
            Err(SynonymError::NotFound(_))
        ));
    }
}
