//! Relevance re-ranking of upstream search hits.
//!
//! Upstream returns hits in broadcast order, which buries the programme a
//! user actually typed. Hits are indexed into an in-memory full-text index
//! and re-scored against the search term with fuzzy matching, so close
//! misspellings still rank. Any indexing or query failure degrades to the
//! input order rather than failing the search.

use tantivy::collector::TopDocs;
use tantivy::query::{BooleanQuery, BoostQuery, Occur, Query, QueryParser};
use tantivy::schema::{Field, Schema, Value, STORED, TEXT};
use tantivy::{doc, Index, TantivyDocument};
use thiserror::Error;
use tracing::warn;

#[derive(Debug, Error)]
enum RerankError {
    #[error("Index error: {0}")]
    Index(#[from] tantivy::TantivyError),
    #[error("Query error: {0}")]
    Query(#[from] tantivy::query::QueryParserError),
}

/// A candidate hit to be scored: an opaque id and the text to match on.
#[derive(Debug, Clone)]
pub struct RerankDoc {
    pub id: String,
    pub text: String,
}

/// Order `docs` by relevance to `term`.
///
/// Returns ids: matched docs first by descending score, then unmatched docs
/// in their input order. On any internal failure the input order is
/// returned unchanged.
pub fn rerank(term: &str, docs: &[RerankDoc]) -> Vec<String> {
    if docs.is_empty() || term.trim().is_empty() {
        return docs.iter().map(|d| d.id.clone()).collect();
    }

    match rank_ids(term, docs) {
        Ok(ranked) => {
            let mut ordered = ranked;
            // Unmatched docs keep their upstream order after the ranked set.
            for doc in docs {
                if !ordered.contains(&doc.id) {
                    ordered.push(doc.id.clone());
                }
            }
            ordered
        }
        Err(e) => {
            warn!(term = term, error = %e, "Re-ranking failed, keeping upstream order");
            docs.iter().map(|d| d.id.clone()).collect()
        }
    }
}

/// Ids of docs that actually match `term`, best first. Unlike [`rerank`],
/// non-matching docs are excluded; failures yield an empty set.
pub fn matches(term: &str, docs: &[RerankDoc]) -> Vec<String> {
    if docs.is_empty() || term.trim().is_empty() {
        return Vec::new();
    }
    match rank_ids(term, docs) {
        Ok(ids) => ids,
        Err(e) => {
            warn!(term = term, error = %e, "Match query failed");
            Vec::new()
        }
    }
}

struct RamIndex {
    index: Index,
    id_field: Field,
    text_field: Field,
}

fn build_index(docs: &[RerankDoc]) -> Result<RamIndex, RerankError> {
    let mut schema_builder = Schema::builder();
    let id_field = schema_builder.add_text_field("id", STORED);
    let text_field = schema_builder.add_text_field("text", TEXT);
    let schema = schema_builder.build();

    let index = Index::create_in_ram(schema);
    let mut writer = index.writer(15_000_000)?;
    for d in docs {
        writer.add_document(doc!(
            id_field => d.id.clone(),
            text_field => d.text.clone(),
        ))?;
    }
    writer.commit()?;

    Ok(RamIndex {
        index,
        id_field,
        text_field,
    })
}

fn rank_ids(term: &str, docs: &[RerankDoc]) -> Result<Vec<String>, RerankError> {
    let ram = build_index(docs)?;
    let reader = ram.index.reader()?;
    let searcher = reader.searcher();

    // Fuzzy term queries score every hit uniformly, which would leave the
    // matching docs in index order. Pairing the fuzzy clause with a boosted
    // exact clause lets BM25 pull exact and closer titles above fuzzy-only
    // hits.
    let sanitized = sanitize_query(term);
    let exact = QueryParser::for_index(&ram.index, vec![ram.text_field]).parse_query(&sanitized)?;
    let mut fuzzy_parser = QueryParser::for_index(&ram.index, vec![ram.text_field]);
    fuzzy_parser.set_field_fuzzy(ram.text_field, true, 1, true);
    let fuzzy = fuzzy_parser.parse_query(&sanitized)?;
    let query = BooleanQuery::new(vec![
        (
            Occur::Should,
            Box::new(BoostQuery::new(exact, 2.0)) as Box<dyn Query>,
        ),
        (Occur::Should, fuzzy),
    ]);

    let top = searcher.search(&query, &TopDocs::with_limit(docs.len().max(1)))?;

    let mut ids = Vec::with_capacity(top.len());
    for (_score, addr) in top {
        let stored: TantivyDocument = searcher.doc(addr)?;
        if let Some(id) = stored
            .get_first(ram.id_field)
            .and_then(|v| v.as_str())
        {
            ids.push(id.to_string());
        }
    }
    Ok(ids)
}

/// Strip query-parser syntax so user input is treated as plain terms.
fn sanitize_query(term: &str) -> String {
    term.chars()
        .map(|c| match c {
            '+' | '-' | '^' | '"' | '~' | '*' | '(' | ')' | '[' | ']' | '{' | '}' | ':' => ' ',
            other => other,
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn docs(titles: &[(&str, &str)]) -> Vec<RerankDoc> {
        titles
            .iter()
            .map(|(id, text)| RerankDoc {
                id: id.to_string(),
                text: text.to_string(),
            })
            .collect()
    }

    #[test]
    fn test_exact_title_ranks_first() {
        let docs = docs(&[
            ("a", "Celebrity Gladiators Special"),
            ("b", "Gladiators"),
            ("c", "Antiques Roadshow"),
        ]);
        let order = rerank("Gladiators", &docs);
        assert_eq!(order[0], "b");
        assert_eq!(order.len(), 3);
    }

    #[test]
    fn test_unmatched_docs_keep_input_order() {
        let docs = docs(&[
            ("a", "Antiques Roadshow"),
            ("b", "Gladiators"),
            ("c", "Bargain Hunt"),
        ]);
        let order = rerank("Gladiators", &docs);
        assert_eq!(order[0], "b");
        assert_eq!(&order[1..], &["a".to_string(), "c".to_string()]);
    }

    #[test]
    fn test_fuzzy_matches_near_misspelling() {
        let docs = docs(&[("a", "Bargain Hunt"), ("b", "Gladiators")]);
        let order = rerank("Gladiator", &docs);
        assert_eq!(order[0], "b");
    }

    #[test]
    fn test_empty_term_preserves_order() {
        let docs = docs(&[("a", "x"), ("b", "y")]);
        assert_eq!(rerank("  ", &docs), vec!["a".to_string(), "b".to_string()]);
    }

    #[test]
    fn test_query_syntax_is_neutralized() {
        let docs = docs(&[("a", "Who Do You Think You Are"), ("b", "Doctor Who")]);
        let order = rerank("\"Doctor Who (2005)", &docs);
        assert_eq!(order.len(), 2);
        assert_eq!(order[0], "b");
    }

    #[test]
    fn test_matches_excludes_non_matching() {
        let docs = docs(&[("a", "Antiques Roadshow"), ("b", "Gladiators")]);
        assert_eq!(matches("Gladiators", &docs), vec!["b".to_string()]);
    }

}
