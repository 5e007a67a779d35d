//! Ranker (spec §4.7): term lookup, per-page aggregation, deterministic
//! top-K ordering via a max-heap.

use std::cmp::Ordering;
use std::collections::{BTreeSet, BinaryHeap, HashMap};

use crate::error::{Error, Result};
use crate::storage::Storage;
use crate::text;

const TOP_K: usize = 25;

/// One ranked result (spec §4.7 step 7).
#[derive(Debug, Clone, PartialEq)]
pub struct RankedPage {
    pub relevant_url: String,
    pub origin_urls: Vec<String>,
    pub depth: i64,
}

/// The response to a search query.
#[derive(Debug, Clone, PartialEq)]
pub struct Response {
    pub pages: Vec<RankedPage>,
}

/// Per-page aggregate before the final fetch-and-emit step.
#[derive(Debug, Clone)]
struct Candidate {
    page_id: i64,
    num_matched_terms: i64,
    matched_terms: BTreeSet<String>,
    origins: BTreeSet<String>,
}

impl Candidate {
    fn sort_key(&self) -> (i64, usize, usize) {
        (
            self.num_matched_terms,
            self.matched_terms.len(),
            self.origins.len(),
        )
    }
}

impl PartialEq for Candidate {
    fn eq(&self, other: &Self) -> bool {
        self.sort_key() == other.sort_key()
    }
}
impl Eq for Candidate {}

impl PartialOrd for Candidate {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Candidate {
    fn cmp(&self, other: &Self) -> Ordering {
        self.sort_key().cmp(&other.sort_key())
    }
}

/// Run the query through the text pipeline, aggregate matches per page, and
/// return the top 25 ranked by `(num_matched_terms, |matched_terms|,
/// |origins|)` descending. `NotFound` if no page matched any lemma.
pub async fn search(storage: &Storage, query: &str) -> Result<Response> {
    let normalized = text::normalize(query.as_bytes())?;
    let lemmas = text::tokenize(&normalized)?;

    let mut candidates: HashMap<i64, Candidate> = HashMap::new();
    for lemma in &lemmas {
        for term_match in storage.get_pages_for_term(lemma).await? {
            let candidate = candidates.entry(term_match.page_id).or_insert_with(|| Candidate {
                page_id: term_match.page_id,
                num_matched_terms: 0,
                matched_terms: BTreeSet::new(),
                origins: BTreeSet::new(),
            });
            candidate.num_matched_terms += term_match.count;
            candidate.matched_terms.insert(lemma.clone());
            candidate.origins.insert(term_match.origin_url);
        }
    }

    if candidates.is_empty() {
        return Err(Error::NotFound);
    }

    let mut heap: BinaryHeap<Candidate> = candidates.into_values().collect();
    let mut pages = Vec::with_capacity(TOP_K.min(heap.len()));

    while pages.len() < TOP_K {
        let Some(candidate) = heap.pop() else {
            break;
        };
        let Some(page) = storage.get_page(candidate.page_id).await? else {
            continue;
        };
        let origin_urls = storage.get_origins(candidate.page_id).await?;
        pages.push(RankedPage {
            relevant_url: page.url,
            origin_urls,
            depth: page.depth,
        });
    }

    Ok(Response { pages })
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Index a page with one `page_terms` row per `(term, count)` pair.
    /// `count` defaults to 1 per [`Storage::insert_page_term`]; tests that
    /// need a higher occurrence count for a single matched term overwrite it
    /// directly, since nothing in the production write path ever does.
    async fn index_page(storage: &Storage, url: &str, origin: &str, depth: i64, terms: &[(&str, i64)]) {
        let page_id = match storage.insert_page(url, depth).await.unwrap() {
            Some(id) => id,
            None => storage.update_page(url, depth).await.unwrap(),
        };
        storage.insert_origin(page_id, origin).await.unwrap();
        for (term, count) in terms {
            let term_id = match storage.insert_term(term).await.unwrap() {
                Some(id) => id,
                None => storage.get_term(term).await.unwrap().unwrap(),
            };
            storage.insert_page_term(page_id, term_id).await.unwrap();
            if *count != 1 {
                set_term_count(storage, page_id, term_id, *count).await;
            }
        }
    }

    async fn set_term_count(storage: &Storage, page_id: i64, term_id: i64, count: i64) {
        storage
            .write(move |conn| {
                conn.execute(
                    "UPDATE page_terms SET count = ?1 WHERE page_id = ?2 AND term_id = ?3",
                    rusqlite::params![count, page_id, term_id],
                )?;
                Ok(())
            })
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn empty_index_returns_not_found() {
        let storage = Storage::open_in_memory().unwrap();
        let result = search(&storage, "world").await;
        assert!(matches!(result, Err(Error::NotFound)));
    }

    #[tokio::test]
    async fn ranks_by_matched_term_count_then_distinct_terms_then_origins() {
        let storage = Storage::open_in_memory().unwrap();
        // P1: 3 matched-term occurrences across 3 distinct tokens.
        index_page(
            &storage,
            "http://p1/",
            "http://origin/",
            0,
            &[("hello", 1), ("world", 1), ("goodbye", 1)],
        )
        .await;
        // P2: 2 occurrences, 2 distinct tokens — ties P3 on the primary key.
        index_page(&storage, "http://p2/", "http://origin/", 0, &[("hello", 1), ("world", 1)]).await;
        // P3: 2 occurrences, but only 1 distinct token, from 2 origins — loses
        // the tiebreak against P2 on distinct-token count.
        index_page(&storage, "http://p3/", "http://origin-a/", 0, &[("hello", 2)]).await;
        storage.insert_origin(
            storage.get_page_by_url("http://p3/").await.unwrap().unwrap().id,
            "http://origin-b/",
        )
        .await
        .unwrap();

        let response = search(&storage, "hello world goodbye").await.unwrap();
        let urls: Vec<&str> = response.pages.iter().map(|p| p.relevant_url.as_str()).collect();
        assert_eq!(urls, vec!["http://p1/", "http://p2/", "http://p3/"]);
    }

    #[tokio::test]
    async fn search_filters_stop_words() {
        let storage = Storage::open_in_memory().unwrap();
        index_page(&storage, "http://a/", "http://a/", 0, &[("hello", 1), ("world", 1)]).await;

        let result = search(&storage, "the").await;
        assert!(matches!(result, Err(Error::NotFound)));
    }
}
