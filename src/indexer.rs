//! Indexing Coordinator (spec §4.8): the glue transaction tying the text
//! pipeline to storage writes.

use chrono::Duration;

use crate::error::Result;
use crate::storage::Storage;
use crate::text;

/// Normalize and tokenize `body` (outside any transaction — CPU-bound work
/// must not hold the storage write lock), then commit page/origin/term rows
/// inside a single immediate transaction.
pub async fn index(
    storage: &Storage,
    url: &str,
    origin: &str,
    depth: i64,
    body: &[u8],
    reindex_duration: Duration,
) -> Result<()> {
    let normalized = text::normalize(body)?;
    let tokens = text::tokenize(&normalized)?;
    storage
        .index_page(url, origin, depth, tokens, reindex_duration)
        .await
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn indexes_page_and_terms() {
        let storage = Storage::open_in_memory().unwrap();
        index(
            &storage,
            "http://a/",
            "http://a/",
            0,
            b"hello world",
            Duration::hours(24),
        )
        .await
        .unwrap();

        let page = storage.get_page_by_url("http://a/").await.unwrap().unwrap();
        assert_eq!(page.depth, 0);
        let matches = storage.get_pages_for_term("hello").await.unwrap();
        assert_eq!(matches.len(), 1);
        assert_eq!(matches[0].page_id, page.id);
    }

    #[tokio::test]
    async fn second_index_within_window_is_a_no_op() {
        let storage = Storage::open_in_memory().unwrap();
        index(
            &storage,
            "http://a/",
            "http://a/",
            0,
            b"hello world",
            Duration::hours(24),
        )
        .await
        .unwrap();
        let first = storage.get_page_by_url("http://a/").await.unwrap().unwrap();

        index(
            &storage,
            "http://a/",
            "http://a/",
            0,
            b"goodbye world",
            Duration::hours(24),
        )
        .await
        .unwrap();
        let second = storage.get_page_by_url("http://a/").await.unwrap().unwrap();

        assert_eq!(first.modified_at, second.modified_at);
        assert!(storage.get_pages_for_term("goodbye").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn reindex_after_window_refreshes_modified_at() {
        let storage = Storage::open_in_memory().unwrap();
        index(
            &storage,
            "http://a/",
            "http://a/",
            0,
            b"hello world",
            Duration::hours(24),
        )
        .await
        .unwrap();
        let first = storage.get_page_by_url("http://a/").await.unwrap().unwrap();

        tokio::time::sleep(std::time::Duration::from_millis(5)).await;
        index(
            &storage,
            "http://a/",
            "http://a/",
            0,
            b"goodbye world",
            Duration::seconds(-1),
        )
        .await
        .unwrap();
        let second = storage.get_page_by_url("http://a/").await.unwrap().unwrap();

        assert!(second.modified_at >= first.modified_at);
        assert_eq!(storage.get_pages_for_term("goodbye").await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn records_multiple_origins_for_same_page() {
        let storage = Storage::open_in_memory().unwrap();
        index(
            &storage,
            "http://a/",
            "http://origin-1/",
            0,
            b"hello",
            Duration::hours(24),
        )
        .await
        .unwrap();
        index(
            &storage,
            "http://a/",
            "http://origin-2/",
            0,
            b"hello",
            Duration::seconds(-1),
        )
        .await
        .unwrap();

        let page = storage.get_page_by_url("http://a/").await.unwrap().unwrap();
        let origins = storage.get_origins(page.id).await.unwrap();
        assert_eq!(origins.len(), 2);
    }
}
