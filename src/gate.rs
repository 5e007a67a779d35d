//! Re-index gate (spec §4.4): decides whether a URL is "fresh" enough to
//! skip re-indexing.

use chrono::{Duration, Utc};
use tracing::warn;

use crate::storage::Storage;

/// `should_index(url)`: true iff no page row for `url` was modified within
/// `reindex_duration` of now. Fails open (returns `true`) on a storage error
/// so a transient failure never permanently wedges a URL out of the index.
pub async fn should_index(storage: &Storage, url: &str, reindex_duration: Duration) -> bool {
    let cutoff = Utc::now() - reindex_duration;
    match storage.is_indexed(url, cutoff).await {
        Ok(fresh) => !fresh,
        Err(e) => {
            warn!(error = %e, url, "gate check failed, indexing anyway");
            true
        }
    }
}
