//! The storage layer (spec §4.3): a single embedded relational store with
//! foreign keys on, WAL journaling, an immediate-transaction locking
//! discipline, and a synchronous change-notification hook delivered in
//! commit order.
//!
//! Ownership: every other component touches persistent state only through
//! this module's query surface (spec §3, "Ownership").

pub(crate) mod queries;
mod schema;

pub use queries::{Page, QueueRow, TermMatch};

use std::collections::{BTreeSet, HashMap};
use std::path::Path;
use std::sync::{Arc, Mutex as StdMutex};

use chrono::{DateTime, Utc};
use rusqlite::hooks::Action;
use rusqlite::{Connection, TransactionBehavior};
use tokio::sync::{Mutex, RwLock};
use tracing::warn;

use crate::error::{Error, Result};

/// The three mutation kinds delivered by the change-notification hook.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Operation {
    Insert,
    Update,
    Delete,
}

/// A subscriber callback: `fn(row_id)`. Must be non-blocking and must not
/// re-enter [`Storage`] — it runs synchronously on the writer's commit tail.
pub type Callback = Box<dyn Fn(i64) + Send + Sync>;

type CallbackKey = (String, Operation);
type CallbackRegistry = Arc<StdMutex<HashMap<CallbackKey, Vec<Callback>>>>;

/// The embedded relational store. Process-wide; every mutation goes through
/// an immediate transaction guarded by the advisory reader/writer lock.
pub struct Storage {
    conn: Mutex<Connection>,
    /// Advisory multi-reader/single-writer discipline, orthogonal to the
    /// database-level locking `PRAGMA`s below. Never upgraded in place: a
    /// write path releases any shared guard before acquiring exclusive.
    lock: RwLock<()>,
    callbacks: CallbackRegistry,
}

/// Install the change-notification hook on `conn`, dispatching to whatever
/// gets registered in `callbacks` later via [`Storage::register`]. Shared by
/// [`Storage::open`] and [`Storage::open_in_memory`] so both constructors
/// wire up the same event-driven path.
fn install_update_hook(conn: &Connection, callbacks: CallbackRegistry) {
    conn.update_hook(Some(
        move |action: Action, _db: &str, table: &str, row_id: i64| {
            let operation = match action {
                Action::SQLITE_INSERT => Operation::Insert,
                Action::SQLITE_UPDATE => Operation::Update,
                Action::SQLITE_DELETE => Operation::Delete,
                _ => return,
            };
            let Ok(registry) = callbacks.lock() else {
                return;
            };
            if let Some(subscribers) = registry.get(&(table.to_string(), operation)) {
                for callback in subscribers {
                    callback(row_id);
                }
            }
        },
    ));
}

impl Storage {
    /// Open (creating if absent) the store at `path`, apply the schema, and
    /// install the change-notification hook.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let conn = Connection::open(path)?;
        conn.execute_batch(
            "PRAGMA journal_mode = WAL;
             PRAGMA synchronous = NORMAL;
             PRAGMA foreign_keys = ON;
             PRAGMA busy_timeout = 30000;",
        )?;
        schema::init(&conn)?;

        let callbacks: CallbackRegistry = Arc::new(StdMutex::new(HashMap::new()));
        install_update_hook(&conn, callbacks.clone());

        Ok(Self {
            conn: Mutex::new(conn),
            lock: RwLock::new(()),
            callbacks,
        })
    }

    /// Open an in-memory store, for tests.
    #[cfg(test)]
    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        conn.execute_batch("PRAGMA foreign_keys = ON;")?;
        schema::init(&conn)?;

        let callbacks: CallbackRegistry = Arc::new(StdMutex::new(HashMap::new()));
        install_update_hook(&conn, callbacks.clone());

        Ok(Self {
            conn: Mutex::new(conn),
            lock: RwLock::new(()),
            callbacks,
        })
    }

    /// Register a callback invoked synchronously, in commit order, whenever
    /// `operation` commits against `table` (spec §4.3, §9).
    pub fn register(&self, table: &str, operation: Operation, callback: Callback) {
        self.callbacks
            .lock()
            .expect("callback registry mutex poisoned")
            .entry((table.to_string(), operation))
            .or_default()
            .push(callback);
    }

    /// Run a read-only query under the shared side of the advisory lock.
    pub async fn read<F, R>(&self, f: F) -> Result<R>
    where
        F: FnOnce(&Connection) -> Result<R> + Send,
    {
        let _guard = self.lock.read().await;
        let conn = self.conn.lock().await;
        f(&conn)
    }

    /// Run a mutation inside an immediate transaction, under the exclusive
    /// side of the advisory lock. Commits on `Ok`, rolls back on `Err`.
    pub async fn write<F, R>(&self, f: F) -> Result<R>
    where
        F: FnOnce(&Connection) -> Result<R> + Send,
    {
        let _guard = self.lock.write().await;
        let mut conn = self.conn.lock().await;
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
        match f(&tx) {
            Ok(value) => {
                tx.commit()?;
                Ok(value)
            }
            Err(e) => {
                drop(tx); // rolls back on Drop
                Err(e)
            }
        }
    }

    // --- typed query surface (spec §4.3) -----------------------------------

    pub async fn dequeue(&self) -> Result<Option<QueueRow>> {
        self.write(|conn| queries::dequeue(conn)).await
    }

    pub async fn enqueue(&self, url: &str, origin: &str, depth: i64, max_depth: i64) -> Result<()> {
        let (url, origin) = (url.to_string(), origin.to_string());
        self.write(move |conn| queries::enqueue(conn, &url, &origin, depth, max_depth))
            .await
    }

    /// Gate-check and enqueue inside a single transaction (spec §4.4, §4.5:
    /// "open an immediate transaction; call the gate; ... otherwise insert").
    /// Returns `false` if the gate rejected the URL as still fresh.
    pub async fn enqueue_if_fresh(
        &self,
        url: &str,
        origin: &str,
        depth: i64,
        max_depth: i64,
        reindex_duration: chrono::Duration,
    ) -> Result<bool> {
        let (url, origin) = (url.to_string(), origin.to_string());
        let cutoff = Utc::now() - reindex_duration;
        self.write(move |conn| {
            if queries::is_indexed(conn, &url, cutoff)? {
                return Ok(false);
            }
            queries::enqueue(conn, &url, &origin, depth, max_depth)?;
            Ok(true)
        })
        .await
    }

    pub async fn get_origins(&self, page_id: i64) -> Result<Vec<String>> {
        self.read(move |conn| queries::get_origins(conn, page_id))
            .await
    }

    pub async fn get_page(&self, id: i64) -> Result<Option<Page>> {
        self.read(move |conn| queries::get_page(conn, id)).await
    }

    pub async fn get_page_by_url(&self, url: &str) -> Result<Option<Page>> {
        let url = url.to_string();
        self.read(move |conn| queries::get_page_by_url(conn, &url))
            .await
    }

    pub async fn get_pages_for_term(&self, term: &str) -> Result<Vec<TermMatch>> {
        let term = term.to_string();
        self.read(move |conn| queries::get_pages_for_term(conn, &term))
            .await
    }

    pub async fn get_term(&self, term: &str) -> Result<Option<i64>> {
        let term = term.to_string();
        self.read(move |conn| queries::get_term(conn, &term)).await
    }

    pub async fn insert_origin(&self, page_id: i64, origin_url: &str) -> Result<()> {
        let origin_url = origin_url.to_string();
        self.write(move |conn| queries::insert_origin(conn, page_id, &origin_url))
            .await
    }

    pub async fn insert_page(&self, url: &str, depth: i64) -> Result<Option<i64>> {
        let url = url.to_string();
        self.write(move |conn| queries::insert_page(conn, &url, depth))
            .await
    }

    pub async fn update_page(&self, url: &str, depth: i64) -> Result<i64> {
        let url = url.to_string();
        self.write(move |conn| queries::update_page(conn, &url, depth))
            .await
    }

    pub async fn insert_page_term(&self, page_id: i64, term_id: i64) -> Result<()> {
        self.write(move |conn| queries::insert_page_term(conn, page_id, term_id))
            .await
    }

    pub async fn insert_term(&self, term: &str) -> Result<Option<i64>> {
        let term = term.to_string();
        self.write(move |conn| queries::insert_term(conn, &term))
            .await
    }

    pub async fn is_indexed(&self, url: &str, cutoff: DateTime<Utc>) -> Result<bool> {
        let url = url.to_string();
        self.read(move |conn| queries::is_indexed(conn, &url, cutoff))
            .await
    }

    /// The Indexing Coordinator's single transaction (spec §4.8): re-check
    /// the gate, upsert the page and origin, then associate each token's
    /// term with the page. A per-token failure is logged and skipped; it
    /// does not abort the page's transaction.
    pub async fn index_page(
        &self,
        url: &str,
        origin: &str,
        depth: i64,
        tokens: BTreeSet<String>,
        reindex_duration: chrono::Duration,
    ) -> Result<()> {
        let (url, origin) = (url.to_string(), origin.to_string());
        let cutoff = Utc::now() - reindex_duration;
        self.write(move |conn| {
            if queries::is_indexed(conn, &url, cutoff)? {
                return Ok(());
            }

            let page_id = match queries::insert_page(conn, &url, depth)? {
                Some(id) => id,
                None => queries::update_page(conn, &url, depth)?,
            };
            queries::insert_origin(conn, page_id, &origin)?;

            for token in &tokens {
                let outcome: Result<()> = (|| {
                    let term_id = match queries::insert_term(conn, token)? {
                        Some(id) => id,
                        None => queries::get_term(conn, token)?.ok_or(Error::NotFound)?,
                    };
                    queries::insert_page_term(conn, page_id, term_id)
                })();
                if let Err(e) = outcome {
                    warn!(error = %e, term = %token, url = %url, "per-token indexing failed, skipping");
                }
            }

            Ok(())
        })
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn insert_and_fetch_page() {
        let storage = Storage::open_in_memory().unwrap();
        let id = storage.insert_page("http://a/", 0).await.unwrap().unwrap();
        let page = storage.get_page(id).await.unwrap().unwrap();
        assert_eq!(page.url, "http://a/");
        assert_eq!(page.depth, 0);
    }

    #[tokio::test]
    async fn insert_page_conflict_returns_none() {
        let storage = Storage::open_in_memory().unwrap();
        storage.insert_page("http://a/", 0).await.unwrap();
        let second = storage.insert_page("http://a/", 1).await.unwrap();
        assert!(second.is_none());
    }

    #[tokio::test]
    async fn update_page_refreshes_modified_at_only() {
        let storage = Storage::open_in_memory().unwrap();
        let id = storage.insert_page("http://a/", 0).await.unwrap().unwrap();
        let before = storage.get_page(id).await.unwrap().unwrap();
        tokio::time::sleep(std::time::Duration::from_millis(5)).await;
        storage.update_page("http://a/", 5).await.unwrap();
        let after = storage.get_page(id).await.unwrap().unwrap();
        assert!(after.modified_at >= before.modified_at);
        assert_eq!(after.depth, 0, "depth is not rewritten on re-index");
    }

    #[tokio::test]
    async fn term_insert_conflict_resolves_via_get_term() {
        let storage = Storage::open_in_memory().unwrap();
        let id1 = storage.insert_term("dog").await.unwrap().unwrap();
        let conflict = storage.insert_term("dog").await.unwrap();
        assert!(conflict.is_none());
        let id2 = storage.get_term("dog").await.unwrap().unwrap();
        assert_eq!(id1, id2);
    }

    #[tokio::test]
    async fn dequeue_is_fifo() {
        let storage = Storage::open_in_memory().unwrap();
        storage.enqueue("http://a/", "http://a/", 0, 1).await.unwrap();
        storage.enqueue("http://b/", "http://a/", 1, 1).await.unwrap();

        let first = storage.dequeue().await.unwrap().unwrap();
        let second = storage.dequeue().await.unwrap().unwrap();
        assert_eq!(first.url, "http://a/");
        assert_eq!(second.url, "http://b/");
        assert!(storage.dequeue().await.unwrap().is_none());
    }

    #[tokio::test]
    async fn is_indexed_respects_cutoff() {
        let storage = Storage::open_in_memory().unwrap();
        storage.insert_page("http://a/", 0).await.unwrap();

        let past_cutoff = Utc::now() - chrono::Duration::hours(1);
        assert!(storage.is_indexed("http://a/", past_cutoff).await.unwrap());

        let future_cutoff = Utc::now() + chrono::Duration::hours(1);
        assert!(!storage
            .is_indexed("http://a/", future_cutoff)
            .await
            .unwrap());
    }

    #[tokio::test]
    async fn change_notification_fires_on_insert() {
        let storage = Storage::open_in_memory().unwrap();
        let fired = Arc::new(std::sync::atomic::AtomicBool::new(false));
        let fired_clone = fired.clone();
        storage.register(
            "queue_items",
            Operation::Insert,
            Box::new(move |_row_id| {
                fired_clone.store(true, std::sync::atomic::Ordering::SeqCst);
            }),
        );
        storage.enqueue("http://a/", "http://a/", 0, 1).await.unwrap();
        assert!(fired.load(std::sync::atomic::Ordering::SeqCst));
    }
}
