//! Typed query surface over the five core tables (spec §4.3).
//!
//! Each function takes `&Connection` and is called from inside
//! [`super::Storage::read`]/[`super::Storage::write`], which supplies either
//! a plain connection (reads) or an immediate transaction (writes) — both
//! deref to `Connection`, so the same query functions serve either path.
//! Statements are prepared-and-cached via `prepare_cached`, the idiomatic
//! rusqlite stand-in for a long-lived prepared-statement handle without the
//! self-referential-struct problem a held `Statement<'_>` would create.

use chrono::{DateTime, Utc};
use rusqlite::{params, OptionalExtension};

use crate::error::Result;

/// A persisted page (spec §3).
#[derive(Debug, Clone, PartialEq)]
pub struct Page {
    pub id: i64,
    pub created_at: DateTime<Utc>,
    pub modified_at: DateTime<Utc>,
    pub url: String,
    pub depth: i64,
}

/// A pending crawl task (spec §3).
#[derive(Debug, Clone, PartialEq)]
pub struct QueueRow {
    pub id: i64,
    pub created_at: DateTime<Utc>,
    pub url: String,
    pub origin: String,
    pub depth: i64,
    pub max_depth: i64,
}

/// One `(page, origin, term-match-count)` row from [`get_pages_for_term`].
#[derive(Debug, Clone, PartialEq)]
pub struct TermMatch {
    pub page_id: i64,
    pub count: i64,
    pub origin_url: String,
}

fn now() -> String {
    Utc::now().to_rfc3339()
}

fn parse_dt(s: &str) -> DateTime<Utc> {
    DateTime::parse_from_rfc3339(s)
        .map(|dt| dt.with_timezone(&Utc))
        .unwrap_or(DateTime::UNIX_EPOCH)
}

/// Delete and return the oldest queued item, FIFO by `created_at` then `id`.
/// Returns `Ok(None)` on an empty queue.
pub fn dequeue(conn: &rusqlite::Connection) -> Result<Option<QueueRow>> {
    let row = conn
        .prepare_cached(
            "SELECT id, created_at, url, origin, depth, max_depth FROM queue_items \
             ORDER BY created_at ASC, id ASC LIMIT 1",
        )?
        .query_row([], |r| {
            Ok(QueueRow {
                id: r.get(0)?,
                created_at: parse_dt(&r.get::<_, String>(1)?),
                url: r.get(2)?,
                origin: r.get(3)?,
                depth: r.get(4)?,
                max_depth: r.get(5)?,
            })
        })
        .optional()?;

    if let Some(ref item) = row {
        conn.prepare_cached("DELETE FROM queue_items WHERE id = ?1")?
            .execute(params![item.id])?;
    }

    Ok(row)
}

/// Insert a pending crawl task.
pub fn enqueue(
    conn: &rusqlite::Connection,
    url: &str,
    origin: &str,
    depth: i64,
    max_depth: i64,
) -> Result<()> {
    conn.prepare_cached(
        "INSERT INTO queue_items (created_at, url, origin, depth, max_depth) \
         VALUES (?1, ?2, ?3, ?4, ?5)",
    )?
    .execute(params![now(), url, origin, depth, max_depth])?;
    Ok(())
}

/// All origin URLs recorded for a page.
pub fn get_origins(conn: &rusqlite::Connection, page_id: i64) -> Result<Vec<String>> {
    let mut stmt =
        conn.prepare_cached("SELECT origin_url FROM origins WHERE page_id = ?1")?;
    let rows = stmt.query_map(params![page_id], |r| r.get(0))?;
    Ok(rows.collect::<std::result::Result<Vec<_>, _>>()?)
}

/// Fetch a page by id.
pub fn get_page(conn: &rusqlite::Connection, id: i64) -> Result<Option<Page>> {
    conn.prepare_cached("SELECT id, created_at, modified_at, url, depth FROM pages WHERE id = ?1")?
        .query_row(params![id], |r| {
            Ok(Page {
                id: r.get(0)?,
                created_at: parse_dt(&r.get::<_, String>(1)?),
                modified_at: parse_dt(&r.get::<_, String>(2)?),
                url: r.get(3)?,
                depth: r.get(4)?,
            })
        })
        .optional()
        .map_err(Into::into)
}

/// Fetch a page by its canonical URL.
pub fn get_page_by_url(conn: &rusqlite::Connection, url: &str) -> Result<Option<Page>> {
    conn.prepare_cached(
        "SELECT id, created_at, modified_at, url, depth FROM pages WHERE url = ?1",
    )?
    .query_row(params![url], |r| {
        Ok(Page {
            id: r.get(0)?,
            created_at: parse_dt(&r.get::<_, String>(1)?),
            modified_at: parse_dt(&r.get::<_, String>(2)?),
            url: r.get(3)?,
            depth: r.get(4)?,
        })
    })
    .optional()
    .map_err(Into::into)
}

/// Join page-terms and origins for every page containing `term`.
pub fn get_pages_for_term(conn: &rusqlite::Connection, term: &str) -> Result<Vec<TermMatch>> {
    let mut stmt = conn.prepare_cached(
        "SELECT pt.page_id, pt.count, o.origin_url \
         FROM page_terms pt \
         JOIN terms t ON t.id = pt.term_id \
         JOIN origins o ON o.page_id = pt.page_id \
         WHERE t.term = ?1",
    )?;
    let rows = stmt.query_map(params![term], |r| {
        Ok(TermMatch {
            page_id: r.get(0)?,
            count: r.get(1)?,
            origin_url: r.get(2)?,
        })
    })?;
    Ok(rows.collect::<std::result::Result<Vec<_>, _>>()?)
}

/// Look up a term's id.
pub fn get_term(conn: &rusqlite::Connection, term: &str) -> Result<Option<i64>> {
    conn.prepare_cached("SELECT id FROM terms WHERE term = ?1")?
        .query_row(params![term], |r| r.get(0))
        .optional()
        .map_err(Into::into)
}

/// Record that `page_id` was discovered from `origin_url`. A no-op if the
/// pair is already present.
pub fn insert_origin(conn: &rusqlite::Connection, page_id: i64, origin_url: &str) -> Result<()> {
    conn.prepare_cached(
        "INSERT OR IGNORE INTO origins (created_at, page_id, origin_url) VALUES (?1, ?2, ?3)",
    )?
    .execute(params![now(), page_id, origin_url])?;
    Ok(())
}

/// Insert a new page. Returns `Ok(None)` (the "no row" sentinel) if the URL
/// is already present — the caller should fall back to [`update_page`].
pub fn insert_page(conn: &rusqlite::Connection, url: &str, depth: i64) -> Result<Option<i64>> {
    let ts = now();
    let result = conn
        .prepare_cached(
            "INSERT INTO pages (created_at, modified_at, url, depth) VALUES (?1, ?1, ?2, ?3)",
        )?
        .execute(params![ts, url, depth]);

    match result {
        Ok(_) => Ok(Some(conn.last_insert_rowid())),
        Err(rusqlite::Error::SqliteFailure(e, _))
            if e.code == rusqlite::ErrorCode::ConstraintViolation =>
        {
            Ok(None)
        }
        Err(e) => Err(e.into()),
    }
}

/// Refresh `modified_at` on an existing page and return its id. Depth is not
/// rewritten: the first depth a page was discovered at is kept, so a later
/// rediscovery at a larger depth cannot make an already-shallow page look
/// deeper (or vice versa).
pub fn update_page(conn: &rusqlite::Connection, url: &str, _depth: i64) -> Result<i64> {
    conn.prepare_cached("UPDATE pages SET modified_at = ?1 WHERE url = ?2")?
        .execute(params![now(), url])?;
    let page = get_page_by_url(conn, url)?;
    page.map(|p| p.id)
        .ok_or_else(|| rusqlite::Error::QueryReturnedNoRows.into())
}

/// Associate a page with a term it contains. A no-op if the pair already
/// exists (spec §3: one row per distinct term per page).
pub fn insert_page_term(conn: &rusqlite::Connection, page_id: i64, term_id: i64) -> Result<()> {
    conn.prepare_cached(
        "INSERT OR IGNORE INTO page_terms (created_at, page_id, term_id, count) \
         VALUES (?1, ?2, ?3, 1)",
    )?
    .execute(params![now(), page_id, term_id])?;
    Ok(())
}

/// Insert a new term. Returns `Ok(None)` on conflict — the caller should
/// fall back to [`get_term`].
pub fn insert_term(conn: &rusqlite::Connection, term: &str) -> Result<Option<i64>> {
    let result = conn
        .prepare_cached("INSERT INTO terms (created_at, term) VALUES (?1, ?2)")?
        .execute(params![now(), term]);

    match result {
        Ok(_) => Ok(Some(conn.last_insert_rowid())),
        Err(rusqlite::Error::SqliteFailure(e, _))
            if e.code == rusqlite::ErrorCode::ConstraintViolation =>
        {
            Ok(None)
        }
        Err(e) => Err(e.into()),
    }
}

/// True iff a page exists for `url` and was modified after `cutoff`.
pub fn is_indexed(conn: &rusqlite::Connection, url: &str, cutoff: DateTime<Utc>) -> Result<bool> {
    let modified_at: Option<String> = conn
        .prepare_cached("SELECT modified_at FROM pages WHERE url = ?1")?
        .query_row(params![url], |r| r.get(0))
        .optional()?;

    Ok(match modified_at {
        Some(ts) => parse_dt(&ts) > cutoff,
        None => false,
    })
}
