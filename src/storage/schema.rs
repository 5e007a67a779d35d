//! Schema definition for the five core tables (spec §3). Idempotent:
//! applied on every `Storage::open` with `CREATE TABLE IF NOT EXISTS`.

use rusqlite::Connection;

use crate::error::Result;

const DDL: &str = r#"
CREATE TABLE IF NOT EXISTS pages (
    id          INTEGER PRIMARY KEY AUTOINCREMENT,
    created_at  TEXT NOT NULL,
    modified_at TEXT NOT NULL,
    url         TEXT NOT NULL UNIQUE,
    depth       INTEGER NOT NULL
);

CREATE TABLE IF NOT EXISTS origins (
    id          INTEGER PRIMARY KEY AUTOINCREMENT,
    created_at  TEXT NOT NULL,
    page_id     INTEGER NOT NULL REFERENCES pages(id),
    origin_url  TEXT NOT NULL,
    UNIQUE(page_id, origin_url)
);

CREATE TABLE IF NOT EXISTS terms (
    id          INTEGER PRIMARY KEY AUTOINCREMENT,
    created_at  TEXT NOT NULL,
    term        TEXT NOT NULL UNIQUE
);

CREATE TABLE IF NOT EXISTS page_terms (
    id          INTEGER PRIMARY KEY AUTOINCREMENT,
    created_at  TEXT NOT NULL,
    page_id     INTEGER NOT NULL REFERENCES pages(id),
    term_id     INTEGER NOT NULL REFERENCES terms(id),
    count       INTEGER NOT NULL DEFAULT 1,
    UNIQUE(page_id, term_id)
);

CREATE TABLE IF NOT EXISTS queue_items (
    id          INTEGER PRIMARY KEY AUTOINCREMENT,
    created_at  TEXT NOT NULL,
    url         TEXT NOT NULL,
    origin      TEXT NOT NULL,
    depth       INTEGER NOT NULL,
    max_depth   INTEGER NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_origins_page_id ON origins(page_id);
CREATE INDEX IF NOT EXISTS idx_page_terms_page_id ON page_terms(page_id);
CREATE INDEX IF NOT EXISTS idx_page_terms_term_id ON page_terms(term_id);
CREATE INDEX IF NOT EXISTS idx_queue_items_created_at ON queue_items(created_at, id);
"#;

/// Apply the schema. Safe to call on every startup.
pub fn init(conn: &Connection) -> Result<()> {
    conn.execute_batch(DDL)?;
    Ok(())
}
