//! Relational store schema
//!
//! All timestamps and intervals are stored as integral Unix seconds so
//! the due-URL and retry predicates can be evaluated inside SQL.

use rusqlite::Connection;

pub fn initialize_schema(conn: &Connection) -> rusqlite::Result<()> {
    conn.execute_batch(
        "
        CREATE TABLE IF NOT EXISTS urls (
            id              INTEGER PRIMARY KEY AUTOINCREMENT,
            url             TEXT NOT NULL UNIQUE,
            hostname        TEXT NOT NULL,
            first_added     INTEGER NOT NULL,
            last_visited    INTEGER,
            content_id      INTEGER REFERENCES contents(id),
            error           TEXT,
            status_code     INTEGER,
            retry_time      INTEGER,
            banned          INTEGER NOT NULL DEFAULT 0,
            rank            REAL
        );

        CREATE TABLE IF NOT EXISTS contents (
            id                INTEGER PRIMARY KEY AUTOINCREMENT,
            hash              TEXT NOT NULL UNIQUE,
            content           BLOB NOT NULL,
            content_text      TEXT NOT NULL,
            lang              TEXT,
            kind              TEXT,
            content_type      TEXT NOT NULL,
            content_type_args TEXT NOT NULL DEFAULT '',
            title             TEXT NOT NULL DEFAULT '',
            fetch_time        INTEGER NOT NULL
        );

        CREATE TABLE IF NOT EXISTS links (
            src_url_id INTEGER NOT NULL REFERENCES urls(id),
            dst_url_id INTEGER NOT NULL REFERENCES urls(id),
            text       TEXT NOT NULL DEFAULT '',
            PRIMARY KEY (src_url_id, dst_url_id)
        );

        CREATE TABLE IF NOT EXISTS hosts (
            hostname            TEXT PRIMARY KEY,
            rank                REAL,
            robots_prefixes     TEXT,
            robots_valid_until  INTEGER,
            robots_last_visited INTEGER,
            robots_retry_time   INTEGER,
            slowdown_until      INTEGER
        );

        CREATE TABLE IF NOT EXISTS images (
            id           INTEGER PRIMARY KEY AUTOINCREMENT,
            image_hash   TEXT NOT NULL UNIQUE,
            content_hash TEXT NOT NULL,
            image        TEXT NOT NULL,
            alt          TEXT NOT NULL DEFAULT '',
            fetch_time   INTEGER NOT NULL,
            url          TEXT NOT NULL
        );

        CREATE INDEX IF NOT EXISTS idx_urls_hostname ON urls (hostname);
        CREATE INDEX IF NOT EXISTS idx_urls_content ON urls (content_id);
        CREATE INDEX IF NOT EXISTS idx_links_dst ON links (dst_url_id);
        ",
    )
}
