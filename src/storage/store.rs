//! SQLite store wrapper
//!
//! Thin typed layer over the schema: every query the daemons run lives
//! here. Interval arithmetic (retry doubling, caps, due predicates) is
//! done in SQL so the row update and its policy stay one statement.

use chrono::Utc;
use rusqlite::{params, Connection, OptionalExtension};
use sha2::{Digest, Sha256};
use std::path::Path;
use url::Url;

use crate::Result;

use super::schema::initialize_schema;
use super::{
    ImageRecord, IndexablePage, RobotsLookup, StoredDocument, SuccessfulVisit, UrlRow,
    MAX_REVISIT_TIME, PERMANENT_ERROR_RETRY, REVISIT_AFTER_CHANGE, REVISIT_INCREMENT_NO_CHANGE,
    ROBOTS_VALIDITY, TEMP_ERROR_MIN_RETRY,
};

/// One handle to the relational store
pub struct Store {
    conn: Connection,
}

impl Store {
    /// Opens (and if necessary creates) the store at the given path
    pub fn open(path: &Path) -> Result<Self> {
        let conn = Connection::open(path)?;
        conn.execute_batch(
            "
            PRAGMA journal_mode = WAL;
            PRAGMA synchronous = NORMAL;
            PRAGMA foreign_keys = ON;
            PRAGMA busy_timeout = 5000;
            ",
        )?;
        initialize_schema(&conn)?;
        Ok(Self { conn })
    }

    /// Opens an in-memory store, used by tests
    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        conn.execute_batch("PRAGMA foreign_keys = ON;")?;
        initialize_schema(&conn)?;
        Ok(Self { conn })
    }

    /// Handle for interrupting a long-running statement from another
    /// task (the cleaner uses this on shutdown)
    pub fn interrupt_handle(&self) -> rusqlite::InterruptHandle {
        self.conn.get_interrupt_handle()
    }

    /// Current time as Unix seconds
    pub fn now() -> i64 {
        Utc::now().timestamp()
    }

    // ===== URL lifecycle =====

    /// Inserts a URL if it is not already known
    pub fn seed_url(&mut self, url: &Url) -> Result<()> {
        let host = url.host_str().unwrap_or_default();
        self.conn.execute(
            "INSERT INTO urls (url, hostname, first_added) VALUES (?1, ?2, ?3)
             ON CONFLICT (url) DO NOTHING",
            params![url.as_str(), host, Self::now()],
        )?;
        Ok(())
    }

    /// URLs due for a visit: not banned, host not under slowdown, and
    /// either never visited or past their retry deadline.
    pub fn due_urls(&self, now: i64) -> Result<Vec<String>> {
        let mut stmt = self.conn.prepare(
            "SELECT u.url FROM urls u
             LEFT JOIN hosts h ON u.hostname = h.hostname
             WHERE u.banned = 0
               AND (h.slowdown_until IS NULL OR h.slowdown_until < ?1)
               AND (u.last_visited IS NULL OR u.last_visited + u.retry_time < ?1)",
        )?;
        let rows = stmt.query_map(params![now], |row| row.get(0))?;
        let mut urls = Vec::new();
        for row in rows {
            urls.push(row?);
        }
        Ok(urls)
    }

    /// Marks a URL as banned by robots rules; banned URLs are never
    /// dispatched again
    pub fn record_banned(&mut self, url: &str) -> Result<()> {
        self.conn.execute(
            "UPDATE urls SET banned = 1 WHERE url = ?1",
            params![url],
        )?;
        Ok(())
    }

    /// Persists a successful visit in one transaction: content upsert,
    /// URL row update, and atomic replacement of the outbound links.
    pub fn record_successful_visit(&mut self, visit: &SuccessfulVisit) -> Result<()> {
        let content_hash = content_hash(&visit.contents);
        let now = visit.visited_at;

        let tx = self.conn.transaction()?;

        // no-op update on conflict so the id comes back either way
        let content_id: i64 = tx.query_row(
            "INSERT INTO contents
                 (hash, content, content_text, lang, kind, content_type, content_type_args,
                  title, fetch_time)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)
             ON CONFLICT (hash) DO UPDATE SET hash = excluded.hash
             RETURNING id",
            params![
                content_hash,
                visit.contents,
                visit.page.text,
                null_if_empty(&visit.page.lang),
                null_if_empty(&visit.page.kind),
                visit.content_type,
                visit.content_type_args,
                visit.page.title,
                now,
            ],
            |row| row.get(0),
        )?;

        let url_id: Option<i64> = tx
            .query_row(
                "UPDATE urls SET
                     last_visited = ?1,
                     content_id = ?2,
                     error = NULL,
                     status_code = ?3,
                     retry_time = CASE WHEN content_id = ?2
                                  THEN MIN(COALESCE(retry_time, 0) + ?4, ?5)
                                  ELSE ?6 END
                 WHERE url = ?7
                 RETURNING id",
                params![
                    now,
                    content_id,
                    visit.status_code,
                    REVISIT_INCREMENT_NO_CHANGE,
                    MAX_REVISIT_TIME,
                    REVISIT_AFTER_CHANGE,
                    visit.url,
                ],
                |row| row.get(0),
            )
            .optional()?;

        let url_id = match url_id {
            Some(id) => id,
            None => {
                tracing::warn!("Visited URL missing from the store: {}", visit.url);
                return Ok(());
            }
        };

        tx.execute("DELETE FROM links WHERE src_url_id = ?1", params![url_id])?;

        for link in &visit.page.links {
            let host = match Url::parse(&link.url) {
                Ok(u) => u.host_str().unwrap_or_default().to_string(),
                Err(_) => continue,
            };

            let dst_id: i64 = tx.query_row(
                "INSERT INTO urls (url, hostname, first_added) VALUES (?1, ?2, ?3)
                 ON CONFLICT (url) DO UPDATE SET url = excluded.url
                 RETURNING id",
                params![link.url, host, now],
                |row| row.get(0),
            )?;

            tx.execute(
                "INSERT INTO links (src_url_id, dst_url_id, text) VALUES (?1, ?2, ?3)
                 ON CONFLICT DO NOTHING",
                params![url_id, dst_id, link.text],
            )?;
        }

        tx.commit()?;
        Ok(())
    }

    /// Temporary error: exponential retry, capped at the max revisit
    /// interval
    pub fn record_temp_error(
        &mut self,
        url: &str,
        status_code: Option<u16>,
        error: &str,
        now: i64,
    ) -> Result<()> {
        self.conn.execute(
            "UPDATE urls SET
                 last_visited = ?1,
                 error = ?2,
                 status_code = ?3,
                 retry_time = CASE WHEN retry_time IS NULL THEN ?4
                              ELSE MIN(retry_time * 2, ?5) END
             WHERE url = ?6",
            params![now, error, status_code, TEMP_ERROR_MIN_RETRY, MAX_REVISIT_TIME, url],
        )?;
        Ok(())
    }

    /// Permanent error (5x, 1x, dead host): long fixed retry
    pub fn record_permanent_error(
        &mut self,
        url: &str,
        status_code: Option<u16>,
        error: &str,
        now: i64,
    ) -> Result<()> {
        self.conn.execute(
            "UPDATE urls SET
                 last_visited = ?1,
                 error = ?2,
                 status_code = ?3,
                 retry_time = ?4
             WHERE url = ?5",
            params![now, error, status_code, PERMANENT_ERROR_RETRY, url],
        )?;
        Ok(())
    }

    // ===== Hosts and robots =====

    /// Puts a host on cooldown until the given time (status 44)
    pub fn set_host_slowdown(&mut self, host: &str, until: i64) -> Result<()> {
        self.conn.execute(
            "INSERT INTO hosts (hostname, slowdown_until) VALUES (?1, ?2)
             ON CONFLICT (hostname) DO UPDATE SET slowdown_until = excluded.slowdown_until",
            params![host, until],
        )?;
        Ok(())
    }

    /// Reads the stored robots state for a host
    pub fn robots_lookup(&self, host: &str, now: i64) -> Result<RobotsLookup> {
        let row: Option<(Option<String>, Option<i64>, Option<i64>)> = self
            .conn
            .query_row(
                "SELECT robots_prefixes, robots_valid_until,
                        robots_last_visited + robots_retry_time
                 FROM hosts WHERE hostname = ?1",
                params![host],
                |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?)),
            )
            .optional()?;

        let (prefixes, valid_until, next_try) = match row {
            Some(r) => r,
            None => return Ok(RobotsLookup::Missing),
        };

        if next_try.is_some_and(|t| t > now) {
            return Ok(RobotsLookup::Backoff);
        }

        match prefixes {
            Some(joined) => Ok(RobotsLookup::Prefixes {
                prefixes: joined
                    .split('\n')
                    .filter(|p| !p.is_empty())
                    .map(str::to_string)
                    .collect(),
                valid_until: valid_until.unwrap_or(now),
            }),
            None => Ok(RobotsLookup::Missing),
        }
    }

    /// Stores freshly fetched robots prefixes with their validity window
    pub fn save_robots_success(
        &mut self,
        host: &str,
        prefixes: &[String],
        now: i64,
    ) -> Result<i64> {
        let joined = prefixes.join("\n");
        let valid_until = now + ROBOTS_VALIDITY;
        self.conn.execute(
            "INSERT INTO hosts
                 (hostname, robots_prefixes, robots_valid_until, robots_last_visited,
                  robots_retry_time)
             VALUES (?1, ?2, ?3, ?4, NULL)
             ON CONFLICT (hostname) DO UPDATE SET
                 robots_prefixes = excluded.robots_prefixes,
                 robots_valid_until = excluded.robots_valid_until,
                 robots_last_visited = excluded.robots_last_visited,
                 robots_retry_time = NULL",
            params![host, joined, valid_until, now],
        )?;
        Ok(valid_until)
    }

    /// Records a robots fetch failure, putting the host in backoff.
    /// Transient failures double the backoff up to the cap; permanent
    /// network errors jump straight to the long interval.
    pub fn save_robots_error(&mut self, host: &str, permanent: bool, now: i64) -> Result<()> {
        if permanent {
            self.conn.execute(
                "INSERT INTO hosts
                     (hostname, robots_prefixes, robots_last_visited, robots_retry_time,
                      slowdown_until)
                 VALUES (?1, NULL, ?2, ?3, ?2 + ?3)
                 ON CONFLICT (hostname) DO UPDATE SET
                     robots_prefixes = NULL,
                     robots_last_visited = excluded.robots_last_visited,
                     robots_retry_time = ?3,
                     slowdown_until = excluded.robots_last_visited + ?3",
                params![host, now, PERMANENT_ERROR_RETRY],
            )?;
        } else {
            self.conn.execute(
                "INSERT INTO hosts
                     (hostname, robots_prefixes, robots_last_visited, robots_retry_time,
                      slowdown_until)
                 VALUES (?1, NULL, ?2, ?3, ?2 + ?3)
                 ON CONFLICT (hostname) DO UPDATE SET
                     robots_prefixes = NULL,
                     robots_last_visited = excluded.robots_last_visited,
                     robots_retry_time = CASE WHEN hosts.robots_retry_time IS NULL THEN ?3
                                         ELSE MIN(hosts.robots_retry_time * 2, ?4) END,
                     slowdown_until = excluded.robots_last_visited +
                                      CASE WHEN hosts.robots_retry_time IS NULL THEN ?3
                                      ELSE MIN(hosts.robots_retry_time * 2, ?4) END",
                params![host, now, TEMP_ERROR_MIN_RETRY, MAX_REVISIT_TIME],
            )?;
        }
        Ok(())
    }

    // ===== Maintenance =====

    /// Removes a host from the store: every link leaving the host is
    /// deleted, and so is every URL of the host that no other host
    /// links to. URLs still referenced from outside survive so the link
    /// graph stays closed. Returns (links deleted, urls deleted).
    pub fn purge_host(&mut self, hostname: &str) -> Result<(usize, usize)> {
        let tx = self.conn.transaction()?;

        let links_deleted = tx.execute(
            "DELETE FROM links WHERE src_url_id IN
                 (SELECT id FROM urls WHERE hostname = ?1)",
            params![hostname],
        )?;

        let urls_deleted = tx.execute(
            "DELETE FROM urls WHERE hostname = ?1
                 AND id NOT IN (SELECT dst_url_id FROM links)",
            params![hostname],
        )?;

        tx.execute("DELETE FROM hosts WHERE hostname = ?1", params![hostname])?;

        tx.commit()?;
        Ok((links_deleted, urls_deleted))
    }

    /// Streams every stored content row together with one referencing
    /// URL, for re-parsing passes
    pub fn for_each_stored_document(
        &self,
        mut f: impl FnMut(StoredDocument) -> bool,
    ) -> Result<()> {
        let mut stmt = self.conn.prepare(
            "SELECT c.id, c.content, c.title, c.content_type, u.url
             FROM contents c
             JOIN urls u ON u.content_id = c.id",
        )?;
        let rows = stmt.query_map([], |row| {
            Ok(StoredDocument {
                content_id: row.get(0)?,
                content: row.get(1)?,
                title: row.get(2)?,
                content_type: row.get(3)?,
                url: row.get(4)?,
            })
        })?;
        for row in rows {
            if !f(row?) {
                break;
            }
        }
        Ok(())
    }

    pub fn update_content_title(&mut self, content_id: i64, title: &str) -> Result<()> {
        self.conn.execute(
            "UPDATE contents SET title = ?1 WHERE id = ?2",
            params![title, content_id],
        )?;
        Ok(())
    }

    // ===== Cleaner =====

    /// Deletes content rows no URL references; returns how many went
    pub fn delete_orphan_contents(&mut self) -> Result<usize> {
        let n = self.conn.execute(
            "DELETE FROM contents
             WHERE NOT EXISTS (SELECT 1 FROM urls WHERE content_id = contents.id)",
            [],
        )?;
        Ok(n)
    }

    // ===== Link graph =====

    /// All link edges as (src, dst) URL id pairs
    pub fn link_edges(&self) -> Result<Vec<(i64, i64)>> {
        let mut stmt = self
            .conn
            .prepare("SELECT src_url_id, dst_url_id FROM links")?;
        let rows = stmt.query_map([], |row| Ok((row.get(0)?, row.get(1)?)))?;
        let mut edges = Vec::new();
        for row in rows {
            edges.push(row?);
        }
        Ok(edges)
    }

    /// Mapping from URL id to hostname, for projecting the host graph
    pub fn url_hosts(&self) -> Result<Vec<(i64, String)>> {
        let mut stmt = self.conn.prepare("SELECT id, hostname FROM urls")?;
        let rows = stmt.query_map([], |row| Ok((row.get(0)?, row.get(1)?)))?;
        let mut pairs = Vec::new();
        for row in rows {
            pairs.push(row?);
        }
        Ok(pairs)
    }

    /// Writes URL ranks in one join-based update
    pub fn write_url_ranks(&mut self, ranks: &[(i64, f64)]) -> Result<()> {
        let tx = self.conn.transaction()?;
        tx.execute_batch(
            "CREATE TEMP TABLE IF NOT EXISTS new_url_ranks (id INTEGER PRIMARY KEY, rank REAL);
             DELETE FROM new_url_ranks;",
        )?;
        {
            let mut insert =
                tx.prepare("INSERT INTO new_url_ranks (id, rank) VALUES (?1, ?2)")?;
            for (id, rank) in ranks {
                insert.execute(params![id, rank])?;
            }
        }
        tx.execute(
            "UPDATE urls SET rank = x.rank FROM new_url_ranks x WHERE urls.id = x.id",
            [],
        )?;
        tx.commit()?;
        Ok(())
    }

    /// Writes host ranks in one join-based update, creating host rows
    /// that only appeared as link targets
    pub fn write_host_ranks(&mut self, ranks: &[(String, f64)]) -> Result<()> {
        let tx = self.conn.transaction()?;
        {
            let mut upsert = tx.prepare(
                "INSERT INTO hosts (hostname, rank) VALUES (?1, ?2)
                 ON CONFLICT (hostname) DO UPDATE SET rank = excluded.rank",
            )?;
            for (host, rank) in ranks {
                upsert.execute(params![host, rank])?;
            }
        }
        tx.commit()?;
        Ok(())
    }

    // ===== Indexing =====

    /// Streams every page with both ranks present to the callback; the
    /// callback returns false to stop early (cancellation).
    pub fn for_each_indexable_page(
        &self,
        mut f: impl FnMut(IndexablePage) -> bool,
    ) -> Result<()> {
        let mut stmt = self.conn.prepare(
            "SELECT u.url, c.title, c.content_text, length(c.content), c.content_type,
                    c.lang, c.kind,
                    (SELECT group_concat(l.text, char(10)) FROM links l
                     WHERE l.dst_url_id = u.id),
                    u.rank, h.rank
             FROM urls u
             JOIN contents c ON c.id = u.content_id
             JOIN hosts h ON h.hostname = u.hostname
             WHERE u.rank IS NOT NULL AND h.rank IS NOT NULL",
        )?;

        let rows = stmt.query_map([], |row| {
            Ok(IndexablePage {
                url: row.get(0)?,
                title: row.get(1)?,
                text: row.get(2)?,
                size: row.get::<_, i64>(3)? as u64,
                content_type: row.get(4)?,
                lang: row.get::<_, Option<String>>(5)?.unwrap_or_default(),
                kind: row.get::<_, Option<String>>(6)?.unwrap_or_default(),
                links: row.get::<_, Option<String>>(7)?.unwrap_or_default(),
                url_rank: row.get(8)?,
                host_rank: row.get(9)?,
            })
        })?;

        for row in rows {
            if !f(row?) {
                break;
            }
        }
        Ok(())
    }

    /// Streams every image row with alt text to the callback
    pub fn for_each_indexable_image(
        &self,
        mut f: impl FnMut(ImageRecord) -> bool,
    ) -> Result<()> {
        let mut stmt = self.conn.prepare(
            "SELECT image_hash, image, alt, fetch_time, url FROM images WHERE alt != ''",
        )?;
        let rows = stmt.query_map([], |row| {
            Ok(ImageRecord {
                image_hash: row.get(0)?,
                image: row.get(1)?,
                alt: row.get(2)?,
                fetch_time: row.get(3)?,
                url: row.get(4)?,
            })
        })?;
        for row in rows {
            if !f(row?) {
                break;
            }
        }
        Ok(())
    }

    // ===== Image search =====

    pub fn random_image(&self) -> Result<Option<ImageRecord>> {
        let record = self
            .conn
            .query_row(
                "SELECT image_hash, image, alt, fetch_time, url FROM images
                 WHERE alt != '' ORDER BY random() LIMIT 1",
                [],
                image_from_row,
            )
            .optional()?;
        Ok(record)
    }

    pub fn image_by_hash(&self, hash: &str) -> Result<Option<ImageRecord>> {
        let record = self
            .conn
            .query_row(
                "SELECT image_hash, image, alt, fetch_time, url FROM images
                 WHERE image_hash = ?1",
                params![hash],
                image_from_row,
            )
            .optional()?;
        Ok(record)
    }

    // ===== Introspection =====

    pub fn get_url(&self, url: &str) -> Result<Option<UrlRow>> {
        let row = self
            .conn
            .query_row(
                "SELECT id, url, hostname, last_visited, content_id, error, status_code,
                        retry_time, banned, rank
                 FROM urls WHERE url = ?1",
                params![url],
                |row| {
                    Ok(UrlRow {
                        id: row.get(0)?,
                        url: row.get(1)?,
                        hostname: row.get(2)?,
                        last_visited: row.get(3)?,
                        content_id: row.get(4)?,
                        error: row.get(5)?,
                        status_code: row.get(6)?,
                        retry_time: row.get(7)?,
                        banned: row.get::<_, i64>(8)? != 0,
                        rank: row.get(9)?,
                    })
                },
            )
            .optional()?;
        Ok(row)
    }

    pub fn url_count(&self) -> Result<i64> {
        Ok(self
            .conn
            .query_row("SELECT count(*) FROM urls", [], |row| row.get(0))?)
    }

    pub fn content_count(&self) -> Result<i64> {
        Ok(self
            .conn
            .query_row("SELECT count(*) FROM contents", [], |row| row.get(0))?)
    }

    pub fn link_count(&self) -> Result<i64> {
        Ok(self
            .conn
            .query_row("SELECT count(*) FROM links", [], |row| row.get(0))?)
    }

    /// Inserts an image row (used by tests and the image pipeline)
    pub fn insert_image(&mut self, record: &ImageRecord, content_hash: &str) -> Result<()> {
        self.conn.execute(
            "INSERT INTO images (image_hash, content_hash, image, alt, fetch_time, url)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)
             ON CONFLICT (image_hash) DO NOTHING",
            params![
                record.image_hash,
                content_hash,
                record.image,
                record.alt,
                record.fetch_time,
                record.url
            ],
        )?;
        Ok(())
    }
}

fn image_from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<ImageRecord> {
    Ok(ImageRecord {
        image_hash: row.get(0)?,
        image: row.get(1)?,
        alt: row.get(2)?,
        fetch_time: row.get(3)?,
        url: row.get(4)?,
    })
}

/// Hex digest identifying a content blob
pub fn content_hash(contents: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(contents);
    format!("{:x}", hasher.finalize())
}

fn null_if_empty(s: &str) -> Option<&str> {
    if s.is_empty() {
        None
    } else {
        Some(s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parse::{Link, Page};
    use crate::storage::RobotsLookup;

    fn seeded(url: &str) -> Store {
        let mut store = Store::open_in_memory().unwrap();
        store
            .seed_url(&Url::parse(url).unwrap())
            .unwrap();
        store
    }

    fn visit(url: &str, body: &[u8], links: Vec<Link>, at: i64) -> SuccessfulVisit {
        SuccessfulVisit {
            url: url.to_string(),
            status_code: 20,
            page: Page {
                text: String::from_utf8_lossy(body).to_string(),
                links,
                title: "t".to_string(),
                ..Page::default()
            },
            contents: body.to_vec(),
            content_type: "text/gemini".to_string(),
            content_type_args: String::new(),
            visited_at: at,
        }
    }

    #[test]
    fn test_seed_is_idempotent() {
        let mut store = seeded("gemini://example.org/");
        store
            .seed_url(&Url::parse("gemini://example.org/").unwrap())
            .unwrap();
        assert_eq!(store.url_count().unwrap(), 1);
    }

    #[test]
    fn test_due_urls_includes_unvisited() {
        let store = seeded("gemini://example.org/");
        let due = store.due_urls(Store::now()).unwrap();
        assert_eq!(due, vec!["gemini://example.org/".to_string()]);
    }

    #[test]
    fn test_due_urls_excludes_banned() {
        let mut store = seeded("gemini://example.org/");
        store.record_banned("gemini://example.org/").unwrap();
        assert!(store.due_urls(Store::now()).unwrap().is_empty());
    }

    #[test]
    fn test_due_urls_honors_slowdown() {
        let mut store = seeded("gemini://example.org/");
        let now = Store::now();
        store.set_host_slowdown("example.org", now + 60).unwrap();
        assert!(store.due_urls(now).unwrap().is_empty());
        // past the cooldown window the URL is due again
        assert!(!store.due_urls(now + 61).unwrap().is_empty());
    }

    #[test]
    fn test_due_urls_honors_retry_interval() {
        let mut store = seeded("gemini://example.org/");
        let now = Store::now();
        store
            .record_successful_visit(&visit("gemini://example.org/", b"hello", vec![], now))
            .unwrap();

        assert!(store.due_urls(now).unwrap().is_empty());
        let row = store.get_url("gemini://example.org/").unwrap().unwrap();
        let retry = row.retry_time.unwrap();
        assert!(!store.due_urls(now + retry + 1).unwrap().is_empty());
    }

    #[test]
    fn test_successful_visit_persists_content_and_links() {
        let mut store = seeded("gemini://example.org/");
        let links = vec![Link {
            url: "gemini://example.org/a".to_string(),
            text: "Foo".to_string(),
        }];
        store
            .record_successful_visit(&visit("gemini://example.org/", b"hello", links, Store::now()))
            .unwrap();

        assert_eq!(store.url_count().unwrap(), 2);
        assert_eq!(store.content_count().unwrap(), 1);
        assert_eq!(store.link_count().unwrap(), 1);

        let row = store.get_url("gemini://example.org/").unwrap().unwrap();
        assert!(row.content_id.is_some());
        assert_eq!(row.status_code, Some(20));
        assert!(row.error.is_none());
    }

    #[test]
    fn test_revisit_with_identical_bytes_reuses_content() {
        let mut store = seeded("gemini://example.org/");
        let now = Store::now();
        let links = vec![Link {
            url: "gemini://example.org/a".to_string(),
            text: "Foo".to_string(),
        }];
        store
            .record_successful_visit(&visit("gemini://example.org/", b"same", links.clone(), now))
            .unwrap();
        store
            .record_successful_visit(&visit("gemini://example.org/", b"same", links, now + 10))
            .unwrap();

        // content row count unchanged, links replaced not duplicated
        assert_eq!(store.content_count().unwrap(), 1);
        assert_eq!(store.link_count().unwrap(), 1);
    }

    #[test]
    fn test_unchanged_content_grows_retry_interval() {
        let mut store = seeded("gemini://example.org/");
        let now = Store::now();
        store
            .record_successful_visit(&visit("gemini://example.org/", b"same", vec![], now))
            .unwrap();
        let first = store
            .get_url("gemini://example.org/")
            .unwrap()
            .unwrap()
            .retry_time
            .unwrap();
        assert_eq!(first, REVISIT_AFTER_CHANGE);

        store
            .record_successful_visit(&visit("gemini://example.org/", b"same", vec![], now + 1))
            .unwrap();
        let second = store
            .get_url("gemini://example.org/")
            .unwrap()
            .unwrap()
            .retry_time
            .unwrap();
        // 2d + 2d = 4d, still under the cap
        assert_eq!(second, REVISIT_AFTER_CHANGE + REVISIT_INCREMENT_NO_CHANGE);
    }

    #[test]
    fn test_changed_content_resets_retry_interval() {
        let mut store = seeded("gemini://example.org/");
        let now = Store::now();
        store
            .record_successful_visit(&visit("gemini://example.org/", b"one", vec![], now))
            .unwrap();
        store
            .record_successful_visit(&visit("gemini://example.org/", b"two", vec![], now + 1))
            .unwrap();

        let row = store.get_url("gemini://example.org/").unwrap().unwrap();
        assert_eq!(row.retry_time, Some(REVISIT_AFTER_CHANGE));
        // both blobs are kept until the cleaner runs
        assert_eq!(store.content_count().unwrap(), 2);
    }

    #[test]
    fn test_temp_error_doubles_and_saturates() {
        let mut store = seeded("gemini://example.org/");
        let now = Store::now();

        store
            .record_temp_error("gemini://example.org/", Some(43), "oops", now)
            .unwrap();
        let row = store.get_url("gemini://example.org/").unwrap().unwrap();
        assert_eq!(row.retry_time, Some(TEMP_ERROR_MIN_RETRY));
        assert_eq!(row.error.as_deref(), Some("oops"));

        store
            .record_temp_error("gemini://example.org/", Some(43), "oops", now)
            .unwrap();
        let row = store.get_url("gemini://example.org/").unwrap().unwrap();
        assert_eq!(row.retry_time, Some(TEMP_ERROR_MIN_RETRY * 2));

        for _ in 0..10 {
            store
                .record_temp_error("gemini://example.org/", Some(43), "oops", now)
                .unwrap();
        }
        let row = store.get_url("gemini://example.org/").unwrap().unwrap();
        assert_eq!(row.retry_time, Some(MAX_REVISIT_TIME));
    }

    #[test]
    fn test_permanent_error_long_retry() {
        let mut store = seeded("gemini://example.org/");
        store
            .record_permanent_error("gemini://example.org/", Some(51), "not found", Store::now())
            .unwrap();
        let row = store.get_url("gemini://example.org/").unwrap().unwrap();
        assert_eq!(row.retry_time, Some(PERMANENT_ERROR_RETRY));
        assert_eq!(row.status_code, Some(51));
    }

    #[test]
    fn test_robots_roundtrip() {
        let mut store = Store::open_in_memory().unwrap();
        let now = Store::now();
        assert_eq!(
            store.robots_lookup("example.org", now).unwrap(),
            RobotsLookup::Missing
        );

        store
            .save_robots_success("example.org", &["/private".to_string()], now)
            .unwrap();
        match store.robots_lookup("example.org", now).unwrap() {
            RobotsLookup::Prefixes { prefixes, valid_until } => {
                assert_eq!(prefixes, vec!["/private".to_string()]);
                assert_eq!(valid_until, now + ROBOTS_VALIDITY);
            }
            other => panic!("expected prefixes, got {:?}", other),
        }
    }

    #[test]
    fn test_robots_empty_prefix_list() {
        let mut store = Store::open_in_memory().unwrap();
        let now = Store::now();
        store.save_robots_success("example.org", &[], now).unwrap();
        match store.robots_lookup("example.org", now).unwrap() {
            RobotsLookup::Prefixes { prefixes, .. } => assert!(prefixes.is_empty()),
            other => panic!("expected prefixes, got {:?}", other),
        }
    }

    #[test]
    fn test_robots_backoff_doubles() {
        let mut store = Store::open_in_memory().unwrap();
        let now = Store::now();

        store.save_robots_error("example.org", false, now).unwrap();
        assert_eq!(
            store.robots_lookup("example.org", now + 1).unwrap(),
            RobotsLookup::Backoff
        );
        // past the first backoff interval the host is fetchable again
        assert_eq!(
            store
                .robots_lookup("example.org", now + TEMP_ERROR_MIN_RETRY + 1)
                .unwrap(),
            RobotsLookup::Missing
        );

        // a second failure doubles the interval
        store.save_robots_error("example.org", false, now).unwrap();
        assert_eq!(
            store
                .robots_lookup("example.org", now + TEMP_ERROR_MIN_RETRY + 1)
                .unwrap(),
            RobotsLookup::Backoff
        );
    }

    #[test]
    fn test_robots_permanent_error() {
        let mut store = Store::open_in_memory().unwrap();
        let now = Store::now();
        store.save_robots_error("example.org", true, now).unwrap();
        assert_eq!(
            store
                .robots_lookup("example.org", now + TEMP_ERROR_MIN_RETRY + 1)
                .unwrap(),
            RobotsLookup::Backoff
        );
    }

    #[test]
    fn test_orphan_contents_cleaned() {
        let mut store = seeded("gemini://example.org/");
        let now = Store::now();
        store
            .record_successful_visit(&visit("gemini://example.org/", b"one", vec![], now))
            .unwrap();
        store
            .record_successful_visit(&visit("gemini://example.org/", b"two", vec![], now + 1))
            .unwrap();
        assert_eq!(store.content_count().unwrap(), 2);

        let removed = store.delete_orphan_contents().unwrap();
        assert_eq!(removed, 1);
        assert_eq!(store.content_count().unwrap(), 1);
    }

    #[test]
    fn test_rank_writes() {
        let mut store = seeded("gemini://example.org/");
        let id = store.get_url("gemini://example.org/").unwrap().unwrap().id;

        store.write_url_ranks(&[(id, 0.5)]).unwrap();
        let row = store.get_url("gemini://example.org/").unwrap().unwrap();
        assert_eq!(row.rank, Some(0.5));

        store
            .write_host_ranks(&[("example.org".to_string(), 1.0)])
            .unwrap();
    }

    #[test]
    fn test_indexable_pages_require_both_ranks() {
        let mut store = seeded("gemini://example.org/");
        let now = Store::now();
        store
            .record_successful_visit(&visit("gemini://example.org/", b"hello", vec![], now))
            .unwrap();

        let mut count = 0;
        store
            .for_each_indexable_page(|_| {
                count += 1;
                true
            })
            .unwrap();
        assert_eq!(count, 0);

        let id = store.get_url("gemini://example.org/").unwrap().unwrap().id;
        store.write_url_ranks(&[(id, 1.0)]).unwrap();
        store
            .write_host_ranks(&[("example.org".to_string(), 1.0)])
            .unwrap();

        let mut pages = Vec::new();
        store
            .for_each_indexable_page(|p| {
                pages.push(p);
                true
            })
            .unwrap();
        assert_eq!(pages.len(), 1);
        assert_eq!(pages[0].url, "gemini://example.org/");
        assert_eq!(pages[0].size, 5);
    }

    #[test]
    fn test_incoming_anchors_concatenated() {
        let mut store = seeded("gemini://example.org/");
        let now = Store::now();
        let links = vec![Link {
            url: "gemini://example.org/dst".to_string(),
            text: "Anchor Text".to_string(),
        }];
        store
            .record_successful_visit(&visit("gemini://example.org/", b"src", links, now))
            .unwrap();
        store
            .record_successful_visit(&visit("gemini://example.org/dst", b"dst", vec![], now))
            .unwrap();

        let ids: Vec<i64> = ["gemini://example.org/", "gemini://example.org/dst"]
            .iter()
            .map(|u| store.get_url(u).unwrap().unwrap().id)
            .collect();
        store
            .write_url_ranks(&ids.iter().map(|&id| (id, 1.0)).collect::<Vec<_>>())
            .unwrap();
        store
            .write_host_ranks(&[("example.org".to_string(), 1.0)])
            .unwrap();

        let mut by_url = std::collections::HashMap::new();
        store
            .for_each_indexable_page(|p| {
                by_url.insert(p.url.clone(), p);
                true
            })
            .unwrap();
        assert_eq!(by_url["gemini://example.org/dst"].links, "Anchor Text");
        assert_eq!(by_url["gemini://example.org/"].links, "");
    }

    #[test]
    fn test_images_roundtrip() {
        let mut store = Store::open_in_memory().unwrap();
        let record = ImageRecord {
            image_hash: "abc".to_string(),
            image: "base64data".to_string(),
            alt: "a drawing".to_string(),
            fetch_time: Store::now(),
            url: "gemini://example.org/pic".to_string(),
        };
        store.insert_image(&record, "contenthash").unwrap();

        let found = store.image_by_hash("abc").unwrap().unwrap();
        assert_eq!(found.alt, "a drawing");

        let random = store.random_image().unwrap().unwrap();
        assert_eq!(random.image_hash, "abc");

        assert!(store.image_by_hash("missing").unwrap().is_none());

        let mut count = 0;
        store
            .for_each_indexable_image(|_| {
                count += 1;
                true
            })
            .unwrap();
        assert_eq!(count, 1);
    }

    #[test]
    fn test_content_hash_stable() {
        assert_eq!(content_hash(b"x"), content_hash(b"x"));
        assert_ne!(content_hash(b"x"), content_hash(b"y"));
    }
}
