use chrono::NaiveDate;
use rusqlite::types::Type;
use rusqlite::{Connection, OptionalExtension};
use std::collections::HashMap;
use std::path::Path;

use crate::error::{Error, Result};
use crate::model::{ChildEdge, Setting, Title, TitleId, UserId, UserRating};

use super::migrations::{MIGRATIONS, TITLE_TABLES};

const TITLE_COLUMNS: &str = "t.id, t.imdb_id, t.title_type, t.name, t.year, t.end_year, \
     t.runtime, t.rating, t.votes, t.genres, t.parent_imdb_id, t.season, t.episode";

/// Number of columns in [`TITLE_COLUMNS`]; extra selected columns start here.
const TITLE_COLUMN_COUNT: usize = 13;

const DATE_FORMAT: &str = "%Y-%m-%d";

/// Exact-match filter for title listings.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TitleFilter {
    pub imdb_id: Option<String>,
}

/// A database connection backing the title, user rating and settings stores.
#[derive(Debug)]
pub struct Database {
    conn: Connection,
}

impl Database {
    /// Open (or create) a database at the given path and apply migrations.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let conn = Connection::open(path)?;
        let db = Self { conn };
        db.apply_migrations()?;
        Ok(db)
    }

    /// Open an in-memory database (for tests).
    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        let db = Self { conn };
        db.apply_migrations()?;
        Ok(db)
    }

    /// Get a reference to the underlying connection (for advanced queries).
    #[must_use]
    pub const fn conn(&self) -> &Connection {
        &self.conn
    }

    /// Run `f` inside a single transaction.
    ///
    /// Statements that fail inside `f` only fail themselves; the
    /// transaction is rolled back only when `f` returns an error.
    pub fn in_transaction<T>(&self, f: impl FnOnce(&Self) -> Result<T>) -> Result<T> {
        self.conn.execute_batch("BEGIN")?;
        match f(self) {
            Ok(value) => {
                self.conn.execute_batch("COMMIT")?;
                Ok(value)
            }
            Err(e) => {
                if let Err(rollback) = self.conn.execute_batch("ROLLBACK") {
                    log::error!("Rollback failed after {}: {}", e, rollback);
                }
                Err(e)
            }
        }
    }

    /// Run `f` inside a savepoint nested in the current transaction.
    ///
    /// When `f` fails, everything it wrote is rolled back and the
    /// enclosing transaction carries on.
    pub fn in_savepoint<T>(&self, f: impl FnOnce(&Self) -> Result<T>) -> Result<T> {
        self.conn.execute_batch("SAVEPOINT merge_row")?;
        match f(self) {
            Ok(value) => {
                self.conn.execute_batch("RELEASE merge_row")?;
                Ok(value)
            }
            Err(e) => {
                if let Err(rollback) = self
                    .conn
                    .execute_batch("ROLLBACK TO merge_row; RELEASE merge_row")
                {
                    log::error!("Savepoint rollback failed after {}: {}", e, rollback);
                }
                Err(e)
            }
        }
    }

    fn apply_migrations(&self) -> Result<()> {
        self.conn.execute(
            "CREATE TABLE IF NOT EXISTS schema_migrations (
                version INTEGER PRIMARY KEY,
                name TEXT NOT NULL,
                applied_at TEXT NOT NULL DEFAULT (datetime('now'))
            )",
            [],
        )?;

        let mut stmt = self
            .conn
            .prepare("SELECT version FROM schema_migrations ORDER BY version")?;
        let applied: Vec<u32> = stmt
            .query_map([], |row| row.get(0))?
            .collect::<rusqlite::Result<Vec<_>>>()?;

        for migration in MIGRATIONS {
            if !applied.contains(&migration.version) {
                log::info!(
                    "Applying migration {} ({})",
                    migration.version,
                    migration.name
                );
                self.conn.execute_batch(migration.sql)?;
                self.conn.execute(
                    "INSERT INTO schema_migrations (version, name) VALUES (?1, ?2)",
                    rusqlite::params![migration.version, migration.name],
                )?;
            }
        }

        Ok(())
    }
}

// Title store
impl Database {
    /// Permanently delete every title and child edge, then recreate the
    /// title tables with their unique `imdb_id` index and `name` text index.
    pub fn rebuild_title_tables(&self) -> Result<()> {
        self.in_transaction(|db| {
            db.conn.execute_batch(
                "DROP TABLE IF EXISTS title_children;
                 DROP TABLE IF EXISTS titles_fts;
                 DROP TABLE IF EXISTS titles;",
            )?;
            db.conn.execute_batch(TITLE_TABLES)?;
            Ok(())
        })
    }

    /// Insert a title, or overwrite the stored attributes of the title with
    /// the same `imdb_id`. Child edges are stored separately.
    pub fn save_title(&self, title: &Title) -> Result<()> {
        let genres = if title.genres.is_empty() {
            None
        } else {
            Some(serde_json::to_string(&title.genres)?)
        };

        let mut stmt = self.conn.prepare_cached(
            "INSERT INTO titles (
                id, imdb_id, title_type, name, year, end_year, runtime,
                rating, votes, genres, parent_imdb_id, season, episode
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13)
            ON CONFLICT(imdb_id) DO UPDATE SET
                title_type = excluded.title_type,
                name = excluded.name,
                year = excluded.year,
                end_year = excluded.end_year,
                runtime = excluded.runtime,
                rating = excluded.rating,
                votes = excluded.votes,
                genres = excluded.genres,
                parent_imdb_id = excluded.parent_imdb_id,
                season = excluded.season,
                episode = excluded.episode
            RETURNING seq",
        )?;
        let seq: i64 = stmt.query_row(
            rusqlite::params![
                title.id.to_string(),
                title.imdb_id,
                title.title_type,
                title.name,
                title.year.map(i64::from),
                title.end_year.map(i64::from),
                title.runtime.map(i64::from),
                title.rating,
                title.votes.map(to_sql_count).transpose()?,
                genres,
                title.parent_imdb_id,
                title.season.map(i64::from),
                title.episode.map(i64::from),
            ],
            |row| row.get(0),
        )?;

        if let Some(name) = &title.name {
            self.conn
                .prepare_cached("DELETE FROM titles_fts WHERE rowid = ?1")?
                .execute([seq])?;
            self.conn
                .prepare_cached("INSERT INTO titles_fts (rowid, name) VALUES (?1, ?2)")?
                .execute(rusqlite::params![seq, name])?;
        }

        Ok(())
    }

    /// Get a title (with its child edges) by surrogate id.
    pub fn get_title_by_id(&self, id: &TitleId) -> Result<Option<Title>> {
        self.find_one_title("t.id = ?1", &id.to_string())
    }

    /// Get a title (with its child edges) by external id.
    pub fn get_title_by_imdb_id(&self, imdb_id: &str) -> Result<Option<Title>> {
        self.find_one_title("t.imdb_id = ?1", imdb_id)
    }

    /// Get the titles for a list of external ids, in input order.
    /// Ids without a stored title are skipped.
    ///
    /// Runs one query for the titles and one for all of their child edges.
    pub fn get_titles_by_imdb_ids(&self, imdb_ids: &[String]) -> Result<Vec<Title>> {
        if imdb_ids.is_empty() {
            return Ok(Vec::new());
        }
        let sql = format!(
            "SELECT {TITLE_COLUMNS}
             FROM json_each(?1) ids
             JOIN titles t ON t.imdb_id = ids.value
             ORDER BY ids.key"
        );
        let mut stmt = self.conn.prepare_cached(&sql)?;
        let mut titles = stmt
            .query_map([serde_json::to_string(imdb_ids)?], row_to_title)?
            .collect::<rusqlite::Result<Vec<_>>>()?;

        self.attach_child_edges(&mut titles)?;
        Ok(titles)
    }

    fn find_one_title(&self, predicate: &str, value: &str) -> Result<Option<Title>> {
        let sql = format!("SELECT {TITLE_COLUMNS} FROM titles t WHERE {predicate}");
        let title = self
            .conn
            .prepare_cached(&sql)?
            .query_row([value], row_to_title)
            .optional()?;

        match title {
            Some(mut title) => {
                title.children = self.get_child_edges(&title.imdb_id)?;
                Ok(Some(title))
            }
            None => Ok(None),
        }
    }

    /// Count the titles matching `filter`.
    pub fn count_titles(&self, filter: &TitleFilter) -> Result<u64> {
        let count: i64 = self.conn.query_row(
            "SELECT COUNT(*) FROM titles t WHERE (?1 IS NULL OR t.imdb_id = ?1)",
            [filter.imdb_id.as_deref()],
            |row| row.get(0),
        )?;
        Ok(from_sql_count(count))
    }

    /// List one window of the titles matching `filter`, in insertion order.
    pub fn list_titles(&self, filter: &TitleFilter, limit: u64, offset: u64) -> Result<Vec<Title>> {
        let sql = format!(
            "SELECT {TITLE_COLUMNS} FROM titles t
             WHERE (?1 IS NULL OR t.imdb_id = ?1)
             ORDER BY t.seq
             LIMIT ?2 OFFSET ?3"
        );
        let mut stmt = self.conn.prepare(&sql)?;
        let mut titles = stmt
            .query_map(
                rusqlite::params![
                    filter.imdb_id.as_deref(),
                    to_sql_count(limit)?,
                    to_sql_count(offset)?
                ],
                row_to_title,
            )?
            .collect::<rusqlite::Result<Vec<_>>>()?;

        self.attach_child_edges(&mut titles)?;
        Ok(titles)
    }

    /// External ids of every stored title.
    pub fn list_title_imdb_ids(&self) -> Result<Vec<String>> {
        let mut stmt = self.conn.prepare("SELECT imdb_id FROM titles ORDER BY seq")?;
        let ids = stmt
            .query_map([], |row| row.get(0))?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(ids)
    }

    /// Full-text match over title names.
    ///
    /// `match_expr` is an FTS5 query. Returns each matching title (without
    /// child edges) with its raw text relevance; larger is more relevant.
    pub fn search_titles(
        &self,
        match_expr: &str,
        title_type: Option<&str>,
    ) -> Result<Vec<(Title, f64)>> {
        let sql = format!(
            "SELECT {TITLE_COLUMNS}, -bm25(titles_fts) AS relevance
             FROM titles_fts
             JOIN titles t ON t.seq = titles_fts.rowid
             WHERE titles_fts MATCH ?1 AND (?2 IS NULL OR t.title_type = ?2)"
        );
        let mut stmt = self.conn.prepare(&sql)?;
        let hits = stmt
            .query_map(rusqlite::params![match_expr, title_type], |row| {
                Ok((row_to_title(row)?, row.get::<_, f64>(TITLE_COLUMN_COUNT)?))
            })?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(hits)
    }
}

// Child edges
impl Database {
    /// Append an edge to a parent's children, or update it in place when
    /// the parent already caches that episode.
    pub fn upsert_child_edge(&self, parent_imdb_id: &str, edge: &ChildEdge) -> Result<()> {
        self.conn
            .prepare_cached(
                "INSERT INTO title_children (parent_imdb_id, imdb_id, season, episode, rating)
                 VALUES (?1, ?2, ?3, ?4, ?5)
                 ON CONFLICT(parent_imdb_id, imdb_id) DO UPDATE SET
                    season = excluded.season,
                    episode = excluded.episode,
                    rating = excluded.rating",
            )?
            .execute(rusqlite::params![
                parent_imdb_id,
                edge.imdb_id,
                edge.season.map(i64::from),
                edge.episode.map(i64::from),
                edge.rating,
            ])?;
        Ok(())
    }

    /// A parent's child edges in discovery order.
    pub fn get_child_edges(&self, parent_imdb_id: &str) -> Result<Vec<ChildEdge>> {
        let mut stmt = self.conn.prepare_cached(
            "SELECT imdb_id, season, episode, rating
             FROM title_children
             WHERE parent_imdb_id = ?1
             ORDER BY rowid",
        )?;
        let edges = stmt
            .query_map([parent_imdb_id], |row| {
                Ok(ChildEdge {
                    imdb_id: row.get(0)?,
                    season: column_u32(row, 1)?,
                    episode: column_u32(row, 2)?,
                    rating: row.get(3)?,
                })
            })?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(edges)
    }

    /// Fill in the child edges of every title with a single query.
    fn attach_child_edges(&self, titles: &mut [Title]) -> Result<()> {
        if titles.is_empty() {
            return Ok(());
        }
        let parents: Vec<&str> = titles.iter().map(|t| t.imdb_id.as_str()).collect();
        let mut stmt = self.conn.prepare_cached(
            "SELECT parent_imdb_id, imdb_id, season, episode, rating
             FROM title_children
             WHERE parent_imdb_id IN (SELECT value FROM json_each(?1))
             ORDER BY rowid",
        )?;
        let rows = stmt.query_map([serde_json::to_string(&parents)?], |row| {
            Ok((
                row.get::<_, String>(0)?,
                ChildEdge {
                    imdb_id: row.get(1)?,
                    season: column_u32(row, 2)?,
                    episode: column_u32(row, 3)?,
                    rating: row.get(4)?,
                },
            ))
        })?;

        let mut by_parent: HashMap<String, Vec<ChildEdge>> = HashMap::new();
        for row in rows {
            let (parent, edge) = row?;
            by_parent.entry(parent).or_default().push(edge);
        }
        for title in titles.iter_mut() {
            title.children = by_parent.get(&title.imdb_id).cloned().unwrap_or_default();
        }
        Ok(())
    }

    pub fn count_child_edges(&self) -> Result<u64> {
        let count: i64 =
            self.conn
                .query_row("SELECT COUNT(*) FROM title_children", [], |row| row.get(0))?;
        Ok(from_sql_count(count))
    }
}

// User ratings
impl Database {
    /// Insert a rating, replacing any previous rating of the same title by
    /// the same user.
    pub fn save_user_rating(&self, rating: &UserRating) -> Result<()> {
        self.conn
            .prepare_cached(
                "INSERT INTO user_ratings (user_id, imdb_id, rating, date)
                 VALUES (?1, ?2, ?3, ?4)
                 ON CONFLICT(user_id, imdb_id) DO UPDATE SET
                    rating = excluded.rating,
                    date = excluded.date",
            )?
            .execute(rusqlite::params![
                rating.user_id.to_string(),
                rating.imdb_id,
                i64::from(rating.rating),
                rating.date.format(DATE_FORMAT).to_string(),
            ])?;
        Ok(())
    }

    /// Delete every rating of a user. Returns the number of rows removed.
    pub fn delete_user_ratings(&self, user_id: &UserId) -> Result<usize> {
        let removed = self.conn.execute(
            "DELETE FROM user_ratings WHERE user_id = ?1",
            [user_id.to_string()],
        )?;
        Ok(removed)
    }

    pub fn get_user_rating(&self, user_id: &UserId, imdb_id: &str) -> Result<Option<UserRating>> {
        let rating = self
            .conn
            .prepare_cached(
                "SELECT user_id, imdb_id, rating, date
                 FROM user_ratings
                 WHERE user_id = ?1 AND imdb_id = ?2",
            )?
            .query_row(
                rusqlite::params![user_id.to_string(), imdb_id],
                row_to_user_rating,
            )
            .optional()?;
        Ok(rating)
    }

    /// All ratings of a user, oldest first.
    pub fn list_user_ratings(&self, user_id: &UserId) -> Result<Vec<UserRating>> {
        let mut stmt = self.conn.prepare(
            "SELECT user_id, imdb_id, rating, date
             FROM user_ratings
             WHERE user_id = ?1
             ORDER BY date, imdb_id",
        )?;
        let ratings = stmt
            .query_map([user_id.to_string()], row_to_user_rating)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(ratings)
    }

    pub fn count_user_ratings(&self) -> Result<u64> {
        let count: i64 =
            self.conn
                .query_row("SELECT COUNT(*) FROM user_ratings", [], |row| row.get(0))?;
        Ok(from_sql_count(count))
    }
}

// Settings
impl Database {
    pub fn get_setting(&self, key: &str) -> Result<Option<String>> {
        let value = self
            .conn
            .query_row("SELECT value FROM settings WHERE key = ?1", [key], |row| {
                row.get(0)
            })
            .optional()?;
        Ok(value)
    }

    /// Create a setting. Fails if the key already exists.
    pub fn create_setting(&self, key: &str, value: &str) -> Result<()> {
        self.conn.execute(
            "INSERT INTO settings (key, value) VALUES (?1, ?2)",
            [key, value],
        )?;
        Ok(())
    }

    /// Update an existing setting.
    pub fn update_setting(&self, key: &str, value: &str) -> Result<()> {
        let updated = self.conn.execute(
            "UPDATE settings SET value = ?2 WHERE key = ?1",
            [key, value],
        )?;
        if updated == 0 {
            return Err(Error::NotFound {
                entity: "setting",
                id: key.to_string(),
            });
        }
        Ok(())
    }

    /// Read a setting, creating it with `default` on a miss.
    pub fn get_or_create_setting(&self, key: &str, default: &str) -> Result<String> {
        if let Some(value) = self.get_setting(key)? {
            return Ok(value);
        }
        self.create_setting(key, default)?;
        Ok(default.to_string())
    }

    pub fn list_settings(&self) -> Result<Vec<Setting>> {
        let mut stmt = self
            .conn
            .prepare("SELECT key, value FROM settings ORDER BY key")?;
        let settings = stmt
            .query_map([], |row| Ok(Setting::new(row.get::<_, String>(0)?, row.get::<_, String>(1)?)))?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(settings)
    }
}

fn row_to_title(row: &rusqlite::Row) -> rusqlite::Result<Title> {
    let id: String = row.get(0)?;
    let genres: Option<String> = row.get(9)?;

    Ok(Title {
        id: id.parse::<TitleId>().map_err(|e| conversion_error(0, e))?,
        imdb_id: row.get(1)?,
        title_type: row.get(2)?,
        name: row.get(3)?,
        year: column_i32(row, 4)?,
        end_year: column_i32(row, 5)?,
        runtime: column_u32(row, 6)?,
        rating: row.get(7)?,
        votes: row
            .get::<_, Option<i64>>(8)?
            .map(|v| u64::try_from(v).map_err(|e| conversion_error(8, e)))
            .transpose()?,
        genres: genres
            .map(|g| serde_json::from_str(&g).map_err(|e| conversion_error(9, e)))
            .transpose()?
            .unwrap_or_default(),
        parent_imdb_id: row.get(10)?,
        season: column_u32(row, 11)?,
        episode: column_u32(row, 12)?,
        children: Vec::new(),
    })
}

fn row_to_user_rating(row: &rusqlite::Row) -> rusqlite::Result<UserRating> {
    let user_id: String = row.get(0)?;
    let rating: i64 = row.get(2)?;
    let date: String = row.get(3)?;

    Ok(UserRating {
        user_id: user_id
            .parse::<UserId>()
            .map_err(|e| conversion_error(0, e))?,
        imdb_id: row.get(1)?,
        rating: u8::try_from(rating).map_err(|e| conversion_error(2, e))?,
        date: NaiveDate::parse_from_str(&date, DATE_FORMAT).map_err(|e| conversion_error(3, e))?,
    })
}

fn column_u32(row: &rusqlite::Row, idx: usize) -> rusqlite::Result<Option<u32>> {
    row.get::<_, Option<i64>>(idx)?
        .map(|v| u32::try_from(v).map_err(|e| conversion_error(idx, e)))
        .transpose()
}

fn column_i32(row: &rusqlite::Row, idx: usize) -> rusqlite::Result<Option<i32>> {
    row.get::<_, Option<i64>>(idx)?
        .map(|v| i32::try_from(v).map_err(|e| conversion_error(idx, e)))
        .transpose()
}

fn conversion_error<E>(idx: usize, e: E) -> rusqlite::Error
where
    E: std::error::Error + Send + Sync + 'static,
{
    rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(e))
}

fn to_sql_count(value: u64) -> Result<i64> {
    i64::try_from(value).map_err(|_| Error::InvalidData(format!("count {value} exceeds i64")))
}

fn from_sql_count(value: i64) -> u64 {
    u64::try_from(value).unwrap_or(0)
}
