/// A schema migration.
#[derive(Debug)]
pub struct Migration {
    pub version: u32,
    pub name: &'static str,
    pub sql: &'static str,
}

/// Tables owned by the title merge store.
///
/// Also replayed verbatim by a collection rebuild, which drops the three
/// tables and recreates them together with their unique and text indexes.
pub const TITLE_TABLES: &str = r#"
-- Merged titles
CREATE TABLE IF NOT EXISTS titles (
    seq INTEGER PRIMARY KEY,
    id TEXT NOT NULL UNIQUE,
    imdb_id TEXT NOT NULL,
    title_type TEXT,
    name TEXT,
    year INTEGER,
    end_year INTEGER,
    runtime INTEGER,
    rating REAL,
    votes INTEGER,
    genres TEXT,
    parent_imdb_id TEXT,
    season INTEGER,
    episode INTEGER
);

CREATE UNIQUE INDEX IF NOT EXISTS idx_titles_imdb_id ON titles(imdb_id);
CREATE INDEX IF NOT EXISTS idx_titles_parent_imdb_id ON titles(parent_imdb_id);
CREATE INDEX IF NOT EXISTS idx_titles_type ON titles(title_type);

-- Episode edges cached on their parent, in discovery (rowid) order
CREATE TABLE IF NOT EXISTS title_children (
    parent_imdb_id TEXT NOT NULL,
    imdb_id TEXT NOT NULL,
    season INTEGER,
    episode INTEGER,
    rating REAL,
    PRIMARY KEY (parent_imdb_id, imdb_id)
);

-- Text index on title names; rowid mirrors titles.seq
CREATE VIRTUAL TABLE IF NOT EXISTS titles_fts USING fts5(
    name,
    tokenize = 'unicode61 remove_diacritics 2'
);
"#;

const MIGRATION_002: &str = r#"
-- Per-user ratings
CREATE TABLE IF NOT EXISTS user_ratings (
    user_id TEXT NOT NULL,
    imdb_id TEXT NOT NULL,
    rating INTEGER NOT NULL CHECK (rating BETWEEN 1 AND 10),
    date TEXT NOT NULL,
    PRIMARY KEY (user_id, imdb_id)
);

CREATE INDEX IF NOT EXISTS idx_user_ratings_imdb_id ON user_ratings(imdb_id);

-- Process-wide settings
CREATE TABLE IF NOT EXISTS settings (
    key TEXT PRIMARY KEY,
    value TEXT NOT NULL
);
"#;

pub const MIGRATIONS: &[Migration] = &[
    Migration {
        version: 1,
        name: "title_store",
        sql: TITLE_TABLES,
    },
    Migration {
        version: 2,
        name: "user_ratings_and_settings",
        sql: MIGRATION_002,
    },
];
