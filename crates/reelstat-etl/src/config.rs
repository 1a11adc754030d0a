use anyhow::{Context, Result};
use confyg::{env, Confygery};
use reelstat_core::paging::PageLimits;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Configuration for reelstat.
///
/// Configuration is loaded from multiple sources with the following priority:
/// 1. CLI arguments (highest priority)
/// 2. Environment variables (REELSTAT_* prefix)
/// 3. Config file (~/.config/reelstat/config.toml)
/// 4. Built-in defaults (lowest priority)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Path to the SQLite database.
    ///
    /// Can be set via:
    /// - CLI: --db /path/to/db
    /// - ENV: REELSTAT_DATABASE_PATH
    /// - Config: database_path = "/path/to/db"
    /// - Default: ~/.local/share/reelstat/reelstat.db
    #[serde(default = "default_db_path")]
    pub database_path: PathBuf,

    /// Where downloaded and decompressed dataset files are written.
    #[serde(default = "default_data_dir")]
    pub data_dir: PathBuf,

    /// Copy dataset archives from this directory instead of downloading them.
    #[serde(default)]
    pub mirror_dir: Option<PathBuf>,

    /// Default location of per-user rating files (`<user id>.csv`).
    #[serde(default = "default_user_ratings_dir")]
    pub user_ratings_dir: PathBuf,

    #[serde(default)]
    pub datasets: DatasetUrls,

    /// Rating rows with fewer votes are dropped, and with them every
    /// basics and episode row for the same title.
    #[serde(default = "default_minimum_votes")]
    pub minimum_votes: u64,

    /// Days between two title collection rebuilds.
    #[serde(default = "default_drop_interval")]
    pub drop_collection_interval_days: i64,

    /// Progress is logged every this many percent while merging (0 disables).
    #[serde(default = "default_progress_step")]
    pub progress_step: u32,

    /// Daily refresh time (`HH:MM`, local time) seeded into settings.
    #[serde(default = "default_refresh_time")]
    pub refresh_time: String,

    #[serde(default)]
    pub page_limits: PageLimits,

    /// Maximum number of name search results.
    #[serde(default = "default_search_limit")]
    pub search_limit: usize,

    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Remote locations of the three datasets.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatasetUrls {
    #[serde(default = "default_ratings_url")]
    pub ratings_url: String,
    #[serde(default = "default_basics_url")]
    pub basics_url: String,
    #[serde(default = "default_episodes_url")]
    pub episodes_url: String,
}

impl Default for DatasetUrls {
    fn default() -> Self {
        Self {
            ratings_url: default_ratings_url(),
            basics_url: default_basics_url(),
            episodes_url: default_episodes_url(),
        }
    }
}

/// Logger options handed to twyg.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// One of trace, debug, info, warn, error.
    #[serde(default = "default_log_level")]
    pub level: String,
    #[serde(default = "default_true")]
    pub coloured: bool,
    #[serde(default)]
    pub report_caller: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            coloured: true,
            report_caller: false,
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            database_path: default_db_path(),
            data_dir: default_data_dir(),
            mirror_dir: None,
            user_ratings_dir: default_user_ratings_dir(),
            datasets: DatasetUrls::default(),
            minimum_votes: default_minimum_votes(),
            drop_collection_interval_days: default_drop_interval(),
            progress_step: default_progress_step(),
            refresh_time: default_refresh_time(),
            page_limits: PageLimits::default(),
            search_limit: default_search_limit(),
            logging: LoggingConfig::default(),
        }
    }
}

impl Config {
    /// Load configuration from file and environment variables.
    ///
    /// Searches for config file at: ~/.config/reelstat/config.toml
    /// Reads environment variables with REELSTAT_ prefix.
    ///
    /// # Errors
    ///
    /// Returns an error if the config file exists but cannot be parsed.
    pub fn load() -> Result<Self> {
        let config_path = config_file_path();

        let mut builder = Confygery::new().context("Failed to create config builder")?;

        if config_path.exists() {
            let path_str = config_path
                .to_str()
                .ok_or_else(|| anyhow::anyhow!("Config path contains invalid UTF-8"))?;
            builder
                .add_file(path_str)
                .context("Failed to load config file")?;
        }

        let env_opts = env::Options::with_top_level("reelstat");
        builder
            .add_env(env_opts)
            .context("Failed to load environment variables")?;

        let config: Self = builder
            .build()
            .context("Failed to build configuration")?;

        Ok(config)
    }

    /// Load configuration, overriding the database path when given.
    ///
    /// This is used when the --db CLI flag is provided.
    pub fn load_with_db_path(db_path: Option<PathBuf>) -> Result<Self> {
        let mut config = Self::load()?;
        if let Some(db_path) = db_path {
            config.database_path = db_path;
        }
        Ok(config)
    }
}

fn default_db_path() -> PathBuf {
    data_root().join("reelstat.db")
}

fn default_data_dir() -> PathBuf {
    data_root().join("datasets")
}

fn default_user_ratings_dir() -> PathBuf {
    data_root().join("user-ratings")
}

/// ~/.local/share/reelstat (or platform equivalent).
fn data_root() -> PathBuf {
    dirs::data_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("reelstat")
}

fn default_ratings_url() -> String {
    "https://datasets.imdbws.com/title.ratings.tsv.gz".to_string()
}

fn default_basics_url() -> String {
    "https://datasets.imdbws.com/title.basics.tsv.gz".to_string()
}

fn default_episodes_url() -> String {
    "https://datasets.imdbws.com/title.episode.tsv.gz".to_string()
}

const fn default_minimum_votes() -> u64 {
    100
}

const fn default_drop_interval() -> i64 {
    7
}

const fn default_progress_step() -> u32 {
    10
}

fn default_refresh_time() -> String {
    "03:00".to_string()
}

const fn default_search_limit() -> usize {
    5
}

fn default_log_level() -> String {
    "info".to_string()
}

const fn default_true() -> bool {
    true
}

/// Get the config file path.
///
/// Returns:
/// - Linux: ~/.config/reelstat/config.toml
/// - macOS: ~/Library/Application Support/reelstat/config.toml
/// - Windows: %APPDATA%\reelstat\config.toml
pub fn config_file_path() -> PathBuf {
    dirs::config_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("reelstat")
        .join("config.toml")
}

/// Get the example config file content.
pub fn example_config() -> &'static str {
    r#"# Reelstat Configuration File
#
# Configuration is loaded from multiple sources with the following priority:
# 1. CLI arguments (highest priority)
# 2. Environment variables (REELSTAT_* prefix)
# 3. This config file
# 4. Built-in defaults (lowest priority)

# Rating rows below this vote count are ignored, together with the
# basics and episode rows of the same titles.
minimum_votes = 100

# Days between two full rebuilds of the title collection.
drop_collection_interval_days = 7

# Log merge progress every N percent (0 disables).
progress_step = 10

# Daily refresh time used by `reelstat schedule` (local time).
refresh_time = "03:00"

# Path to the SQLite database
#
# Can also be set via:
# - CLI: reelstat --db /custom/path.db status
# - Environment: REELSTAT_DATABASE_PATH=/custom/path.db
#
# Default: Platform-specific data directory
#database_path = "/path/to/custom/reelstat.db"

# Copy dataset archives from a local directory instead of downloading them.
#mirror_dir = "/srv/imdb-mirror"

[logging]
level = "info"
coloured = true
report_caller = false
"#
}

/// Create default config file if it doesn't exist.
///
/// Returns true if a new file was created, false if it already existed.
pub fn ensure_config_file() -> Result<bool> {
    let config_path = config_file_path();

    if config_path.exists() {
        return Ok(false);
    }

    if let Some(parent) = config_path.parent() {
        std::fs::create_dir_all(parent).context("Failed to create config directory")?;
    }

    std::fs::write(&config_path, example_config()).context("Failed to write config file")?;

    Ok(true)
}
