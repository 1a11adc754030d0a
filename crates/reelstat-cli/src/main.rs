use anyhow::Result;
use clap::Parser;
use std::path::PathBuf;

use reelstat_core::model::{TitleId, UserId};
use reelstat_etl::Config;
use reelstat_query::{SortDirection, UserRatingQuery, UserRatingSort};

mod commands;

#[derive(Debug, Parser)]
#[command(name = "reelstat", version, about)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Path to the database (default: ~/.local/share/reelstat/reelstat.db)
    #[arg(long, global = true)]
    db: Option<PathBuf>,
}

#[derive(Debug, clap::Subcommand)]
enum Commands {
    /// Download and merge the ratings, basics and episode datasets
    ///
    /// The title collection is dropped and rebuilt when the last rebuild is
    /// older than `drop_collection_interval_days`. Rating rows under
    /// `minimum_votes` are ignored, along with the basics and episode rows
    /// of the same titles. Nothing happens while updates are paused.
    Refresh {
        /// Rebuild even if the last rebuild is recent
        #[arg(long)]
        force: bool,
    },
    /// Refresh every day at the stored refresh time until Ctrl-C
    Schedule,
    /// Pause refreshes
    Pause,
    /// Resume refreshes
    Resume,
    /// Replace a user's ratings with a CSV export (tconst,rating,date)
    Import {
        /// User id (UUID)
        user: UserId,
        /// Ratings file (default: <user_ratings_dir>/<user>.csv)
        path: Option<PathBuf>,
        /// Delete the file after a successful import
        #[arg(long)]
        delete: bool,
    },
    /// Look up, list and search titles
    Title {
        #[command(subcommand)]
        action: TitleAction,
    },
    /// Show a series with its episodes and the user's ratings of them
    Episodes {
        /// Series external id
        series: String,
        #[arg(long)]
        user: UserId,
    },
    /// List the series a user rated, with their episode ratings
    Series {
        #[arg(long)]
        user: UserId,
    },
    /// Per-season averages of the series a user rated
    Seasons {
        #[arg(long)]
        user: UserId,
    },
    /// Rating distribution, bias and largest disagreements of a user
    Analysis {
        #[arg(long)]
        user: UserId,
    },
    /// List a user's ratings with their titles
    Ratings {
        #[arg(long)]
        user: UserId,
        /// Only this exact rating
        #[arg(long)]
        rating: Option<u8>,
        /// Case-insensitive part of the title name
        #[arg(long)]
        name: Option<String>,
        /// Title type (repeatable)
        #[arg(long = "type")]
        types: Vec<String>,
        #[arg(long)]
        year: Option<i32>,
        /// Only episodes of this series
        #[arg(long)]
        parent: Option<String>,
        /// date, rating, name or year
        #[arg(long, default_value = "date")]
        sort: UserRatingSort,
        /// Sort descending
        #[arg(long)]
        desc: bool,
        #[arg(long)]
        page: Option<u32>,
        #[arg(long)]
        per_page: Option<u32>,
    },
    /// Show collection and settings status
    Status,
    /// Manage configuration
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

#[derive(Debug, clap::Subcommand)]
enum TitleAction {
    /// Show a title by external id
    Show {
        imdb_id: String,
        /// Include this user's rating
        #[arg(long)]
        user: Option<UserId>,
    },
    /// Show a title by surrogate id
    Id { id: TitleId },
    /// List titles page by page
    List {
        /// Exact external id filter
        #[arg(long)]
        imdb_id: Option<String>,
        #[arg(long)]
        page: Option<u32>,
        #[arg(long)]
        per_page: Option<u32>,
    },
    /// Search titles by name
    Search {
        text: String,
        /// Only titles of this type
        #[arg(long = "type")]
        title_type: Option<String>,
    },
}

#[derive(Debug, clap::Subcommand)]
enum ConfigAction {
    /// Create the config file with defaults
    Init,
    /// Show the effective configuration
    Show,
    /// Print a value (dotted key), or the whole file
    Get { key: Option<String> },
    /// Set a value (dotted key) in the config file
    Set { key: String, value: String },
    /// Print the config file path
    Path,
    /// Print an example config file
    Example,
}

fn ensure_parent_dir(path: &std::path::Path) -> Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let config = Config::load_with_db_path(cli.db)?;
    reelstat_etl::logging::init(&config.logging)?;

    ensure_parent_dir(&config.database_path)?;

    match cli.command {
        Commands::Refresh { force } => commands::run_refresh(&config, force).await?,
        Commands::Schedule => commands::run_schedule(&config).await?,
        Commands::Pause => commands::set_paused(&config, true)?,
        Commands::Resume => commands::set_paused(&config, false)?,
        Commands::Import { user, path, delete } => {
            commands::run_import(&config, user, path, delete)?;
        }
        Commands::Title { action } => match action {
            TitleAction::Show { imdb_id, user } => {
                commands::titles::show_title(&config, &imdb_id, user)?;
            }
            TitleAction::Id { id } => commands::titles::show_title_by_id(&config, id)?,
            TitleAction::List {
                imdb_id,
                page,
                per_page,
            } => commands::titles::list_titles(&config, imdb_id, page, per_page)?,
            TitleAction::Search { text, title_type } => {
                commands::titles::search_titles(&config, &text, title_type.as_deref())?;
            }
        },
        Commands::Episodes { series, user } => {
            commands::titles::show_episodes(&config, &series, user)?;
        }
        Commands::Series { user } => commands::titles::show_rated_series(&config, user)?,
        Commands::Seasons { user } => commands::titles::show_seasons(&config, user)?,
        Commands::Analysis { user } => commands::titles::show_analysis(&config, user)?,
        Commands::Ratings {
            user,
            rating,
            name,
            types,
            year,
            parent,
            sort,
            desc,
            page,
            per_page,
        } => {
            let query = UserRatingQuery {
                rating,
                name,
                types,
                year,
                parent_imdb_id: parent,
                sort_by: sort,
                direction: if desc {
                    SortDirection::Descending
                } else {
                    SortDirection::Ascending
                },
                page,
                items_per_page: per_page,
            };
            commands::titles::list_ratings(&config, user, &query)?;
        }
        Commands::Status => commands::show_status(&config)?,
        Commands::Config { action } => match action {
            ConfigAction::Init => commands::config::init_config()?,
            ConfigAction::Show => commands::config::show_config(&config)?,
            ConfigAction::Get { key } => commands::config::get_config(&config, key)?,
            ConfigAction::Set { key, value } => commands::config::set_config(key, value)?,
            ConfigAction::Path => commands::config::show_path()?,
            ConfigAction::Example => commands::config::show_example()?,
        },
    }

    Ok(())
}
