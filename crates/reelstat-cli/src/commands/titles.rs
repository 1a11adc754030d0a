use anyhow::{Context, Result};
use serde::Serialize;

use reelstat_core::model::{TitleId, UserId};
use reelstat_core::schema::{Database, TitleFilter};
use reelstat_etl::Config;
use reelstat_query::{QueryConfig, QueryEngine, UserRatingQuery};

fn engine(config: &Config) -> Result<QueryEngine> {
    let db = Database::open(&config.database_path).context("Failed to open database")?;
    Ok(QueryEngine::new(
        db,
        QueryConfig {
            page_limits: config.page_limits,
            search_limit: config.search_limit,
        },
    ))
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

fn print_found<T: Serialize>(value: Option<T>, what: &str) -> Result<()> {
    match value {
        Some(value) => print_json(&value),
        None => {
            eprintln!("{what} not found");
            Ok(())
        }
    }
}

/// Show one title, with the user's rating when a user is given.
pub fn show_title(config: &Config, imdb_id: &str, user: Option<UserId>) -> Result<()> {
    let engine = engine(config)?;
    let what = format!("Title {imdb_id}");
    match user {
        Some(user) => print_found(
            engine.get_by_external_id_with_user_rating(imdb_id, &user)?,
            &what,
        ),
        None => print_found(engine.get_by_external_id(imdb_id)?, &what),
    }
}

pub fn show_title_by_id(config: &Config, id: TitleId) -> Result<()> {
    let engine = engine(config)?;
    print_found(engine.get_by_id(&id)?, &format!("Title with id {id}"))
}

pub fn list_titles(
    config: &Config,
    imdb_id: Option<String>,
    page: Option<u32>,
    items_per_page: Option<u32>,
) -> Result<()> {
    let engine = engine(config)?;
    let filter = TitleFilter { imdb_id };
    print_json(&engine.list_all(&filter, page, items_per_page)?)
}

pub fn search_titles(config: &Config, text: &str, title_type: Option<&str>) -> Result<()> {
    let engine = engine(config)?;
    print_json(&engine.search_by_name(text, title_type)?)
}

pub fn show_episodes(config: &Config, series: &str, user: UserId) -> Result<()> {
    let engine = engine(config)?;
    print_found(
        engine.get_episodes_with_user_rating(series, &user)?,
        &format!("Series {series}"),
    )
}

pub fn show_rated_series(config: &Config, user: UserId) -> Result<()> {
    let engine = engine(config)?;
    print_json(&engine.get_user_rated_series(&user)?)
}

pub fn show_seasons(config: &Config, user: UserId) -> Result<()> {
    let engine = engine(config)?;
    print_json(&engine.get_seasons_from_user_rated_series(&user)?)
}

pub fn show_analysis(config: &Config, user: UserId) -> Result<()> {
    let engine = engine(config)?;
    print_json(&engine.get_analysis(&user)?)
}

pub fn list_ratings(config: &Config, user: UserId, query: &UserRatingQuery) -> Result<()> {
    let engine = engine(config)?;
    print_json(&engine.list_user_ratings(&user, query)?)
}
