use anyhow::{Context, Result};
use reelstat_core::schema::{Database, TitleFilter};
use reelstat_etl::Config;

pub fn show_status(config: &Config) -> Result<()> {
    let db = Database::open(&config.database_path).context("Failed to open database")?;

    let titles = db.count_titles(&TitleFilter::default())?;
    let edges = db.count_child_edges()?;
    let ratings = db.count_user_ratings()?;

    println!("\n📊 Reelstat Status\n");
    println!("  Database: {}", config.database_path.display());
    println!("  Titles: {titles}");
    println!("  Episode links: {edges}");
    println!("  User ratings: {ratings}");

    let settings = db.list_settings()?;
    if !settings.is_empty() {
        println!("\n  Settings:");
        for setting in &settings {
            println!("    {} = {}", setting.key, setting.value);
        }
    }

    if titles == 0 {
        println!("\n  Run `reelstat refresh` to load the datasets");
    }

    Ok(())
}
