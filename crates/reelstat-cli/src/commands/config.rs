use anyhow::{Context, Result};
use reelstat_etl::{config, Config};
use toml_edit::{DocumentMut, Item};

/// Show the current effective configuration.
pub fn show_config(config: &Config) -> Result<()> {
    println!("Current Configuration");
    println!("=====================\n");

    let path = config::config_file_path();
    println!("Config file: {}", path.display());
    let exists = path.exists();
    println!("File exists: {}\n", if exists { "yes" } else { "no (using defaults)" });

    println!("Settings:");
    println!("  database_path: {}", config.database_path.display());
    println!("  data_dir: {}", config.data_dir.display());
    println!(
        "  mirror_dir: {}",
        config
            .mirror_dir
            .as_ref()
            .map_or_else(|| "<not set>".to_string(), |d| d.display().to_string())
    );
    println!("  user_ratings_dir: {}", config.user_ratings_dir.display());
    println!("  minimum_votes: {}", config.minimum_votes);
    println!(
        "  drop_collection_interval_days: {}",
        config.drop_collection_interval_days
    );
    println!("  refresh_time: {}", config.refresh_time);
    println!("  search_limit: {}", config.search_limit);
    println!(
        "  page_limits: {}..={} (default {})",
        config.page_limits.min, config.page_limits.max, config.page_limits.default
    );
    println!("  logging.level: {}", config.logging.level);
    println!("  logging.coloured: {}", config.logging.coloured);

    println!("\nPriority: CLI args > ENV vars (REELSTAT_*) > Config file > Defaults");

    Ok(())
}

/// Look up a dotted key such as `logging.level` in the serialized config.
fn lookup(config: &Config, key: &str) -> Result<Option<serde_json::Value>> {
    let tree = serde_json::to_value(config)?;
    let pointer = format!("/{}", key.replace('.', "/"));
    Ok(tree.pointer(&pointer).cloned())
}

/// Print one config value, or the whole file when no key is given.
pub fn get_config(config: &Config, key: Option<String>) -> Result<()> {
    let Some(key) = key else {
        let config_path = config::config_file_path();
        if config_path.exists() {
            let contents =
                std::fs::read_to_string(&config_path).context("Failed to read config file")?;
            print!("{}", contents);
        } else {
            println!("Config file does not exist: {}", config_path.display());
            println!("\nRun 'reelstat config init' to create it.");
        }
        return Ok(());
    };

    match lookup(config, &key)? {
        Some(serde_json::Value::String(s)) => println!("{s}"),
        Some(serde_json::Value::Null) => println!("<not set>"),
        Some(value) => println!("{value}"),
        None => anyhow::bail!("Unknown config key: {}", key),
    }
    Ok(())
}

/// Write `value` under a dotted `key`, creating tables on the way.
///
/// Values that parse as TOML (numbers, booleans, quoted strings) keep
/// their type; anything else is stored as a string.
fn set_value(doc: &mut DocumentMut, key: &str, value: &str) -> Result<()> {
    let mut parts: Vec<&str> = key.split('.').collect();
    let Some(last) = parts.pop() else {
        anyhow::bail!("Empty config key");
    };

    let mut table = doc.as_table_mut();
    for part in parts {
        table = table
            .entry(part)
            .or_insert(toml_edit::table())
            .as_table_mut()
            .ok_or_else(|| anyhow::anyhow!("{part} in {key} is not a table"))?;
    }

    let mut parsed = value
        .parse::<toml_edit::Value>()
        .unwrap_or_else(|_| toml_edit::Value::from(value));
    *parsed.decor_mut() = table
        .get(last)
        .and_then(Item::as_value)
        .map(|old| old.decor().clone())
        .unwrap_or_default();

    // Indexing replaces the item only; the key and its comments stay.
    table[last] = toml_edit::value(parsed);
    Ok(())
}

/// Set a config value in the config file, keeping its comments.
pub fn set_config(key: String, value: String) -> Result<()> {
    if lookup(&Config::default(), &key)?.is_none() {
        anyhow::bail!("Unknown config key: {}", key);
    }

    config::ensure_config_file()?;
    let config_path = config::config_file_path();
    let contents = std::fs::read_to_string(&config_path).context("Failed to read config file")?;
    let mut doc: DocumentMut = contents.parse().context("Config file is not valid TOML")?;

    set_value(&mut doc, &key, &value)?;

    std::fs::write(&config_path, doc.to_string()).context("Failed to write config file")?;

    println!("✓ Updated {} = {}", key, value);
    println!("  in {}", config_path.display());

    Ok(())
}

/// Show the config file path.
pub fn show_path() -> Result<()> {
    println!("{}", config::config_file_path().display());
    Ok(())
}

/// Show example configuration.
pub fn show_example() -> Result<()> {
    print!("{}", config::example_config());
    Ok(())
}

/// Initialize config file with defaults.
pub fn init_config() -> Result<()> {
    let created = config::ensure_config_file()?;
    let config_path = config::config_file_path();

    if created {
        println!("✓ Created config file: {}", config_path.display());
        println!("\nEdit this file to configure reelstat.");
    } else {
        println!("Config file already exists: {}", config_path.display());
    }

    Ok(())
}
