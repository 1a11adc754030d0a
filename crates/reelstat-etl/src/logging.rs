//! Logger setup through twyg.

use anyhow::Result;
use twyg::{LogLevel, OptsBuilder};

use crate::config::LoggingConfig;

/// Map a configured level name onto a twyg level. Unknown names mean info.
pub fn level_from_name(name: &str) -> LogLevel {
    match name.trim().to_ascii_lowercase().as_str() {
        "trace" => LogLevel::Trace,
        "debug" => LogLevel::Debug,
        "warn" | "warning" => LogLevel::Warn,
        "error" => LogLevel::Error,
        _ => LogLevel::Info,
    }
}

/// Install the global logger. Call once, at startup.
pub fn init(config: &LoggingConfig) -> Result<()> {
    let opts = OptsBuilder::new()
        .coloured(config.coloured)
        .level(level_from_name(&config.level))
        .report_caller(config.report_caller)
        .build()
        .map_err(|e| anyhow::anyhow!("Invalid logging options: {e}"))?;
    twyg::setup(opts).map_err(|e| anyhow::anyhow!("Failed to set up logging: {e}"))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_level_from_name() {
        assert!(matches!(level_from_name("debug"), LogLevel::Debug));
        assert!(matches!(level_from_name("WARN"), LogLevel::Warn));
        assert!(matches!(level_from_name("chatty"), LogLevel::Info));
    }
}
