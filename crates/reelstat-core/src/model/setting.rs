use serde::{Deserialize, Serialize};

/// Well-known process-wide settings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SettingKey {
    /// Date (`YYYY-MM-DD`) of the last title collection rebuild.
    LastDrop,
    /// `"true"` while scheduled refreshes are administratively paused.
    UpdatePaused,
    /// Daily refresh time as `HH:MM`.
    RefreshTime,
}

impl SettingKey {
    pub const ALL: [Self; 3] = [Self::LastDrop, Self::UpdatePaused, Self::RefreshTime];

    /// Key stored in the settings table.
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::LastDrop => "last_drop",
            Self::UpdatePaused => "is_update_paused",
            Self::RefreshTime => "refresh_time",
        }
    }
}

/// A durable key/value pair, unique on `key`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Setting {
    pub key: String,
    pub value: String,
}

impl Setting {
    #[must_use]
    pub fn new(key: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            value: value.into(),
        }
    }
}
