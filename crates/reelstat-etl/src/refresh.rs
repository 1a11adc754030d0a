//! Refresh policy: is a collection rebuild due, and are refreshes paused?

use std::fmt::Debug;
use std::sync::Arc;

use chrono::{Local, NaiveDate, NaiveDateTime};
use reelstat_core::model::SettingKey;
use reelstat_core::schema::Database;

const DATE_FORMAT: &str = "%Y-%m-%d";

/// Source of the current local time.
pub trait Clock: Debug + Send + Sync {
    fn now(&self) -> NaiveDateTime;

    fn today(&self) -> NaiveDate {
        self.now().date()
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> NaiveDateTime {
        Local::now().naive_local()
    }
}

/// A clock stuck at one instant.
#[derive(Debug, Clone, Copy)]
pub struct FixedClock(pub NaiveDateTime);

impl FixedClock {
    /// Midnight of the given day.
    pub fn on(date: NaiveDate) -> Self {
        Self(date.and_time(chrono::NaiveTime::MIN))
    }
}

impl Clock for FixedClock {
    fn now(&self) -> NaiveDateTime {
        self.0
    }
}

/// `true` when no rebuild was ever recorded or at least `interval_days`
/// whole days have passed since the last one.
pub fn should_rebuild(last_drop: Option<NaiveDate>, interval_days: i64, today: NaiveDate) -> bool {
    match last_drop {
        None => true,
        Some(last) => (today - last).num_days() >= interval_days,
    }
}

/// What a refresh run should do.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RefreshGate {
    Paused,
    NotDue,
    Rebuild,
}

/// Reads and writes the settings that gate a refresh run.
#[derive(Debug, Clone)]
pub struct RefreshPolicy {
    interval_days: i64,
    clock: Arc<dyn Clock>,
}

impl RefreshPolicy {
    pub fn new(interval_days: i64, clock: Arc<dyn Clock>) -> Self {
        Self {
            interval_days,
            clock,
        }
    }

    pub fn clock(&self) -> &Arc<dyn Clock> {
        &self.clock
    }

    /// Whether refreshes are administratively paused. The flag is created
    /// as `false` on first read.
    pub fn is_paused(&self, db: &Database) -> reelstat_core::Result<bool> {
        let value = db.get_or_create_setting(SettingKey::UpdatePaused.as_str(), "false")?;
        Ok(value == "true")
    }

    pub fn set_paused(&self, db: &Database, paused: bool) -> reelstat_core::Result<()> {
        let key = SettingKey::UpdatePaused.as_str();
        db.get_or_create_setting(key, "false")?;
        db.update_setting(key, if paused { "true" } else { "false" })
    }

    /// Date of the last rebuild. An unreadable value counts as none.
    pub fn last_drop(&self, db: &Database) -> reelstat_core::Result<Option<NaiveDate>> {
        let Some(value) = db.get_setting(SettingKey::LastDrop.as_str())? else {
            return Ok(None);
        };
        match NaiveDate::parse_from_str(&value, DATE_FORMAT) {
            Ok(date) => Ok(Some(date)),
            Err(e) => {
                log::warn!("Ignoring unreadable last_drop {:?}: {}", value, e);
                Ok(None)
            }
        }
    }

    pub fn rebuild_due(&self, db: &Database) -> reelstat_core::Result<bool> {
        let last = self.last_drop(db)?;
        Ok(should_rebuild(last, self.interval_days, self.clock.today()))
    }

    /// Store today as the last rebuild date.
    pub fn record_rebuild(&self, db: &Database) -> reelstat_core::Result<()> {
        let key = SettingKey::LastDrop.as_str();
        let today = self.clock.today().format(DATE_FORMAT).to_string();
        if db.get_setting(key)?.is_some() {
            db.update_setting(key, &today)
        } else {
            db.create_setting(key, &today)
        }
    }

    /// Consult both checks. `force` skips the interval check only.
    pub fn gate(&self, db: &Database, force: bool) -> reelstat_core::Result<RefreshGate> {
        if self.is_paused(db)? {
            return Ok(RefreshGate::Paused);
        }
        if !force && !self.rebuild_due(db)? {
            return Ok(RefreshGate::NotDue);
        }
        Ok(RefreshGate::Rebuild)
    }
}
