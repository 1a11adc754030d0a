//! SQLite schema and the `Database` handle.

pub mod db;
pub mod migrations;

pub use db::{Database, TitleFilter};
