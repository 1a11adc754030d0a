//! Core domain model and schema for reelstat.
//!
//! This crate defines the merged `Title` entity and its child edges, per-user
//! ratings, process-wide settings, paging types, the SQLite schema, and the
//! `Database` handle that backs the title merge store, the user rating store
//! and the settings store.

#![deny(unsafe_code)]
#![warn(missing_debug_implementations)]

pub mod error;
pub mod model;
pub mod paging;
pub mod schema;

pub use error::{Error, Result};
