//! medpulse-store: Persistence for published articles.
//!
//! A single JSON array on disk, most-recent-first, capped in length and
//! rewritten whole on every change. Single writer; no file locking.

pub mod error;
pub mod stats;
pub mod store;

pub use error::{Result, StoreError};
pub use stats::{AdminSnapshot, StoreStats};
pub use store::{NewsStore, DEFAULT_CAP};
