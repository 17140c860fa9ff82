//! Byte-level download progress for keyed HTTP fetches.
//!
//! - [`progress`]: the keyed listener registry, its throttling policy, the
//!   counting stream wrappers and the single-consumer delivery loop.
//! - [`fetcher`]: a reqwest-backed fetcher whose response bodies report into
//!   a registry.

pub mod config;
pub mod fetcher;
pub mod progress;
pub mod types;

pub use config::FetchConfig;
pub use types::types::{FetchError, FetchRequest};
