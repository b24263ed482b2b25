//! geoBoundaries metadata collector.
//!
//! Fetches per-country administrative boundary metadata from the geoBoundaries
//! API, caches it as CSV, classifies licenses against an allow-list, and
//! cross-references boundary submissions with their GitHub tracking issues.

pub mod cli;
pub mod config;
pub mod data;
pub mod fetch;
pub mod github;
pub mod server;
