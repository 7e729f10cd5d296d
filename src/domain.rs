//! Domain module - Core player entities
//!
//! This module contains the records collected for every player profile, the
//! snapshot type that the cache and the report renderer operate on, and the
//! run statistics shared by all components.
//!
//! Modern Rust module organization (Rust 2018+ style):
//! - Each module is its own file in the domain/ directory
//! - Public exports are defined here for convenience

pub mod player;
pub mod statistics;

pub use player::{PlayerId, PlayerRecord, PlayerSummary, RpCard, Snapshot, SocialLink};
pub use statistics::{RunStats, Statistics};
