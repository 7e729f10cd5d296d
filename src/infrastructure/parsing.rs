//! HTML parsing infrastructure
//!
//! Extraction of structured player records from raw profile pages.

pub mod profile_parser;

pub use profile_parser::ProfileParser;
