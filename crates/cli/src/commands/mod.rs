//! CLI command implementations.

pub mod domains;
pub mod migrate;
