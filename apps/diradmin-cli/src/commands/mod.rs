//! CLI command implementations

pub mod ping;
pub mod profile;
pub mod search;
