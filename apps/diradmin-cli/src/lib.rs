//! diradmin CLI library
//!
//! This library exposes internal modules for integration testing.

pub mod config;
pub mod error;
pub mod logging;
pub mod output;
