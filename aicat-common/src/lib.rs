//! # aicat Common Library
//!
//! Shared code for the metadata catalog:
//! - Error type shared by storage and configuration
//! - Configuration loading (TOML file + compiled defaults)
//! - Database connection, schema creation and the entity store
//! - Row models for datasets and publications

pub mod config;
pub mod db;
pub mod error;

pub use error::{Error, Result};
