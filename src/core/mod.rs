//! Core functionality module
//!
//! Configuration management and the error taxonomy shared by the rest of
//! the crate.
//!
//! # Submodules
//!
//! - `config` - Configuration loading, saving, and management
//! - `error` - Error types and result aliases

pub mod config;
pub mod error;
