//! # Neural Pitch Common Library
//!
//! Shared code for the Neural Pitch services:
//! - Error types
//! - Configuration loading (TOML, environment, compiled defaults)
//! - Working directory resolution, creation and purge

pub mod config;
pub mod dirs;
pub mod error;

pub use dirs::WorkDirs;
pub use error::{Error, Result};
