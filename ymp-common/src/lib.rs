//! # YMP Common Library
//!
//! Shared code for the ymp workspace:
//! - Common error type
//! - Configuration file location and TOML loading
//! - Human-readable duration formatting

pub mod config;
pub mod error;
pub mod human_time;

pub use error::{Error, Result};
