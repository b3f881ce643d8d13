//! romsync: Collect files matching a known-good SHA-256 catalog.

pub mod catalog;
pub mod config;
pub mod error;
pub mod hash;
pub mod reconcile;
pub mod report;
pub mod scanner;
pub mod types;

pub use error::{Error, Result};
