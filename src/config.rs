//! Run configuration.
//!
//! Built once from the command line, validated at the boundary, then
//! handed to the core as an immutable value.

use std::path::PathBuf;

use crate::error::{Error, Result};
use crate::scanner::check_root;

/// Where matched files land unless told otherwise.
pub const DEFAULT_DESTINATION: &str = "Content/Roms";

/// Known-good checksum list.
pub const DEFAULT_CATALOG: &str = "roms.sha256";

/// Problem report, written only when requested.
pub const DEFAULT_REPORT: &str = "missing.txt";

/// Configuration for a reconciliation run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunConfig {
    /// Collection to search for catalogued files.
    pub source_root: PathBuf,
    /// Directory matched files are copied into.
    pub destination_root: PathBuf,
    /// Checksum list of known-good files.
    pub catalog_path: PathBuf,
    /// Where the problem report goes when enabled.
    pub report_path: PathBuf,
    /// Write the problem report to `report_path`.
    pub generate_missing_report: bool,
    /// Replace destination files whose content is wrong.
    pub force_overwrite: bool,
    /// Decide every outcome but write nothing to the destination.
    pub dry_run: bool,
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            source_root: PathBuf::new(), // Required, set by the caller
            destination_root: PathBuf::from(DEFAULT_DESTINATION),
            catalog_path: PathBuf::from(DEFAULT_CATALOG),
            report_path: PathBuf::from(DEFAULT_REPORT),
            generate_missing_report: false,
            force_overwrite: false,
            dry_run: false,
        }
    }
}

impl RunConfig {
    /// Check the configuration before any work starts.
    ///
    /// # Errors
    /// `InvalidConfig` for empty required paths, `SourceRootUnavailable`
    /// if the source root is not a readable directory.
    pub fn validate(&self) -> Result<()> {
        if self.source_root.as_os_str().is_empty() {
            return Err(Error::InvalidConfig("source root is required".to_string()));
        }
        if self.destination_root.as_os_str().is_empty() {
            return Err(Error::InvalidConfig("destination root is empty".to_string()));
        }
        if self.catalog_path.as_os_str().is_empty() {
            return Err(Error::InvalidConfig("catalog path is empty".to_string()));
        }
        if self.generate_missing_report && self.report_path.as_os_str().is_empty() {
            return Err(Error::InvalidConfig("report path is empty".to_string()));
        }
        check_root(&self.source_root)
    }
}

// ============================================================================
// TESTS
// ============================================================================
