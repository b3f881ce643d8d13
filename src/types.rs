//! Domain types for romsync.

use std::fmt;
use std::path::PathBuf;

use serde::Serialize;

// ============================================================================
// PRIMITIVES
// ============================================================================

/// Content identity: a SHA-256 digest.
///
/// Comparison is on raw bytes, so two hex spellings that differ only in
/// letter case parse to equal hashes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ContentHash(pub [u8; 32]);

impl ContentHash {
    /// Returns the hash as a lowercase hex string.
    pub fn to_hex(&self) -> String {
        self.0.iter().map(|b| format!("{:02x}", b)).collect()
    }

    /// Parse a 64-character hex string (either case).
    pub fn from_hex(hex: &str) -> Result<Self, String> {
        hex_to_bytes(hex).map(ContentHash)
    }
}

impl fmt::Display for ContentHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_hex())
    }
}

impl Serialize for ContentHash {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.serialize_str(&self.to_hex())
    }
}

/// Parse a 64-character hex string into 32 bytes.
fn hex_to_bytes(hex: &str) -> Result<[u8; 32], String> {
    if hex.len() != 64 {
        return Err(format!("Expected 64 hex chars, got {}", hex.len()));
    }
    if !hex.bytes().all(|b| b.is_ascii_hexdigit()) {
        return Err(format!("Not a hex string: {}", hex));
    }
    let mut bytes = [0u8; 32];
    for (i, chunk) in hex.as_bytes().chunks(2).enumerate() {
        let s = std::str::from_utf8(chunk).map_err(|e| e.to_string())?;
        bytes[i] = u8::from_str_radix(s, 16).map_err(|e| e.to_string())?;
    }
    Ok(bytes)
}

// ============================================================================
// CATALOG & CANDIDATES
// ============================================================================

/// One known-good file: the destination filename and its expected digest.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CatalogEntry {
    pub name: String,
    pub expected: ContentHash,
}

/// A source file whose name matches a catalog entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CandidateFile {
    pub path: PathBuf,
    pub size: u64,
}

// ============================================================================
// OUTCOMES
// ============================================================================

/// Terminal state of reconciling one catalog entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum Outcome {
    /// Destination was absent; candidate copied in.
    Copied,
    /// Destination already holds the expected content.
    AlreadyCorrect,
    /// Destination held wrong content and was replaced (force).
    Overwritten,
    /// No source file carries this name.
    MissingSource,
    /// Source file exists but its content is not the catalogued one.
    HashMismatch { found: ContentHash },
    /// Destination holds wrong content and force is off.
    /// `found` is None when the destination could not be read.
    DestinationDiffers { found: Option<ContentHash> },
    /// Source candidate could not be read.
    Unreadable { path: PathBuf, reason: String },
    /// Copy or overwrite failed part way.
    CopyFailed { reason: String },
}

impl Outcome {
    /// True when this entry leaves something for the user to look at.
    pub fn is_problem(&self) -> bool {
        !matches!(
            self,
            Outcome::Copied | Outcome::AlreadyCorrect | Outcome::Overwritten
        )
    }
}

/// Outcome for one catalog entry, with the context needed to report it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EntryOutcome {
    pub name: String,
    pub expected: ContentHash,
    /// Source candidate, if one was found.
    pub source: Option<PathBuf>,
    #[serde(flatten)]
    pub outcome: Outcome,
}

/// Complete result of a run. One outcome per catalog entry, in catalog order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct RunReport {
    pub outcomes: Vec<EntryOutcome>,
    /// Bytes written into the destination (or that would be, in a dry run).
    pub bytes_copied: u64,
    pub dry_run: bool,
}

impl RunReport {
    pub fn summary(&self) -> RunSummary {
        let mut summary = RunSummary {
            bytes_copied: self.bytes_copied,
            ..Default::default()
        };
        for entry in &self.outcomes {
            match entry.outcome {
                Outcome::Copied => summary.copied += 1,
                Outcome::AlreadyCorrect => summary.already_correct += 1,
                Outcome::Overwritten => summary.overwritten += 1,
                Outcome::MissingSource => summary.missing += 1,
                Outcome::HashMismatch { .. } => summary.mismatched += 1,
                Outcome::DestinationDiffers { .. } => summary.destination_differs += 1,
                Outcome::Unreadable { .. } | Outcome::CopyFailed { .. } => summary.failed += 1,
            }
        }
        summary
    }

    /// Entries that need attention, in catalog order.
    pub fn problems(&self) -> impl Iterator<Item = &EntryOutcome> {
        self.outcomes.iter().filter(|e| e.outcome.is_problem())
    }
}

/// Per-outcome counts; the caller derives exit status from these.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct RunSummary {
    pub copied: usize,
    pub already_correct: usize,
    pub overwritten: usize,
    pub missing: usize,
    pub mismatched: usize,
    pub destination_differs: usize,
    pub failed: usize,
    pub bytes_copied: u64,
}

impl RunSummary {
    pub fn total(&self) -> usize {
        self.copied
            + self.already_correct
            + self.overwritten
            + self.missing
            + self.mismatched
            + self.destination_differs
            + self.failed
    }

    /// Every catalog entry ended up present and correct in the destination.
    pub fn is_complete(&self) -> bool {
        self.missing + self.mismatched + self.destination_differs + self.failed == 0
    }
}

// ============================================================================
// CONFIGURATION
// ============================================================================

/// Output format for reports.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OutputFormat {
    /// Human-readable pretty output.
    #[default]
    Human,
    /// Machine-readable JSON.
    Json,
}

// ============================================================================
// TESTS
// ============================================================================
