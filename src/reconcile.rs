//! Reconciliation of a catalog against a source tree.
//!
//! Per catalog entry:
//!
//! ```text
//! lookup ─ not found ──────────────────────────────▶ MissingSource
//!    │ found
//! hash ─── unreadable ─────────────────────────────▶ Unreadable
//!    │ ≠ expected ─────────────────────────────────▶ HashMismatch
//!    │ = expected
//! destination ─ absent ───────────── copy ─────────▶ Copied
//!    │ matches ────────────────────────────────────▶ AlreadyCorrect
//!    │ differs, no force ──────────────────────────▶ DestinationDiffers
//!    │ differs, force ────────────── copy ─────────▶ Overwritten
//! ```
//!
//! A failed copy becomes `CopyFailed`. Per-entry problems never stop the
//! batch; only [`RunContext::prepare`] can fail.

use std::fs::{self, File};
use std::io::{self, BufReader};
use std::path::{Path, PathBuf};

use tracing::{debug, info, warn};

use crate::catalog::{load_catalog, Catalog};
use crate::config::RunConfig;
use crate::error::{Error, Result};
use crate::hash::{copy_hashed, hash_file};
use crate::scanner::SourceIndex;
use crate::types::{CandidateFile, CatalogEntry, ContentHash, EntryOutcome, Outcome, RunReport};

// ============================================================================
// RUN CONTEXT
// ============================================================================

/// Everything a run needs, built at start and dropped at the end.
#[derive(Debug)]
pub struct RunContext {
    pub config: RunConfig,
    pub catalog: Catalog,
    pub index: SourceIndex,
}

impl RunContext {
    /// Validate config, load the catalog, ready the destination, index the source.
    ///
    /// The destination is left out of the source walk, so a destination
    /// nested in the collection never supplies its own candidates.
    ///
    /// # Errors
    /// Any fatal error: invalid config, `CatalogUnavailable`,
    /// `DestinationUnavailable`, `SourceRootUnavailable`.
    pub fn prepare(config: RunConfig) -> Result<Self> {
        Self::prepare_with_progress(config, |_| {})
    }

    /// Like [`prepare`](Self::prepare), reporting source files scanned.
    pub fn prepare_with_progress<F>(config: RunConfig, on_file: F) -> Result<Self>
    where
        F: FnMut(usize),
    {
        config.validate()?;
        let catalog = load_catalog(&config.catalog_path)?;
        prepare_destination(&config)?;
        let index = SourceIndex::build_for_catalog(
            &config.source_root,
            &catalog,
            Some(&config.destination_root),
            on_file,
        )?;

        Ok(Self {
            config,
            catalog,
            index,
        })
    }

    /// Assemble a context from parts already in hand.
    pub fn from_parts(config: RunConfig, catalog: Catalog, index: SourceIndex) -> Self {
        Self {
            config,
            catalog,
            index,
        }
    }
}

/// Create the destination root. A dry run never writes, so it only needs
/// the destination to not be something other than a directory.
fn prepare_destination(config: &RunConfig) -> Result<()> {
    let path = &config.destination_root;

    if config.dry_run {
        return match fs::metadata(path) {
            Ok(meta) if !meta.is_dir() => Err(Error::DestinationUnavailable {
                path: path.clone(),
                source: io::Error::other("not a directory"),
            }),
            _ => Ok(()),
        };
    }

    fs::create_dir_all(path).map_err(|source| Error::DestinationUnavailable {
        path: path.clone(),
        source,
    })
}

// ============================================================================
// ENGINE
// ============================================================================

/// Reconcile every catalog entry, in catalog order.
pub fn reconcile(ctx: &RunContext) -> RunReport {
    reconcile_with_progress(ctx, |_, _| {})
}

/// Like [`reconcile`], calling `on_entry` with the count done so far and
/// the outcome just decided.
pub fn reconcile_with_progress<F>(ctx: &RunContext, mut on_entry: F) -> RunReport
where
    F: FnMut(usize, &EntryOutcome),
{
    let mut report = RunReport {
        outcomes: Vec::with_capacity(ctx.catalog.len()),
        bytes_copied: 0,
        dry_run: ctx.config.dry_run,
    };

    info!(
        entries = ctx.catalog.len(),
        destination = %ctx.config.destination_root.display(),
        force = ctx.config.force_overwrite,
        dry_run = ctx.config.dry_run,
        "Reconciling catalog"
    );

    for (i, entry) in ctx.catalog.entries().iter().enumerate() {
        let candidate = ctx.index.get(&entry.name);
        let outcome = reconcile_entry(entry, candidate, &ctx.config, &mut report.bytes_copied);

        debug!(name = %entry.name, outcome = ?outcome, "Reconciled");

        report.outcomes.push(EntryOutcome {
            name: entry.name.clone(),
            expected: entry.expected,
            source: candidate.map(|c| c.path.clone()),
            outcome,
        });
        on_entry(i + 1, &report.outcomes[i]);
    }

    report
}

fn reconcile_entry(
    entry: &CatalogEntry,
    candidate: Option<&CandidateFile>,
    config: &RunConfig,
    bytes_copied: &mut u64,
) -> Outcome {
    let Some(candidate) = candidate else {
        return Outcome::MissingSource;
    };

    let found = match hash_file(&candidate.path) {
        Ok(hash) => hash,
        Err(e) => {
            warn!(path = %candidate.path.display(), error = %e, "Cannot read source candidate");
            return Outcome::Unreadable {
                path: candidate.path.clone(),
                reason: e.to_string(),
            };
        }
    };

    // A source-side mismatch is never copied, force or not
    if found != entry.expected {
        return Outcome::HashMismatch { found };
    }

    let destination = config.destination_root.join(&entry.name);

    let success = match inspect_destination(&destination, &entry.expected) {
        DestinationState::Matches => return Outcome::AlreadyCorrect,
        DestinationState::Differs(found) if !config.force_overwrite => {
            return Outcome::DestinationDiffers { found };
        }
        DestinationState::Differs(_) => Outcome::Overwritten,
        DestinationState::Absent => Outcome::Copied,
    };

    if config.dry_run {
        *bytes_copied += candidate.size;
        return success;
    }

    match place_file(&candidate.path, &destination, &entry.expected) {
        Ok(bytes) => {
            *bytes_copied += bytes;
            success
        }
        Err(e) => {
            warn!(name = %entry.name, error = %e, "Copy failed");
            Outcome::CopyFailed {
                reason: e.to_string(),
            }
        }
    }
}

/// What is already sitting at the destination path.
enum DestinationState {
    Absent,
    Matches,
    /// Wrong content, or unreadable (`None`).
    Differs(Option<ContentHash>),
}

fn inspect_destination(path: &Path, expected: &ContentHash) -> DestinationState {
    match hash_file(path) {
        Ok(hash) if hash == *expected => DestinationState::Matches,
        Ok(hash) => DestinationState::Differs(Some(hash)),
        Err(e) if e.kind() == io::ErrorKind::NotFound => DestinationState::Absent,
        Err(e) => {
            warn!(path = %path.display(), error = %e, "Cannot read existing destination file");
            DestinationState::Differs(None)
        }
    }
}

// ============================================================================
// COPY SINK
// ============================================================================

/// Copy `source` over `destination` via a temporary sibling.
///
/// The bytes are re-hashed as they are written; if they no longer match
/// `expected` the temporary file is removed and the destination is left
/// as it was. Returns the number of bytes written.
fn place_file(source: &Path, destination: &Path, expected: &ContentHash) -> Result<u64> {
    let temp = temp_path(destination);

    let written = write_verified(source, &temp, expected).and_then(|written| {
        fs::rename(&temp, destination)
            .map(|()| written)
            .map_err(|e| Error::write_failure(destination, e))
    });

    if written.is_err() {
        let _ = fs::remove_file(&temp);
    }
    written
}

fn write_verified(source: &Path, temp: &Path, expected: &ContentHash) -> Result<u64> {
    let input = File::open(source).map_err(|e| Error::unreadable(source, e))?;
    let permissions = input
        .metadata()
        .map_err(|e| Error::unreadable(source, e))?
        .permissions();
    let mut output = File::create(temp).map_err(|e| Error::write_failure(temp, e))?;

    let (hash, written) =
        copy_hashed(BufReader::new(input), &mut output).map_err(|e| Error::write_failure(temp, e))?;
    output.sync_all().map_err(|e| Error::write_failure(temp, e))?;

    if hash != *expected {
        return Err(Error::write_failure(
            temp,
            io::Error::new(io::ErrorKind::InvalidData, "source changed during copy"),
        ));
    }

    fs::set_permissions(temp, permissions).map_err(|e| Error::write_failure(temp, e))?;
    Ok(written)
}

/// Hidden sibling in the same directory, so the final rename stays on one filesystem.
fn temp_path(destination: &Path) -> PathBuf {
    let name = destination
        .file_name()
        .map(|n| n.to_string_lossy())
        .unwrap_or_default();
    destination.with_file_name(format!(".{}.{}.part", name, std::process::id()))
}

// ============================================================================
// TESTS
// ============================================================================
