//! Source tree scanning.
//!
//! [`SourceFiles`] walks a collection lazily; [`SourceIndex`] materializes
//! that walk once into a name → candidate map so reconciliation never
//! re-walks the tree per catalog entry.

use std::collections::hash_map::Entry;
use std::collections::{HashMap, HashSet};
use std::fs;
use std::path::{Path, PathBuf};

use tracing::{debug, info, warn};
use walkdir::WalkDir;

use crate::catalog::Catalog;
use crate::error::{Error, Result};
use crate::types::CandidateFile;

// ============================================================================
// LAZY WALK
// ============================================================================

/// Every regular file under a root, as `(filename, candidate)` pairs.
///
/// Directory listings are visited in file-name order, so the sequence is
/// deterministic. Symlinks are followed; a directory whose canonical path
/// was already visited is not entered again, which also breaks link
/// cycles. Unreadable entries are logged and skipped.
///
/// Restart by constructing a new walk over the same root.
pub struct SourceFiles {
    walker: walkdir::IntoIter,
    visited: HashSet<PathBuf>,
    excluded: Option<PathBuf>,
}

impl SourceFiles {
    pub fn new(root: &Path) -> Self {
        let walker = WalkDir::new(root)
            .follow_links(true)
            .sort_by_file_name()
            .into_iter();

        Self {
            walker,
            visited: HashSet::new(),
            excluded: None,
        }
    }

    /// Never descend into `dir` below the root. Paths are compared after
    /// canonicalization, so `dir` may be relative or reached through links.
    pub fn excluding(mut self, dir: &Path) -> Self {
        match fs::canonicalize(dir) {
            Ok(real) => self.excluded = Some(real),
            Err(e) => debug!(path = %dir.display(), error = %e, "Excluded directory does not resolve"),
        }
        self
    }

    /// Returns false when `dir` is excluded or resolves to an already-visited
    /// directory.
    fn enter_dir(&mut self, dir: &Path, depth: usize) -> bool {
        let real = match fs::canonicalize(dir) {
            Ok(real) => real,
            Err(e) => {
                warn!(path = %dir.display(), error = %e, "Cannot resolve directory, skipping");
                return false;
            }
        };

        if depth > 0 && self.excluded.as_ref() == Some(&real) {
            debug!(path = %dir.display(), "Skipping excluded directory");
            return false;
        }
        if !self.visited.insert(real) {
            debug!(path = %dir.display(), "Directory already visited");
            return false;
        }
        true
    }
}

impl Iterator for SourceFiles {
    type Item = (String, CandidateFile);

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            let entry = match self.walker.next()? {
                Ok(entry) => entry,
                Err(e) => {
                    if e.loop_ancestor().is_some() {
                        debug!(error = %e, "Skipping symlink cycle");
                    } else {
                        warn!(error = %e, "Skipping unreadable entry");
                    }
                    continue;
                }
            };

            let file_type = entry.file_type();

            if file_type.is_dir() {
                if !self.enter_dir(entry.path(), entry.depth()) {
                    self.walker.skip_current_dir();
                }
                continue;
            }

            if !file_type.is_file() {
                continue;
            }

            let name = match entry.file_name().to_str() {
                Some(name) => name.to_string(),
                None => {
                    warn!(path = %entry.path().display(), "Skipping non UTF-8 filename");
                    continue;
                }
            };

            let size = entry.metadata().map(|m| m.len()).unwrap_or(0);

            return Some((
                name,
                CandidateFile {
                    path: entry.into_path(),
                    size,
                },
            ));
        }
    }
}

// ============================================================================
// INDEX
// ============================================================================

/// Name → first-discovered candidate for a source tree.
#[derive(Debug, Default)]
pub struct SourceIndex {
    files: HashMap<String, CandidateFile>,
    /// Regular files walked, indexed or not.
    pub scanned: usize,
    /// Files ignored because an earlier file had the same name.
    pub shadowed: usize,
}

impl SourceIndex {
    /// Index every file under `root`.
    ///
    /// # Errors
    /// Returns `SourceRootUnavailable` if `root` is missing or not a directory.
    pub fn build(root: &Path) -> Result<Self> {
        check_root(root)?;
        Ok(Self::collect(root, SourceFiles::new(root), |_| true, |_| {}))
    }

    /// Index only the files whose names the catalog asks for, never looking
    /// inside `exclude` (the destination, when it sits under `root`).
    ///
    /// `on_file` is called with the running count of files scanned.
    ///
    /// # Errors
    /// Returns `SourceRootUnavailable` if `root` is missing or not a directory.
    pub fn build_for_catalog<F>(
        root: &Path,
        catalog: &Catalog,
        exclude: Option<&Path>,
        on_file: F,
    ) -> Result<Self>
    where
        F: FnMut(usize),
    {
        check_root(root)?;

        let mut files = SourceFiles::new(root);
        if let Some(dir) = exclude {
            files = files.excluding(dir);
        }
        Ok(Self::collect(root, files, |name| catalog.contains(name), on_file))
    }

    fn collect<K, F>(root: &Path, files: SourceFiles, keep: K, mut on_file: F) -> Self
    where
        K: Fn(&str) -> bool,
        F: FnMut(usize),
    {
        let mut index = SourceIndex::default();

        for (name, candidate) in files {
            index.scanned += 1;
            on_file(index.scanned);

            if !keep(&name) {
                continue;
            }

            match index.files.entry(name) {
                Entry::Occupied(first) => {
                    debug!(
                        name = %first.key(),
                        kept = %first.get().path.display(),
                        ignored = %candidate.path.display(),
                        "Duplicate filename in source, keeping first"
                    );
                    index.shadowed += 1;
                }
                Entry::Vacant(slot) => {
                    slot.insert(candidate);
                }
            }
        }

        info!(
            root = %root.display(),
            scanned = index.scanned,
            indexed = index.files.len(),
            shadowed = index.shadowed,
            "Indexed source tree"
        );
        index
    }

    pub fn get(&self, name: &str) -> Option<&CandidateFile> {
        self.files.get(name)
    }

    pub fn len(&self) -> usize {
        self.files.len()
    }

    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }
}

/// The source root must exist and be a directory.
pub fn check_root(root: &Path) -> Result<()> {
    match fs::metadata(root) {
        Ok(meta) if meta.is_dir() => Ok(()),
        Ok(_) => Err(Error::SourceRootUnavailable {
            path: root.to_path_buf(),
            reason: "not a directory".to_string(),
        }),
        Err(e) => Err(Error::SourceRootUnavailable {
            path: root.to_path_buf(),
            reason: e.to_string(),
        }),
    }
}

// ============================================================================
// TESTS
// ============================================================================
