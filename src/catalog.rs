//! Known-good catalog loading.
//!
//! Parses the conventional SHA256SUMS layout, one entry per line:
//!
//! ```text
//! <64 hex chars> <filename>
//! <64 hex chars> *<filename>      (binary-mode marker)
//! <64 hex chars>*<filename>
//! ```
//!
//! Malformed lines are skipped and counted, never fatal.

use std::collections::HashMap;
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::{Component, Path};

use tracing::{debug, info, warn};

use crate::error::{Error, Result};
use crate::types::{CatalogEntry, ContentHash};

/// The expected (name → hash) set, in file order.
#[derive(Debug, Default, Clone)]
pub struct Catalog {
    entries: Vec<CatalogEntry>,
    by_name: HashMap<String, usize>,
    /// Lines skipped because they did not parse.
    pub malformed: usize,
    /// Lines that redefined an already-seen name.
    pub duplicates: usize,
}

impl Catalog {
    /// Insert an entry. A repeated name replaces the earlier hash but keeps
    /// the earlier position.
    pub fn insert(&mut self, entry: CatalogEntry) {
        match self.by_name.get(&entry.name) {
            Some(&idx) => {
                warn!(
                    name = %entry.name,
                    previous = %self.entries[idx].expected,
                    replacement = %entry.expected,
                    "Duplicate catalog name, keeping the later hash"
                );
                self.duplicates += 1;
                self.entries[idx] = entry;
            }
            None => {
                self.by_name.insert(entry.name.clone(), self.entries.len());
                self.entries.push(entry);
            }
        }
    }

    pub fn get(&self, name: &str) -> Option<&CatalogEntry> {
        self.by_name.get(name).map(|&idx| &self.entries[idx])
    }

    pub fn contains(&self, name: &str) -> bool {
        self.by_name.contains_key(name)
    }

    pub fn entries(&self) -> &[CatalogEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Load a catalog file from disk.
///
/// # Errors
/// Returns `CatalogUnavailable` if the file cannot be opened or read.
pub fn load_catalog(path: &Path) -> Result<Catalog> {
    let file = File::open(path).map_err(|source| Error::CatalogUnavailable {
        path: path.to_path_buf(),
        source,
    })?;

    let catalog = parse_catalog(BufReader::new(file)).map_err(|e| match e {
        Error::CatalogUnavailable { source, .. } => Error::CatalogUnavailable {
            path: path.to_path_buf(),
            source,
        },
        other => other,
    })?;

    info!(
        path = %path.display(),
        entries = catalog.len(),
        malformed = catalog.malformed,
        duplicates = catalog.duplicates,
        "Loaded catalog"
    );
    Ok(catalog)
}

/// Parse catalog lines from any buffered reader.
///
/// # Errors
/// Returns `CatalogUnavailable` (with an empty path) if reading fails.
/// Lines that are not valid UTF-8 are counted as malformed.
pub fn parse_catalog<R: BufRead>(reader: R) -> Result<Catalog> {
    let mut catalog = Catalog::default();

    for (line_no, raw) in reader.split(b'\n').enumerate() {
        let raw = raw.map_err(|source| Error::CatalogUnavailable {
            path: Default::default(),
            source,
        })?;
        let Ok(line) = std::str::from_utf8(&raw) else {
            warn!(line = line_no + 1, "Skipping catalog line that is not valid UTF-8");
            catalog.malformed += 1;
            continue;
        };
        let trimmed = line.trim();

        if trimmed.is_empty() || trimmed.starts_with('#') {
            continue;
        }

        match parse_line(trimmed) {
            Some(entry) => {
                debug!(name = %entry.name, hash = %entry.expected, "Catalog entry");
                catalog.insert(entry);
            }
            None => {
                warn!(line = line_no + 1, content = %trimmed, "Skipping malformed catalog line");
                catalog.malformed += 1;
            }
        }
    }

    Ok(catalog)
}

/// Parse one non-empty, trimmed line.
fn parse_line(line: &str) -> Option<CatalogEntry> {
    let split = line.find(|c: char| c.is_whitespace() || c == '*')?;
    let (hash, rest) = line.split_at(split);

    let name = rest.trim_start();
    let name = name.strip_prefix('*').unwrap_or(name).trim();
    if !is_plain_filename(name) {
        return None;
    }

    let expected = ContentHash::from_hex(hash).ok()?;
    Some(CatalogEntry {
        name: name.to_string(),
        expected,
    })
}

/// A single normal path component: no separators, no `..`, not absolute.
fn is_plain_filename(name: &str) -> bool {
    let mut components = Path::new(name).components();
    matches!(
        (components.next(), components.next()),
        (Some(Component::Normal(_)), None)
    ) && !name.contains(['/', '\\'])
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::{Cursor, Write};
    use tempfile::NamedTempFile;

    const H1: &str = "b94d27b9934d3e08a52e52d7da7dabfac484efe37a5380ee9088f7ace2efcde9";
    const H2: &str = "e3b0c44298fc1c149afbf4c8996fb92427ae41e4649b934ca495991b7852b855";

    fn parse(text: &str) -> Catalog {
        parse_catalog(Cursor::new(text)).unwrap()
    }

    #[test]
    fn test_parses_two_column_format() {
        let catalog = parse(&format!("{H1}  pacman.zip\n{H2} galaga.zip\n"));

        assert_eq!(catalog.len(), 2);
        assert_eq!(catalog.get("pacman.zip").unwrap().expected.to_hex(), H1);
        assert_eq!(catalog.get("galaga.zip").unwrap().expected.to_hex(), H2);
        assert_eq!(catalog.malformed, 0);
    }

    #[test]
    fn test_parses_binary_marker_forms() {
        let catalog = parse(&format!("{H1} *pacman.zip\n{H2}*galaga.zip\n"));

        assert!(catalog.contains("pacman.zip"));
        assert!(catalog.contains("galaga.zip"));
    }

    #[test]
    fn test_names_may_contain_spaces() {
        let catalog = parse(&format!("{H1}  Ms. Pac-Man (USA).zip\n"));
        assert!(catalog.contains("Ms. Pac-Man (USA).zip"));
    }

    #[test]
    fn test_uppercase_hash_accepted() {
        let catalog = parse(&format!("{}  a.rom\n", H1.to_uppercase()));
        assert_eq!(catalog.get("a.rom").unwrap().expected.to_hex(), H1);
    }

    #[test]
    fn test_preserves_file_order() {
        let catalog = parse(&format!("{H1} z.rom\n{H2} a.rom\n{H1} m.rom\n"));
        let names: Vec<_> = catalog.entries().iter().map(|e| e.name.as_str()).collect();
        assert_eq!(names, vec!["z.rom", "a.rom", "m.rom"]);
    }

    #[test]
    fn test_malformed_lines_skipped_and_counted() {
        let text = format!("{H1}\nnot-a-hash file.rom\nabcd short.rom\n{H2} ok.rom\n");
        let catalog = parse(&text);

        assert_eq!(catalog.len(), 1);
        assert!(catalog.contains("ok.rom"));
        assert_eq!(catalog.malformed, 3);
    }

    #[test]
    fn test_non_utf8_line_is_malformed_not_fatal() {
        let mut bytes = format!("{H1}  good.rom\n{H2}  caf").into_bytes();
        bytes.push(0xE9);
        bytes.extend_from_slice(b".rom\n");

        let catalog = parse_catalog(Cursor::new(bytes)).unwrap();

        assert_eq!(catalog.len(), 1);
        assert!(catalog.contains("good.rom"));
        assert_eq!(catalog.malformed, 1);
    }

    #[test]
    fn test_crlf_line_endings() {
        let catalog = parse(&format!("{H1}  a.rom\r\n{H2} *b.rom\r\n"));
        assert!(catalog.contains("a.rom"));
        assert!(catalog.contains("b.rom"));
    }

    #[test]
    fn test_names_with_path_components_rejected() {
        let text = format!("{H1} ../escape.rom\n{H1} sub/dir.rom\n{H1} /abs.rom\n{H1} ..\n");
        let catalog = parse(&text);

        assert!(catalog.is_empty());
        assert_eq!(catalog.malformed, 4);
    }

    #[test]
    fn test_blank_and_comment_lines_ignored() {
        let catalog = parse(&format!("\n# arcade set\n   \n{H1} a.rom\n"));
        assert_eq!(catalog.len(), 1);
        assert_eq!(catalog.malformed, 0);
    }

    #[test]
    fn test_duplicate_name_last_wins_keeps_position() {
        let catalog = parse(&format!("{H1} a.rom\n{H2} b.rom\n{H2} a.rom\n"));

        assert_eq!(catalog.len(), 2);
        assert_eq!(catalog.duplicates, 1);
        assert_eq!(catalog.entries()[0].name, "a.rom");
        assert_eq!(catalog.entries()[0].expected.to_hex(), H2);
    }

    #[test]
    fn test_load_catalog_from_file() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, "{H1} *a.rom").unwrap();

        let catalog = load_catalog(file.path()).unwrap();
        assert!(catalog.contains("a.rom"));
    }

    #[test]
    fn test_load_missing_catalog_is_unavailable() {
        let err = load_catalog(Path::new("/nonexistent/roms.sha256")).unwrap_err();
        assert!(matches!(err, Error::CatalogUnavailable { .. }));
    }
}
