//! Content hashing for catalog verification.
//!
//! SHA-256, streamed in fixed-size chunks so memory use does not depend on
//! file size.

use std::fs::File;
use std::io::{self, BufReader, Read, Write};
use std::path::Path;

use sha2::{Digest, Sha256};

use crate::types::ContentHash;

const CHUNK_SIZE: usize = 8192;

/// Compute the SHA-256 hash of a file's contents.
///
/// # Errors
/// Returns an error if the file cannot be opened or a read fails mid-stream.
pub fn hash_file(path: &Path) -> io::Result<ContentHash> {
    let file = File::open(path)?;
    hash_reader(BufReader::new(file))
}

/// Compute the SHA-256 hash of everything `reader` yields.
pub fn hash_reader<R: Read>(mut reader: R) -> io::Result<ContentHash> {
    let mut hasher = Sha256::new();

    let mut buffer = [0u8; CHUNK_SIZE];
    loop {
        let bytes_read = match reader.read(&mut buffer) {
            Ok(0) => break,
            Ok(n) => n,
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(e),
        };
        hasher.update(&buffer[..bytes_read]);
    }

    Ok(digest_to_hash(&hasher.finalize()))
}

/// Stream `reader` into `writer`, hashing the bytes on the way through.
///
/// Returns the digest of what was written and the byte count.
pub fn copy_hashed<R: Read, W: Write>(mut reader: R, writer: &mut W) -> io::Result<(ContentHash, u64)> {
    let mut hasher = Sha256::new();
    let mut written = 0u64;

    let mut buffer = [0u8; CHUNK_SIZE];
    loop {
        let bytes_read = match reader.read(&mut buffer) {
            Ok(0) => break,
            Ok(n) => n,
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(e),
        };
        writer.write_all(&buffer[..bytes_read])?;
        hasher.update(&buffer[..bytes_read]);
        written += bytes_read as u64;
    }
    writer.flush()?;

    Ok((digest_to_hash(&hasher.finalize()), written))
}

fn digest_to_hash(digest: &[u8]) -> ContentHash {
    let mut bytes = [0u8; 32];
    bytes.copy_from_slice(digest);
    ContentHash(bytes)
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::NamedTempFile;

    const EMPTY_SHA256: &str = "e3b0c44298fc1c149afbf4c8996fb92427ae41e4649b934ca495991b7852b855";
    const HELLO_WORLD_SHA256: &str =
        "b94d27b9934d3e08a52e52d7da7dabfac484efe37a5380ee9088f7ace2efcde9";

    #[test]
    fn test_known_value() {
        let mut file = NamedTempFile::new().unwrap();
        write!(file, "hello world").unwrap();

        let hash = hash_file(file.path()).unwrap();
        assert_eq!(hash.to_hex(), HELLO_WORLD_SHA256);
    }

    #[test]
    fn test_empty_file() {
        let file = NamedTempFile::new().unwrap();

        let hash = hash_file(file.path()).unwrap();
        assert_eq!(hash.to_hex(), EMPTY_SHA256);
    }

    #[test]
    fn test_multi_chunk_file_matches_in_memory_digest() {
        // Spans several chunks and ends mid-chunk
        let data: Vec<u8> = (0..(CHUNK_SIZE * 3 + 17)).map(|i| (i % 251) as u8).collect();
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(&data).unwrap();

        let from_file = hash_file(file.path()).unwrap();
        let expected = digest_to_hash(&Sha256::digest(&data));
        assert_eq!(from_file, expected);
    }

    #[test]
    fn test_different_content_different_hash() {
        let mut file1 = NamedTempFile::new().unwrap();
        let mut file2 = NamedTempFile::new().unwrap();

        writeln!(file1, "content A").unwrap();
        writeln!(file2, "content B").unwrap();

        assert_ne!(hash_file(file1.path()).unwrap(), hash_file(file2.path()).unwrap());
    }

    #[test]
    fn test_copy_hashed_writes_and_digests() {
        let mut sink = Vec::new();
        let (hash, written) = copy_hashed(&b"hello world"[..], &mut sink).unwrap();

        assert_eq!(sink, b"hello world");
        assert_eq!(written, 11);
        assert_eq!(hash.to_hex(), HELLO_WORLD_SHA256);
    }

    #[test]
    fn test_hash_nonexistent_file_errors() {
        let result = hash_file(Path::new("/nonexistent/file.rom"));
        assert!(result.is_err());
    }
}
