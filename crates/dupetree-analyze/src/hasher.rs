//! BLAKE3 content hashing with cooperative cancellation.
//!
//! Every digest is a 256-bit BLAKE3 hash, so equal byte sequences always
//! produce equal digests. Streams are consumed in [`BLOCK_SIZE`] blocks and
//! cancellation is polled before each one; a cancelled hash yields `Ok(None)`.

use std::fs::File;
use std::io::{self, Read};
use std::path::{Path, PathBuf};

use thiserror::Error;

use dupetree_core::{ContentHash, Progress};

/// Bytes read per block. Quick mode hashes exactly one block.
pub const BLOCK_SIZE: usize = 8192;

/// How much of a stream to hash.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HashMode {
    /// First block only.
    Quick,
    /// Whole stream.
    Full,
}

/// Errors raised while hashing file content.
#[derive(Debug, Error)]
pub enum HashError {
    #[error("File not found: {path}")]
    NotFound { path: PathBuf },

    #[error("Cannot open {path}: {source}")]
    Unreadable {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("Read error: {source}")]
    Read {
        #[from]
        source: io::Error,
    },
}

/// Hash the file at `path`.
pub fn hash_file(
    path: &Path,
    progress: &Progress,
    mode: HashMode,
) -> Result<Option<ContentHash>, HashError> {
    let file = File::open(path).map_err(|source| match source.kind() {
        io::ErrorKind::NotFound => HashError::NotFound {
            path: path.to_path_buf(),
        },
        _ => HashError::Unreadable {
            path: path.to_path_buf(),
            source,
        },
    })?;
    hash_stream(file, progress, mode)
}

/// Hash a byte stream.
pub fn hash_stream<R: Read>(
    mut reader: R,
    progress: &Progress,
    mode: HashMode,
) -> Result<Option<ContentHash>, HashError> {
    let mut hasher = blake3::Hasher::new();
    let mut buffer = [0u8; BLOCK_SIZE];

    loop {
        if progress.is_cancelled() {
            return Ok(None);
        }

        let read = read_block(&mut reader, &mut buffer)?;
        hasher.update(&buffer[..read]);

        if read < BLOCK_SIZE || mode == HashMode::Quick {
            break;
        }
    }

    Ok(Some(ContentHash::new(*hasher.finalize().as_bytes())))
}

/// Hash the UTF-8 bytes of `s`.
pub fn hash_string(s: &str, progress: &Progress) -> Option<ContentHash> {
    if progress.is_cancelled() {
        return None;
    }
    Some(ContentHash::new(*blake3::hash(s.as_bytes()).as_bytes()))
}

/// Placeholder digest derived from a size alone: the low byte of `size`
/// repeated across the digest. Not a content hash.
pub fn fake_size_hash(size: u64) -> ContentHash {
    ContentHash::new([(size & 0xff) as u8; ContentHash::LEN])
}

/// Fill `buffer` unless the stream ends first. Returns the bytes read.
fn read_block<R: Read>(reader: &mut R, buffer: &mut [u8]) -> io::Result<usize> {
    let mut filled = 0;
    while filled < buffer.len() {
        match reader.read(&mut buffer[filled..]) {
            Ok(0) => break,
            Ok(n) => filled += n,
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(e),
        }
    }
    Ok(filled)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use std::io::Cursor;
    use tempfile::TempDir;

    /// Reader that hands out at most three bytes per call.
    struct Trickle<'a>(&'a [u8]);

    impl Read for Trickle<'_> {
        fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
            let n = self.0.len().min(buf.len()).min(3);
            buf[..n].copy_from_slice(&self.0[..n]);
            self.0 = &self.0[n..];
            Ok(n)
        }
    }

    fn full(bytes: &[u8]) -> ContentHash {
        hash_stream(Cursor::new(bytes), &Progress::silent(), HashMode::Full)
            .unwrap()
            .unwrap()
    }

    #[test]
    fn test_full_hash_matches_blake3() {
        let data = vec![7u8; BLOCK_SIZE * 3 + 17];
        assert_eq!(full(&data).as_bytes(), blake3::hash(&data).as_bytes());
    }

    #[test]
    fn test_quick_hash_reads_one_block() {
        let mut a = vec![1u8; BLOCK_SIZE * 2];
        let mut b = a.clone();
        a[BLOCK_SIZE + 5] = 2;
        b[BLOCK_SIZE + 9] = 3;

        let quick = |bytes: &[u8]| {
            hash_stream(Cursor::new(bytes), &Progress::silent(), HashMode::Quick)
                .unwrap()
                .unwrap()
        };

        assert_eq!(quick(&a), quick(&b));
        assert_ne!(full(&a), full(&b));
        assert_eq!(quick(&a).as_bytes(), blake3::hash(&a[..BLOCK_SIZE]).as_bytes());
    }

    #[test]
    fn test_short_reads_are_coalesced() {
        let data: Vec<u8> = (0..BLOCK_SIZE as u32 + 100).map(|i| i as u8).collect();
        let trickled = hash_stream(Trickle(&data), &Progress::silent(), HashMode::Full)
            .unwrap()
            .unwrap();
        assert_eq!(trickled, full(&data));
    }

    #[test]
    fn test_cancelled_hash_is_empty() {
        let progress = Progress::silent().with_cancel_fn(|| true);
        let result = hash_stream(Cursor::new(b"abc"), &progress, HashMode::Full).unwrap();
        assert!(result.is_none());
        assert!(hash_string("abc", &progress).is_none());
    }

    #[test]
    fn test_hash_string_matches_stream() {
        let progress = Progress::silent();
        assert_eq!(hash_string("a, b", &progress), Some(full(b"a, b")));
    }

    #[test]
    fn test_fake_size_hash() {
        assert_eq!(fake_size_hash(0x1234).as_bytes(), &[0x34; 32]);
        assert_eq!(fake_size_hash(5), fake_size_hash(5 + 256));
        assert_ne!(fake_size_hash(5), fake_size_hash(6));
    }

    #[test]
    fn test_hash_file_errors() {
        let temp = TempDir::new().unwrap();
        let missing = temp.path().join("missing");
        let err = hash_file(&missing, &Progress::silent(), HashMode::Full).unwrap_err();
        assert!(matches!(err, HashError::NotFound { .. }));

        let present = temp.path().join("present");
        fs::write(&present, "content").unwrap();
        let hash = hash_file(&present, &Progress::silent(), HashMode::Quick).unwrap();
        assert_eq!(hash, Some(full(b"content")));
    }
}
