//! SHA-256 fingerprints of a source directory.
//!
//! Two granularities are used by the executor:
//! - the *listing* fingerprint hashes the sorted entry names only. It is cheap
//!   and catches added, removed and renamed entries, but an in-place edit
//!   that keeps every name unchanged goes unnoticed.
//! - the *content* fingerprint hashes the concatenated bytes of every file,
//!   in sorted relative-path order. Files are streamed through the hasher in
//!   fixed-size chunks, so memory use does not grow with file size.

use crate::fs::walker::{list_entry_names, portable_bytes, walk_directory, WalkOptions};
use futures_util::{future, stream, StreamExt};
use sha2::{Digest, Sha256};
use std::fmt;
use std::io;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use tokio::io::AsyncReadExt;
use tokio::sync::mpsc;
use tracing::debug;

/// Bytes read from a file per step
const CHUNK_SIZE: usize = 64 * 1024;

/// Chunks a reader may run ahead of the hasher
const CHUNKS_AHEAD: usize = 4;

/// A 256-bit digest rendered as 64 hexadecimal characters.
///
/// Equality is exact string equality; no case folding is applied to values
/// read back from the log.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Fingerprint(String);

impl Fingerprint {
    /// Length of the hex rendering
    pub const HEX_LEN: usize = 64;

    /// Digest arbitrary bytes.
    pub fn of(data: impl AsRef<[u8]>) -> Self {
        Self::from_hasher(Sha256::new_with_prefix(data))
    }

    fn from_hasher(hasher: Sha256) -> Self {
        Self(hex::encode(hasher.finalize()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Fingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
#[error("invalid fingerprint: expected {expected} hex characters, got {0:?}", expected = Fingerprint::HEX_LEN)]
pub struct InvalidFingerprint(pub String);

impl FromStr for Fingerprint {
    type Err = InvalidFingerprint;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.len() == Self::HEX_LEN && s.bytes().all(|b| b.is_ascii_hexdigit()) {
            Ok(Self(s.to_string()))
        } else {
            Err(InvalidFingerprint(s.to_string()))
        }
    }
}

/// Fingerprint of a list of relative paths. Each path is hashed as its raw
/// bytes with `/` between components and terminated by `\n`, so that
/// `["ab", "c"]` and `["a", "bc"]` differ; an empty list hashes the empty
/// string.
pub fn listing_fingerprint<P: AsRef<Path>>(names: &[P]) -> Fingerprint {
    let mut hasher = Sha256::new();
    for name in names {
        hasher.update(portable_bytes(name.as_ref()));
        hasher.update(b"\n");
    }
    Fingerprint::from_hasher(hasher)
}

/// Enumerate `root` and fingerprint its sorted entry names.
pub async fn fingerprint_listing(root: &Path, options: &WalkOptions) -> io::Result<Fingerprint> {
    let root = root.to_path_buf();
    let options = options.clone();

    let names = tokio::task::spawn_blocking(move || list_entry_names(&root, &options))
        .await
        .map_err(io::Error::other)??;

    debug!("Listing fingerprint over {} entries", names.len());
    Ok(listing_fingerprint(&names))
}

/// Fingerprint the concatenated contents of every file below `root`.
///
/// Up to `concurrency` files are read ahead at once, each holding at most
/// [`CHUNKS_AHEAD`] chunks; chunks are hashed in sorted path order so the
/// digest is reproducible.
pub async fn fingerprint_contents(
    root: &Path,
    options: &WalkOptions,
    concurrency: usize,
) -> io::Result<Fingerprint> {
    let walk_root = root.to_path_buf();
    let walk_options = options.clone();

    let files = tokio::task::spawn_blocking(move || walk_directory(&walk_root, &walk_options))
        .await
        .map_err(io::Error::other)??;

    let total_files = files.len();
    let mut total_bytes = 0u64;
    let mut hasher = Sha256::new();

    let mut readers = stream::iter(files)
        .map(|file| future::ready(read_chunks(file.path)))
        .buffered(concurrency.max(1));

    while let Some(mut chunks) = readers.next().await {
        while let Some(chunk) = chunks.recv().await {
            let chunk = chunk?;
            total_bytes += chunk.len() as u64;
            hasher.update(&chunk);
        }
    }

    debug!("Content fingerprint over {} files ({} bytes)", total_files, total_bytes);
    Ok(Fingerprint::from_hasher(hasher))
}

/// Read `path` in the background, handing over one chunk at a time. The
/// reader stops as soon as the receiver is dropped.
fn read_chunks(path: PathBuf) -> mpsc::Receiver<io::Result<Vec<u8>>> {
    let (tx, rx) = mpsc::channel(CHUNKS_AHEAD);

    tokio::spawn(async move {
        let mut file = match tokio::fs::File::open(&path).await {
            Ok(file) => file,
            Err(e) => {
                let _ = tx.send(Err(e)).await;
                return;
            }
        };

        loop {
            let mut chunk = vec![0u8; CHUNK_SIZE];
            match file.read(&mut chunk).await {
                Ok(0) => return,
                Ok(n) => {
                    chunk.truncate(n);
                    if tx.send(Ok(chunk)).await.is_err() {
                        return;
                    }
                }
                Err(e) => {
                    let _ = tx.send(Err(e)).await;
                    return;
                }
            }
        }
    });

    rx
}
