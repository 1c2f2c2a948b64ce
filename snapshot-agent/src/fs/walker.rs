//! Deterministic directory traversal for fingerprinting.
//!
//! Both fingerprints must see the tree in the same order on every run and on
//! every platform, so everything returned from here is sorted by relative
//! path rather than left in file-system enumeration order.

use std::io;
use std::path::{Path, PathBuf};
use walkdir::{DirEntry, WalkDir};

/// Options for directory walking
#[derive(Debug, Clone, Default)]
pub struct WalkOptions {
    /// Entry names to skip, together with everything below them
    pub exclude_patterns: Vec<String>,

    /// Paths relative to the root to skip, together with everything below them
    pub exclude_paths: Vec<PathBuf>,
}

/// A file discovered during walking
#[derive(Debug, Clone)]
pub struct FileInfo {
    /// Full path to the file
    pub path: PathBuf,

    /// Relative path from the root
    pub relative_path: PathBuf,
}

impl FileInfo {
    /// Create FileInfo from a DirEntry.
    /// Symlinks count when they resolve to a regular file. Returns None if
    /// the entry is not file-like (directory, broken link, link to a
    /// directory).
    fn from_entry(entry: &DirEntry, root: &Path) -> io::Result<Option<Self>> {
        let raw_metadata = entry.metadata()?;
        let path = entry.path().to_path_buf();

        let is_file = if raw_metadata.is_symlink() {
            std::fs::metadata(&path).is_ok_and(|resolved| resolved.is_file())
        } else {
            raw_metadata.is_file()
        };

        if !is_file {
            return Ok(None);
        }

        Ok(Some(Self {
            relative_path: relative_to(&path, root),
            path,
        }))
    }
}

/// Walk a directory tree and collect all file-like entries, sorted by
/// relative path.
///
/// # Returns
/// * `Ok(Vec<FileInfo>)` - List of all files found
/// * `Err(io::Error)` - If the root is missing, not a directory, or unreadable
pub fn walk_directory(root: &Path, options: &WalkOptions) -> io::Result<Vec<FileInfo>> {
    let mut files = Vec::new();

    for entry in walker(root, options)? {
        let entry = entry?;

        if let Some(file_info) = FileInfo::from_entry(&entry, root)? {
            files.push(file_info);
        }
    }

    files.sort_by(|a, b| a.relative_path.cmp(&b.relative_path));
    Ok(files)
}

/// List the relative paths of every entry below `root` (files, directories
/// and links alike), sorted. An empty directory yields an empty list.
pub fn list_entry_names(root: &Path, options: &WalkOptions) -> io::Result<Vec<PathBuf>> {
    let mut names = Vec::new();

    for entry in walker(root, options)? {
        let entry = entry?;
        names.push(relative_to(entry.path(), root));
    }

    names.sort();
    Ok(names)
}

/// Raw bytes of a relative path with components joined by `/`.
///
/// Unlike [`normalize_separators`] this is lossless: names that are not
/// valid UTF-8 keep their exact bytes.
pub fn portable_bytes(path: &Path) -> Vec<u8> {
    let mut bytes = Vec::with_capacity(path.as_os_str().len());
    for (i, component) in path.components().enumerate() {
        if i > 0 {
            bytes.push(b'/');
        }
        bytes.extend_from_slice(component.as_os_str().as_encoded_bytes());
    }
    bytes
}

/// Render a path with forward slashes regardless of host separator.
pub fn normalize_separators(path: &Path) -> String {
    path.to_string_lossy().replace('\\', "/")
}

fn walker(
    root: &Path,
    options: &WalkOptions,
) -> io::Result<impl Iterator<Item = walkdir::Result<DirEntry>>> {
    let metadata = std::fs::metadata(root)?;
    if !metadata.is_dir() {
        return Err(io::Error::new(
            io::ErrorKind::InvalidInput,
            format!("{} is not a directory", root.display()),
        ));
    }

    let root = root.to_path_buf();
    let patterns = options.exclude_patterns.clone();
    let paths = options.exclude_paths.clone();
    Ok(WalkDir::new(&root)
        .min_depth(1)
        .into_iter()
        .filter_entry(move |entry| {
            !should_exclude(entry, &patterns)
                && !paths.iter().any(|p| entry.path().strip_prefix(&root) == Ok(p.as_path()))
        }))
}

/// `path` relative to `root` when it lies strictly inside it. Both are made
/// absolute lexically, so neither needs to exist yet.
pub fn relative_inside(root: &Path, path: &Path) -> Option<PathBuf> {
    let root = std::path::absolute(root).ok()?;
    let path = std::path::absolute(path).ok()?;
    let relative = path.strip_prefix(&root).ok()?;
    (!relative.as_os_str().is_empty()).then(|| relative.to_path_buf())
}

fn relative_to(path: &Path, root: &Path) -> PathBuf {
    path.strip_prefix(root).unwrap_or(path).to_path_buf()
}

/// Check if a directory entry should be excluded based on patterns.
/// Patterns are literal names, compared without wildcard expansion.
fn should_exclude(entry: &DirEntry, patterns: &[String]) -> bool {
    let file_name = entry.file_name();
    patterns.iter().any(|pattern| file_name == pattern.as_str())
}
