//! Repository inventory: bounded head/tail samples of eligible text files.
//!
//! Samples feed the search planner as context; they are never a full index.
//! Large files are never loaded whole, only a chunk from each end.

use anyhow::{bail, Result};
use std::fs;
use std::io::{Read, Seek, SeekFrom};
use std::path::Path;
use walkdir::{DirEntry, WalkDir};

use crate::types::FileSample;

/// Directories never worth sampling: VCS metadata, dependency caches, build
/// output. Dot-prefixed directories are pruned regardless of this list.
const IGNORE_DIRS: &[&str] = &[
    ".git",
    ".hg",
    ".svn",
    "node_modules",
    "dist",
    "build",
    ".next",
    ".nuxt",
    ".venv",
    "venv",
    "__pycache__",
    "target",
    "out",
];

/// Fallback extension set when the caller supplies no allow-list.
const TEXT_LIKE: &[&str] = &[
    ".js", ".jsx", ".ts", ".tsx", ".py", ".go", ".java", ".rb", ".php", ".cs", ".kt", ".scala",
    ".rs", ".c", ".cpp", ".mjs", ".json", ".yml", ".yaml", ".md", ".txt",
];

/// Per-end read window; also the upper bound when `max_bytes` is larger.
const CHUNK_BYTES: u64 = 8192;

/// Inventory result: the samples plus how many eligible files were skipped
/// because they could not be read.
#[derive(Debug, Default)]
pub struct Inventory {
    pub samples: Vec<FileSample>,
    pub skipped_files: usize,
}

/// Walk `root` and sample up to `max_files` eligible files.
///
/// Traversal prunes [`IGNORE_DIRS`] and hidden directories, stops as soon as
/// the cap is reached, and treats unreadable files as skips, not errors.
pub fn build_inventory(
    root: &Path,
    exts: Option<&[String]>,
    max_files: usize,
    max_bytes: u64,
) -> Result<Inventory> {
    if !root.is_dir() {
        bail!("inventory root is not a directory: {}", root.display());
    }

    let mut inventory = Inventory::default();
    let walker = WalkDir::new(root).into_iter().filter_entry(keep_entry);
    for entry in walker {
        if inventory.samples.len() >= max_files {
            break;
        }
        let Ok(entry) = entry else {
            continue;
        };
        if !entry.file_type().is_file() {
            continue;
        }

        let path = entry.path();
        let ext = lowercase_ext(path);
        if !ext_allowed(&ext, exts) {
            continue;
        }

        let Ok(metadata) = entry.metadata() else {
            inventory.skipped_files += 1;
            continue;
        };
        let Ok((head, tail)) = read_head_tail(path, max_bytes) else {
            inventory.skipped_files += 1;
            continue;
        };

        let relative = path.strip_prefix(root).unwrap_or(path);
        inventory.samples.push(FileSample {
            path: relative.to_string_lossy().to_string(),
            ext,
            size: metadata.len(),
            head,
            tail,
        });
    }

    tracing::debug!(
        sampled = inventory.samples.len(),
        skipped = inventory.skipped_files,
        "inventory complete"
    );
    Ok(inventory)
}

/// Keep predicate for traversal; returning false prunes the whole subtree.
fn keep_entry(entry: &DirEntry) -> bool {
    if entry.depth() == 0 || !entry.file_type().is_dir() {
        return true;
    }
    let name = entry.file_name().to_string_lossy();
    !name.starts_with('.') && !IGNORE_DIRS.contains(&name.as_ref())
}

/// Lowercased extension with its leading dot, or empty for none.
fn lowercase_ext(path: &Path) -> String {
    match path.extension() {
        Some(ext) => format!(".{}", ext.to_string_lossy().to_lowercase()),
        None => String::new(),
    }
}

fn ext_allowed(ext: &str, allow: Option<&[String]>) -> bool {
    match allow {
        Some(list) => list.iter().any(|allowed| allowed == ext),
        None => TEXT_LIKE.contains(&ext),
    }
}

/// Read the first and last `min(max_bytes, 8 KiB)` of a file, decoded
/// permissively. A file smaller than one chunk is read once and the same
/// content serves as both head and tail.
fn read_head_tail(path: &Path, max_bytes: u64) -> std::io::Result<(String, String)> {
    let chunk = max_bytes.min(CHUNK_BYTES);
    let mut file = fs::File::open(path)?;
    let len = file.metadata()?.len();

    if len <= chunk {
        let mut bytes = Vec::new();
        file.read_to_end(&mut bytes)?;
        let text = String::from_utf8_lossy(&bytes).into_owned();
        return Ok((text.clone(), text));
    }

    let mut head = vec![0u8; chunk as usize];
    file.read_exact(&mut head)?;
    file.seek(SeekFrom::End(-(chunk as i64)))?;
    let mut tail = vec![0u8; chunk as usize];
    file.read_exact(&mut tail)?;
    Ok((
        String::from_utf8_lossy(&head).into_owned(),
        String::from_utf8_lossy(&tail).into_owned(),
    ))
}
