//! Bounded reads of source text around a route declaration.

use anyhow::{Context, Result};
use std::fs;
use std::path::Path;

use crate::types::Snippet;

/// Default line radius around the declaration line.
pub const DEFAULT_RADIUS: usize = 60;

/// Read the inclusive window `[max(1, center-radius), min(len, center+radius)]`.
///
/// `file` may be absolute or repository-relative. Windows are clamped to the
/// file, never out of bounds; a center past the end yields an empty snippet.
pub fn read_snippet(root: &Path, file: &str, center_line: usize, radius: usize) -> Result<Snippet> {
    let lines = read_lines(root, file)?;
    let start = center_line.saturating_sub(radius).max(1);
    // center_line comes from LM output; saturate rather than trust it
    let end = center_line.saturating_add(radius).min(lines.len());
    Ok(window(file, start, end, &lines))
}

/// Variant taking an explicit inclusive range instead of center+radius.
pub fn read_file_section(root: &Path, file: &str, start: usize, end: usize) -> Result<Snippet> {
    let lines = read_lines(root, file)?;
    let start = start.max(1);
    let end = end.min(lines.len());
    Ok(window(file, start, end, &lines))
}

fn read_lines(root: &Path, file: &str) -> Result<Vec<String>> {
    let candidate = Path::new(file);
    let abs_path = if candidate.is_absolute() {
        candidate.to_path_buf()
    } else {
        root.join(candidate)
    };
    let bytes =
        fs::read(&abs_path).with_context(|| format!("read snippet from {}", abs_path.display()))?;
    Ok(String::from_utf8_lossy(&bytes)
        .lines()
        .map(str::to_string)
        .collect())
}

fn window(file: &str, start: usize, end: usize, lines: &[String]) -> Snippet {
    let text = if start <= end {
        lines[start - 1..end].join("\n")
    } else {
        String::new()
    };
    Snippet {
        file: file.to_string(),
        start,
        end,
        text,
    }
}
