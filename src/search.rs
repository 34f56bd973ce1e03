//! Pattern search: glob file selection plus a case-insensitive per-line
//! regex scan that captures surrounding context.

use globset::Glob;
use regex::{Regex, RegexBuilder};
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use walkdir::{DirEntry, WalkDir};

use crate::types::{Match, SearchQuery};

/// Per-query match cap used when the caller does not pick one.
pub const DEFAULT_MATCH_LIMIT: usize = 50;

/// Framework-agnostic probes used when the planned queries match nothing.
pub fn fallback_queries() -> Vec<SearchQuery> {
    vec![
        SearchQuery::new(
            r"\b(app|router)\.(get|post|put|patch|delete|options|head|all)\s*\(",
            "**/*.{js,ts,jsx,tsx}",
            "Generic JS HTTP methods",
        ),
        SearchQuery::new(r"express\.Router\(", "**/*.{js,ts,jsx,tsx}", "Express routers"),
        SearchQuery::new(
            r"@Controller|@Get\(|@Post\(|@Put\(|@Delete\(",
            "**/*.{ts,tsx}",
            "NestJS annotations",
        ),
        SearchQuery::new(r"@\w+\.route\(", "**/*.py", "Flask route decorator"),
        SearchQuery::new(
            r"@app\.(get|post|put|patch|delete)\(",
            "**/*.py",
            "FastAPI decorators",
        ),
        SearchQuery::new(
            r"\b(POST|GET|PUT|PATCH|DELETE)\s*\(",
            "**/*.go",
            "Go std http handlers",
        ),
        SearchQuery::new(r"\b(Handle|HandleFunc)\s*\(", "**/*.go", "Go mux/chi"),
        SearchQuery::new(
            r"@RequestMapping|@GetMapping|@PostMapping|@PutMapping|@DeleteMapping",
            "**/*.java",
            "Spring annotations",
        ),
        SearchQuery::new(
            r#"resources\s+:|get\s+['"]|post\s+['"]"#,
            "**/*.rb",
            "Rails routes",
        ),
    ]
}

/// Run every query against the tree under `root`.
///
/// The result maps query index to its matches and holds an entry for every
/// query, empty or not, so per-query counts survive into the report. A
/// malformed regex or glob yields zero matches for that query instead of
/// failing the search. Matches carry root-relative paths.
pub fn multi_search(
    root: &Path,
    queries: &[SearchQuery],
    context: usize,
    limit: usize,
) -> BTreeMap<usize, Vec<Match>> {
    let files = collect_files(root);
    let mut results = BTreeMap::new();
    for (idx, query) in queries.iter().enumerate() {
        let matches = run_query(&files, query, context, limit);
        tracing::debug!(
            query = idx,
            regex = %query.regex,
            glob = %query.glob,
            matches = matches.len(),
            "search query done"
        );
        results.insert(idx, matches);
    }
    results
}

fn run_query(
    files: &[(PathBuf, String)],
    query: &SearchQuery,
    context: usize,
    limit: usize,
) -> Vec<Match> {
    let Ok(glob) = Glob::new(&query.glob) else {
        return Vec::new();
    };
    let glob = glob.compile_matcher();
    let Ok(regex) = RegexBuilder::new(&query.regex).case_insensitive(true).build() else {
        return Vec::new();
    };

    let mut acc = Vec::new();
    for (path, relative) in files {
        if !glob.is_match(relative) {
            continue;
        }
        grep_file(path, relative, &regex, context, limit, &mut acc);
        if acc.len() >= limit {
            break;
        }
    }
    acc
}

fn grep_file(
    path: &Path,
    relative: &str,
    regex: &Regex,
    context: usize,
    limit: usize,
    acc: &mut Vec<Match>,
) {
    let Ok(bytes) = fs::read(path) else {
        return;
    };
    let text = String::from_utf8_lossy(&bytes);
    let lines: Vec<&str> = text.lines().collect();
    for (idx, line) in lines.iter().enumerate() {
        if !regex.is_match(line) {
            continue;
        }
        let before = lines[idx.saturating_sub(context)..idx]
            .iter()
            .map(|l| l.to_string())
            .collect();
        let after = lines[idx + 1..(idx + 1).saturating_add(context).min(lines.len())]
            .iter()
            .map(|l| l.to_string())
            .collect();
        acc.push(Match {
            file: relative.to_string(),
            line: idx + 1,
            matched: line.trim().to_string(),
            before,
            after,
        });
        if acc.len() >= limit {
            return;
        }
    }
}

/// All non-hidden files under `root` with their root-relative paths.
fn collect_files(root: &Path) -> Vec<(PathBuf, String)> {
    let mut files = Vec::new();
    for entry in WalkDir::new(root)
        .follow_links(false)
        .into_iter()
        .filter_entry(not_hidden)
        .flatten()
    {
        if !entry.file_type().is_file() {
            continue;
        }
        let path = entry.path();
        let relative = path
            .strip_prefix(root)
            .unwrap_or(path)
            .to_string_lossy()
            .into_owned();
        files.push((path.to_path_buf(), relative));
    }
    files
}

fn not_hidden(entry: &DirEntry) -> bool {
    if entry.depth() == 0 {
        return true;
    }
    !entry
        .file_name()
        .to_string_lossy()
        .starts_with('.')
}
