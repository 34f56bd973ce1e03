//! Shared data types for the discovery pipeline and its report surface.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;

/// Extensions sampled by default when the caller supplies no allow-list.
pub const DEFAULT_EXTS: &[&str] = &[
    ".js", ".jsx", ".ts", ".tsx", ".py", ".go", ".java", ".rb", ".php", ".cs", ".kt", ".scala",
    ".rs", ".c", ".cpp", ".mjs", ".md", ".yml", ".yaml", ".json",
];

/// Tuning knobs accepted by a generation request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GenerateOptions {
    #[serde(default = "default_max_search_rounds")]
    pub max_search_rounds: u32,
    #[serde(default = "default_max_files")]
    pub max_files: usize,
    #[serde(default = "default_max_routes")]
    pub max_routes: usize,
    #[serde(default = "default_context_lines")]
    pub context_lines: usize,
    #[serde(default)]
    pub enrich_top_n: Option<usize>,
    #[serde(default = "default_max_bytes_per_file")]
    pub max_bytes_per_file: u64,
    /// Extension allow-list; `None` falls back to the built-in text set.
    #[serde(default = "default_exts")]
    pub exts: Option<Vec<String>>,
}

fn default_max_search_rounds() -> u32 {
    3
}

fn default_max_files() -> usize {
    200
}

fn default_max_routes() -> usize {
    300
}

fn default_context_lines() -> usize {
    20
}

fn default_max_bytes_per_file() -> u64 {
    200_000
}

fn default_exts() -> Option<Vec<String>> {
    Some(DEFAULT_EXTS.iter().map(|ext| ext.to_string()).collect())
}

impl Default for GenerateOptions {
    fn default() -> Self {
        GenerateOptions {
            max_search_rounds: default_max_search_rounds(),
            max_files: default_max_files(),
            max_routes: default_max_routes(),
            context_lines: default_context_lines(),
            enrich_top_n: None,
            max_bytes_per_file: default_max_bytes_per_file(),
            exts: default_exts(),
        }
    }
}

/// Bounded head/tail sample of one repository file, used as planning context.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FileSample {
    pub path: String,
    pub ext: String,
    pub size: u64,
    pub head: String,
    pub tail: String,
}

/// One regex+glob probe for endpoint declarations.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchQuery {
    pub regex: String,
    #[serde(default = "default_glob")]
    pub glob: String,
    pub why: String,
}

fn default_glob() -> String {
    "**/*".to_string()
}

impl SearchQuery {
    pub fn new(regex: &str, glob: &str, why: &str) -> Self {
        SearchQuery {
            regex: regex.to_string(),
            glob: glob.to_string(),
            why: why.to_string(),
        }
    }
}

/// LM-proposed search strategy: inferred frameworks plus concrete queries.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SearchPlan {
    #[serde(default)]
    pub frameworks: Vec<String>,
    #[serde(default)]
    pub searches: Vec<SearchQuery>,
}

/// A single matching line with its surrounding context.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Match {
    pub file: String,
    /// 1-based line number of the matched line.
    pub line: usize,
    #[serde(rename = "match")]
    pub matched: String,
    pub before: Vec<String>,
    pub after: Vec<String>,
}

/// HTTP methods the extractor is allowed to emit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HttpMethod {
    Get,
    Post,
    Put,
    Patch,
    Delete,
    Options,
    Head,
    All,
}

impl HttpMethod {
    /// Parse case-insensitively; anything outside the allowed set is rejected.
    pub fn parse(raw: &str) -> Option<Self> {
        match raw.to_ascii_lowercase().as_str() {
            "get" => Some(HttpMethod::Get),
            "post" => Some(HttpMethod::Post),
            "put" => Some(HttpMethod::Put),
            "patch" => Some(HttpMethod::Patch),
            "delete" => Some(HttpMethod::Delete),
            "options" => Some(HttpMethod::Options),
            "head" => Some(HttpMethod::Head),
            "all" => Some(HttpMethod::All),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            HttpMethod::Get => "get",
            HttpMethod::Post => "post",
            HttpMethod::Put => "put",
            HttpMethod::Patch => "patch",
            HttpMethod::Delete => "delete",
            HttpMethod::Options => "options",
            HttpMethod::Head => "head",
            HttpMethod::All => "all",
        }
    }
}

impl fmt::Display for HttpMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// An endpoint candidate backed by verbatim source lines.
///
/// The evidence list must quote the searched file exactly; extraction rejects
/// anything the quoted lines do not support.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DiscoveredRoute {
    pub method: HttpMethod,
    pub raw_path: String,
    pub file: String,
    pub line: usize,
    pub evidence: Vec<String>,
}

/// Coarse authentication hint inferred from a snippet.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AuthHint {
    Required,
    None,
    Maybe,
    Unknown,
}

/// Optional per-route hints; absent fields mean "could not infer".
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Enrichment {
    #[serde(default)]
    pub summary: Option<String>,
    #[serde(default)]
    pub auth: Option<AuthHint>,
    #[serde(default, rename = "requestBody")]
    pub request_body: Option<Value>,
    #[serde(default)]
    pub responses: Option<Map<String, Value>>,
}

/// A bounded window of source text around a route declaration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Snippet {
    pub file: String,
    /// 1-based inclusive start line.
    pub start: usize,
    /// 1-based inclusive end line.
    pub end: usize,
    pub text: String,
}

/// Path parameter descriptor emitted for every `{name}` segment.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ParamDescriptor {
    pub name: String,
    #[serde(rename = "in")]
    pub location: String,
    pub required: bool,
    pub schema: Value,
}

/// Source traceability carried alongside a merged route.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EvidenceRef {
    pub file: String,
    pub line: usize,
    pub quotes: Vec<String>,
}

/// Merge-ready unit: one normalized route plus everything learned about it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RouteDef {
    pub method: HttpMethod,
    pub path: String,
    pub parameters: Vec<ParamDescriptor>,
    #[serde(rename = "requestBody")]
    pub request_body: Option<Value>,
    pub responses: Map<String, Value>,
    pub evidence: EvidenceRef,
    pub summary: Option<String>,
    pub auth: Option<AuthHint>,
}

/// Items dropped along the way, surfaced instead of silently discarded.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SkipCounts {
    /// Files skipped during inventory because they could not be read.
    pub files: usize,
    /// Discovered routes beyond the `max_routes` cap.
    pub routes: usize,
    /// Extractor array elements that failed shape validation.
    pub route_items: usize,
    /// Routes whose enrichment call degraded to an empty result.
    pub enrichments: usize,
}

/// Diagnostic report accompanying a generation result.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GenerateReport {
    pub repo: String,
    pub inventory_count: usize,
    pub frameworks: Vec<String>,
    /// The queries actually executed (fallback set if the plan found nothing).
    pub searches: Vec<SearchQuery>,
    /// Match count per query, keyed by stringified query index.
    pub matches_counts: Map<String, Value>,
    pub routes_sample: Vec<DiscoveredRoute>,
    pub spec_servers: Vec<String>,
    pub paths_count: usize,
}

/// Structured result returned to the caller after a generation run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GenerateOutcome {
    pub status: String,
    pub spec_path: String,
    pub routes_found: usize,
    pub rounds_used: u32,
    pub skipped: SkipCounts,
    pub notes: Vec<String>,
    pub report: GenerateReport,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn method_parse_is_case_insensitive() {
        assert_eq!(HttpMethod::parse("GET"), Some(HttpMethod::Get));
        assert_eq!(HttpMethod::parse("Patch"), Some(HttpMethod::Patch));
        assert_eq!(HttpMethod::parse("all"), Some(HttpMethod::All));
        assert_eq!(HttpMethod::parse("fetch"), None);
        assert_eq!(HttpMethod::parse(""), None);
    }

    #[test]
    fn search_query_glob_defaults_to_match_everything() {
        let query: SearchQuery = serde_json::from_str(
            r#"{"regex": "router\\.(get|post)", "why": "generic router calls"}"#,
        )
        .unwrap();
        assert_eq!(query.glob, "**/*");
    }

    #[test]
    fn enrichment_missing_fields_deserialize_as_none() {
        let enrichment: Enrichment = serde_json::from_str("{}").unwrap();
        assert!(enrichment.summary.is_none());
        assert!(enrichment.auth.is_none());
        assert!(enrichment.request_body.is_none());
        assert!(enrichment.responses.is_none());
    }

    #[test]
    fn match_serializes_matched_line_under_match_key() {
        let m = Match {
            file: "src/app.js".to_string(),
            line: 4,
            matched: "app.get('/users', handler)".to_string(),
            before: vec![],
            after: vec![],
        };
        let value = serde_json::to_value(&m).unwrap();
        assert!(value.get("match").is_some());
        assert!(value.get("matched").is_none());
    }

    #[test]
    fn options_deserialize_with_defaults() {
        let options: GenerateOptions = serde_json::from_str("{}").unwrap();
        assert_eq!(options.max_files, 200);
        assert_eq!(options.max_routes, 300);
        assert_eq!(options.context_lines, 20);
        assert_eq!(options.max_bytes_per_file, 200_000);
        assert!(options.enrich_top_n.is_none());
        let exts = options.exts.unwrap();
        assert!(exts.contains(&".py".to_string()));
        assert!(exts.contains(&".ts".to_string()));
    }
}
