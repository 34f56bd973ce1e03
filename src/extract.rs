//! Route extraction: one LM call that turns raw search matches into typed
//! route candidates, dropping malformed elements individually.

use anyhow::{Context, Result};
use serde::Deserialize;
use serde_json::{json, Value};
use std::collections::BTreeMap;

use crate::lm::{complete_json, LmClient};
use crate::types::{DiscoveredRoute, HttpMethod, Match};

// Prompt template loaded at compile time
const EXTRACT_SYSTEM: &str = include_str!(concat!(
    env!("CARGO_MANIFEST_DIR"),
    "/prompts/extract_routes.md"
));

/// Per-query match budget for the extraction prompt.
const MAX_MATCHES_PER_QUERY: usize = 50;
/// Context lines kept on each side of a match in the prompt.
const PROMPT_CONTEXT_LINES: usize = 5;

const EXTRACT_TEMPERATURE: f32 = 0.2;

/// Extraction result plus how many array elements failed validation.
pub struct ExtractOutcome {
    pub routes: Vec<DiscoveredRoute>,
    pub dropped: usize,
}

/// Untyped shape of one response element, validated before promotion.
#[derive(Deserialize)]
struct RawRoute {
    method: String,
    raw_path: String,
    file: String,
    line: usize,
    evidence: Vec<String>,
}

/// Convert the search results into [`DiscoveredRoute`]s.
///
/// The prompt payload is keyed by stringified query index with matches and
/// context truncated to fixed budgets. Elements of the response array that
/// do not conform are dropped one by one; a response that is valid JSON but
/// not an array yields zero routes.
pub fn extract_routes(
    matches: &BTreeMap<usize, Vec<Match>>,
    client: &dyn LmClient,
) -> Result<ExtractOutcome> {
    let mut compact = serde_json::Map::new();
    for (idx, batch) in matches {
        let entries: Vec<Value> = batch
            .iter()
            .take(MAX_MATCHES_PER_QUERY)
            .map(|m| {
                let before_from = m.before.len().saturating_sub(PROMPT_CONTEXT_LINES);
                let after_to = m.after.len().min(PROMPT_CONTEXT_LINES);
                json!({
                    "file": m.file,
                    "line": m.line,
                    "match": m.matched,
                    "before": &m.before[before_from..],
                    "after": &m.after[..after_to],
                })
            })
            .collect();
        compact.insert(idx.to_string(), Value::Array(entries));
    }
    let user = serde_json::to_string_pretty(&Value::Object(compact))
        .context("encode match payload")?;

    let raw = complete_json(client, Some(EXTRACT_SYSTEM), &user, EXTRACT_TEMPERATURE)?;

    let mut routes = Vec::new();
    let mut dropped = 0usize;
    if let Value::Array(items) = raw {
        for item in items {
            match parse_route(item) {
                Some(route) => routes.push(route),
                None => dropped += 1,
            }
        }
    }
    tracing::info!(routes = routes.len(), dropped, "route extraction done");
    Ok(ExtractOutcome { routes, dropped })
}

fn parse_route(item: Value) -> Option<DiscoveredRoute> {
    let raw: RawRoute = serde_json::from_value(item).ok()?;
    let method = HttpMethod::parse(&raw.method)?;
    Some(DiscoveredRoute {
        method,
        raw_path: raw.raw_path,
        file: raw.file,
        line: raw.line,
        evidence: raw.evidence,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lm::testing::ScriptedLm;

    fn one_match(file: &str, line: usize, matched: &str) -> Match {
        Match {
            file: file.to_string(),
            line,
            matched: matched.to_string(),
            before: Vec::new(),
            after: Vec::new(),
        }
    }

    fn matches_map(batch: Vec<Match>) -> BTreeMap<usize, Vec<Match>> {
        let mut map = BTreeMap::new();
        map.insert(0, batch);
        map
    }

    #[test]
    fn parses_well_formed_routes() {
        let lm = ScriptedLm::new(vec![
            r#"[{"method": "GET", "raw_path": "/users/:id", "file": "app.js", "line": 3, "evidence": ["app.get('/users/:id', h)"]}]"#,
        ]);
        let matches = matches_map(vec![one_match("app.js", 3, "app.get('/users/:id', h)")]);
        let outcome = extract_routes(&matches, &lm).unwrap();
        assert_eq!(outcome.routes.len(), 1);
        assert_eq!(outcome.dropped, 0);
        assert_eq!(outcome.routes[0].method, HttpMethod::Get);
        assert_eq!(outcome.routes[0].raw_path, "/users/:id");
    }

    #[test]
    fn accepts_exactly_the_well_formed_subset() {
        let reply = r#"[
            {"method": "post", "raw_path": "/a", "file": "a.js", "line": 1, "evidence": ["app.post('/a')"]},
            {"method": "banana", "raw_path": "/b", "file": "a.js", "line": 2, "evidence": []},
            {"method": "get", "file": "a.js", "line": 3, "evidence": []},
            {"method": "get", "raw_path": "/d", "file": "a.js", "line": "four", "evidence": []}
        ]"#;
        let lm = ScriptedLm::new(vec![reply]);
        let matches = matches_map(vec![one_match("a.js", 1, "app.post('/a')")]);
        let outcome = extract_routes(&matches, &lm).unwrap();
        assert_eq!(outcome.routes.len(), 1);
        assert_eq!(outcome.dropped, 3);
        assert_eq!(outcome.routes[0].raw_path, "/a");
    }

    #[test]
    fn non_array_response_yields_no_routes() {
        let lm = ScriptedLm::new(vec![r#"{"routes": []}"#]);
        let matches = matches_map(vec![one_match("a.js", 1, "x")]);
        let outcome = extract_routes(&matches, &lm).unwrap();
        assert!(outcome.routes.is_empty());
        assert_eq!(outcome.dropped, 0);
    }

    #[test]
    fn prompt_truncates_matches_and_context() {
        let lm = ScriptedLm::new(vec!["[]"]);
        let mut batch = Vec::new();
        for i in 0..60 {
            let mut m = one_match("a.js", i + 1, "app.get('/x', h)");
            m.before = (0..8).map(|j| format!("before{j}")).collect();
            m.after = (0..8).map(|j| format!("after{j}")).collect();
            batch.push(m);
        }
        let matches = matches_map(batch);
        extract_routes(&matches, &lm).unwrap();

        let calls = lm.calls.borrow();
        let payload: Value = serde_json::from_str(&calls[0]).unwrap();
        let entries = payload["0"].as_array().unwrap();
        assert_eq!(entries.len(), 50);
        let before = entries[0]["before"].as_array().unwrap();
        assert_eq!(before.len(), 5);
        assert_eq!(before[0], "before3");
        assert_eq!(entries[0]["after"].as_array().unwrap().len(), 5);
        assert!(entries[0].get("match").is_some());
    }

    #[test]
    fn unrecoverable_response_is_an_error() {
        let lm = ScriptedLm::new(vec!["no json here"]);
        let matches = matches_map(vec![one_match("a.js", 1, "x")]);
        assert!(extract_routes(&matches, &lm).is_err());
    }
}
