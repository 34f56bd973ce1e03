//! Search planning: one LM call that turns the inventory sample into
//! framework guesses plus concrete regex+glob probes.

use anyhow::{Context, Result};
use serde_json::{json, Value};

use crate::lm::{complete_json, LmClient};
use crate::types::{FileSample, SearchPlan};

// Prompt template loaded at compile time
const PLAN_SYSTEM: &str = include_str!(concat!(
    env!("CARGO_MANIFEST_DIR"),
    "/prompts/plan_search.md"
));

/// At most this many samples go into the planning prompt.
const MAX_PLAN_SAMPLES: usize = 50;
/// Head/tail text is cut to this many characters per sample.
const SAMPLE_CHAR_BUDGET: usize = 200;

const PLAN_TEMPERATURE: f32 = 0.2;

/// Ask the LM for a search plan over the first [`MAX_PLAN_SAMPLES`] samples.
///
/// Missing `frameworks`/`searches` keys yield an empty plan (the caller's
/// fallback round covers that); a malformed query entry fails the stage.
pub fn plan_search(samples: &[FileSample], client: &dyn LmClient) -> Result<SearchPlan> {
    let compact: Vec<Value> = samples
        .iter()
        .take(MAX_PLAN_SAMPLES)
        .map(|sample| {
            json!({
                "path": sample.path,
                "ext": sample.ext,
                "head": head_chars(&sample.head, SAMPLE_CHAR_BUDGET),
                "tail": tail_chars(&sample.tail, SAMPLE_CHAR_BUDGET),
            })
        })
        .collect();
    let user = serde_json::to_string_pretty(&compact).context("encode inventory payload")?;

    let raw = complete_json(client, Some(PLAN_SYSTEM), &user, PLAN_TEMPERATURE)?;
    let plan: SearchPlan = serde_json::from_value(raw).context("parse search plan")?;
    tracing::info!(
        frameworks = plan.frameworks.len(),
        searches = plan.searches.len(),
        "search plan ready"
    );
    Ok(plan)
}

fn head_chars(text: &str, limit: usize) -> String {
    text.chars().take(limit).collect()
}

fn tail_chars(text: &str, limit: usize) -> String {
    let total = text.chars().count();
    if total <= limit {
        return text.to_string();
    }
    text.chars().skip(total - limit).collect()
}
