//! Per-route enrichment: one LM call inferring summary, auth hint, and
//! request/response schemas strictly from a code snippet.

use serde_json::Value;

use crate::lm::{complete_json, LmClient};
use crate::types::{Enrichment, HttpMethod, Snippet};

// Prompt template loaded at compile time
const ENRICH_SYSTEM: &str = include_str!(concat!(
    env!("CARGO_MANIFEST_DIR"),
    "/prompts/enrich_route.md"
));

const ENRICH_TEMPERATURE: f32 = 0.1;

/// Enrichment plus whether the call degraded to an empty result.
pub struct EnrichOutcome {
    pub enrichment: Enrichment,
    pub degraded: bool,
}

/// Ask the LM for OpenAPI hints about one route.
///
/// Any failure here, from the call itself through shape validation, degrades
/// to an all-null enrichment instead of propagating; a single route must
/// never abort the pipeline.
pub fn enrich_route(
    snippet: &Snippet,
    method: HttpMethod,
    raw_path: &str,
    client: &dyn LmClient,
) -> EnrichOutcome {
    let user = format!(
        "METHOD: {}\nRAW_PATH: {}\nCODE_SNIPPET:\n{}",
        method.as_str().to_uppercase(),
        raw_path,
        snippet.text
    );

    let raw: Value = match complete_json(client, Some(ENRICH_SYSTEM), &user, ENRICH_TEMPERATURE) {
        Ok(raw) => raw,
        Err(err) => {
            tracing::debug!(path = raw_path, error = %err, "enrichment degraded");
            return EnrichOutcome {
                enrichment: Enrichment::default(),
                degraded: true,
            };
        }
    };

    match serde_json::from_value::<Enrichment>(raw) {
        Ok(enrichment) => EnrichOutcome {
            enrichment,
            degraded: false,
        },
        Err(err) => {
            tracing::debug!(path = raw_path, error = %err, "enrichment degraded");
            EnrichOutcome {
                enrichment: Enrichment::default(),
                degraded: true,
            }
        }
    }
}
