//! Generation pipeline: acquire a repository, discover its HTTP endpoints,
//! and assemble a validated OpenAPI document plus a diagnostic report.

use anyhow::Result;
use serde_json::{json, Map, Value};

use crate::enrich::{enrich_route, EnrichOutcome};
use crate::extract::{extract_routes, ExtractOutcome};
use crate::gitops::{acquire, repo_name_from_url};
use crate::inventory::build_inventory;
use crate::lm::LmClient;
use crate::normalize::{extract_path_params, normalize_path};
use crate::openapi::{
    build_openapi_skeleton, downgrade_schemas, export_spec, merge_route, validate_openapi,
};
use crate::planner::plan_search;
use crate::search::{fallback_queries, multi_search, DEFAULT_MATCH_LIMIT};
use crate::snippet::{read_snippet, DEFAULT_RADIUS};
use crate::types::{
    Enrichment, EvidenceRef, GenerateOptions, GenerateOutcome, GenerateReport, RouteDef,
    SearchPlan, SkipCounts,
};

const SPEC_FILE_NAME: &str = "openapi.generated.json";
const SPEC_VERSION: &str = "0.1.0";

/// Run the whole pipeline for one repository.
///
/// `repo` may be a clone URL or an existing local directory. Stage failures
/// that have a local recovery (a dropped route element, a degraded
/// enrichment, an invalid document) are absorbed and counted; everything
/// else propagates and fails the run as a whole.
pub fn run_generate(
    repo: &str,
    options: &GenerateOptions,
    client: &dyn LmClient,
) -> Result<GenerateOutcome> {
    let repo_dir = acquire(repo)?;
    let mut notes = Vec::new();

    let inventory = build_inventory(
        &repo_dir,
        options.exts.as_deref(),
        options.max_files,
        options.max_bytes_per_file,
    )?;
    tracing::info!(
        files = inventory.samples.len(),
        skipped = inventory.skipped_files,
        "inventory built"
    );
    notes.push("Step 1 complete: repository acquired and indexed.".to_string());

    let SearchPlan {
        frameworks,
        searches,
    } = plan_search(&inventory.samples, client)?;
    let mut queries = searches;
    let mut matches = multi_search(
        &repo_dir,
        &queries,
        options.context_lines,
        DEFAULT_MATCH_LIMIT,
    );

    let mut used_fallback = false;
    let planned_total: usize = matches.values().map(Vec::len).sum();
    if planned_total == 0 && options.max_search_rounds >= 2 {
        used_fallback = true;
        queries = fallback_queries();
        matches = multi_search(
            &repo_dir,
            &queries,
            options.context_lines,
            DEFAULT_MATCH_LIMIT,
        );
    }
    tracing::info!(
        matches = matches.values().map(Vec::len).sum::<usize>(),
        used_fallback,
        "search finished"
    );
    notes.push("Step 2 complete: planned searches and ran regex.".to_string());

    let ExtractOutcome { routes, dropped } = extract_routes(&matches, client)?;
    notes.push("Step 3 complete: extracted endpoints with evidence.".to_string());

    let title = format!("{} (Generated)", repo_name_from_url(repo));
    let mut doc = build_openapi_skeleton(&title, SPEC_VERSION, &[]);

    let enrich_cap = options.enrich_top_n.unwrap_or(usize::MAX);
    let mut merged = 0usize;
    let mut degraded_enrichments = 0usize;
    for route in routes.iter().take(options.max_routes) {
        let path = normalize_path(&route.raw_path);
        let parameters = extract_path_params(&path);

        let enrichment = if merged < enrich_cap {
            match read_snippet(&repo_dir, &route.file, route.line, DEFAULT_RADIUS) {
                Ok(snippet) => {
                    let EnrichOutcome {
                        enrichment,
                        degraded,
                    } = enrich_route(&snippet, route.method, &route.raw_path, client);
                    if degraded {
                        degraded_enrichments += 1;
                    }
                    enrichment
                }
                Err(err) => {
                    // The extractor sometimes invents file names; merge the
                    // route anyway, just without hints.
                    tracing::debug!(file = route.file.as_str(), error = %err, "snippet unreadable");
                    degraded_enrichments += 1;
                    Enrichment::default()
                }
            }
        } else {
            Enrichment::default()
        };

        let responses = enrichment
            .responses
            .filter(|map| !map.is_empty())
            .unwrap_or_else(default_route_responses);

        let def = RouteDef {
            method: route.method,
            path,
            parameters,
            request_body: enrichment.request_body,
            responses,
            evidence: EvidenceRef {
                file: route.file.clone(),
                line: route.line,
                quotes: route.evidence.clone(),
            },
            summary: enrichment.summary,
            auth: enrichment.auth,
        };
        merge_route(&mut doc, &def)?;
        merged += 1;
    }

    let mut extra_notes = Vec::new();
    let validation = validate_openapi(&doc)?;
    if !validation.valid {
        tracing::warn!(errors = validation.errors.len(), "document invalid, downgrading schemas");
        downgrade_schemas(&mut doc);
        let revalidation = validate_openapi(&doc)?;
        if revalidation.valid {
            extra_notes.push("Some schemas downgraded to permissive object.".to_string());
        } else {
            for error in &revalidation.errors {
                tracing::warn!(error = error.as_str(), "still invalid after downgrade");
            }
            extra_notes.push("Spec still invalid after downgrade; check logs.".to_string());
        }
    }
    notes.push("Step 4 complete: assembled and validated OpenAPI spec.".to_string());
    notes.append(&mut extra_notes);

    let spec_path = repo_dir.join(SPEC_FILE_NAME);
    export_spec(&doc, &spec_path)?;
    tracing::info!(
        path = %spec_path.display(),
        routes = merged,
        "specification written"
    );

    let matches_counts: Map<String, Value> = matches
        .iter()
        .map(|(idx, batch)| (idx.to_string(), Value::from(batch.len())))
        .collect();
    let spec_servers = doc
        .get("servers")
        .and_then(Value::as_array)
        .map(|servers| {
            servers
                .iter()
                .filter_map(|server| server.get("url").and_then(Value::as_str))
                .map(str::to_string)
                .collect()
        })
        .unwrap_or_default();
    let paths_count = doc
        .get("paths")
        .and_then(Value::as_object)
        .map_or(0, Map::len);

    Ok(GenerateOutcome {
        status: "ok".to_string(),
        spec_path: spec_path.display().to_string(),
        routes_found: routes.len(),
        rounds_used: 1 + u32::from(used_fallback),
        skipped: SkipCounts {
            files: inventory.skipped_files,
            routes: routes.len().saturating_sub(merged),
            route_items: dropped,
            enrichments: degraded_enrichments,
        },
        notes,
        report: GenerateReport {
            repo: repo_name_from_url(repo),
            inventory_count: inventory.samples.len(),
            frameworks,
            searches: queries,
            matches_counts,
            routes_sample: routes.iter().take(10).cloned().collect(),
            spec_servers,
            paths_count,
        },
    })
}

fn default_route_responses() -> Map<String, Value> {
    let mut responses = Map::new();
    responses.insert("200".to_string(), json!({ "description": "OK" }));
    responses
}
