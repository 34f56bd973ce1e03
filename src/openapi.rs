//! OpenAPI document assembly and validation: skeleton, per-route merge,
//! schema downgrade, and a structural validity check.

use anyhow::{anyhow, Context, Result};
use jsonschema::{Draft, JSONSchema};
use serde_json::{json, Map, Value};
use std::fs;
use std::path::Path;

use crate::types::RouteDef;

// Structural OpenAPI 3.0 schema loaded at compile time
const OPENAPI30_SCHEMA: &str = include_str!("openapi30.schema.json");

const DEFAULT_SERVER_URL: &str = "http://localhost";

/// Outcome of a structural validation pass.
#[derive(Debug)]
pub struct Validation {
    pub valid: bool,
    pub errors: Vec<String>,
}

/// Empty OpenAPI 3.0 document shell with one default server if none given.
pub fn build_openapi_skeleton(title: &str, version: &str, servers: &[String]) -> Value {
    let servers: Vec<Value> = if servers.is_empty() {
        vec![json!({ "url": DEFAULT_SERVER_URL })]
    } else {
        servers.iter().map(|url| json!({ "url": url })).collect()
    };
    json!({
        "openapi": "3.0.3",
        "info": { "title": title, "version": version },
        "servers": servers,
        "paths": {}
    })
}

/// Insert or overwrite the operation at `paths[path][method]`.
///
/// Missing pieces get defaults: a `"{METHOD} {path}"` summary, an empty
/// parameter list, and a single permissive 200 response. A non-null request
/// body schema is wrapped in a not-required `application/json` envelope.
/// Merging the same (path, method) twice keeps only the later operation.
pub fn merge_route(doc: &mut Value, route: &RouteDef) -> Result<()> {
    let method = route.method.as_str();

    let summary = route
        .summary
        .as_deref()
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .unwrap_or_else(|| format!("{} {}", method.to_uppercase(), route.path));

    let responses = if route.responses.is_empty() {
        json!({ "200": default_response() })
    } else {
        Value::Object(route.responses.clone())
    };

    let mut entry = Map::new();
    entry.insert("summary".to_string(), Value::String(summary));
    entry.insert(
        "parameters".to_string(),
        serde_json::to_value(&route.parameters).context("encode parameters")?,
    );
    entry.insert("responses".to_string(), responses);
    if let Some(schema) = &route.request_body {
        entry.insert(
            "requestBody".to_string(),
            json!({
                "required": false,
                "content": { "application/json": { "schema": schema } }
            }),
        );
    }

    let paths = doc
        .get_mut("paths")
        .and_then(Value::as_object_mut)
        .ok_or_else(|| anyhow!("document has no paths object"))?;
    let item = paths
        .entry(route.path.clone())
        .or_insert_with(|| Value::Object(Map::new()));
    let item = item
        .as_object_mut()
        .ok_or_else(|| anyhow!("path item for {} is not an object", route.path))?;
    item.insert(method.to_string(), Value::Object(entry));
    Ok(())
}

fn default_response() -> Value {
    json!({
        "description": "OK",
        "content": {
            "application/json": { "schema": permissive_schema() }
        }
    })
}

fn permissive_schema() -> Value {
    json!({ "type": "object", "additionalProperties": true })
}

/// Replace every request-body and JSON response schema with a permissive
/// open object. Last-resort repair, never part of the success path.
pub fn downgrade_schemas(doc: &mut Value) {
    let Some(paths) = doc.get_mut("paths").and_then(Value::as_object_mut) else {
        return;
    };
    for item in paths.values_mut() {
        let Some(item) = item.as_object_mut() else {
            continue;
        };
        for op in item.values_mut() {
            let Some(op) = op.as_object_mut() else {
                continue;
            };
            if let Some(media) = op
                .get_mut("requestBody")
                .and_then(|rb| rb.get_mut("content"))
                .and_then(|content| content.get_mut("application/json"))
                .and_then(Value::as_object_mut)
            {
                media.insert("schema".to_string(), permissive_schema());
            }
            let Some(responses) = op.get_mut("responses").and_then(Value::as_object_mut) else {
                continue;
            };
            for response in responses.values_mut() {
                if let Some(media) = response
                    .get_mut("content")
                    .and_then(|content| content.get_mut("application/json"))
                    .and_then(Value::as_object_mut)
                {
                    media.insert("schema".to_string(), permissive_schema());
                }
            }
        }
    }
}

/// Validate a document against the embedded OpenAPI 3.0 structural schema.
pub fn validate_openapi(doc: &Value) -> Result<Validation> {
    let schema: Value =
        serde_json::from_str(OPENAPI30_SCHEMA).context("parse embedded OpenAPI schema")?;
    let compiled = JSONSchema::options()
        .with_draft(Draft::Draft7)
        .compile(&schema)
        .map_err(|err| anyhow!("compile embedded OpenAPI schema: {err}"))?;

    // Collect errors before `compiled` drops; the iterator borrows it.
    let validation = match compiled.validate(doc) {
        Ok(()) => Validation {
            valid: true,
            errors: Vec::new(),
        },
        Err(errors) => Validation {
            valid: false,
            errors: errors
                .map(|err| format!("{}: {err}", err.instance_path))
                .collect(),
        },
    };
    Ok(validation)
}

/// Serialize the document as indented JSON, creating parent directories.
pub fn export_spec(doc: &Value, out_path: &Path) -> Result<()> {
    if let Some(parent) = out_path.parent() {
        fs::create_dir_all(parent)
            .with_context(|| format!("create {}", parent.display()))?;
    }
    let text = serde_json::to_string_pretty(doc).context("serialize OpenAPI document")?;
    fs::write(out_path, text).with_context(|| format!("write {}", out_path.display()))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{EvidenceRef, HttpMethod, ParamDescriptor};

    fn route(method: HttpMethod, path: &str) -> RouteDef {
        RouteDef {
            method,
            path: path.to_string(),
            parameters: Vec::new(),
            request_body: None,
            responses: Map::new(),
            evidence: EvidenceRef {
                file: "app.js".to_string(),
                line: 1,
                quotes: vec!["app.get('/x', h)".to_string()],
            },
            summary: None,
            auth: None,
        }
    }

    #[test]
    fn skeleton_has_default_server_and_empty_paths() {
        let doc = build_openapi_skeleton("demo (Generated)", "0.1.0", &[]);
        assert_eq!(doc["openapi"], "3.0.3");
        assert_eq!(doc["info"]["title"], "demo (Generated)");
        assert_eq!(doc["servers"][0]["url"], "http://localhost");
        assert!(doc["paths"].as_object().unwrap().is_empty());
        assert!(validate_openapi(&doc).unwrap().valid);
    }

    #[test]
    fn merge_applies_defaults() {
        let mut doc = build_openapi_skeleton("t", "0.1.0", &[]);
        merge_route(&mut doc, &route(HttpMethod::Get, "/users")).unwrap();

        let op = &doc["paths"]["/users"]["get"];
        assert_eq!(op["summary"], "GET /users");
        assert!(op["parameters"].as_array().unwrap().is_empty());
        let responses = op["responses"].as_object().unwrap();
        assert_eq!(responses.len(), 1);
        assert_eq!(
            responses["200"]["content"]["application/json"]["schema"],
            json!({ "type": "object", "additionalProperties": true })
        );
        assert!(validate_openapi(&doc).unwrap().valid);
    }

    #[test]
    fn merge_overwrites_same_path_and_method() {
        let mut doc = build_openapi_skeleton("t", "0.1.0", &[]);
        let mut first = route(HttpMethod::Get, "/users");
        first.summary = Some("first".to_string());
        let mut second = route(HttpMethod::Get, "/users");
        second.summary = Some("second".to_string());

        merge_route(&mut doc, &first).unwrap();
        merge_route(&mut doc, &second).unwrap();

        let item = doc["paths"]["/users"].as_object().unwrap();
        assert_eq!(item.len(), 1);
        assert_eq!(item["get"]["summary"], "second");
    }

    #[test]
    fn request_body_is_wrapped_not_required() {
        let mut doc = build_openapi_skeleton("t", "0.1.0", &[]);
        let mut posted = route(HttpMethod::Post, "/users");
        posted.request_body = Some(json!({ "type": "object", "required": ["name"] }));
        merge_route(&mut doc, &posted).unwrap();

        let body = &doc["paths"]["/users"]["post"]["requestBody"];
        assert_eq!(body["required"], false);
        assert_eq!(
            body["content"]["application/json"]["schema"]["required"][0],
            "name"
        );
    }

    #[test]
    fn parameters_round_trip_into_the_operation() {
        let mut doc = build_openapi_skeleton("t", "0.1.0", &[]);
        let mut get = route(HttpMethod::Get, "/users/{id}");
        get.parameters = vec![ParamDescriptor {
            name: "id".to_string(),
            location: "path".to_string(),
            required: true,
            schema: json!({ "type": "string" }),
        }];
        merge_route(&mut doc, &get).unwrap();

        let params = doc["paths"]["/users/{id}"]["get"]["parameters"]
            .as_array()
            .unwrap();
        assert_eq!(params[0]["name"], "id");
        assert_eq!(params[0]["in"], "path");
        assert!(validate_openapi(&doc).unwrap().valid);
    }

    #[test]
    fn downgrade_repairs_an_invalid_schema() {
        let mut doc = build_openapi_skeleton("t", "0.1.0", &[]);
        let mut bad = route(HttpMethod::Post, "/orders");
        bad.request_body = Some(json!({ "type": "definitely-not-a-type" }));
        merge_route(&mut doc, &bad).unwrap();

        let before = validate_openapi(&doc).unwrap();
        assert!(!before.valid);
        assert!(!before.errors.is_empty());

        downgrade_schemas(&mut doc);
        let after = validate_openapi(&doc).unwrap();
        assert!(after.valid, "errors: {:?}", after.errors);

        let schema =
            &doc["paths"]["/orders"]["post"]["requestBody"]["content"]["application/json"]["schema"];
        assert_eq!(schema, &json!({ "type": "object", "additionalProperties": true }));
    }

    #[test]
    fn downgrade_replaces_response_schemas_too() {
        let mut doc = build_openapi_skeleton("t", "0.1.0", &[]);
        let mut listed = route(HttpMethod::Get, "/orders");
        listed.responses.insert(
            "200".to_string(),
            json!({
                "description": "OK",
                "content": { "application/json": { "schema": { "bogusKeyword": 1 } } }
            }),
        );
        merge_route(&mut doc, &listed).unwrap();
        assert!(!validate_openapi(&doc).unwrap().valid);

        downgrade_schemas(&mut doc);
        let after = validate_openapi(&doc).unwrap();
        assert!(after.valid, "errors: {:?}", after.errors);
    }

    #[test]
    fn wildcard_method_is_structurally_invalid() {
        let mut doc = build_openapi_skeleton("t", "0.1.0", &[]);
        merge_route(&mut doc, &route(HttpMethod::All, "/anything")).unwrap();
        let validation = validate_openapi(&doc).unwrap();
        assert!(!validation.valid);
    }

    #[test]
    fn validation_errors_outlive_the_compiled_schema() {
        let doc = json!({ "openapi": "3.0.3", "paths": {} });
        let validation = validate_openapi(&doc).unwrap();
        assert!(!validation.valid);
        assert!(
            validation.errors.iter().any(|e| e.contains("info")),
            "errors: {:?}",
            validation.errors
        );
    }

    #[test]
    fn export_creates_parent_directories() {
        let dir = tempfile::TempDir::new().unwrap();
        let out = dir.path().join("nested/openapi.generated.json");
        let doc = build_openapi_skeleton("t", "0.1.0", &[]);
        export_spec(&doc, &out).unwrap();

        let written: Value = serde_json::from_str(&fs::read_to_string(&out).unwrap()).unwrap();
        assert_eq!(written["openapi"], "3.0.3");
    }
}
