//! Path normalization: rewrite framework parameter syntaxes into `{name}`
//! form and derive the path-parameter list.

use regex::Regex;
use serde_json::json;
use std::sync::OnceLock;

use crate::types::ParamDescriptor;

fn colon_param() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    // Anchored to a segment start so `<int:id>` is left for the angle rules.
    RE.get_or_init(|| Regex::new(r"(^|/):([A-Za-z0-9_]+)").unwrap())
}

fn typed_angle_param() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"<[^:>]*:([^>]+)>").unwrap())
}

fn angle_param() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"<([^>]+)>").unwrap())
}

fn doubled_slash() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"//+").unwrap())
}

fn brace_param() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\{([^}]+)\}").unwrap())
}

/// Rewrite `:id`, `<int:id>`, and `<id>` segments to `{id}` and collapse
/// doubled slashes. Idempotent; always returns a leading `/`.
pub fn normalize_path(raw: &str) -> String {
    let mut path = raw.trim().to_string();
    if !path.starts_with('/') {
        path.insert(0, '/');
    }
    path = colon_param().replace_all(&path, "${1}{${2}}").into_owned();
    path = typed_angle_param().replace_all(&path, "{$1}").into_owned();
    path = angle_param().replace_all(&path, "{$1}").into_owned();
    doubled_slash().replace_all(&path, "/").into_owned()
}

/// One required string-typed path parameter per `{name}`, in path order.
/// Repeated names are kept, not deduplicated.
pub fn extract_path_params(path: &str) -> Vec<ParamDescriptor> {
    brace_param()
        .captures_iter(path)
        .map(|caps| ParamDescriptor {
            name: caps[1].to_string(),
            location: "path".to_string(),
            required: true,
            schema: json!({"type": "string"}),
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn colon_params_become_braces() {
        assert_eq!(normalize_path("/users/:id"), "/users/{id}");
        assert_eq!(normalize_path("users/:id/posts/:postId"), "/users/{id}/posts/{postId}");
    }

    #[test]
    fn typed_angle_params_keep_only_the_name() {
        assert_eq!(normalize_path("/items/<int:item_id>"), "/items/{item_id}");
        assert_eq!(normalize_path("/files/<path:name>"), "/files/{name}");
    }

    #[test]
    fn untyped_angle_params_become_braces() {
        assert_eq!(normalize_path("/users/<id>"), "/users/{id}");
    }

    #[test]
    fn doubled_slashes_collapse() {
        let normalized = normalize_path("//a//b/");
        assert_eq!(normalized, "/a/b/");
        assert!(normalized.starts_with('/'));
        assert!(!normalized.contains("//"));
    }

    #[test]
    fn normalization_is_idempotent() {
        for raw in [
            "/users/:id",
            "items/<int:item_id>",
            "//a//b",
            "/plain",
            "/mixed/:one/<int:two>/<three>",
        ] {
            let once = normalize_path(raw);
            assert_eq!(normalize_path(&once), once);
        }
    }

    #[test]
    fn whitespace_is_trimmed() {
        assert_eq!(normalize_path("  /ping  "), "/ping");
    }

    #[test]
    fn mixed_syntaxes_normalize_together() {
        assert_eq!(
            normalize_path("/mixed/:one/<int:two>/<three>"),
            "/mixed/{one}/{two}/{three}"
        );
    }

    #[test]
    fn params_extracted_in_order() {
        let params = extract_path_params(&normalize_path("/users/:id/posts/:postId"));
        let names: Vec<&str> = params.iter().map(|p| p.name.as_str()).collect();
        assert_eq!(names, vec!["id", "postId"]);
        for param in &params {
            assert_eq!(param.location, "path");
            assert!(param.required);
            assert_eq!(param.schema, json!({"type": "string"}));
        }
    }

    #[test]
    fn repeated_names_yield_repeated_descriptors() {
        let params = extract_path_params("/pair/{id}/with/{id}");
        assert_eq!(params.len(), 2);
        assert_eq!(params[0].name, "id");
        assert_eq!(params[1].name, "id");
    }

    #[test]
    fn plain_path_has_no_params() {
        assert!(extract_path_params("/health").is_empty());
    }
}
