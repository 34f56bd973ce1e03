//! CLI argument parsing for the discovery pipeline.
//!
//! The CLI stays thin: flags map one-to-one onto [`GenerateOptions`] and the
//! LM backend is resolved at this boundary, never inside pipeline stages.
use clap::{Parser, Subcommand};
use std::path::PathBuf;

use crate::types::GenerateOptions;

/// Root CLI entrypoint.
#[derive(Parser, Debug)]
#[command(
    name = "apiscout",
    version,
    about = "Draft an OpenAPI 3.0 document for an undocumented repository",
    subcommand_required = true,
    arg_required_else_help = true
)]
pub struct RootArgs {
    #[command(subcommand)]
    pub command: Command,
}

/// Top-level commands.
#[derive(Subcommand, Debug)]
pub enum Command {
    Generate(GenerateArgs),
    Validate(ValidateArgs),
}

/// Generate command inputs: the repository plus every pipeline knob.
#[derive(Parser, Debug)]
#[command(about = "Discover endpoints and write openapi.generated.json")]
pub struct GenerateArgs {
    /// Repository to analyze: clone URL or existing local directory
    #[arg(long, value_name = "URL_OR_DIR")]
    pub repo: String,

    /// Search rounds allowed; values below 2 disable the fallback round
    #[arg(long, value_name = "N", default_value_t = 3)]
    pub max_search_rounds: u32,

    /// Cap on files sampled into the planning inventory
    #[arg(long, value_name = "N", default_value_t = 200)]
    pub max_files: usize,

    /// Cap on discovered routes merged into the document
    #[arg(long, value_name = "N", default_value_t = 300)]
    pub max_routes: usize,

    /// Context lines captured on each side of a search match
    #[arg(long, value_name = "N", default_value_t = 20)]
    pub context_lines: usize,

    /// Enrich only the first N merged routes with an LM call
    #[arg(long, value_name = "N")]
    pub enrich_top_n: Option<usize>,

    /// Per-file byte budget for head/tail sampling
    #[arg(long, value_name = "BYTES", default_value_t = 200_000)]
    pub max_bytes_per_file: u64,

    /// Extension to sample, repeatable; defaults to a built-in source set
    #[arg(long = "ext", value_name = "EXT")]
    pub exts: Vec<String>,

    /// Shell command used as the LM backend; `{prompt}` is substituted,
    /// otherwise the prompt arrives on stdin
    #[arg(long, value_name = "CMD")]
    pub lm_command: Option<String>,

    /// Gemini model id for the hosted backend
    #[arg(long, value_name = "MODEL")]
    pub model: Option<String>,
}

impl GenerateArgs {
    /// Fold flags into pipeline options, normalizing extension spellings.
    pub fn to_options(&self) -> GenerateOptions {
        let mut options = GenerateOptions {
            max_search_rounds: self.max_search_rounds,
            max_files: self.max_files,
            max_routes: self.max_routes,
            context_lines: self.context_lines,
            enrich_top_n: self.enrich_top_n,
            max_bytes_per_file: self.max_bytes_per_file,
            ..GenerateOptions::default()
        };
        if !self.exts.is_empty() {
            options.exts = Some(self.exts.iter().map(|ext| normalize_ext(ext)).collect());
        }
        options
    }
}

/// `js` and `.JS` both mean `.js`.
fn normalize_ext(raw: &str) -> String {
    let lower = raw.trim().to_lowercase();
    if lower.starts_with('.') {
        lower
    } else {
        format!(".{lower}")
    }
}

/// Validate command inputs for an existing document.
#[derive(Parser, Debug)]
#[command(about = "Validate an OpenAPI JSON document")]
pub struct ValidateArgs {
    /// Path to the OpenAPI JSON file
    #[arg(value_name = "SPEC")]
    pub spec: PathBuf,
}
