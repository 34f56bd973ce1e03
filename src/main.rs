use anyhow::{bail, Context, Result};
use clap::Parser;
use tracing_subscriber::EnvFilter;

mod cli;
mod enrich;
mod extract;
mod gitops;
mod inventory;
mod lm;
mod normalize;
mod openapi;
mod planner;
mod search;
mod snippet;
mod types;
mod workflow;

use cli::{Command, GenerateArgs, RootArgs, ValidateArgs};

fn main() -> Result<()> {
    // Logs go to stderr; stdout carries only command output.
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let args = RootArgs::parse();
    match args.command {
        Command::Generate(args) => cmd_generate(args),
        Command::Validate(args) => cmd_validate(args),
    }
}

fn cmd_generate(args: GenerateArgs) -> Result<()> {
    let client = lm::resolve_client(args.lm_command.as_deref(), args.model.as_deref())?;
    let outcome = workflow::run_generate(&args.repo, &args.to_options(), client.as_ref())?;
    println!("{}", serde_json::to_string_pretty(&outcome)?);
    Ok(())
}

fn cmd_validate(args: ValidateArgs) -> Result<()> {
    let text = std::fs::read_to_string(&args.spec)
        .with_context(|| format!("read {}", args.spec.display()))?;
    let doc: serde_json::Value =
        serde_json::from_str(&text).with_context(|| format!("parse {}", args.spec.display()))?;

    let validation = openapi::validate_openapi(&doc)?;
    if !validation.valid {
        for error in &validation.errors {
            eprintln!("{error}");
        }
        bail!(
            "{} failed OpenAPI validation ({} error(s))",
            args.spec.display(),
            validation.errors.len()
        );
    }
    println!("valid: {}", args.spec.display());
    Ok(())
}
