//! Shared test infrastructure for integration tests.

use serde_json::Value;
use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use std::process::Command;
use tempfile::TempDir;

/// A finished `generate` run: parsed stdout plus the staged repository.
pub struct GenerateRun {
    pub outcome: Value,
    /// Keeps the staged repository alive for spec-file assertions.
    pub repo: TempDir,
}

impl GenerateRun {
    /// Parse the spec file the run reports having written.
    pub fn written_spec(&self) -> Value {
        let path = self.outcome["spec_path"].as_str().expect("spec_path string");
        let text = fs::read_to_string(path).expect("read generated spec");
        serde_json::from_str(&text).expect("parse generated spec")
    }
}

fn manifest_dir() -> PathBuf {
    PathBuf::from(env::var("CARGO_MANIFEST_DIR").unwrap_or_else(|_| ".".into()))
}

/// `--lm-command` value answering from tests/fixtures/{name}/replies/.
///
/// Invoked through `sh` so a lost executable bit on the script cannot fail
/// the suite.
pub fn mock_lm_command(name: &str) -> String {
    let script = manifest_dir().join("tests/mock-lm.sh");
    let fixture = manifest_dir().join("tests/fixtures").join(name);
    format!("sh {} {}", script.display(), fixture.display())
}

/// Copy tests/fixtures/{name}/repo/ into a fresh temp directory so runs can
/// write into it without touching the checked-in fixture.
pub fn stage_repo(name: &str) -> TempDir {
    let src = manifest_dir().join("tests/fixtures").join(name).join("repo");
    let staged = TempDir::new().expect("create staging dir");
    copy_tree(&src, staged.path()).expect("stage fixture repo");
    staged
}

fn copy_tree(src: &Path, dst: &Path) -> std::io::Result<()> {
    for entry in fs::read_dir(src)? {
        let entry = entry?;
        let target = dst.join(entry.file_name());
        if entry.file_type()?.is_dir() {
            fs::create_dir_all(&target)?;
            copy_tree(&entry.path(), &target)?;
        } else {
            fs::copy(entry.path(), &target)?;
        }
    }
    Ok(())
}

/// Run `apiscout generate` on a staged copy of the fixture repo with the
/// mock LM backend, asserting the process exits successfully.
pub fn run_generate(fixture: &str, extra_args: &[&str]) -> GenerateRun {
    let repo = stage_repo(fixture);
    let output = Command::new(env!("CARGO_BIN_EXE_apiscout"))
        .arg("generate")
        .arg("--repo")
        .arg(repo.path())
        .arg("--lm-command")
        .arg(mock_lm_command(fixture))
        .args(extra_args)
        .output()
        .expect("run apiscout");
    assert!(
        output.status.success(),
        "apiscout generate failed: {}",
        String::from_utf8_lossy(&output.stderr)
    );
    let outcome: Value = serde_json::from_str(&String::from_utf8_lossy(&output.stdout))
        .expect("parse outcome JSON");
    GenerateRun { outcome, repo }
}
