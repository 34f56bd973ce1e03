//! Render a generated OpenAPI document through a local Mintlify dev server
//! and capture a hydrated, self-contained HTML snapshot (plus an optional
//! PDF) with a headless browser. Thin automation over external binaries;
//! the document itself is never modified.

use anyhow::{anyhow, bail, Context, Result};
use clap::Parser;
use serde_json::{json, Value};
use std::fs;
use std::io::{BufRead, BufReader};
use std::path::{Path, PathBuf};
use std::process::{Child, Command, Stdio};
use std::thread;
use std::time::{Duration, Instant};

const INDEX_MDX: &str = "---\ntitle: Home\n---\n\n# API docs\n\nThis site was generated locally with Mintlify and your OpenAPI spec.\nOpen the **API reference** section in the sidebar to view endpoint pages.\n";

const METHODS: &[&str] = &[
    "get", "post", "put", "delete", "patch", "options", "head", "trace",
];

const BROWSERS: &[&str] = &["chromium", "chromium-browser", "google-chrome", "chrome"];

#[derive(Parser, Debug)]
#[command(
    name = "apiscout-render",
    version,
    about = "Render an OpenAPI document with Mintlify and export an HTML snapshot"
)]
struct Args {
    /// Path to the OpenAPI JSON file
    #[arg(value_name = "SPEC")]
    spec: PathBuf,

    /// Output HTML snapshot path
    #[arg(long, value_name = "PATH", default_value = "api-docs.html")]
    out: PathBuf,

    /// Optional PDF output path
    #[arg(long, value_name = "PATH")]
    pdf: Option<PathBuf>,

    /// Headless browser binary for snapshots (default: first of
    /// chromium/chromium-browser/google-chrome/chrome found on PATH)
    #[arg(long, value_name = "BIN")]
    browser: Option<PathBuf>,

    /// Port for the Mintlify dev server
    #[arg(long, value_name = "PORT", default_value_t = 3333)]
    port: u16,

    /// Seconds to wait for the dev server to answer HTTP
    #[arg(long, value_name = "SECS", default_value_t = 300)]
    timeout: u64,

    /// Extra seconds to wait after the server is reachable before capturing
    #[arg(long, value_name = "SECS", default_value_t = 12)]
    startup_grace: u64,

    /// Keep the scaffolded Mintlify project directory for debugging
    #[arg(long)]
    keep_temp: bool,

    /// Leave the dev server running after capture (blocks until it exits)
    #[arg(long)]
    keep_server: bool,
}

fn main() -> Result<()> {
    let args = Args::parse();

    let text = fs::read_to_string(&args.spec)
        .with_context(|| format!("read {}", args.spec.display()))?;
    let spec: Value =
        serde_json::from_str(&text).with_context(|| format!("parse {}", args.spec.display()))?;

    let ops = list_operations(&spec);
    if ops.is_empty() {
        bail!("no operations found under `paths` in {}", args.spec.display());
    }

    let project = tempfile::Builder::new()
        .prefix("mintlify-api-")
        .tempdir()
        .context("create project dir")?;
    let first_slug = write_project(project.path(), &text, &ops)?;
    eprintln!("[info] project dir: {}", project.path().display());

    let mut server = launch_mint_dev(project.path(), args.port)?;
    let capture_result = (|| {
        if !wait_for_server(args.port, Duration::from_secs(args.timeout)) {
            bail!("Mintlify dev server never became reachable on port {}", args.port);
        }
        // Bundling and hydration continue past the first HTTP response.
        thread::sleep(Duration::from_secs(args.startup_grace));

        let base_url = format!("http://127.0.0.1:{}", args.port);
        let browser = match &args.browser {
            Some(path) => path.clone(),
            None => find_browser()?,
        };
        capture_html(&browser, &base_url, &first_slug, &args.out)?;
        eprintln!("HTML: {}", args.out.display());
        if let Some(pdf) = &args.pdf {
            capture_pdf(&browser, &base_url, &first_slug, pdf)?;
            eprintln!("PDF:  {}", pdf.display());
        }
        eprintln!("Preview locally: {base_url}");
        Ok(())
    })();

    if args.keep_server && capture_result.is_ok() {
        eprintln!("[info] --keep-server is on; leaving dev server running.");
        let _ = server.wait();
    } else {
        let _ = server.kill();
        let _ = server.wait();
    }

    if args.keep_temp || args.keep_server {
        let kept = project.keep();
        eprintln!("[info] kept project at: {}", kept.display());
    }

    capture_result
}

/// Every (METHOD, path) pair present in the document, in path order.
fn list_operations(spec: &Value) -> Vec<(String, String)> {
    let mut ops = Vec::new();
    let Some(paths) = spec.get("paths").and_then(Value::as_object) else {
        return ops;
    };
    for (path, item) in paths {
        let Some(item) = item.as_object() else {
            continue;
        };
        for (method, op) in item {
            if METHODS.contains(&method.to_lowercase().as_str()) && op.is_object() {
                ops.push((method.to_uppercase(), path.clone()));
            }
        }
    }
    ops
}

/// `GET /api/guides/{city}` becomes `get-api-guides-city`.
fn slugify(method: &str, path: &str) -> String {
    let clean: String = path
        .trim_matches('/')
        .chars()
        .filter(|c| *c != '{' && *c != '}')
        .collect();
    let clean = clean.replace('/', "-");
    let clean = if clean.is_empty() { "root" } else { &clean };
    format!("{}-{}", method.to_lowercase(), clean)
}

/// Scaffold a minimal Mintlify project around the spec; returns the slug of
/// the first endpoint page so the capture can land on a hydrated API view.
fn write_project(project: &Path, spec_text: &str, ops: &[(String, String)]) -> Result<String> {
    fs::write(project.join("index.mdx"), INDEX_MDX).context("write index.mdx")?;
    fs::write(project.join("openapi.json"), spec_text).context("write openapi.json")?;

    let api_dir = project.join("api-reference");
    fs::create_dir_all(&api_dir).context("create api-reference dir")?;

    let mut pages = Vec::new();
    let mut first_slug = None;
    for (method, path) in ops {
        let slug = slugify(method, path);
        if first_slug.is_none() {
            first_slug = Some(slug.clone());
        }
        let mdx = format!(
            "---\ntitle: {method} {path}\nopenapi: \"./openapi.json {method} {path}\"\n---\n\n"
        );
        fs::write(api_dir.join(format!("{slug}.mdx")), mdx)
            .with_context(|| format!("write page for {method} {path}"))?;
        pages.push(format!("api-reference/{slug}"));
    }
    if pages.is_empty() {
        pages.push("api-reference".to_string());
    }

    let docs = json!({
        "$schema": "https://mintlify.com/docs.json",
        "theme": "mint",
        "name": "API Docs",
        "colors": { "primary": "#0ea5e9" },
        "navigation": {
            "groups": [
                { "group": "API reference", "pages": pages }
            ]
        },
        "interaction": { "drilldown": true }
    });
    fs::write(
        project.join("docs.json"),
        serde_json::to_string_pretty(&docs).context("serialize docs.json")?,
    )
    .context("write docs.json")?;

    Ok(first_slug.unwrap_or_else(|| "index".to_string()))
}

/// Start `mintlify dev` (falling back to npx) with its output streamed to
/// stderr by a drain thread so bundler errors surface immediately.
fn launch_mint_dev(project: &Path, port: u16) -> Result<Child> {
    let port_arg = port.to_string();
    let mut command = match which::which("mintlify") {
        Ok(cli) => {
            let mut command = Command::new(cli);
            command.args(["dev", "--port", &port_arg]);
            command
        }
        Err(_) => {
            let mut command = Command::new("npx");
            command.args(["mintlify", "dev", "--port", &port_arg]);
            command
        }
    };

    let mut child = command
        .current_dir(project)
        .stdout(Stdio::piped())
        .stderr(Stdio::inherit())
        .stdin(Stdio::null())
        .spawn()
        .context("launch mintlify dev (is mintlify or npx installed?)")?;

    if let Some(stdout) = child.stdout.take() {
        thread::spawn(move || {
            for line in BufReader::new(stdout).lines().map_while(Result::ok) {
                eprintln!("[mintlify] {line}");
            }
        });
    }
    Ok(child)
}

/// Poll until the server answers with any non-5xx status.
fn wait_for_server(port: u16, timeout: Duration) -> bool {
    let agent: ureq::Agent = ureq::Agent::config_builder()
        .http_status_as_error(false)
        .build()
        .into();
    let url = format!("http://127.0.0.1:{port}/");
    let deadline = Instant::now() + timeout;
    while Instant::now() < deadline {
        if let Ok(response) = agent.get(&url).call() {
            if response.status().as_u16() < 500 {
                return true;
            }
        }
        thread::sleep(Duration::from_secs(2));
    }
    false
}

fn find_browser() -> Result<PathBuf> {
    BROWSERS
        .iter()
        .find_map(|name| which::which(name).ok())
        .ok_or_else(|| anyhow!("no headless-capable browser found (tried {BROWSERS:?})"))
}

fn page_url(base_url: &str, first_slug: &str) -> String {
    format!("{base_url}/api-reference/{first_slug}")
}

/// Dump the hydrated DOM of the first endpoint page, falling back to the
/// site root when that page will not render.
fn capture_html(browser: &Path, base_url: &str, first_slug: &str, out: &Path) -> Result<()> {
    let html = dump_dom(browser, &page_url(base_url, first_slug))
        .or_else(|_| dump_dom(browser, base_url))?;
    fs::write(out, html).with_context(|| format!("write {}", out.display()))?;
    Ok(())
}

fn dump_dom(browser: &Path, url: &str) -> Result<String> {
    let output = Command::new(browser)
        .args([
            "--headless=new",
            "--disable-gpu",
            "--virtual-time-budget=1500",
            "--dump-dom",
            url,
        ])
        .output()
        .context("run headless browser")?;
    if !output.status.success() {
        bail!(
            "browser snapshot of {url} failed: {}",
            String::from_utf8_lossy(&output.stderr).trim()
        );
    }
    let html = String::from_utf8_lossy(&output.stdout).into_owned();
    if html.trim().is_empty() {
        bail!("browser snapshot of {url} produced no output");
    }
    Ok(html)
}

fn capture_pdf(browser: &Path, base_url: &str, first_slug: &str, out: &Path) -> Result<()> {
    let pdf_arg = format!("--print-to-pdf={}", out.display());
    let output = Command::new(browser)
        .args([
            "--headless=new",
            "--disable-gpu",
            "--no-pdf-header-footer",
            &pdf_arg,
            &page_url(base_url, first_slug),
        ])
        .output()
        .context("run headless browser for PDF")?;
    if !output.status.success() {
        bail!(
            "PDF capture failed: {}",
            String::from_utf8_lossy(&output.stderr).trim()
        );
    }
    Ok(())
}
