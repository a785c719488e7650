use std::path::Path;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use clap::Parser;
use submit_gate::Document;
use submit_gate::GateConfig;
use submit_gate::HttpTransport;
use submit_gate::SubmissionGate;
use submit_gate::WindowUnit;
use tracing::Level;
use tracing::error;
use tracing::info;
use tracing_subscriber::EnvFilter;

/// Submit documents to the creation endpoint, never exceeding the configured
/// rate.
#[derive(Parser, Debug)]
#[command(author, version, about)]
struct Args {
    /// Document JSON files; each is submitted from its own thread
    #[arg(required = true)]
    documents: Vec<PathBuf>,

    /// Signature sent with every document
    #[arg(short, long)]
    signature: String,

    /// JSON gate configuration; overrides the flags below
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Window length
    #[arg(long, value_enum, default_value_t = WindowUnit::Second)]
    window: WindowUnit,

    /// Admissions per window
    #[arg(short, long, default_value_t = 10)]
    limit: usize,

    /// Longest wait for admission (e.g. "2s", "500ms")
    #[arg(long, value_parser = humantime::parse_duration)]
    wait_timeout: Option<Duration>,

    /// Reject instead of waiting when the window is exhausted
    #[arg(long)]
    fail_fast: bool,

    /// Document creation endpoint
    #[arg(long, default_value = submit_gate::DEFAULT_ENDPOINT)]
    endpoint: String,
}

impl Args {
    fn gate_config(&self) -> anyhow::Result<GateConfig> {
        match &self.config {
            Some(path) => {
                let raw = std::fs::read_to_string(path)
                    .with_context(|| format!("reading {}", path.display()))?;
                serde_json::from_str(&raw).with_context(|| format!("parsing {}", path.display()))
            }
            None => Ok(GateConfig {
                window: self.window,
                max_per_window: self.limit,
                wait_timeout: self.wait_timeout,
                fail_fast: self.fail_fast,
                endpoint: self.endpoint.clone(),
            }),
        }
    }
}

fn load_document(path: &Path) -> anyhow::Result<Document> {
    let raw = std::fs::read_to_string(path).with_context(|| format!("reading {}", path.display()))?;
    serde_json::from_str(&raw).with_context(|| format!("parsing {}", path.display()))
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::builder()
                .with_default_directive(Level::INFO.into())
                .from_env_lossy(),
        )
        .init();

    let args = Args::parse();
    let config = args.gate_config()?;
    config.validate()?;

    info!(
        window = ?config.window,
        max_per_window = config.max_per_window,
        endpoint = %config.endpoint,
        "Starting submissions"
    );

    let documents = args
        .documents
        .iter()
        .map(|path| load_document(path).map(|doc| (path, doc)))
        .collect::<anyhow::Result<Vec<_>>>()?;

    let transport = HttpTransport::new(config.endpoint_url()?)?;
    let gate = SubmissionGate::new(Arc::new(config.limiter()?), transport)
        .with_admission(config.admission());

    let failures = std::thread::scope(|s| {
        let handles: Vec<_> = documents
            .iter()
            .map(|(path, doc)| {
                let gate = &gate;
                let signature = args.signature.as_str();
                s.spawn(move || match gate.submit(doc, signature) {
                    Ok(response) => {
                        info!(document = %path.display(), status = response.status, "submitted");
                        println!("{}: {}", path.display(), response.body);
                        true
                    }
                    Err(e) => {
                        error!(document = %path.display(), error = %e, "submission failed");
                        false
                    }
                })
            })
            .collect();

        handles
            .into_iter()
            .map(|h| h.join())
            .filter(|joined| !matches!(joined, Ok(true)))
            .count()
    });

    anyhow::ensure!(failures == 0, "{failures} document(s) failed");
    Ok(())
}
