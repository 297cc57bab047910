use std::{collections::BTreeMap, path::PathBuf, process::Stdio};

use anyhow::{Context, Result};
use async_trait::async_trait;
use serde::Deserialize;
use tokio::process::Command;
use tracing::{debug, warn};

/// Severity of a single diagnostic, ordered from worst to mildest.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Severity {
    Error,
    Warning,
    Info,
    Hint,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Diagnostic {
    pub severity: Severity,
    pub message: String,
}

/// Diagnostics attached to one file, mirroring how language tooling
/// publishes them per resource.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileDiagnostics {
    pub path: PathBuf,
    pub diagnostics: Vec<Diagnostic>,
}

/// Counts error-severity entries across all per-file lists. Warnings and
/// milder diagnostics never contribute.
pub fn count_errors(sets: &[FileDiagnostics]) -> usize {
    sets.iter()
        .flat_map(|set| set.diagnostics.iter())
        .filter(|diagnostic| diagnostic.severity == Severity::Error)
        .count()
}

/// A publisher of workspace diagnostics. Implementations are best-effort: a
/// snapshot always comes back, even if it has to be empty.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait DiagnosticsSource: Send {
    async fn diagnostics(&mut self) -> Vec<FileDiagnostics>;
}

/// Publishes diagnostics by checking the workspace with cargo and reading
/// its JSON message stream.
pub struct CargoDiagnostics {
    workspace: PathBuf,
}

impl CargoDiagnostics {
    pub fn new(workspace: PathBuf) -> Self {
        Self { workspace }
    }

    async fn check(&self) -> Result<Vec<FileDiagnostics>> {
        // A failing exit status still carries the diagnostics we're after,
        // only a spawn failure is an error.
        let output = Command::new("cargo")
            .args(["check", "--quiet", "--all-targets", "--message-format=json"])
            .current_dir(&self.workspace)
            .stdin(Stdio::null())
            .stderr(Stdio::null())
            .output()
            .await
            .context("Failed to run cargo check")?;
        Ok(parse_message_stream(&output.stdout))
    }
}

#[async_trait]
impl DiagnosticsSource for CargoDiagnostics {
    async fn diagnostics(&mut self) -> Vec<FileDiagnostics> {
        match self.check().await {
            Ok(sets) => sets,
            Err(e) => {
                debug!("Check failed, publishing an empty snapshot {e:?}");
                vec![]
            }
        }
    }
}

#[derive(Deserialize)]
struct CheckMessage {
    reason: String,
    #[serde(default)]
    message: Option<CompilerMessage>,
}

#[derive(Deserialize)]
struct CompilerMessage {
    level: String,
    message: String,
    #[serde(default)]
    spans: Vec<CheckSpan>,
}

#[derive(Deserialize)]
struct CheckSpan {
    file_name: String,
    #[serde(default)]
    is_primary: bool,
}

fn parse_message_stream(stdout: &[u8]) -> Vec<FileDiagnostics> {
    let mut by_file: BTreeMap<PathBuf, Vec<Diagnostic>> = BTreeMap::new();
    for line in stdout.split(|b| *b == b'\n') {
        if line.is_empty() {
            continue;
        }
        let parsed = match serde_json::from_slice::<CheckMessage>(line) {
            Ok(v) => v,
            Err(e) => {
                // ignore illegal values. The stream can carry non-JSON noise
                warn!("During parsing of check output found illegal json string: {e}");
                continue;
            }
        };
        if parsed.reason != "compiler-message" {
            continue;
        }
        let Some(message) = parsed.message else {
            continue;
        };
        // Messages without a primary span are end-of-run summaries like
        // "aborting due to N previous errors" and would double-count.
        let Some(primary) = message.spans.iter().find(|span| span.is_primary) else {
            continue;
        };
        by_file
            .entry(PathBuf::from(&primary.file_name))
            .or_default()
            .push(Diagnostic {
                severity: severity_from_level(&message.level),
                message: message.message,
            });
    }

    by_file
        .into_iter()
        .map(|(path, diagnostics)| FileDiagnostics { path, diagnostics })
        .collect()
}

fn severity_from_level(level: &str) -> Severity {
    if level.starts_with("error") {
        return Severity::Error;
    }
    match level {
        "warning" => Severity::Warning,
        "help" => Severity::Hint,
        _ => Severity::Info,
    }
}
