use std::path::{Path, PathBuf};

use futures::{StreamExt, stream};
use tokio::io;
use tracing::{debug, warn};

/// File extensions that count as tracked source code.
pub const SOURCE_EXTENSIONS: &[&str] = &["rs", "ts", "js", "py", "cpp", "sol", "html", "css"];

/// Directories that never contain tracked source code.
pub const EXCLUDED_DIRS: &[&str] = &["node_modules", ".git", "out", ".vscode", "target"];

const READ_CONCURRENCY: usize = 8;

/// Sums line counts over every tracked source file under a workspace root.
pub struct LineCounter {
    root: PathBuf,
}

impl LineCounter {
    pub fn new(root: PathBuf) -> Self {
        Self { root }
    }

    /// Recounts the workspace from scratch. Files that fail to read are
    /// logged and left out of the sum, so a total is always produced.
    pub async fn total_lines(&self) -> u64 {
        let files = self.collect_source_files().await;
        debug!("Counting lines over {} files in {:?}", files.len(), self.root);
        sum_lines(files).await
    }

    /// Walks the workspace, dropping excluded directories wholesale. A
    /// directory that fails to enumerate only loses its own subtree.
    async fn collect_source_files(&self) -> Vec<PathBuf> {
        let mut files = vec![];
        let mut pending = vec![self.root.clone()];
        while let Some(dir) = pending.pop() {
            let mut entries = match tokio::fs::read_dir(&dir).await {
                Ok(entries) => entries,
                Err(e) => {
                    warn!("Failed to enumerate directory {:?}: {e}", dir);
                    continue;
                }
            };
            loop {
                match entries.next_entry().await {
                    Ok(Some(entry)) => {
                        let path = entry.path();
                        match entry.file_type().await {
                            Ok(t) if t.is_dir() => {
                                if !is_excluded_dir(&path) {
                                    pending.push(path);
                                }
                            }
                            Ok(t) if t.is_file() && is_source_file(&path) => {
                                files.push(path);
                            }
                            Ok(_) => {}
                            Err(e) => warn!("Failed to inspect entry {:?}: {e}", path),
                        }
                    }
                    Ok(None) => break,
                    Err(e) => {
                        warn!("Failed to enumerate directory {:?}: {e}", dir);
                        break;
                    }
                }
            }
        }
        files
    }
}

/// Only a sum comes out of this, so files are read concurrently without any
/// ordering guarantee.
async fn sum_lines(files: Vec<PathBuf>) -> u64 {
    stream::iter(files)
        .map(|path| async move {
            match count_file_lines(&path).await {
                Ok(lines) => lines,
                Err(e) => {
                    warn!("Failed to read file {:?}: {e}", path);
                    0
                }
            }
        })
        .buffer_unordered(READ_CONCURRENCY)
        .fold(0u64, |total, lines| async move { total + lines })
        .await
}

fn is_excluded_dir(path: &Path) -> bool {
    path.file_name()
        .and_then(|v| v.to_str())
        .is_some_and(|name| EXCLUDED_DIRS.contains(&name))
}

fn is_source_file(path: &Path) -> bool {
    path.extension()
        .and_then(|v| v.to_str())
        .is_some_and(|ext| SOURCE_EXTENSIONS.contains(&ext))
}

/// A file's line count is its newline-segment count. An empty file has no
/// lines and a trailing newline doesn't add one. Counting raw bytes keeps
/// source files with broken encodings countable.
async fn count_file_lines(path: &Path) -> Result<u64, io::Error> {
    let content = tokio::fs::read(path).await?;
    let newlines = content.iter().filter(|b| **b == b'\n').count() as u64;
    match content.last() {
        None => Ok(0),
        Some(b'\n') => Ok(newlines),
        Some(_) => Ok(newlines + 1),
    }
}
