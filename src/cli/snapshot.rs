use std::path::PathBuf;

use anyhow::Result;

use crate::workspace::{
    diagnostics::{CargoDiagnostics, DiagnosticsSource, count_errors},
    lines::LineCounter,
};

/// Command to process `snapshot` command. Scans the workspace once and
/// prints the totals. Without a session there are no minutes to show.
pub async fn process_snapshot_command(workspace: PathBuf) -> Result<()> {
    let lines = LineCounter::new(workspace.clone()).total_lines().await;
    let mut diagnostics = CargoDiagnostics::new(workspace);
    let errors = count_errors(&diagnostics.diagnostics().await);
    println!("{lines} lines | {errors} errors");
    Ok(())
}
