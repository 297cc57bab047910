use std::{io::Write, time::Duration};

use anyhow::Result;
use chrono::Local;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use crate::{
    session::{report::ReportRequest, timer::MinutesHandle},
    status::{StatusLine, StatusSnapshot},
    utils::clock::Clock,
    workspace::{
        diagnostics::{DiagnosticsSource, count_errors},
        lines::LineCounter,
    },
};

/// Keeps the status line current. Owns every input of the display, the line
/// counter, the diagnostics source and the minutes handle, so nothing else
/// ever writes to the console.
pub struct RefreshModule<W> {
    lines: LineCounter,
    diagnostics: Box<dyn DiagnosticsSource>,
    minutes: MinutesHandle,
    status: StatusLine<W>,
    reports: mpsc::Receiver<ReportRequest>,
    shutdown: CancellationToken,
    refresh_frequency: Duration,
    time_provider: Box<dyn Clock>,
}

impl<W: Write> RefreshModule<W> {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        lines: LineCounter,
        diagnostics: Box<dyn DiagnosticsSource>,
        minutes: MinutesHandle,
        status: StatusLine<W>,
        reports: mpsc::Receiver<ReportRequest>,
        shutdown: CancellationToken,
        refresh_frequency: Duration,
        time_provider: Box<dyn Clock>,
    ) -> Self {
        Self {
            lines,
            diagnostics,
            minutes,
            status,
            reports,
            shutdown,
            refresh_frequency,
            time_provider,
        }
    }

    /// Derives all three display values from scratch. Only the minutes
    /// counter is read rather than recomputed, and it is never written.
    async fn scan(&mut self) -> StatusSnapshot {
        let lines = self.lines.total_lines().await;
        let errors = count_errors(&self.diagnostics.diagnostics().await);
        StatusSnapshot {
            lines,
            minutes: self.minutes.minutes(),
            errors,
        }
    }

    async fn refresh(&mut self) -> Result<()> {
        let snapshot = self.scan().await;
        debug!("Refreshing status {:?}", snapshot);
        self.status.update(&snapshot)?;
        Ok(())
    }

    async fn report(&mut self) -> Result<()> {
        let snapshot = self.scan().await;
        info!("Reporting on demand {:?}", snapshot);
        let at = self.time_provider.time().with_timezone(&Local);
        self.status.notify(&snapshot, at)?;
        Ok(())
    }

    /// Executes the refresh event loop. The display is painted once up
    /// front so it's never empty while the first minute elapses.
    pub async fn run(mut self) -> Result<()> {
        self.refresh().await?;
        let mut refresh_point = self.time_provider.instant() + self.refresh_frequency;
        loop {
            tokio::select! {
                _ = self.shutdown.cancelled() => {
                    self.status.clear()?;
                    return Ok(())
                }
                _ = self.time_provider.sleep_until(refresh_point) => {
                    refresh_point += self.refresh_frequency;
                    self.refresh().await?;
                }
                Some(ReportRequest) = self.reports.recv() => {
                    self.report().await?;
                }
            }
        }
    }
}
