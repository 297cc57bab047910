use anyhow::Result;
use tokio::{
    io::{AsyncBufReadExt, AsyncRead, BufReader},
    sync::mpsc,
};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error};

/// Request for a one-shot report, produced by the console listener.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReportRequest;

/// Watches the session's console for typed commands. `report` (or `r`)
/// requests a one-shot report from the refresh module.
pub struct ReportListener<R> {
    input: R,
    next: mpsc::Sender<ReportRequest>,
    shutdown: CancellationToken,
}

impl<R: AsyncRead + Unpin> ReportListener<R> {
    pub fn new(input: R, next: mpsc::Sender<ReportRequest>, shutdown: CancellationToken) -> Self {
        Self {
            input,
            next,
            shutdown,
        }
    }

    pub async fn run(self) -> Result<()> {
        let mut lines = BufReader::new(self.input).lines();
        loop {
            tokio::select! {
                _ = self.shutdown.cancelled() => return Ok(()),
                line = lines.next_line() => match line {
                    Ok(Some(line)) => match line.trim() {
                        "report" | "r" => {
                            debug!("Report requested from console");
                            self.next
                                .send(ReportRequest)
                                .await
                                .inspect_err(|e| error!("Unexpected error during sending {e:?}"))?;
                        }
                        "" => {}
                        other => debug!("Ignoring unknown console command {other:?}"),
                    },
                    // The console can close its input without the session
                    // being over, reports just stop being available.
                    Ok(None) => return Ok(()),
                    Err(e) => {
                        error!("Failed to read console input {e:?}");
                        return Ok(());
                    }
                }
            }
        }
    }
}
