use std::{io::Write, path::PathBuf, time::Duration};

use anyhow::Result;
use focus::{FocusEvaluator, FocusEvent, FocusModule};
use refresh::RefreshModule;
use report::{ReportListener, ReportRequest};
use timer::{MinutesHandle, SessionModule, SessionTimer};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

use crate::{
    input_api::{GenericInputProbe, InputProbe},
    status::StatusLine,
    utils::clock::{Clock, DefaultClock},
    workspace::{
        diagnostics::{CargoDiagnostics, DiagnosticsSource},
        lines::LineCounter,
    },
};

pub mod focus;
pub mod refresh;
pub mod report;
pub mod shutdown;
pub mod timer;

/// Cadence shared by the minute tick and the display refresh. The two run
/// as independent timers, only the period is common.
pub const MINUTE_PERIOD: Duration = Duration::from_secs(60);

const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(1);
const FOCUS_THRESHOLD_SECONDS: u32 = 60 * 2;

pub struct SessionConfig {
    pub workspace: PathBuf,
}

/// Represents the starting point for a tracking session.
pub async fn start_session(config: SessionConfig) -> Result<()> {
    info!("Tracking workspace {:?}", config.workspace);

    let (focus_sender, focus_receiver) = mpsc::channel::<FocusEvent>(10);
    let (report_sender, report_receiver) = mpsc::channel::<ReportRequest>(10);
    let probe = GenericInputProbe::new()?;

    let shutdown_token = CancellationToken::new();

    let timer = SessionTimer::new(MINUTE_PERIOD);
    let minutes = timer.handle();

    let focus = create_focus_module(focus_sender, probe, &shutdown_token, DefaultClock);
    let session = SessionModule::new(focus_receiver, timer);
    let listener = ReportListener::new(
        tokio::io::stdin(),
        report_sender,
        shutdown_token.clone(),
    );
    let refresh = create_refresh_module(
        &config,
        Box::new(CargoDiagnostics::new(config.workspace.clone())),
        minutes,
        report_receiver,
        StatusLine::new(std::io::stdout()).with_style(),
        &shutdown_token,
        DefaultClock,
    );

    let (_, focus_result, session_result, listener_result, refresh_result) = tokio::join!(
        shutdown::detect_shutdown(shutdown_token),
        focus.run(),
        session.run(),
        listener.run(),
        refresh.run(),
    );

    if let Err(e) = focus_result {
        error!("Focus module got an error {:?}", e);
    }

    if let Err(e) = session_result {
        error!("Session module got an error {:?}", e);
    }

    if let Err(e) = listener_result {
        error!("Report listener got an error {:?}", e);
    }

    if let Err(e) = refresh_result {
        error!("Refresh module got an error {:?}", e);
    }

    Ok(())
}

fn create_focus_module(
    sender: mpsc::Sender<FocusEvent>,
    probe: impl InputProbe + 'static,
    shutdown_token: &CancellationToken,
    clock: impl Clock,
) -> FocusModule {
    FocusModule::new(
        sender,
        Box::new(probe),
        FocusEvaluator::from_seconds(FOCUS_THRESHOLD_SECONDS),
        shutdown_token.clone(),
        DEFAULT_POLL_INTERVAL,
        Box::new(clock),
    )
}

fn create_refresh_module<W: Write>(
    config: &SessionConfig,
    diagnostics: Box<dyn DiagnosticsSource>,
    minutes: MinutesHandle,
    reports: mpsc::Receiver<ReportRequest>,
    status: StatusLine<W>,
    shutdown_token: &CancellationToken,
    clock: impl Clock,
) -> RefreshModule<W> {
    RefreshModule::new(
        LineCounter::new(config.workspace.clone()),
        diagnostics,
        minutes,
        status,
        reports,
        shutdown_token.clone(),
        MINUTE_PERIOD,
        Box::new(clock),
    )
}

#[cfg(test)]
mod session_tests {
    use std::{
        fs, io,
        path::PathBuf,
        sync::{Arc, Mutex},
    };

    use anyhow::Result;
    use tempfile::tempdir;

    use crate::{
        input_api::MockInputProbe,
        status::StatusLine,
        utils::logging::TEST_LOGGING,
        workspace::diagnostics::{Diagnostic, FileDiagnostics, MockDiagnosticsSource, Severity},
    };

    use super::*;

    #[derive(Clone, Default)]
    struct SharedBuf(Arc<Mutex<Vec<u8>>>);

    impl Write for SharedBuf {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            self.0.lock().unwrap().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    /// Smoke test to check that the whole session works together: the user
    /// shows up focused, walks away after three and a half minutes, asks
    /// for one report along the way.
    #[tokio::test(start_paused = true)]
    async fn smoke_test_session() -> Result<()> {
        *TEST_LOGGING;
        let dir = tempdir()?;
        fs::write(dir.path().join("main.rs"), "fn main() {\n}\n")?;

        let mut probe = MockInputProbe::new();
        let mut polls = 0u32;
        probe.expect_get_idle_time().returning(move || {
            polls += 1;
            // Focused for the first 215 polls (one per second), away after.
            if polls <= 215 { Ok(0) } else { Ok(300_000) }
        });

        let mut diagnostics = MockDiagnosticsSource::new();
        diagnostics.expect_diagnostics().returning(|| {
            vec![FileDiagnostics {
                path: PathBuf::from("main.rs"),
                diagnostics: vec![Diagnostic {
                    severity: Severity::Error,
                    message: "broken".into(),
                }],
            }]
        });

        let config = SessionConfig {
            workspace: dir.path().to_path_buf(),
        };

        let (focus_sender, focus_receiver) = mpsc::channel::<FocusEvent>(10);
        let (report_sender, report_receiver) = mpsc::channel::<ReportRequest>(10);
        let shutdown_token = CancellationToken::new();

        let timer = SessionTimer::new(MINUTE_PERIOD);
        let minutes = timer.handle();

        let buf = SharedBuf::default();
        let focus = create_focus_module(focus_sender, probe, &shutdown_token, DefaultClock);
        let session = SessionModule::new(focus_receiver, timer);
        let listener = ReportListener::new(
            b"report\n".as_slice(),
            report_sender,
            shutdown_token.clone(),
        );
        let refresh = create_refresh_module(
            &config,
            Box::new(diagnostics),
            minutes.clone(),
            report_receiver,
            StatusLine::new(buf.clone()),
            &shutdown_token,
            DefaultClock,
        );

        let (_, focus_result, session_result, listener_result, refresh_result) = tokio::join!(
            async {
                tokio::time::sleep(Duration::from_secs(260)).await;
                shutdown_token.cancel()
            },
            focus.run(),
            session.run(),
            listener.run(),
            refresh.run(),
        );

        focus_result?;
        session_result?;
        listener_result?;
        refresh_result?;

        // Focus was lost at 215s, so only three full minutes count.
        assert_eq!(minutes.minutes(), 3);

        let written = String::from_utf8_lossy(&buf.0.lock().unwrap()).into_owned();
        assert!(written.contains("Report"));
        assert!(written.contains("2 lines | 3 min | 1 errors"));
        assert!(written.ends_with("\r\x1b[2K"));

        Ok(())
    }
}
