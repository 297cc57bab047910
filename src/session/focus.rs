use std::time::Duration;

use anyhow::Result;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error};

use crate::{input_api::InputProbe, utils::clock::Clock};

/// Transition of the user between present and away states.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FocusEvent {
    Gained,
    Lost,
}

/// Decides whether the user counts as focused for a measured idle time.
pub struct FocusEvaluator {
    threshold_ms: u32,
}

impl FocusEvaluator {
    pub fn from_seconds(threshold_s: u32) -> Self {
        Self {
            threshold_ms: threshold_s * 1000,
        }
    }

    pub fn is_focused(&self, idle_time: u32) -> bool {
        idle_time <= self.threshold_ms
    }
}

/// Watches the input probe for focus transitions. Only transitions travel
/// downstream, repeated polls in the same state stay silent.
pub struct FocusModule {
    next: mpsc::Sender<FocusEvent>,
    probe: Box<dyn InputProbe>,
    evaluator: FocusEvaluator,
    shutdown: CancellationToken,
    poll_frequency: Duration,
    time_provider: Box<dyn Clock>,
}

impl FocusModule {
    pub fn new(
        next: mpsc::Sender<FocusEvent>,
        probe: Box<dyn InputProbe>,
        evaluator: FocusEvaluator,
        shutdown: CancellationToken,
        poll_frequency: Duration,
        time_provider: Box<dyn Clock>,
    ) -> Self {
        Self {
            next,
            probe,
            evaluator,
            shutdown,
            poll_frequency,
            time_provider,
        }
    }

    fn poll_focus(&mut self) -> Result<bool> {
        let idle_ms = self.probe.get_idle_time()?;
        Ok(self.evaluator.is_focused(idle_ms))
    }

    /// Executes the polling event loop. A failed poll produces no event, so
    /// the session simply freezes in its current state until the next
    /// successful one.
    pub async fn run(mut self) -> Result<()> {
        let mut focused = false;
        let mut poll_point = self.time_provider.instant();
        loop {
            poll_point += self.poll_frequency;

            match self.poll_focus() {
                Ok(now_focused) if now_focused != focused => {
                    focused = now_focused;
                    let event = if focused {
                        FocusEvent::Gained
                    } else {
                        FocusEvent::Lost
                    };
                    debug!("Sending focus transition {:?}", event);
                    self.next
                        .send(event)
                        .await
                        .inspect_err(|e| error!("Unexpected error during sending {e:?}"))?;
                }
                Ok(_) => {}
                Err(e) => {
                    error!("Encountered an error during focus polling {:?}", e)
                }
            }

            tokio::select! {
                // Cancelation means we stop execution of the event loop. Which
                // means we also drop the sender channel and consequently stop
                // the session module.
                _ = self.shutdown.cancelled() => {
                    return Ok(())
                }
                _ = self.time_provider.sleep_until(poll_point) => ()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::collections::VecDeque;

    use anyhow::anyhow;

    use crate::{input_api::MockInputProbe, utils::clock::DefaultClock};

    use super::*;

    const AWAY_MS: u32 = 300_000;

    fn scripted_probe(mut idle_times: VecDeque<Result<u32>>) -> MockInputProbe {
        let mut probe = MockInputProbe::new();
        probe
            .expect_get_idle_time()
            .returning(move || idle_times.pop_front().unwrap_or(Ok(0)));
        probe
    }

    async fn run_module(
        probe: MockInputProbe,
        polls: u64,
    ) -> (Vec<FocusEvent>, Result<()>) {
        let (sender, mut receiver) = mpsc::channel(10);
        let shutdown = CancellationToken::new();
        let module = FocusModule::new(
            sender,
            Box::new(probe),
            FocusEvaluator::from_seconds(120),
            shutdown.clone(),
            Duration::from_secs(1),
            Box::new(DefaultClock),
        );

        // The first poll happens immediately, so exactly `polls` polls fit
        // before the cancelation point.
        let (_, run_result) = tokio::join!(
            async {
                tokio::time::sleep(Duration::from_millis(polls * 1000 - 500)).await;
                shutdown.cancel()
            },
            module.run(),
        );

        let mut events = vec![];
        while let Ok(event) = receiver.try_recv() {
            events.push(event);
        }
        (events, run_result)
    }

    #[tokio::test(start_paused = true)]
    async fn emits_events_on_transitions_only() {
        let probe = scripted_probe(
            [Ok(0), Ok(5), Ok(AWAY_MS), Ok(AWAY_MS), Ok(10)]
                .into_iter()
                .collect(),
        );

        let (events, run_result) = run_module(probe, 5).await;

        run_result.unwrap();
        assert_eq!(
            events,
            vec![FocusEvent::Gained, FocusEvent::Lost, FocusEvent::Gained]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn probe_failure_produces_no_event() {
        let probe = scripted_probe(
            [Ok(0), Err(anyhow!("probe broke")), Ok(0)]
                .into_iter()
                .collect(),
        );

        let (events, run_result) = run_module(probe, 3).await;

        run_result.unwrap();
        assert_eq!(events, vec![FocusEvent::Gained]);
    }

    #[tokio::test(start_paused = true)]
    async fn stays_silent_while_away() {
        let probe = scripted_probe([Ok(AWAY_MS), Ok(AWAY_MS), Ok(AWAY_MS)].into_iter().collect());

        let (events, run_result) = run_module(probe, 3).await;

        run_result.unwrap();
        assert_eq!(events, vec![]);
    }

    #[test]
    fn evaluator_uses_an_inclusive_threshold() {
        let evaluator = FocusEvaluator::from_seconds(120);
        assert!(evaluator.is_focused(0));
        assert!(evaluator.is_focused(120_000));
        assert!(!evaluator.is_focused(120_001));
    }
}
