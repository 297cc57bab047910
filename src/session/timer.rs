use std::{
    sync::{
        Arc,
        atomic::{AtomicU64, Ordering},
    },
    time::Duration,
};

use anyhow::Result;
use tokio::{sync::mpsc, task::JoinHandle, time::Instant};
use tracing::debug;

use super::focus::FocusEvent;

/// Read side of the coding-minutes counter. Handles stay valid after the
/// timer itself is gone.
#[derive(Clone, Debug)]
pub struct MinutesHandle(Arc<AtomicU64>);

impl MinutesHandle {
    pub fn minutes(&self) -> u64 {
        self.0.load(Ordering::Relaxed)
    }
}

/// Counts full minutes of focused work. The tick only runs between
/// [start](Self::start) and [stop](Self::stop), so the counter freezes
/// whenever focus is lost. A partially elapsed minute is discarded on stop.
pub struct SessionTimer {
    minutes: Arc<AtomicU64>,
    period: Duration,
    tick: Option<JoinHandle<()>>,
}

impl SessionTimer {
    pub fn new(period: Duration) -> Self {
        Self {
            minutes: Arc::new(AtomicU64::new(0)),
            period,
            tick: None,
        }
    }

    pub fn handle(&self) -> MinutesHandle {
        MinutesHandle(self.minutes.clone())
    }

    pub fn is_running(&self) -> bool {
        self.tick.is_some()
    }

    /// Starts the minute tick. Starting a running timer changes nothing,
    /// the already scheduled tick keeps its cadence.
    pub fn start(&mut self) {
        if self.tick.is_some() {
            return;
        }
        let minutes = self.minutes.clone();
        let period = self.period;
        self.tick = Some(tokio::spawn(async move {
            let mut tick_point = Instant::now() + period;
            loop {
                tokio::time::sleep_until(tick_point).await;
                tick_point += period;
                minutes.fetch_add(1, Ordering::Relaxed);
            }
        }));
    }

    /// Stops the tick. Stopping a stopped timer changes nothing.
    pub fn stop(&mut self) {
        if let Some(tick) = self.tick.take() {
            tick.abort();
        }
    }
}

impl Drop for SessionTimer {
    fn drop(&mut self) {
        self.stop();
    }
}

/// Drives the [SessionTimer] lifecycle from focus transitions.
pub struct SessionModule {
    receiver: mpsc::Receiver<FocusEvent>,
    timer: SessionTimer,
}

impl SessionModule {
    pub fn new(receiver: mpsc::Receiver<FocusEvent>, timer: SessionTimer) -> Self {
        Self { receiver, timer }
    }

    pub async fn run(mut self) -> Result<()> {
        while let Some(event) = self.receiver.recv().await {
            debug!("Processing focus event {:?}", event);
            match event {
                FocusEvent::Gained => self.timer.start(),
                FocusEvent::Lost => self.timer.stop(),
            }
        }

        // Sender gone means the watcher shut down, the session is over.
        self.timer.stop();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const MINUTE: Duration = Duration::from_secs(60);

    fn just_past(minutes: u64) -> Duration {
        MINUTE * minutes as u32 + Duration::from_secs(1)
    }

    #[tokio::test(start_paused = true)]
    async fn counts_full_minutes_while_running() {
        let mut timer = SessionTimer::new(MINUTE);
        let handle = timer.handle();

        timer.start();
        tokio::time::sleep(just_past(3)).await;

        assert_eq!(handle.minutes(), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn partial_minutes_are_not_counted() {
        let mut timer = SessionTimer::new(MINUTE);
        let handle = timer.handle();

        timer.start();
        tokio::time::sleep(Duration::from_secs(59)).await;

        assert_eq!(handle.minutes(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn start_is_idempotent() {
        let mut timer = SessionTimer::new(MINUTE);
        let handle = timer.handle();

        timer.start();
        tokio::time::sleep(Duration::from_secs(30)).await;
        timer.start();
        tokio::time::sleep(just_past(2) - Duration::from_secs(30)).await;

        // A second start must not double the increment rate.
        assert_eq!(handle.minutes(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn does_not_tick_while_stopped() {
        let mut timer = SessionTimer::new(MINUTE);
        let handle = timer.handle();

        timer.start();
        tokio::time::sleep(just_past(1)).await;
        timer.stop();
        tokio::time::sleep(MINUTE * 10).await;

        assert_eq!(handle.minutes(), 1);

        timer.start();
        tokio::time::sleep(just_past(1)).await;
        assert_eq!(handle.minutes(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn stop_is_idempotent() {
        let mut timer = SessionTimer::new(MINUTE);
        let handle = timer.handle();

        timer.stop();
        timer.start();
        tokio::time::sleep(just_past(1)).await;
        timer.stop();
        timer.stop();

        assert_eq!(handle.minutes(), 1);
        assert!(!timer.is_running());
    }

    #[tokio::test(start_paused = true)]
    async fn module_translates_focus_events() -> Result<()> {
        let (sender, receiver) = mpsc::channel(10);
        let timer = SessionTimer::new(MINUTE);
        let handle = timer.handle();
        let module = SessionModule::new(receiver, timer);
        let run = tokio::spawn(module.run());

        sender.send(FocusEvent::Gained).await?;
        tokio::time::sleep(just_past(2)).await;
        sender.send(FocusEvent::Lost).await?;
        tokio::time::sleep(MINUTE * 5).await;

        assert_eq!(handle.minutes(), 2);

        drop(sender);
        run.await??;
        assert_eq!(handle.minutes(), 2);
        Ok(())
    }
}
