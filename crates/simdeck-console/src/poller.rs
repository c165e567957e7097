//! The recurring telemetry tick.
//!
//! [`PollHandle`] owns at most one poll task. Each cycle sleeps for the
//! interval, then fetches status and metrics together and applies them to the
//! shared history under one write lock. The next sleep only starts after both
//! calls settled, so ticks never overlap.

use std::sync::Arc;
use std::time::Duration;

use simdeck_client::ControlApi;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use crate::history::{unix_millis, SharedHistory, TickOutcome};

struct PollTask {
    stop: watch::Sender<bool>,
    join: JoinHandle<()>,
}

/// Arm/disarm handle for the poll task.
///
/// Dropping the handle disarms it.
pub struct PollHandle {
    interval: Duration,
    task: Option<PollTask>,
    retired: Option<JoinHandle<()>>,
}

impl PollHandle {
    pub fn new(interval: Duration) -> Self {
        Self {
            interval,
            task: None,
            retired: None,
        }
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    pub fn is_armed(&self) -> bool {
        self.task.is_some()
    }

    /// Start ticking. Does nothing if already armed.
    ///
    /// A task disarmed earlier may still be finishing its last fetch; the new
    /// task waits for it before its first sleep.
    pub fn arm(&mut self, api: Arc<dyn ControlApi>, history: SharedHistory) {
        if self.task.is_some() {
            return;
        }

        let (stop, stopped) = watch::channel(false);
        let previous = self.retired.take();
        let interval = self.interval;
        let join = tokio::spawn(async move {
            if let Some(previous) = previous {
                let _ = previous.await;
            }
            poll_loop(api, history, interval, stopped).await;
        });

        debug!(interval_ms = interval.as_millis() as u64, "poll timer armed");
        self.task = Some(PollTask { stop, join });
    }

    /// Stop ticking. A fetch already in flight is left to settle.
    pub fn disarm(&mut self) {
        if let Some(task) = self.task.take() {
            task.stop.send_replace(true);
            self.retired = Some(task.join);
            debug!("poll timer disarmed");
        }
    }
}

impl Drop for PollHandle {
    fn drop(&mut self) {
        self.disarm();
    }
}

async fn poll_loop(
    api: Arc<dyn ControlApi>,
    history: SharedHistory,
    interval: Duration,
    mut stopped: watch::Receiver<bool>,
) {
    loop {
        tokio::select! {
            _ = tokio::time::sleep(interval) => {}
            _ = stopped.changed() => break,
        }
        if *stopped.borrow() {
            break;
        }

        let ticket = history.write().await.begin_tick();
        let (status, metrics) = tokio::join!(api.get_status(), api.get_metrics());

        match (status, metrics) {
            (Ok(status), Ok(metrics)) => {
                let outcome =
                    history
                        .write()
                        .await
                        .apply_tick(ticket, unix_millis(), &status, &metrics);
                if let TickOutcome::Applied { timestamp } = outcome {
                    debug!(timestamp, nodes = status.nodes.len(), "tick applied");
                }
            }
            (Err(e), _) | (_, Err(e)) => {
                warn!(error = %e, "tick discarded");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::history::HistoryAccumulator;
    use crate::testing::{status_of, Op, ScriptedEngine};
    use simdeck_client::MetricsReport;

    const INTERVAL: Duration = Duration::from_millis(2000);

    fn setup() -> (Arc<ScriptedEngine>, SharedHistory, PollHandle) {
        (
            Arc::new(ScriptedEngine::new()),
            HistoryAccumulator::shared(),
            PollHandle::new(INTERVAL),
        )
    }

    async fn advance(ms: u64) {
        tokio::time::sleep(Duration::from_millis(ms)).await;
    }

    #[tokio::test(start_paused = true)]
    async fn ticks_once_per_interval() {
        let (engine, history, mut poller) = setup();
        poller.arm(engine.clone(), history.clone());

        advance(100).await;
        assert!(history.read().await.is_empty());

        advance(3 * 2000).await;
        assert_eq!(history.read().await.len(), 3);
        assert_eq!(engine.count(Op::Status), 3);
        assert_eq!(engine.count(Op::Metrics), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn arm_is_idempotent() {
        let (engine, history, mut poller) = setup();
        poller.arm(engine.clone(), history.clone());
        poller.arm(engine.clone(), history.clone());

        advance(2100).await;
        assert_eq!(history.read().await.len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn disarm_stops_ticks() {
        let (engine, history, mut poller) = setup();
        poller.arm(engine.clone(), history.clone());
        advance(2100).await;
        poller.disarm();
        assert!(!poller.is_armed());

        advance(10_000).await;
        assert_eq!(history.read().await.len(), 1);
        assert_eq!(engine.count(Op::Status), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn slow_engine_never_overlaps() {
        let (engine, history, mut poller) = setup();
        engine.set_read_delay(Duration::from_millis(5000));
        poller.arm(engine.clone(), history.clone());

        advance(30_000).await;
        assert_eq!(engine.max_in_flight(), 1);
        // Each cycle is 2s sleep + 5s fetch
        assert_eq!(history.read().await.len(), 4);
    }

    #[tokio::test(start_paused = true)]
    async fn partial_failure_discards_tick() {
        let (engine, history, mut poller) = setup();
        engine.fail(Op::Metrics);
        poller.arm(engine.clone(), history.clone());

        advance(4100).await;
        assert!(history.read().await.is_empty());
        assert_eq!(engine.count(Op::Status), 2);

        engine.heal(Op::Metrics);
        advance(2100).await;
        assert_eq!(history.read().await.len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn late_response_after_disarm_is_applied() {
        let (engine, history, mut poller) = setup();
        engine.set_read_delay(Duration::from_millis(1000));
        poller.arm(engine.clone(), history.clone());

        // Tick begins at 2000 and settles at 3000
        advance(2500).await;
        poller.disarm();
        advance(1000).await;
        assert_eq!(history.read().await.len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn late_response_after_reset_is_dropped() {
        let (engine, history, mut poller) = setup();
        engine.set_read_delay(Duration::from_millis(1000));
        engine.push_metrics(MetricsReport {
            latency: 0.5,
            throughput: 1.0,
            packet_loss: 0.0,
        });
        poller.arm(engine.clone(), history.clone());

        advance(2500).await;
        poller.disarm();
        history.write().await.reset_history();
        advance(1000).await;
        assert!(history.read().await.is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn rearm_waits_for_retired_task() {
        let (engine, history, mut poller) = setup();
        engine.set_read_delay(Duration::from_millis(1500));
        poller.arm(engine.clone(), history.clone());

        advance(2500).await;
        poller.disarm();
        poller.arm(engine.clone(), history.clone());

        advance(10_000).await;
        assert_eq!(engine.max_in_flight(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn drop_disarms() {
        let (engine, history, mut poller) = setup();
        engine.push_status(status_of(&["A"], 1));
        poller.arm(engine.clone(), history.clone());
        drop(poller);

        advance(10_000).await;
        assert!(history.read().await.is_empty());
        assert_eq!(engine.count(Op::Status), 0);
    }
}
