use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::{JoinError, JoinHandle, JoinSet};
use tokio::time::{Interval, MissedTickBehavior, interval};
use tracing::{debug, error, info, warn};

use super::engine::{CheckEngine, TickReport};

const MIN_PERIOD: Duration = Duration::from_millis(1);

/// What makes the scheduler start a tick
pub enum TickTrigger {
    /// Fire immediately, then once every period (at least 1ms)
    Interval(Duration),
    /// Fire once per message; the loop ends when every sender is dropped
    Manual(mpsc::Receiver<()>),
}

enum Ticks {
    Interval(Interval),
    Manual(mpsc::Receiver<()>),
}

impl Ticks {
    fn new(trigger: TickTrigger) -> Self {
        match trigger {
            TickTrigger::Interval(period) => {
                let mut timer = interval(period.max(MIN_PERIOD));
                timer.set_missed_tick_behavior(MissedTickBehavior::Skip);
                Ticks::Interval(timer)
            }
            TickTrigger::Manual(rx) => Ticks::Manual(rx),
        }
    }

    /// Wait for the next tick; `false` once the trigger is exhausted
    async fn next(&mut self) -> bool {
        match self {
            Ticks::Interval(timer) => {
                timer.tick().await;
                true
            }
            Ticks::Manual(rx) => rx.recv().await.is_some(),
        }
    }
}

/// Monitoring scheduler - starts ticks on a trigger without waiting for the
/// previous one to finish
///
/// Overlap is safe because the engine never lets two ticks work on the same
/// check at once.
pub struct MonitoringScheduler {
    engine: Arc<CheckEngine>,
    report_tx: Option<mpsc::Sender<TickReport>>,
    shutdown_tx: Option<mpsc::Sender<()>>,
}

impl MonitoringScheduler {
    pub fn new(engine: Arc<CheckEngine>) -> Self {
        Self { engine, report_tx: None, shutdown_tx: None }
    }

    /// Publish every finished tick's report on `tx`
    pub fn with_reports(mut self, tx: mpsc::Sender<TickReport>) -> Self {
        self.report_tx = Some(tx);
        self
    }

    /// Start the tick loop in the background
    ///
    /// The returned handle completes after `stop` (or an exhausted manual
    /// trigger) once every tick already started has finished.
    pub fn start(&mut self, trigger: TickTrigger) -> JoinHandle<()> {
        let (shutdown_tx, mut shutdown_rx) = mpsc::channel::<()>(1);
        if self.shutdown_tx.replace(shutdown_tx).is_some() {
            warn!("Scheduler restarted, the earlier loop stops after its running ticks");
        }

        let engine = Arc::clone(&self.engine);
        let report_tx = self.report_tx.clone();

        tokio::spawn(async move {
            let mut ticks = Ticks::new(trigger);
            let mut running: JoinSet<TickReport> = JoinSet::new();
            info!("Check scheduler started");

            loop {
                tokio::select! {
                    _ = shutdown_rx.recv() => {
                        info!("Check scheduler stopping");
                        break;
                    }
                    fired = ticks.next() => {
                        if !fired {
                            debug!("Tick trigger closed");
                            break;
                        }
                        let engine = Arc::clone(&engine);
                        running.spawn(async move { engine.run_tick().await });
                    }
                    Some(finished) = running.join_next(), if !running.is_empty() => {
                        publish(&report_tx, finished);
                    }
                }
            }

            while let Some(finished) = running.join_next().await {
                publish(&report_tx, finished);
            }
            info!("Check scheduler stopped");
        })
    }

    /// Ask the loop to stop starting ticks
    pub async fn stop(&mut self) {
        if let Some(tx) = self.shutdown_tx.take() {
            // The loop may already be gone if its trigger closed.
            let _ = tx.send(()).await;
        }
    }
}

fn publish(report_tx: &Option<mpsc::Sender<TickReport>>, finished: Result<TickReport, JoinError>) {
    match finished {
        Ok(report) => {
            if let Some(tx) = report_tx {
                if tx.try_send(report).is_err() {
                    debug!("Tick report dropped, no room in channel");
                }
            }
        }
        Err(e) => error!("Tick task crashed: {}", e),
    }
}
