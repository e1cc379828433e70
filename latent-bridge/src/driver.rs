//! The async event loop.
//!
//! A timer task and a stdin task feed one channel; a single consumer takes
//! inputs off it in arrival order and hands each to the scheduler on the
//! blocking pool. A tick that fired while the previous input was still being
//! handled is dropped.

use crate::commands::{Command, CommandParser, HELP};
use anyhow::{Context, Result, anyhow};
use latent_core::scheduler::{Event, Outcome, SchedulerStats};
use latent_core::{InferenceEngine, RenderSink, SharedScheduler};
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};

#[derive(Debug)]
pub enum Input {
    /// The timer fired at this instant.
    Tick(Instant),
    Line(String),
    /// No more lines will arrive.
    Closed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopReason {
    Quit,
    TickLimit,
    InputClosed,
}

#[derive(Debug)]
pub struct DriverReport {
    pub stats: SchedulerStats,
    pub stop: StopReason,
}

/// Forward stdin lines until EOF.
pub fn spawn_stdin(tx: mpsc::Sender<Input>) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut lines = BufReader::new(tokio::io::stdin()).lines();
        loop {
            match lines.next_line().await {
                Ok(Some(line)) => {
                    if tx.send(Input::Line(line)).await.is_err() {
                        break;
                    }
                }
                Ok(None) => {
                    let _ = tx.send(Input::Closed).await;
                    break;
                }
                Err(e) => {
                    tracing::error!("Failed to read stdin: {}", e);
                    let _ = tx.send(Input::Closed).await;
                    break;
                }
            }
        }
    })
}

/// Send a tick every `period` until the receiver goes away.
pub fn spawn_timer(tx: mpsc::Sender<Input>, period: Duration) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(period);
        interval.set_missed_tick_behavior(MissedTickBehavior::Skip);
        loop {
            let fired = interval.tick().await;
            if tx.send(Input::Tick(fired)).await.is_err() {
                break;
            }
        }
    })
}

pub struct Driver<E: InferenceEngine, S> {
    scheduler: SharedScheduler<E, S>,
    period: Duration,
    max_ticks: Option<u64>,
}

impl<E, S> Driver<E, S>
where
    E: InferenceEngine + Send + 'static,
    E::Arena: Send,
    S: RenderSink + Send + 'static,
{
    pub fn new(scheduler: SharedScheduler<E, S>, period: Duration, max_ticks: Option<u64>) -> Self {
        Self {
            scheduler,
            period,
            max_ticks,
        }
    }

    /// Consume inputs until `quit`, the tick limit, or the end of input.
    ///
    /// A failing tick stops the loop with its error; a failing command is
    /// logged and the loop carries on. The timer task ending is an error too.
    pub async fn run(
        self,
        tx: mpsc::Sender<Input>,
        mut rx: mpsc::Receiver<Input>,
    ) -> Result<DriverReport> {
        let mut idle_since = Instant::now();
        let mut timer = spawn_timer(tx, self.period);
        let mut fired = 0u64;
        let mut stale = 0u64;

        let stop = loop {
            let input = tokio::select! {
                input = rx.recv() => input,
                joined = &mut timer => {
                    return Err(match joined {
                        Err(e) => anyhow::Error::new(e).context("Timer task failed"),
                        Ok(()) => anyhow!("Timer task stopped"),
                    });
                }
            };
            let Some(input) = input else {
                break StopReason::InputClosed;
            };

            match input {
                Input::Tick(at) => {
                    fired += 1;
                    if at < idle_since {
                        stale += 1;
                        tracing::warn!("Tick dropped: previous input still in flight");
                    } else if let Err(e) = self.dispatch(Event::Tick).await {
                        timer.abort();
                        return Err(e.context("Tick failed"));
                    }
                    if self.max_ticks.is_some_and(|max| fired >= max) {
                        break StopReason::TickLimit;
                    }
                }
                Input::Line(line) => match CommandParser::parse(&line) {
                    Command::Event(event) => {
                        if let Err(e) = self.dispatch(event).await {
                            tracing::error!("{:#}", e);
                        }
                    }
                    Command::Status => self.print_status(stale)?,
                    Command::Help => println!("{}", HELP),
                    Command::Quit => break StopReason::Quit,
                    Command::Unknown(text) if text.is_empty() => {}
                    Command::Unknown(text) => {
                        tracing::warn!("Unknown command '{}' (try 'help')", text)
                    }
                },
                Input::Closed => {
                    if self.max_ticks.is_none() {
                        break StopReason::InputClosed;
                    }
                }
            }
            idle_since = Instant::now();
        };

        timer.abort();
        let mut stats = self.scheduler.stats()?;
        stats.dropped_ticks += stale;
        tracing::info!("Driver stopped ({:?}): {:?}", stop, stats);
        Ok(DriverReport { stats, stop })
    }

    async fn dispatch(&self, event: Event) -> Result<Outcome> {
        let scheduler = self.scheduler.clone();
        tokio::task::spawn_blocking(move || scheduler.dispatch(event))
            .await
            .context("Scheduler task panicked")?
    }

    fn print_status(&self, stale: u64) -> Result<()> {
        let (state, stats, mix) = self.scheduler.with(|s| {
            (s.state(), s.stats(), s.context().store.mix())
        })?;
        println!(
            "{:?} | mix {:.2} | ticks {} | train steps {} | passes {} | dropped {}",
            state,
            mix,
            stats.ticks,
            stats.train_steps,
            stats.passes,
            stats.dropped_ticks + stale
        );
        Ok(())
    }
}
