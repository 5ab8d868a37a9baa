//! Periodic triggers for collection and alarm cycles.
//!
//! A thin actor: two interval timers and a command channel. Each tick spawns
//! its cycle as a separate task so a long collection pass never delays alarm
//! evaluation. Overlap is safe by construction: the collector suppresses
//! duplicate per-device probes and the alarm engine skips a trigger while a
//! cycle is still running.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc;
use tokio::time::interval;
use tracing::{debug, error, warn};

use crate::alarm::AlarmEngine;
use crate::collector::Collector;
use crate::config::ScheduleConfig;

#[derive(Debug)]
pub enum SchedulerCommand {
    /// Gracefully stop issuing triggers. In-flight cycles finish on their own.
    Shutdown,
}

pub struct Scheduler {
    collector: Arc<Collector>,
    engine: Arc<AlarmEngine>,
    config: ScheduleConfig,
    command_rx: mpsc::Receiver<SchedulerCommand>,
}

impl Scheduler {
    pub fn new(
        collector: Arc<Collector>,
        engine: Arc<AlarmEngine>,
        config: ScheduleConfig,
        command_rx: mpsc::Receiver<SchedulerCommand>,
    ) -> Self {
        Self {
            collector,
            engine,
            config,
            command_rx,
        }
    }

    pub async fn run(mut self) {
        debug!(
            "starting scheduler (collection every {}s, alarms every {}s)",
            self.config.collection_interval, self.config.alarm_interval
        );

        let mut collect_ticker = interval(Duration::from_secs(self.config.collection_interval));
        let mut alarm_ticker = interval(Duration::from_secs(self.config.alarm_interval));

        loop {
            tokio::select! {
                _ = collect_ticker.tick() => {
                    let collector = self.collector.clone();
                    tokio::spawn(async move {
                        if let Err(e) = collector.collect_all().await {
                            error!("collection cycle failed: {e}");
                        }
                    });
                }

                _ = alarm_ticker.tick() => {
                    let engine = self.engine.clone();
                    tokio::spawn(async move {
                        if let Err(e) = engine.check_all().await {
                            error!("alarm cycle failed: {e}");
                        }
                    });
                }

                Some(cmd) = self.command_rx.recv() => {
                    match cmd {
                        SchedulerCommand::Shutdown => {
                            debug!("received shutdown command");
                            break;
                        }
                    }
                }

                else => {
                    warn!("command channel closed, shutting down");
                    break;
                }
            }
        }

        debug!("scheduler stopped");
    }
}

/// Handle for controlling a running scheduler.
#[derive(Clone)]
pub struct SchedulerHandle {
    sender: mpsc::Sender<SchedulerCommand>,
}

impl SchedulerHandle {
    pub fn spawn(
        collector: Arc<Collector>,
        engine: Arc<AlarmEngine>,
        config: ScheduleConfig,
    ) -> Self {
        let (cmd_tx, cmd_rx) = mpsc::channel(8);
        let scheduler = Scheduler::new(collector, engine, config, cmd_rx);

        tokio::spawn(scheduler.run());

        Self { sender: cmd_tx }
    }

    pub async fn shutdown(&self) {
        let _ = self.sender.send(SchedulerCommand::Shutdown).await;
    }
}
