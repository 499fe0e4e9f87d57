//! Fixed-interval consumer of the message channel.
//!
//! Each tick handles at most `pump_batch_size` messages and then yields until
//! the next tick, whether or not anything was queued. A failing handler is
//! logged and never stops the rest of the tick.

use std::any::Any;
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Notify;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, error, info, warn};

use crate::core::CompressionSettings;
use crate::messaging::{LogLevel, Message, MessageReceiver};
use crate::worker::WorkerError;

/// Applies messages to whatever is on the other side (UI, log, test probe).
pub trait MessageHandler: Send + 'static {
    fn handle(&mut self, message: Message) -> anyhow::Result<()>;
}

impl<F> MessageHandler for F
where
    F: FnMut(Message) -> anyhow::Result<()> + Send + 'static,
{
    fn handle(&mut self, message: Message) -> anyhow::Result<()> {
        self(message)
    }
}

/// Headless handler that forwards every message to `tracing`.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingHandler;

impl MessageHandler for TracingHandler {
    fn handle(&mut self, message: Message) -> anyhow::Result<()> {
        match message {
            Message::Log { level, text } => match level {
                LogLevel::Debug => debug!("{}", text),
                LogLevel::Info => info!("{}", text),
                LogLevel::Warning => warn!("{}", text),
                LogLevel::Error => error!("{}", text),
            },
            Message::Progress(update) => info!(
                "[{}/{}] {}% {}",
                update.completed_tasks, update.total_tasks, update.progress_percentage, update.status
            ),
            Message::ComponentEnable(id) => debug!("enable {}", id),
            Message::ComponentDisable(id) => debug!("disable {}", id),
            Message::LabelUpdate { component, text } => debug!("{} = {}", component, text),
            Message::ShowError { title, text } => error!("{}: {}", title, text),
            Message::ShowInfo { title, text } => info!("{}: {}", title, text),
            Message::Custom { data, .. } => debug!("custom message {}", data),
        }
        Ok(())
    }
}

pub struct Pump<H: MessageHandler> {
    receiver: MessageReceiver,
    handler: H,
    batch_size: usize,
    interval: Duration,
    delivered: u64,
    failed: u64,
}

impl<H: MessageHandler> Pump<H> {
    pub fn new(receiver: MessageReceiver, handler: H, settings: &CompressionSettings) -> Self {
        Self {
            receiver,
            handler,
            batch_size: settings.pump_batch_size.max(1),
            interval: settings.pump_interval(),
            delivered: 0,
            failed: 0,
        }
    }

    /// Handles up to one batch of queued messages. Returns how many were taken.
    pub fn tick(&mut self) -> usize {
        let batch = self.receiver.drain(self.batch_size);
        let taken = batch.len();
        for message in batch {
            self.dispatch(message);
        }
        taken
    }

    fn dispatch(&mut self, message: Message) {
        let kind = message.kind();
        let handler = &mut self.handler;
        let result = catch_unwind(AssertUnwindSafe(|| match message {
            Message::Custom { data, callback: Some(callback) } => callback(data),
            other => handler.handle(other),
        }));

        match result {
            Ok(Ok(())) => self.delivered += 1,
            Ok(Err(err)) => {
                self.failed += 1;
                error!("Message handler failed for {:?}: {:#}", kind, err);
            }
            Err(panic) => {
                self.failed += 1;
                error!("Message handler panicked for {:?}: {}", kind, panic_message(panic.as_ref()));
            }
        }
    }

    pub fn delivered(&self) -> u64 {
        self.delivered
    }

    pub fn failed(&self) -> u64 {
        self.failed
    }

    pub fn handler(&self) -> &H {
        &self.handler
    }

    pub fn into_handler(self) -> H {
        self.handler
    }

    /// Runs the pump on the current tokio runtime until [`PumpHandle::shutdown`].
    pub fn spawn(mut self) -> PumpHandle<H> {
        let shutdown = Arc::new(Notify::new());
        let signal = shutdown.clone();
        let task = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(self.interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            debug!("Message pump started ({:?} interval, {} per tick)", self.interval, self.batch_size);

            loop {
                tokio::select! {
                    _ = ticker.tick() => {
                        self.tick();
                    }
                    _ = signal.notified() => break,
                }
            }

            // Deliver what was queued before shutdown, but not what arrives after.
            let mut remaining = self.receiver.len();
            while remaining > 0 {
                let taken = self.tick();
                if taken == 0 {
                    break;
                }
                remaining = remaining.saturating_sub(taken);
            }
            debug!("Message pump stopped: {} delivered, {} failed", self.delivered, self.failed);
            self
        });

        PumpHandle { shutdown, task }
    }
}

pub struct PumpHandle<H: MessageHandler> {
    shutdown: Arc<Notify>,
    task: JoinHandle<Pump<H>>,
}

impl<H: MessageHandler> PumpHandle<H> {
    /// Stops ticking, flushes already queued messages, and returns the pump.
    pub async fn shutdown(self) -> Result<Pump<H>, WorkerError> {
        self.shutdown.notify_one();
        Ok(self.task.await?)
    }

    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }
}

fn panic_message(panic: &(dyn Any + Send)) -> String {
    if let Some(text) = panic.downcast_ref::<&str>() {
        text.to_string()
    } else if let Some(text) = panic.downcast_ref::<String>() {
        text.clone()
    } else {
        "unknown panic".to_string()
    }
}
