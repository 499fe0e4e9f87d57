//! Unbounded multi-producer, single-consumer message queue.
//!
//! Workers never talk to the UI directly. Everything user-visible is queued
//! here and delivered by the [`Pump`](super::Pump) on its own schedule.

use std::collections::VecDeque;
use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::trace;

use crate::core::ProgressUpdate;

/// Callback attached to a custom message. Runs on the pump, never on a worker.
pub type MessageCallback = Box<dyn FnOnce(Value) -> anyhow::Result<()> + Send>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MessageKind {
    Log,
    Progress,
    ComponentEnable,
    ComponentDisable,
    LabelUpdate,
    ShowError,
    ShowInfo,
    Custom,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Debug,
    Info,
    Warning,
    Error,
}

pub enum Message {
    Log { level: LogLevel, text: String },
    Progress(ProgressUpdate),
    ComponentEnable(String),
    ComponentDisable(String),
    LabelUpdate { component: String, text: String },
    ShowError { title: String, text: String },
    ShowInfo { title: String, text: String },
    Custom { data: Value, callback: Option<MessageCallback> },
}

impl Message {
    pub fn kind(&self) -> MessageKind {
        match self {
            Message::Log { .. } => MessageKind::Log,
            Message::Progress(_) => MessageKind::Progress,
            Message::ComponentEnable(_) => MessageKind::ComponentEnable,
            Message::ComponentDisable(_) => MessageKind::ComponentDisable,
            Message::LabelUpdate { .. } => MessageKind::LabelUpdate,
            Message::ShowError { .. } => MessageKind::ShowError,
            Message::ShowInfo { .. } => MessageKind::ShowInfo,
            Message::Custom { .. } => MessageKind::Custom,
        }
    }
}

impl fmt::Debug for Message {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Message::Log { level, text } => f.debug_struct("Log").field("level", level).field("text", text).finish(),
            Message::Progress(update) => f.debug_tuple("Progress").field(update).finish(),
            Message::ComponentEnable(id) => f.debug_tuple("ComponentEnable").field(id).finish(),
            Message::ComponentDisable(id) => f.debug_tuple("ComponentDisable").field(id).finish(),
            Message::LabelUpdate { component, text } => f
                .debug_struct("LabelUpdate")
                .field("component", component)
                .field("text", text)
                .finish(),
            Message::ShowError { title, text } => f.debug_struct("ShowError").field("title", title).field("text", text).finish(),
            Message::ShowInfo { title, text } => f.debug_struct("ShowInfo").field("title", title).field("text", text).finish(),
            Message::Custom { data, callback } => f
                .debug_struct("Custom")
                .field("data", data)
                .field("callback", &callback.as_ref().map(|_| "<fn>"))
                .finish(),
        }
    }
}

struct Shared {
    queue: Mutex<VecDeque<Message>>,
    closed: AtomicBool,
}

pub struct MessageChannel;

impl MessageChannel {
    #[allow(clippy::new_ret_no_self)]
    pub fn new() -> (MessageSender, MessageReceiver) {
        let shared = Arc::new(Shared {
            queue: Mutex::new(VecDeque::new()),
            closed: AtomicBool::new(false),
        });
        (MessageSender { shared: shared.clone() }, MessageReceiver { shared })
    }
}

/// Producer side. Cheap to clone, usable from any thread.
#[derive(Clone)]
pub struct MessageSender {
    shared: Arc<Shared>,
}

impl MessageSender {
    /// Queues `message`. Never blocks.
    ///
    /// Returns `false` once the receiver is gone; the message is dropped.
    pub fn send(&self, message: Message) -> bool {
        if self.shared.closed.load(Ordering::Acquire) {
            trace!("Dropping {:?} message, receiver closed", message.kind());
            return false;
        }
        self.shared.queue.lock().push_back(message);
        true
    }

    pub fn log(&self, text: impl Into<String>) -> bool {
        self.send(Message::Log { level: LogLevel::Info, text: text.into() })
    }

    pub fn log_warning(&self, text: impl Into<String>) -> bool {
        self.send(Message::Log { level: LogLevel::Warning, text: text.into() })
    }

    pub fn log_error(&self, text: impl Into<String>) -> bool {
        self.send(Message::Log { level: LogLevel::Error, text: text.into() })
    }

    pub fn progress(&self, update: ProgressUpdate) -> bool {
        self.send(Message::Progress(update))
    }

    pub fn enable(&self, component: impl Into<String>) -> bool {
        self.send(Message::ComponentEnable(component.into()))
    }

    pub fn disable(&self, component: impl Into<String>) -> bool {
        self.send(Message::ComponentDisable(component.into()))
    }

    pub fn update_label(&self, component: impl Into<String>, text: impl Into<String>) -> bool {
        self.send(Message::LabelUpdate { component: component.into(), text: text.into() })
    }

    pub fn show_error(&self, title: impl Into<String>, text: impl Into<String>) -> bool {
        self.send(Message::ShowError { title: title.into(), text: text.into() })
    }

    pub fn show_info(&self, title: impl Into<String>, text: impl Into<String>) -> bool {
        self.send(Message::ShowInfo { title: title.into(), text: text.into() })
    }

    pub fn custom(
        &self,
        data: Value,
        callback: impl FnOnce(Value) -> anyhow::Result<()> + Send + 'static,
    ) -> bool {
        self.send(Message::Custom { data, callback: Some(Box::new(callback)) })
    }

    pub fn is_closed(&self) -> bool {
        self.shared.closed.load(Ordering::Acquire)
    }
}

/// Consumer side. Exactly one exists per channel.
pub struct MessageReceiver {
    shared: Arc<Shared>,
}

impl MessageReceiver {
    pub fn try_recv(&self) -> Option<Message> {
        self.shared.queue.lock().pop_front()
    }

    /// Removes up to `max` messages from the front of the queue.
    pub fn drain(&self, max: usize) -> Vec<Message> {
        let mut queue = self.shared.queue.lock();
        let count = max.min(queue.len());
        queue.drain(..count).collect()
    }

    pub fn len(&self) -> usize {
        self.shared.queue.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.shared.queue.lock().is_empty()
    }
}

impl Drop for MessageReceiver {
    fn drop(&mut self) {
        self.shared.closed.store(true, Ordering::Release);
        self.shared.queue.lock().clear();
    }
}
