//! Thread-safe keyed property store with per-key change notification.
//!
//! One mutex guards both the values and the subscriber lists. Subscribers are
//! always invoked after that mutex is released, so a callback may read or
//! write the store again without deadlocking.

use std::collections::HashMap;
use std::fmt;
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::Arc;
use parking_lot::Mutex;
use serde::Serialize;
use serde_json::Value;
use tracing::{error, trace, warn};

/// Delivered to subscribers when a key's value changes.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PropertyChange {
    pub key: String,
    /// `None` when the key had never been set
    pub old_value: Option<Value>,
    pub new_value: Value,
}

type Callback = dyn Fn(&PropertyChange) -> anyhow::Result<()> + Send + Sync;

/// Cloneable subscription handle. Clones refer to the same subscription.
#[derive(Clone)]
pub struct Subscriber {
    callback: Arc<Callback>,
}

impl Subscriber {
    pub fn new(callback: impl Fn(&PropertyChange) -> anyhow::Result<()> + Send + Sync + 'static) -> Self {
        Self { callback: Arc::new(callback) }
    }

    fn address(&self) -> *const () {
        Arc::as_ptr(&self.callback) as *const ()
    }

    fn notify(&self, change: &PropertyChange) {
        match catch_unwind(AssertUnwindSafe(|| (self.callback)(change))) {
            Ok(Ok(())) => {}
            Ok(Err(err)) => warn!("Subscriber for '{}' failed: {:#}", change.key, err),
            Err(_) => error!("Subscriber for '{}' panicked", change.key),
        }
    }
}

impl PartialEq for Subscriber {
    fn eq(&self, other: &Self) -> bool {
        self.address() == other.address()
    }
}

impl Eq for Subscriber {}

impl fmt::Debug for Subscriber {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("Subscriber").field(&self.address()).finish()
    }
}

#[derive(Default)]
struct Inner {
    values: HashMap<String, Value>,
    subscribers: HashMap<String, Vec<Subscriber>>,
}

#[derive(Clone, Default)]
pub struct ObservableStore {
    inner: Arc<Mutex<Inner>>,
}

impl ObservableStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Stores `value` under `key` and notifies that key's subscribers.
    ///
    /// Returns `false` without notifying anyone when the value is unchanged.
    /// A key that was never set compares equal to `Value::Null`.
    pub fn set(&self, key: &str, value: impl Into<Value>) -> bool {
        let value = value.into();
        let (change, subscribers) = {
            let mut inner = self.inner.lock();
            let unchanged = match inner.values.get(key) {
                Some(current) => *current == value,
                None => value.is_null(),
            };
            if unchanged {
                return false;
            }
            let old_value = inner.values.insert(key.to_string(), value.clone());
            let subscribers = inner.subscribers.get(key).cloned().unwrap_or_default();
            (PropertyChange { key: key.to_string(), old_value, new_value: value }, subscribers)
        };

        trace!("'{}' changed, notifying {} subscriber(s)", key, subscribers.len());
        for subscriber in &subscribers {
            subscriber.notify(&change);
        }
        true
    }

    pub fn get(&self, key: &str, default: impl Into<Value>) -> Value {
        self.try_get(key).unwrap_or_else(|| default.into())
    }

    pub fn try_get(&self, key: &str) -> Option<Value> {
        self.inner.lock().values.get(key).cloned()
    }

    /// Registers `subscriber` under `key`. Returns `false` if it already was.
    pub fn subscribe(&self, key: &str, subscriber: &Subscriber) -> bool {
        let mut inner = self.inner.lock();
        let list = inner.subscribers.entry(key.to_string()).or_default();
        if list.contains(subscriber) {
            return false;
        }
        list.push(subscriber.clone());
        true
    }

    /// Returns `false` if `subscriber` was not registered under `key`.
    pub fn unsubscribe(&self, key: &str, subscriber: &Subscriber) -> bool {
        let mut inner = self.inner.lock();
        let Some(list) = inner.subscribers.get_mut(key) else {
            return false;
        };
        let before = list.len();
        list.retain(|existing| existing != subscriber);
        let removed = list.len() != before;
        if list.is_empty() {
            inner.subscribers.remove(key);
        }
        removed
    }

    /// Drops the subscribers of `key`, or of every key when `None`.
    pub fn unsubscribe_all(&self, key: Option<&str>) {
        let mut inner = self.inner.lock();
        match key {
            Some(key) => {
                inner.subscribers.remove(key);
            }
            None => inner.subscribers.clear(),
        }
    }

    pub fn subscriber_count(&self, key: &str) -> usize {
        self.inner.lock().subscribers.get(key).map_or(0, Vec::len)
    }
}

/// Well-known keys written by the dispatcher.
pub mod keys {
    pub const BUSY: &str = "busy";
    pub const PROGRESS: &str = "progress";
    pub const ERROR_MESSAGE: &str = "error_message";
    pub const STATUS_MESSAGE: &str = "status_message";
}

impl ObservableStore {
    pub fn is_busy(&self) -> bool {
        self.try_get(keys::BUSY).and_then(|v| v.as_bool()).unwrap_or(false)
    }

    pub fn set_busy(&self, busy: bool) -> bool {
        self.set(keys::BUSY, busy)
    }

    /// Fraction complete in `0.0..=1.0`.
    pub fn progress(&self) -> f64 {
        self.try_get(keys::PROGRESS).and_then(|v| v.as_f64()).unwrap_or(0.0)
    }

    pub fn set_progress(&self, fraction: f64) -> bool {
        let fraction = if fraction.is_nan() { 0.0 } else { fraction.clamp(0.0, 1.0) };
        self.set(keys::PROGRESS, fraction)
    }

    pub fn reset_progress(&self) -> bool {
        self.set_progress(0.0)
    }

    pub fn error_message(&self) -> Option<String> {
        self.try_get(keys::ERROR_MESSAGE).and_then(|v| v.as_str().map(str::to_string))
    }

    pub fn set_error_message(&self, message: impl Into<String>) -> bool {
        self.set(keys::ERROR_MESSAGE, Value::String(message.into()))
    }

    pub fn clear_error(&self) -> bool {
        self.set(keys::ERROR_MESSAGE, Value::Null)
    }

    pub fn status_message(&self) -> String {
        self.try_get(keys::STATUS_MESSAGE)
            .and_then(|v| v.as_str().map(str::to_string))
            .unwrap_or_default()
    }

    pub fn set_status_message(&self, message: impl Into<String>) -> bool {
        self.set(keys::STATUS_MESSAGE, Value::String(message.into()))
    }
}
