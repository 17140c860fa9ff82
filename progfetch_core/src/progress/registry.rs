use std::collections::HashMap;
use std::io::Read;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};

use super::counting::{ProgressReader, ProgressStream};
use super::delivery::{DeliveryContext, DeliveryLoop, DeliveryQueue};
use super::listener::{ProgressListener, ProgressSink};
use super::throttle::{needs_dispatch, Dispatch};

/// A listener and the granularity it asked for when it was registered.
struct Registration {
    /// Weak: the registry never keeps a listener alive.
    listener: Weak<dyn ProgressListener>,
    granularity: f64,
}

/// Both tables live under one lock so that `forget` clears them together.
#[derive(Default)]
struct RegistryState {
    /// key → registration.
    listeners: HashMap<String, Registration>,
    /// key → last notified bucket.
    progresses: HashMap<String, i64>,
}

impl RegistryState {
    fn remove(&mut self, key: &str) {
        self.listeners.remove(key);
        self.progresses.remove(key);
    }
}

/// Keyed listener registry that turns raw per-read byte counts into
/// throttled progress notifications.
///
/// One registry is normally shared (behind an `Arc`) by every in-flight
/// stream. All methods take `&self` and are safe to call from any thread;
/// notifications are handed to the [`DeliveryContext`] and never run on the
/// reading thread.
///
/// # Lifecycle of a key
///
/// | Event                                   | Effect                          |
/// |-----------------------------------------|---------------------------------|
/// | `expect(key, listener)`                 | registration created / replaced |
/// | `update(key, n, total)` with `n < total` | throttled notification          |
/// | `update(key, n, total)` with `n >= total`| key forgotten, final notification |
/// | `forget(key)`                           | registration and bucket dropped |
/// | listener `Arc` dropped by its owner     | next `update` drops the entry   |
pub struct ProgressRegistry {
    state: Mutex<RegistryState>,
    delivery: Arc<dyn DeliveryContext>,
}

impl ProgressRegistry {
    pub fn new(delivery: Arc<dyn DeliveryContext>) -> Self {
        Self {
            state: Mutex::new(RegistryState::default()),
            delivery,
        }
    }

    /// Creates a registry backed by a fresh [`DeliveryQueue`] and returns the
    /// loop that must be driven for notifications to arrive.
    pub fn with_queue() -> (Arc<Self>, DeliveryLoop) {
        let (queue, delivery_loop) = DeliveryQueue::new();
        (Arc::new(Self::new(Arc::new(queue))), delivery_loop)
    }

    fn state(&self) -> MutexGuard<'_, RegistryState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Registers `listener` for `key`, replacing any earlier registration.
    ///
    /// Only a weak reference is kept; the caller owns the listener. The
    /// listener's granularity is read once, here, before the lock is taken.
    pub fn expect(&self, key: impl Into<String>, listener: &Arc<dyn ProgressListener>) {
        let key = key.into();
        let registration = Registration {
            listener: Arc::downgrade(listener),
            granularity: listener.granularity_percentage(),
        };
        log::debug!(
            "[progress_registry] expect key={} granularity={}",
            key, registration.granularity
        );
        self.state().listeners.insert(key, registration);
    }

    /// Drops the registration and progress state for `key`. Unknown keys are
    /// ignored.
    pub fn forget(&self, key: &str) {
        log::debug!("[progress_registry] forget key={}", key);
        self.state().remove(key);
    }

    /// Reports that `bytes_read` out of `total_bytes` have been consumed for
    /// `key`, and schedules a notification if the listener's granularity
    /// calls for one.
    pub fn update(&self, key: &str, bytes_read: u64, total_bytes: u64) {
        let (listener, decision) = {
            let mut state = self.state();

            let (listener, granularity) = match state.listeners.get(key) {
                None => return,
                Some(registration) => (registration.listener.upgrade(), registration.granularity),
            };
            let Some(listener) = listener else {
                log::debug!("[progress_registry] listener for key={} was dropped", key);
                state.remove(key);
                return;
            };

            // Completion (or a body longer than advertised) forgets the key
            // before the throttle runs, so a reused key starts fresh.
            if total_bytes <= bytes_read {
                state.remove(key);
            }

            let decision = needs_dispatch(
                bytes_read,
                total_bytes,
                granularity,
                state.progresses.get(key).copied(),
            );
            if let Dispatch::Bucket(bucket) = decision {
                state.progresses.insert(key.to_string(), bucket);
            }
            (listener, decision)
        };

        if !decision.should_notify() {
            log::trace!(
                "[progress_registry] suppressed key={} bytes_read={} total={}",
                key, bytes_read, total_bytes
            );
            return;
        }

        let key = key.to_string();
        self.delivery.post(Box::new(move || {
            listener.on_progress(&key, bytes_read, total_bytes);
        }));
    }

    /// Whether a live listener is currently registered for `key`.
    pub fn is_expecting(&self, key: &str) -> bool {
        self.state()
            .listeners
            .get(key)
            .is_some_and(|r| r.listener.strong_count() > 0)
    }

    /// Keys holding either a registration or a stored bucket, sorted.
    pub fn tracked_keys(&self) -> Vec<String> {
        let state = self.state();
        let mut keys: Vec<String> = state
            .listeners
            .keys()
            .chain(state.progresses.keys())
            .cloned()
            .collect();
        keys.sort();
        keys.dedup();
        keys
    }

    /// Last bucket notified for `key`, if any.
    pub fn last_bucket(&self, key: &str) -> Option<i64> {
        self.state().progresses.get(key).copied()
    }

    /// Wraps a blocking reader so that every read reports to this registry.
    /// `declared_len` is `None` when the length is unknown.
    pub fn wrap_reader<R: Read>(
        self: &Arc<Self>,
        key: impl Into<String>,
        reader: R,
        declared_len: Option<u64>,
    ) -> ProgressReader<R> {
        ProgressReader::new(key, reader, declared_len, Arc::clone(self) as Arc<dyn ProgressSink>)
    }

    /// Stream counterpart of [`wrap_reader`](Self::wrap_reader).
    pub fn wrap_stream<S>(
        self: &Arc<Self>,
        key: impl Into<String>,
        stream: S,
        declared_len: Option<u64>,
    ) -> ProgressStream<S> {
        ProgressStream::new(key, stream, declared_len, Arc::clone(self) as Arc<dyn ProgressSink>)
    }
}

impl ProgressSink for ProgressRegistry {
    fn update(&self, key: &str, bytes_read: u64, total_bytes: u64) {
        ProgressRegistry::update(self, key, bytes_read, total_bytes);
    }
}
