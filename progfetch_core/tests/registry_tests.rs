use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::thread;

use progfetch_core::progress::throttle::{bucket_for, needs_dispatch, Dispatch};
use progfetch_core::progress::{DeliveryContext, DeliveryQueue, ProgressListener, ProgressRegistry};

mod common;
use common::{as_dyn, RecordingListener};

// ---------------------------------------------------------------
// throttle
// ---------------------------------------------------------------

#[test]
fn test_throttle_always_dispatches_start_completion_and_zero_granularity() {
    assert_eq!(needs_dispatch(0, 100, 10.0, Some(0)), Dispatch::Always);
    assert_eq!(needs_dispatch(100, 100, 10.0, Some(9)), Dispatch::Always);
    assert_eq!(needs_dispatch(150, 100, 10.0, None), Dispatch::Always);
    assert_eq!(needs_dispatch(42, 100, 0.0, Some(4)), Dispatch::Always);
}

#[test]
fn test_throttle_zero_total_counts_as_completion() {
    assert_eq!(needs_dispatch(5, 0, 10.0, None), Dispatch::Always);
}

#[test]
fn test_throttle_buckets() {
    assert_eq!(bucket_for(10, 100, 10.0), 1);
    assert_eq!(bucket_for(19, 100, 10.0), 1);
    assert_eq!(bucket_for(1, 3, 5.0), 6); // 33.3% / 5
    assert_eq!(needs_dispatch(15, 100, 10.0, None), Dispatch::Bucket(1));
    assert_eq!(needs_dispatch(15, 100, 10.0, Some(1)), Dispatch::Suppress);
    assert_eq!(needs_dispatch(25, 100, 10.0, Some(1)), Dispatch::Bucket(2));
    assert!(!Dispatch::Suppress.should_notify());
}

// ---------------------------------------------------------------
// ProgressRegistry::update
// ---------------------------------------------------------------

#[test]
fn test_granularity_scenario_dispatches_10_25_100_and_forgets() {
    let (registry, mut delivery) = ProgressRegistry::with_queue();
    let listener = RecordingListener::new(10.0);
    registry.expect("a", &as_dyn(&listener));

    registry.update("a", 10, 100);
    registry.update("a", 15, 100);
    assert_eq!(registry.last_bucket("a"), Some(1));
    registry.update("a", 25, 100);
    registry.update("a", 100, 100);

    assert_eq!(delivery.drain(), 3);
    assert_eq!(listener.bytes(), vec![10, 25, 100]);
    assert!(listener.events().iter().all(|(k, _, t)| k == "a" && *t == 100));

    assert!(!registry.is_expecting("a"));
    assert!(registry.tracked_keys().is_empty());
    assert_eq!(registry.last_bucket("a"), None);
}

#[test]
fn test_update_without_listener_is_noop() {
    let (registry, mut delivery) = ProgressRegistry::with_queue();

    registry.update("nobody", 0, 100);
    registry.update("nobody", 50, 100);
    registry.update("nobody", 100, 100);

    assert_eq!(delivery.pending(), 0);
    assert_eq!(delivery.drain(), 0);
    assert!(registry.tracked_keys().is_empty());
}

#[test]
fn test_forget_is_idempotent() {
    let (registry, _delivery) = ProgressRegistry::with_queue();
    let listener = RecordingListener::new(10.0);
    registry.expect("a", &as_dyn(&listener));
    registry.expect("b", &as_dyn(&listener));
    registry.update("a", 30, 100);

    registry.forget("a");
    let after_once = registry.tracked_keys();
    registry.forget("a");
    registry.forget("never-registered");

    assert_eq!(registry.tracked_keys(), after_once);
    assert_eq!(after_once, vec!["b".to_string()]);
}

#[test]
fn test_forgotten_key_receives_nothing() {
    let (registry, mut delivery) = ProgressRegistry::with_queue();
    let listener = RecordingListener::new(0.0);
    registry.expect("a", &as_dyn(&listener));
    registry.update("a", 10, 100);
    registry.forget("a");
    registry.update("a", 20, 100);

    delivery.drain();
    assert_eq!(listener.bytes(), vec![10]);
}

#[test]
fn test_expect_replaces_previous_registration() {
    let (registry, mut delivery) = ProgressRegistry::with_queue();
    let first = RecordingListener::new(0.0);
    let second = RecordingListener::new(0.0);

    registry.expect("a", &as_dyn(&first));
    registry.expect("a", &as_dyn(&second));
    registry.update("a", 40, 100);
    delivery.drain();

    assert!(first.events().is_empty());
    assert_eq!(second.bytes(), vec![40]);
}

#[test]
fn test_registry_does_not_keep_listener_alive() {
    let (registry, mut delivery) = ProgressRegistry::with_queue();
    let listener = RecordingListener::new(0.0);
    let weak = Arc::downgrade(&listener);
    registry.expect("a", &as_dyn(&listener));
    assert!(registry.is_expecting("a"));

    drop(listener);
    assert!(weak.upgrade().is_none());
    assert!(!registry.is_expecting("a"));

    registry.update("a", 10, 100);
    assert_eq!(delivery.drain(), 0);
    assert!(registry.tracked_keys().is_empty());
}

#[test]
fn test_first_byte_and_zero_granularity_always_notify() {
    let (registry, mut delivery) = ProgressRegistry::with_queue();
    let coarse = RecordingListener::new(50.0);
    let every = RecordingListener::new(0.0);
    registry.expect("coarse", &as_dyn(&coarse));
    registry.expect("every", &as_dyn(&every));

    for bytes in [0, 0, 1, 2, 3] {
        registry.update("coarse", bytes, 100);
        registry.update("every", bytes, 100);
    }
    delivery.drain();

    // 0 and 0 always; 1 opens bucket 0; 2 and 3 stay in it.
    assert_eq!(coarse.bytes(), vec![0, 0, 1]);
    assert_eq!(every.bytes(), vec![0, 0, 1, 2, 3]);
}

#[test]
fn test_zero_total_is_treated_as_completion() {
    let (registry, mut delivery) = ProgressRegistry::with_queue();
    let listener = RecordingListener::new(10.0);
    registry.expect("a", &as_dyn(&listener));

    registry.update("a", 7, 0);
    delivery.drain();

    assert_eq!(listener.events(), vec![("a".to_string(), 7, 0)]);
    assert!(registry.tracked_keys().is_empty());
}

#[test]
fn test_overlong_body_completes_once() {
    let (registry, mut delivery) = ProgressRegistry::with_queue();
    let listener = RecordingListener::new(10.0);
    registry.expect("a", &as_dyn(&listener));

    registry.update("a", 50, 100);
    registry.update("a", 120, 100);
    registry.update("a", 150, 100);
    delivery.drain();

    assert_eq!(listener.bytes(), vec![50, 120]);
    assert!(registry.tracked_keys().is_empty());
}

#[test]
fn test_short_stream_with_high_granularity_only_sees_completion() {
    let (registry, mut delivery) = ProgressRegistry::with_queue();
    let listener = RecordingListener::new(50.0);
    registry.expect("a", &as_dyn(&listener));

    registry.update("a", 100, 100);
    delivery.drain();

    assert_eq!(listener.events(), vec![("a".to_string(), 100, 100)]);
}

#[test]
fn test_notifications_are_monotonic() {
    let (registry, mut delivery) = ProgressRegistry::with_queue();
    let listener = RecordingListener::new(3.0);
    registry.expect("a", &as_dyn(&listener));

    let total = 10_000;
    for bytes in (0..=total).step_by(37) {
        registry.update("a", bytes, total);
    }
    registry.update("a", total, total);
    delivery.drain();

    let bytes = listener.bytes();
    assert!(bytes.windows(2).all(|w| w[0] <= w[1]), "{:?}", bytes);
    assert_eq!(bytes.last(), Some(&total));
}

#[test]
fn test_throttle_bounds_notification_count() {
    for granularity in [1.0_f64, 5.0, 7.0, 10.0, 33.0] {
        let (registry, mut delivery) = ProgressRegistry::with_queue();
        let listener = RecordingListener::new(granularity);
        registry.expect("a", &as_dyn(&listener));

        let total = 1000;
        for bytes in 1..=total {
            registry.update("a", bytes, total);
        }
        delivery.drain();

        let intermediate = listener.bytes().iter().filter(|&&b| b != total).count();
        let bound = (100.0 / granularity).ceil() as usize;
        assert!(
            intermediate <= bound,
            "granularity {}: {} intermediate notifications, bound {}",
            granularity, intermediate, bound
        );
        assert_eq!(listener.bytes().last(), Some(&total));
    }
}

#[test]
fn test_concurrent_keys_from_many_threads() {
    let (registry, mut delivery) = ProgressRegistry::with_queue();
    let listeners: Vec<_> = (0..8).map(|_| RecordingListener::new(10.0)).collect();
    for (i, listener) in listeners.iter().enumerate() {
        registry.expect(format!("key-{i}"), &as_dyn(listener));
    }

    let handles: Vec<_> = (0..8)
        .map(|i| {
            let registry = Arc::clone(&registry);
            thread::spawn(move || {
                let key = format!("key-{i}");
                for bytes in (0..=4096).step_by(64) {
                    registry.update(&key, bytes, 4096);
                }
            })
        })
        .collect();
    for handle in handles {
        handle.join().unwrap();
    }
    delivery.drain();

    for (i, listener) in listeners.iter().enumerate() {
        let events = listener.events();
        assert!(events.iter().all(|(k, _, _)| *k == format!("key-{i}")));
        let bytes = listener.bytes();
        assert!(bytes.windows(2).all(|w| w[0] <= w[1]));
        assert_eq!(bytes.first(), Some(&0));
        assert_eq!(bytes.last(), Some(&4096));
    }
    assert!(registry.tracked_keys().is_empty());
}

/// Listener whose granularity lookup inspects the registry it is registered with.
struct IntrospectingListener {
    registry: Mutex<Option<Arc<ProgressRegistry>>>,
    granularity_reads: AtomicUsize,
}

impl ProgressListener for IntrospectingListener {
    fn on_progress(&self, _key: &str, _bytes_read: u64, _total_bytes: u64) {}

    fn granularity_percentage(&self) -> f64 {
        self.granularity_reads.fetch_add(1, Ordering::SeqCst);
        if let Some(registry) = self.registry.lock().unwrap().as_ref() {
            let _ = registry.tracked_keys();
        }
        10.0
    }
}

#[test]
fn test_granularity_is_read_once_outside_the_lock() {
    let (registry, mut delivery) = ProgressRegistry::with_queue();
    let listener = Arc::new(IntrospectingListener {
        registry: Mutex::new(Some(Arc::clone(&registry))),
        granularity_reads: AtomicUsize::new(0),
    });
    let as_listener: Arc<dyn ProgressListener> = listener.clone();

    registry.expect("a", &as_listener);
    for bytes in [0, 10, 15, 25, 60, 100] {
        registry.update("a", bytes, 100);
    }

    assert_eq!(delivery.drain(), 5);
    assert_eq!(listener.granularity_reads.load(Ordering::SeqCst), 1);
    listener.registry.lock().unwrap().take();
}

// ---------------------------------------------------------------
// delivery
// ---------------------------------------------------------------

struct ThreadNameListener {
    names: Mutex<Vec<String>>,
}

impl ProgressListener for ThreadNameListener {
    fn on_progress(&self, _key: &str, _bytes_read: u64, _total_bytes: u64) {
        let name = thread::current().name().unwrap_or("unnamed").to_string();
        self.names.lock().unwrap().push(name);
    }

    fn granularity_percentage(&self) -> f64 {
        0.0
    }
}

#[test]
fn test_listener_runs_on_delivery_thread() {
    let (registry, delivery) = ProgressRegistry::with_queue();
    let loop_thread = thread::Builder::new()
        .name("delivery".to_string())
        .spawn(move || delivery.run_blocking())
        .unwrap();

    let listener = Arc::new(ThreadNameListener {
        names: Mutex::new(Vec::new()),
    });
    let as_listener: Arc<dyn ProgressListener> = listener.clone();
    registry.expect("a", &as_listener);
    registry.update("a", 1, 10);
    registry.update("a", 10, 10);

    // Dropping the registry drops the last queue handle and ends the loop.
    drop(registry);
    loop_thread.join().unwrap();

    assert_eq!(*listener.names.lock().unwrap(), vec!["delivery", "delivery"]);
}

#[tokio::test]
async fn test_async_delivery_loop_preserves_order() {
    let (registry, delivery) = ProgressRegistry::with_queue();
    let loop_handle = tokio::spawn(delivery.run());

    let listener = RecordingListener::new(0.0);
    registry.expect("a", &as_dyn(&listener));
    for bytes in 0..=50 {
        registry.update("a", bytes, 50);
    }

    drop(registry);
    loop_handle.await.unwrap();

    assert_eq!(listener.bytes(), (0..=50).collect::<Vec<u64>>());
}

#[test]
fn test_panicking_task_does_not_stop_delivery() {
    let (queue, mut delivery) = DeliveryQueue::new();
    let ran = Arc::new(Mutex::new(false));
    let ran_clone = Arc::clone(&ran);

    queue.post(Box::new(|| panic!("listener blew up")));
    queue.post(Box::new(move || *ran_clone.lock().unwrap() = true));

    assert_eq!(delivery.drain(), 2);
    assert!(*ran.lock().unwrap());
}

#[test]
fn test_post_after_loop_dropped_is_silent() {
    let (queue, delivery) = DeliveryQueue::new();
    drop(delivery);
    queue.post(Box::new(|| {}));
}
