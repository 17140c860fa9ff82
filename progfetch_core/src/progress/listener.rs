/// Anything that wants byte-level progress for a request key.
///
/// Listeners are registered with [`ProgressRegistry::expect`] and are only
/// weakly referenced by the registry: the caller keeps the `Arc` alive for as
/// long as it cares about the callbacks.
///
/// `on_progress` always runs on the delivery loop, never on the thread that
/// is reading the stream.
///
/// [`ProgressRegistry::expect`]: super::registry::ProgressRegistry::expect
pub trait ProgressListener: Send + Sync {
    fn on_progress(&self, key: &str, bytes_read: u64, total_bytes: u64);

    /// Minimum change, in percentage points, between two notifications.
    /// `0.0` asks for every read.
    ///
    /// Read once per [`ProgressRegistry::expect`]; a listener that wants a
    /// different granularity registers again.
    fn granularity_percentage(&self) -> f64;
}

/// Receives raw `(key, bytes_read, total_bytes)` reports from the counting
/// wrappers, one per read.
pub trait ProgressSink: Send + Sync {
    fn update(&self, key: &str, bytes_read: u64, total_bytes: u64);
}
