/// Outcome of evaluating one progress report against the throttling policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Dispatch {
    /// Notify, and leave the stored bucket alone.
    Always,
    /// Notify, and remember this bucket for the key.
    Bucket(i64),
    /// Same bucket as the last notification; drop the report.
    Suppress,
}

impl Dispatch {
    pub fn should_notify(self) -> bool {
        !matches!(self, Dispatch::Suppress)
    }
}

/// Decides whether `current` out of `total` bytes is worth a notification,
/// given the listener's granularity and the last bucket notified for the key.
///
/// The first byte, the completion event, and every report for a listener with
/// zero granularity always go through. A zero `total` counts as completion
/// rather than dividing by it.
pub fn needs_dispatch(current: u64, total: u64, granularity: f64, last_bucket: Option<i64>) -> Dispatch {
    if granularity <= 0.0 || current == 0 || total == 0 || current >= total {
        return Dispatch::Always;
    }

    let bucket = bucket_for(current, total, granularity);
    match last_bucket {
        Some(last) if last == bucket => Dispatch::Suppress,
        _ => Dispatch::Bucket(bucket),
    }
}

/// `floor(100 * current / total / granularity)`.
pub fn bucket_for(current: u64, total: u64, granularity: f64) -> i64 {
    let percent = 100.0 * current as f64 / total as f64;
    (percent / granularity).floor() as i64
}
