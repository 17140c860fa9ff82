use serde::Serialize;

/// One delivered progress notification, in a form that can be logged or
/// serialized for machine consumers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ProgressUpdate {
    pub key: String,
    pub bytes_read: u64,
    pub total_bytes: u64,
}

impl ProgressUpdate {
    pub fn new(key: impl Into<String>, bytes_read: u64, total_bytes: u64) -> Self {
        Self {
            key: key.into(),
            bytes_read,
            total_bytes,
        }
    }

    /// Percentage in `0.0..=100.0`; `None` when the total is zero.
    pub fn percent(&self) -> Option<f64> {
        if self.total_bytes == 0 {
            return None;
        }
        Some((100.0 * self.bytes_read as f64 / self.total_bytes as f64).min(100.0))
    }

    pub fn is_complete(&self) -> bool {
        self.bytes_read >= self.total_bytes
    }
}

/// Human-readable byte formatting.
pub fn format_bytes(bytes: u64) -> String {
    const KB: f64 = 1024.0;
    const MB: f64 = KB * 1024.0;
    const GB: f64 = MB * 1024.0;

    let b = bytes as f64;
    if b >= GB {
        format!("{:.2} GB", b / GB)
    } else if b >= MB {
        format!("{:.2} MB", b / MB)
    } else if b >= KB {
        format!("{:.1} KB", b / KB)
    } else {
        format!("{} B", bytes)
    }
}
