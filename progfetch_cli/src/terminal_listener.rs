use std::collections::HashMap;
use std::sync::Mutex;

use indicatif::{MultiProgress, ProgressBar, ProgressStyle};

use progfetch_core::progress::{ProgressListener, ProgressUpdate};

/// Renders one indicatif bar per fetched key.
///
/// Bars are created on the first notification for a key and finished on its
/// completion notification.
pub struct TerminalProgressListener {
    granularity: f64,
    multi: MultiProgress,
    bars: Mutex<HashMap<String, ProgressBar>>,
}

impl TerminalProgressListener {
    pub fn new(granularity: f64) -> Self {
        Self {
            granularity,
            multi: MultiProgress::new(),
            bars: Mutex::new(HashMap::new()),
        }
    }

    fn new_bar(&self, key: &str, total_bytes: u64) -> ProgressBar {
        let bar = self.multi.add(ProgressBar::new(total_bytes.max(1)));
        match ProgressStyle::with_template(
            "[{bar:30.cyan/blue}] {bytes}/{total_bytes} ({binary_bytes_per_sec}) {msg}",
        ) {
            Ok(style) => bar.set_style(style.progress_chars("=>-")),
            Err(e) => log::warn!("[terminal_listener] bad progress template: {}", e),
        }
        bar.set_message(short_name(key).to_string());
        bar
    }
}

impl ProgressListener for TerminalProgressListener {
    fn on_progress(&self, key: &str, bytes_read: u64, total_bytes: u64) {
        let mut bars = self.bars.lock().unwrap_or_else(|e| e.into_inner());
        let bar = bars
            .entry(key.to_string())
            .or_insert_with(|| self.new_bar(key, total_bytes));

        bar.set_length(total_bytes.max(1));
        bar.set_position(bytes_read);

        if bytes_read >= total_bytes {
            bar.finish_with_message(format!("{} done", short_name(key)));
            bars.remove(key);
        }
    }

    fn granularity_percentage(&self) -> f64 {
        self.granularity
    }
}

/// Prints every notification as one JSON line on stdout.
pub struct JsonProgressListener {
    granularity: f64,
}

impl JsonProgressListener {
    pub fn new(granularity: f64) -> Self {
        Self { granularity }
    }
}

impl ProgressListener for JsonProgressListener {
    fn on_progress(&self, key: &str, bytes_read: u64, total_bytes: u64) {
        let update = ProgressUpdate::new(key, bytes_read, total_bytes);
        match serde_json::to_string(&update) {
            Ok(line) => println!("{}", line),
            Err(e) => log::error!("[json_listener] key={}: {}", key, e),
        }
    }

    fn granularity_percentage(&self) -> f64 {
        self.granularity
    }
}

/// Last path segment of a key, for display.
fn short_name(key: &str) -> &str {
    key.trim_end_matches('/').rsplit('/').next().unwrap_or(key)
}
