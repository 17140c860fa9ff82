#![allow(dead_code)]

use std::io::{self, Read};
use std::sync::{Arc, Mutex};

use progfetch_core::progress::{ProgressListener, ProgressSink};

/// Listener that records every notification it receives.
pub struct RecordingListener {
    granularity: f64,
    events: Mutex<Vec<(String, u64, u64)>>,
}

impl RecordingListener {
    pub fn new(granularity: f64) -> Arc<Self> {
        Arc::new(Self {
            granularity,
            events: Mutex::new(Vec::new()),
        })
    }

    pub fn events(&self) -> Vec<(String, u64, u64)> {
        self.events.lock().unwrap().clone()
    }

    pub fn bytes(&self) -> Vec<u64> {
        self.events().into_iter().map(|(_, bytes, _)| bytes).collect()
    }
}

impl ProgressListener for RecordingListener {
    fn on_progress(&self, key: &str, bytes_read: u64, total_bytes: u64) {
        self.events
            .lock()
            .unwrap()
            .push((key.to_string(), bytes_read, total_bytes));
    }

    fn granularity_percentage(&self) -> f64 {
        self.granularity
    }
}

pub fn as_dyn(listener: &Arc<RecordingListener>) -> Arc<dyn ProgressListener> {
    listener.clone()
}

/// Sink that records every raw `update` call, unthrottled.
#[derive(Default)]
pub struct RecordingSink {
    calls: Mutex<Vec<(String, u64, u64)>>,
}

impl RecordingSink {
    pub fn calls(&self) -> Vec<(String, u64, u64)> {
        self.calls.lock().unwrap().clone()
    }
}

impl ProgressSink for RecordingSink {
    fn update(&self, key: &str, bytes_read: u64, total_bytes: u64) {
        self.calls
            .lock()
            .unwrap()
            .push((key.to_string(), bytes_read, total_bytes));
    }
}

/// Reader that hands out at most `chunk` bytes per call.
pub struct ChunkedReader {
    data: Vec<u8>,
    pos: usize,
    chunk: usize,
}

impl ChunkedReader {
    pub fn new(data: Vec<u8>, chunk: usize) -> Self {
        Self { data, pos: 0, chunk }
    }
}

impl Read for ChunkedReader {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let n = self.chunk.min(buf.len()).min(self.data.len() - self.pos);
        buf[..n].copy_from_slice(&self.data[self.pos..self.pos + n]);
        self.pos += n;
        Ok(n)
    }
}

/// Deterministic test payload.
pub fn generate_test_data(size: usize) -> Vec<u8> {
    (0..size).map(|i| (i % 251) as u8).collect()
}

/// Drains `reader` through a fixed buffer, so each `read` sees the
/// reader's own chunk size rather than a small first read.
pub fn read_all<R: Read>(reader: &mut R) -> Vec<u8> {
    let mut out = Vec::new();
    let mut buf = [0u8; 4096];
    loop {
        let n = reader.read(&mut buf).unwrap();
        if n == 0 {
            return out;
        }
        out.extend_from_slice(&buf[..n]);
    }
}
