use std::io::{self, Read};
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};

use bytes::Bytes;
use futures::Stream;

use super::listener::ProgressSink;

/// Running byte count for one wrapped source, shared by the blocking and the
/// async wrappers.
struct ByteCounter {
    key: String,
    declared_len: Option<u64>,
    bytes_read: u64,
    finished: bool,
    sink: Arc<dyn ProgressSink>,
}

impl ByteCounter {
    fn new(key: String, declared_len: Option<u64>, sink: Arc<dyn ProgressSink>) -> Self {
        Self {
            key,
            declared_len,
            bytes_read: 0,
            finished: false,
            sink,
        }
    }

    /// A read that delivered `n > 0` bytes.
    fn record(&mut self, n: usize) {
        self.bytes_read += n as u64;
        match self.declared_len {
            Some(total) => self.sink.update(&self.key, self.bytes_read, total),
            // Without a length there is no percentage to report; the single
            // completion event is sent from `finish`.
            None => log::trace!(
                "[progress_stream] key={} bytes_read={} (length unknown)",
                self.key, self.bytes_read
            ),
        }
    }

    /// The source reported end of stream. Only the first end of stream is
    /// reported; a key may already belong to a new fetch by the next one.
    fn finish(&mut self) {
        if self.finished {
            return;
        }
        self.finished = true;
        let total = match self.declared_len {
            Some(total) => {
                self.bytes_read = total;
                total
            }
            None => self.bytes_read,
        };
        self.sink.update(&self.key, self.bytes_read, total);
    }
}

/// Blocking [`Read`] adapter that reports every read to a [`ProgressSink`].
///
/// Bytes, ordering and end-of-stream signalling are passed through untouched.
/// At end of stream the count is forced to the declared length so that the
/// sink always sees a `bytes_read == total_bytes` completion.
pub struct ProgressReader<R> {
    inner: R,
    counter: ByteCounter,
}

impl<R> ProgressReader<R> {
    pub fn new(
        key: impl Into<String>,
        inner: R,
        declared_len: Option<u64>,
        sink: Arc<dyn ProgressSink>,
    ) -> Self {
        Self {
            inner,
            counter: ByteCounter::new(key.into(), declared_len, sink),
        }
    }

    pub fn key(&self) -> &str {
        &self.counter.key
    }

    pub fn bytes_read(&self) -> u64 {
        self.counter.bytes_read
    }

    pub fn into_inner(self) -> R {
        self.inner
    }
}

impl<R: Read> Read for ProgressReader<R> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let n = self.inner.read(buf)?;
        // A zero-length buffer also yields 0 without meaning end of stream.
        if buf.is_empty() {
            return Ok(n);
        }
        if n == 0 {
            self.counter.finish();
        } else {
            self.counter.record(n);
        }
        Ok(n)
    }
}

/// [`Stream`] adapter over chunked bodies (e.g. `reqwest::Response::bytes_stream`)
/// with the same accounting as [`ProgressReader`]. Errors are forwarded and
/// not counted.
pub struct ProgressStream<S> {
    inner: S,
    counter: ByteCounter,
}

impl<S> ProgressStream<S> {
    pub fn new(
        key: impl Into<String>,
        inner: S,
        declared_len: Option<u64>,
        sink: Arc<dyn ProgressSink>,
    ) -> Self {
        Self {
            inner,
            counter: ByteCounter::new(key.into(), declared_len, sink),
        }
    }

    pub fn key(&self) -> &str {
        &self.counter.key
    }

    pub fn bytes_read(&self) -> u64 {
        self.counter.bytes_read
    }

    pub fn into_inner(self) -> S {
        self.inner
    }
}

impl<S, E> Stream for ProgressStream<S>
where
    S: Stream<Item = Result<Bytes, E>> + Unpin,
{
    type Item = Result<Bytes, E>;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        let this = &mut *self;
        match Pin::new(&mut this.inner).poll_next(cx) {
            Poll::Ready(Some(Ok(chunk))) => {
                if !chunk.is_empty() {
                    this.counter.record(chunk.len());
                }
                Poll::Ready(Some(Ok(chunk)))
            }
            Poll::Ready(None) => {
                this.counter.finish();
                Poll::Ready(None)
            }
            other => other,
        }
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        self.inner.size_hint()
    }
}
