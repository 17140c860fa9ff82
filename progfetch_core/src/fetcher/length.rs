use std::io;
use std::pin::Pin;
use std::task::{Context, Poll};

use bytes::Bytes;
use futures::Stream;

/// Fails a body that ends before its advertised `Content-Length` with one
/// `UnexpectedEof` error, then ends.
pub struct LengthCheckedStream<S> {
    inner: S,
    expected: Option<u64>,
    read: u64,
    done: bool,
}

impl<S> LengthCheckedStream<S> {
    pub fn new(inner: S, expected: Option<u64>) -> Self {
        Self {
            inner,
            expected,
            read: 0,
            done: false,
        }
    }
}

impl<S> Stream for LengthCheckedStream<S>
where
    S: Stream<Item = io::Result<Bytes>> + Unpin,
{
    type Item = io::Result<Bytes>;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        let this = &mut *self;
        if this.done {
            return Poll::Ready(None);
        }
        match Pin::new(&mut this.inner).poll_next(cx) {
            Poll::Ready(Some(Ok(chunk))) => {
                this.read += chunk.len() as u64;
                Poll::Ready(Some(Ok(chunk)))
            }
            Poll::Ready(None) => {
                this.done = true;
                match this.expected {
                    Some(expected) if this.read < expected => {
                        log::warn!(
                            "[length_check] body ended early: expected {} bytes, read {}",
                            expected, this.read
                        );
                        Poll::Ready(Some(Err(io::Error::new(
                            io::ErrorKind::UnexpectedEof,
                            format!(
                                "failed to read all expected data, expected: {}, but read: {}",
                                expected, this.read
                            ),
                        ))))
                    }
                    _ => Poll::Ready(None),
                }
            }
            other => other,
        }
    }
}
