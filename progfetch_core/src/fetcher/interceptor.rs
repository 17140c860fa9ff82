use std::io;
use std::sync::Arc;

use bytes::Bytes;
use futures::stream::BoxStream;
use futures::{StreamExt, TryStreamExt};
use reqwest::header::HeaderMap;
use reqwest::{Response, StatusCode, Url};

use crate::progress::counting::ProgressStream;
use crate::progress::listener::ProgressSink;

/// Response body as a stream of chunks, transport errors mapped to `io::Error`.
pub type BodyStream = BoxStream<'static, io::Result<Bytes>>;

/// A response whose body has been wrapped for progress accounting.
pub struct InterceptedResponse {
    pub key: String,
    pub status: StatusCode,
    /// Final URL after redirects.
    pub url: Url,
    pub headers: HeaderMap,
    pub content_length: Option<u64>,
    pub body: ProgressStream<BodyStream>,
}

/// Wraps every response body it sees in a [`ProgressStream`] reporting to
/// `sink` under the key of the request that produced it.
#[derive(Clone)]
pub struct ProgressInterceptor {
    sink: Arc<dyn ProgressSink>,
}

impl ProgressInterceptor {
    pub fn new(sink: Arc<dyn ProgressSink>) -> Self {
        Self { sink }
    }

    /// `key` is the request URL as issued, not the post-redirect URL, so it
    /// matches what the caller registered its listener under.
    pub fn intercept(&self, key: impl Into<String>, response: Response) -> InterceptedResponse {
        let key = key.into();
        let status = response.status();
        let url = response.url().clone();
        let headers = response.headers().clone();
        let content_length = response.content_length();

        log::debug!(
            "[progress_interceptor] key={} status={} content_length={:?}",
            key, status, content_length
        );

        let stream: BodyStream = response.bytes_stream().map_err(io::Error::other).boxed();
        let body = ProgressStream::new(key.clone(), stream, content_length, Arc::clone(&self.sink));

        InterceptedResponse {
            key,
            status,
            url,
            headers,
            content_length,
            body,
        }
    }
}
