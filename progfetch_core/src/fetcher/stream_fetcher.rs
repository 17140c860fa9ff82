use std::future::Future;
use std::io;
use std::pin::Pin;
use std::task::{Context, Poll};

use async_trait::async_trait;
use bytes::Bytes;
use futures::{Stream, StreamExt};
use reqwest::{Client, Url};
use tokio_util::io::StreamReader;
use tokio_util::sync::{CancellationToken, WaitForCancellationFutureOwned};

use crate::fetcher::data_fetcher::DataFetcher;
use crate::fetcher::disposition::suggest_file_name;
use crate::fetcher::headers::{apply_headers, basic_auth_value};
use crate::fetcher::interceptor::{BodyStream, InterceptedResponse, ProgressInterceptor};
use crate::fetcher::length::LengthCheckedStream;
use crate::progress::counting::ProgressStream;
use crate::types::types::{DataSource, FetchError, FetchRequest};

/// Upper bound on the buffer reserved up front by [`FetchedStream::collect_bytes`].
const MAX_PREALLOCATION: usize = 1 << 20;

/// Fetches one [`FetchRequest`] over HTTP and hands back its body as a
/// progress-reporting stream.
///
/// The body passes through the [`ProgressInterceptor`] before anything else
/// sees it, so every chunk the consumer pulls is reported under the request's
/// key.
pub struct StreamFetcher {
    client: Client,
    request: FetchRequest,
    interceptor: ProgressInterceptor,
    cancel_token: CancellationToken,
}

impl StreamFetcher {
    pub fn new(client: Client, request: FetchRequest, interceptor: ProgressInterceptor) -> Self {
        Self {
            client,
            request,
            interceptor,
            cancel_token: CancellationToken::new(),
        }
    }

    pub fn request(&self) -> &FetchRequest {
        &self.request
    }

    pub fn cancel_token(&self) -> &CancellationToken {
        &self.cancel_token
    }
}

#[async_trait]
impl DataFetcher for StreamFetcher {
    async fn load_data(&self) -> Result<FetchedStream, FetchError> {
        if self.cancel_token.is_cancelled() {
            return Err(FetchError::Cancelled);
        }

        let key = self.request.key()?;
        let auth_header = basic_auth_value(&self.request);
        let builder = apply_headers(self.client.get(&key), &self.request, auth_header.as_deref());

        log::info!("[stream_fetcher] key={}: sending request", key);

        let response = tokio::select! {
            _ = self.cancel_token.cancelled() => {
                log::info!("[stream_fetcher] key={}: cancelled before response", key);
                return Err(FetchError::Cancelled);
            }
            result = builder.send() => result?,
        };

        let intercepted = self.interceptor.intercept(key, response);
        let status = intercepted.status;
        log::info!(
            "[stream_fetcher] key={}: status={}, content_length={:?}",
            intercepted.key, status, intercepted.content_length
        );

        if !status.is_success() {
            return Err(FetchError::Http {
                status: status.as_u16(),
                message: status.canonical_reason().unwrap_or("unknown status").to_string(),
            });
        }

        Ok(FetchedStream::new(intercepted, self.cancel_token.clone()))
    }

    fn cancel(&self) {
        log::debug!("[stream_fetcher] cancel requested for {}", self.request.url);
        self.cancel_token.cancel();
    }

    fn data_source(&self) -> DataSource {
        DataSource::Remote
    }
}

/// Body of a successful fetch.
///
/// Yields `io::Result<Bytes>` chunks. A body cut short of its
/// `Content-Length` ends with an `UnexpectedEof` error; a cancelled fetch
/// ends with an `Interrupted` error.
pub struct FetchedStream {
    key: String,
    url: Url,
    content_length: Option<u64>,
    content_type: Option<String>,
    content_disposition: Option<String>,
    body: LengthCheckedStream<ProgressStream<BodyStream>>,
    cancelled: Pin<Box<WaitForCancellationFutureOwned>>,
    finished: bool,
}

impl FetchedStream {
    fn new(response: InterceptedResponse, cancel_token: CancellationToken) -> Self {
        let header = |name: reqwest::header::HeaderName| {
            response
                .headers
                .get(name)
                .and_then(|v| v.to_str().ok())
                .map(|s| s.to_string())
        };
        let content_type = header(reqwest::header::CONTENT_TYPE);
        let content_disposition = header(reqwest::header::CONTENT_DISPOSITION);

        Self {
            key: response.key,
            url: response.url,
            content_length: response.content_length,
            content_type,
            content_disposition,
            body: LengthCheckedStream::new(response.body, response.content_length),
            cancelled: Box::pin(cancel_token.cancelled_owned()),
            finished: false,
        }
    }

    /// The progress key this body reports under.
    pub fn key(&self) -> &str {
        &self.key
    }

    /// URL the body was actually served from, after redirects.
    pub fn url(&self) -> &Url {
        &self.url
    }

    pub fn content_length(&self) -> Option<u64> {
        self.content_length
    }

    pub fn content_type(&self) -> Option<&str> {
        self.content_type.as_deref()
    }

    /// Local file name suggested by the response headers or the URL.
    pub fn file_name(&self) -> String {
        suggest_file_name(self.url.as_str(), self.content_disposition.as_deref())
    }

    /// Adapts the body to `tokio::io::AsyncRead`.
    pub fn into_async_read(self) -> StreamReader<Self, Bytes> {
        StreamReader::new(self)
    }

    /// Reads the whole body into memory.
    pub async fn collect_bytes(mut self) -> Result<Vec<u8>, FetchError> {
        // Content-Length is server-controlled; only trust it up to a cap.
        let reserve = self
            .content_length
            .and_then(|n| usize::try_from(n).ok())
            .map_or(0, |n| n.min(MAX_PREALLOCATION));
        let mut out = Vec::with_capacity(reserve);
        while let Some(chunk) = self.next().await {
            out.extend_from_slice(&chunk?);
        }
        Ok(out)
    }
}

impl Stream for FetchedStream {
    type Item = io::Result<Bytes>;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        let this = &mut *self;
        if this.finished {
            return Poll::Ready(None);
        }
        if this.cancelled.as_mut().poll(cx).is_ready() {
            this.finished = true;
            log::info!("[fetched_stream] key={}: cancelled mid-body", this.key);
            return Poll::Ready(Some(Err(io::Error::new(
                io::ErrorKind::Interrupted,
                "fetch cancelled",
            ))));
        }
        match Pin::new(&mut this.body).poll_next(cx) {
            Poll::Ready(None) => {
                this.finished = true;
                Poll::Ready(None)
            }
            other => other,
        }
    }
}
