use std::sync::Arc;

use reqwest::Client;

use crate::config::FetchConfig;
use crate::fetcher::interceptor::ProgressInterceptor;
use crate::fetcher::stream_fetcher::StreamFetcher;
use crate::progress::listener::{ProgressListener, ProgressSink};
use crate::progress::registry::ProgressRegistry;
use crate::types::types::{FetchError, FetchRequest};

/// Ties one HTTP client to one progress registry and hands out fetchers
/// whose bodies report into that registry.
///
/// The module does not own the registry exclusively; callers keep their own
/// `Arc` to register and forget listeners.
pub struct ProgressFetchModule {
    client: Client,
    registry: Arc<ProgressRegistry>,
    interceptor: ProgressInterceptor,
}

impl ProgressFetchModule {
    pub fn new(config: &FetchConfig, registry: Arc<ProgressRegistry>) -> Result<Self, FetchError> {
        Ok(Self::with_client(config.build_client()?, registry))
    }

    /// Uses an existing client. Clones of a `reqwest::Client` share one
    /// connection pool.
    pub fn with_client(client: Client, registry: Arc<ProgressRegistry>) -> Self {
        let interceptor = ProgressInterceptor::new(Arc::clone(&registry) as Arc<dyn ProgressSink>);
        Self {
            client,
            registry,
            interceptor,
        }
    }

    /// Whether this module can fetch `request` (plain http/https URLs).
    pub fn handles(&self, request: &FetchRequest) -> bool {
        reqwest::Url::parse(&request.url)
            .map(|u| matches!(u.scheme(), "http" | "https"))
            .unwrap_or(false)
    }

    pub fn fetcher_for(&self, request: FetchRequest) -> StreamFetcher {
        StreamFetcher::new(self.client.clone(), request, self.interceptor.clone())
    }

    pub fn expect(&self, key: impl Into<String>, listener: &Arc<dyn ProgressListener>) {
        self.registry.expect(key, listener);
    }

    pub fn forget(&self, key: &str) {
        self.registry.forget(key);
    }

    pub fn registry(&self) -> &Arc<ProgressRegistry> {
        &self.registry
    }
}
