use async_trait::async_trait;

use crate::fetcher::stream_fetcher::FetchedStream;
use crate::types::types::{DataSource, FetchError};

/// A one-shot loader for a single resource.
///
/// Resources held by a returned stream are released when it is dropped.
#[async_trait]
pub trait DataFetcher: Send + Sync {
    /// Issues the request and returns the body once headers have arrived.
    async fn load_data(&self) -> Result<FetchedStream, FetchError>;

    /// Aborts the fetch. Safe to call from any thread, at any time, any
    /// number of times.
    fn cancel(&self);

    fn data_source(&self) -> DataSource;
}
