pub mod data_fetcher;
pub mod disposition;
pub mod headers;
pub mod interceptor;
pub mod length;
pub mod module;
pub mod stream_fetcher;

pub use data_fetcher::DataFetcher;
pub use module::ProgressFetchModule;
pub use stream_fetcher::{FetchedStream, StreamFetcher};
