pub mod counting;
pub mod delivery;
pub mod listener;
pub mod registry;
pub mod snapshot;
pub mod throttle;

pub use counting::{ProgressReader, ProgressStream};
pub use delivery::{DeliveryContext, DeliveryLoop, DeliveryQueue, DeliveryTask};
pub use listener::{ProgressListener, ProgressSink};
pub use registry::ProgressRegistry;
pub use snapshot::{format_bytes, ProgressUpdate};
