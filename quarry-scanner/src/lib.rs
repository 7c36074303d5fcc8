pub mod crawler;
pub mod error;
pub mod extract;
pub mod prober;
pub mod result;
pub mod transport;

pub use crawler::{Crawler, ProgressCallback};
pub use error::ScanError;
pub use prober::{Prober, ResultCallback, join_word};
pub use result::{Endpoint, EndpointSource, Metadata, ProbeResult};
pub use transport::{Transport, TransportOptions};
