pub mod guards;
pub mod manager;
pub mod stream;

pub use guards::ConnectionGuard;
pub use manager::{ConnectionError, ConnectionManager};
pub use stream::PrefixedStream;
