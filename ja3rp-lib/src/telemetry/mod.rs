pub mod endpoints;
pub mod health;
pub mod metrics;
pub mod server;
pub mod tracing;

pub use endpoints::{metrics_response, observability_response};
pub use health::health_check_response;
pub use metrics::{init_metrics, Metrics};
pub use server::{serve_observability, start_observability_server};
pub use tracing::init_tracing;
