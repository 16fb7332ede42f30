mod loader;
mod types;

pub use loader::{load_from_path, read_from_path, validate_config};
pub use types::{
    AccessConfig, Config, FingerprintConfig, LoggingConfig, SecurityConfig, TelemetryConfig,
    TimeoutConfig, TlsConfig,
};
