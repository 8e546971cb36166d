//! Configuration management subsystem.
//!
//! # Data Flow
//! ```text
//! config file (TOML)
//!     → loader.rs (parse & deserialize)
//!     → validation.rs (semantic checks)
//!     → ServerConfig (validated, immutable)
//!     → shared with all subsystems at startup
//! ```
//!
//! Config is immutable once loaded; all fields have defaults so a
//! minimal config works.

pub mod loader;
pub mod schema;
pub mod validation;

pub use loader::{load_config, ConfigError};
pub use schema::{
    ConnectionConfig, HandlerPoolConfig, LimitsConfig, ListenerConfig, ObservabilityConfig,
    ServerConfig, TimeoutConfig,
};
