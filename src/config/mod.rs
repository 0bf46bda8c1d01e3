//! Configuration management subsystem.
//!
//! # Data Flow
//! ```text
//! config file (TOML, optional)
//!     → loader.rs (parse & deserialize)
//!     → loader.rs (GATEKEEPER_* environment overrides)
//!     → validation.rs (semantic checks)
//!     → GatekeeperConfig (validated, immutable)
//!     → shared by reference with every pipeline stage
//! ```
//!
//! # Design Decisions
//! - Config is immutable once loaded; limits never change at runtime
//! - All fields have defaults to allow minimal configs
//! - Validation separates syntactic (serde) from semantic checks

pub mod loader;
pub mod schema;
pub mod validation;

pub use loader::{apply_env_overrides, load, load_config, ConfigError};
pub use schema::GatekeeperConfig;
pub use schema::{
    HeadersConfig, ListenerConfig, LogFormat, ObservabilityConfig, RateLimitConfig, StoreConfig,
    TimeoutConfig, UpstreamConfig, ValidationConfig,
};
