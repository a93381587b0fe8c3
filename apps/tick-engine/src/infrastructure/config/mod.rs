//! Configuration Module
//!
//! Environment-driven configuration for the engine binary.

mod settings;

pub use settings::{
    ConfigError, Credentials, EngineConfig, StoreSettings, StreamSettings, Venue,
};
