//! Configuration for Herald bots.
//!
//! Settings are layered with figment from defaults, config files and
//! `HERALD_*` environment variables, then validated; see [`ConfigLoader`].

pub mod error;
pub mod loader;
pub mod schema;
pub mod validation;

pub use error::{ConfigError, ConfigResult};
pub use loader::{ConfigLoader, Profile};
pub use schema::{
    BotConfig, DefaultsConfig, HeraldConfig, LogFormat, LogLevel, LogOutput, LogRotation,
    LoggingConfig, PipelineConfig, SpanEventConfig, ThrottleConfig,
};
pub use validation::validate_config;
