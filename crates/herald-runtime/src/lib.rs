//! Herald Runtime - configuration, logging and the message loop.
//!
//! This crate provides:
//! - Layered configuration (`HeraldConfig`, `ConfigLoader`) backed by figment
//! - Logging setup on `tracing-subscriber` (`LoggingBuilder`)
//! - The message loop (`HeraldRuntime`) that turns inbound messages into
//!   pipeline runs
//!
//! ```ignore
//! use herald::prelude::*;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let runtime = HeraldRuntime::builder()
//!         .source(Source::new("builtin").command(CommandDefinition::new("ping", ping)))
//!         .build()?;
//!
//!     let (tx, rx) = tokio::sync::mpsc::channel(64);
//!     let bot = MyClient::connect(tx).await?;
//!
//!     // Run until Ctrl+C
//!     runtime.run(bot, rx).await?;
//!     Ok(())
//! }
//! ```

pub mod config;
pub mod error;
pub mod logging;
pub mod runtime;

pub use config::{ConfigError, ConfigLoader, ConfigResult, HeraldConfig, Profile};
pub use error::{RuntimeError, RuntimeResult};
pub use logging::{LoggingBuilder, SpanEvents};
pub use runtime::{HeraldRuntime, RuntimeBuilder};

// Re-export tracing for use by plugin crates
pub use tracing;
pub use tracing_subscriber;
