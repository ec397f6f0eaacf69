//! # Herald
//!
//! A plugin and command framework for chat bots.
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────┐   ┌────────────┐   ┌────────┐   ┌──────────────────────────────────┐
//! │ Platform │──▶│  Runtime   │──▶│ Router │──▶│ Pipeline (own task per message)  │──▶ handler
//! │  client  │   │  (prefix)  │   │        │   │ typing, checks, throttle, args   │
//! └──────────┘   └────────────┘   └────────┘   └──────────────────────────────────┘
//!                      │                ▲
//!                      ▼                │
//!               ┌────────────┐   ┌──────┴───────┐
//!               │ Repository │──▶│ Merged tree  │
//!               │ + providers│   │              │
//!               └────────────┘   └──────────────┘
//! ```
//!
//! - **Sources** describe modules and commands; a repository merges the
//!   built-in source with plugin providers into one resolved tree
//! - **Router** matches invoke text word by word against the tree
//! - **Pipeline** runs the checks and the handler for one invocation,
//!   reporting errors and panics to the invoking user
//! - **Runtime** reads messages, strips prefixes and drives the pipeline
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use herald::prelude::*;
//!
//! async fn roll(Args(sides): Args<String>) -> Result<String, UserError> {
//!     let sides: u32 = sides.parse().map_err(|_| UserError::new("Give me a number."))?;
//!     Ok(format!("You rolled {}", sides / 2 + 1))
//! }
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let runtime = HeraldRuntime::builder()
//!         .source(
//!             Source::new("builtin").command(
//!                 CommandDefinition::new("roll", roll)
//!                     .args(RawArgs::required("sides"))
//!                     .throttle(PerUser::new(2, Duration::from_secs(30))),
//!             ),
//!         )
//!         .build()?;
//!
//!     let (tx, rx) = tokio::sync::mpsc::channel(64);
//!     let bot = MyClient::connect(tx).await?;
//!     runtime.run(bot, rx).await?;
//!     Ok(())
//! }
//! ```
//!
//! ## Features
//!
//! - `toml-config`: load `herald.toml` (default)
//! - `yaml-config`: load `herald.yaml`
//! - `json-log`: JSON log output
//! - `clap`: clap-derived argument configs

pub use herald_core as core;
pub use herald_framework as framework;
pub use herald_runtime as runtime;

/// Prelude module for convenient imports.
///
/// ```rust,ignore
/// use herald::prelude::*;
/// ```
pub mod prelude {
    pub use std::sync::Arc;
    pub use std::time::Duration;

    // Runtime - main entry point
    pub use herald_runtime::{HeraldConfig, HeraldRuntime, RuntimeBuilder};

    // Definitions
    pub use herald_framework::{
        CommandDefinition, Defaults, LibraryDefaults, ModuleDefinition, PluginProvider,
        PluginRepository, Source,
    };

    // Handlers and extractors
    pub use herald_framework::{Args, FromContext, InvokeContext, IntoReply, State};

    // Argument configs
    pub use herald_framework::{ArgConfig, NoArgs, RawArgs, ShellArgs};
    #[cfg(feature = "clap")]
    pub use herald_framework::ClapArgs;

    // Restrictions
    pub use herald_framework::Restriction;
    pub use herald_framework::restriction::{
        direct_only, guild_only, user_permissions, users,
    };

    // Pipeline hooks
    pub use herald_framework::{
        ErrorHandler, Middleware, Next, Outcome, PanicHandler, Pipeline, middleware_fn, route,
    };

    // Throttling
    pub use herald_core::throttle::{Global, PerChannel, PerGuild, PerMember, PerUser};
    pub use herald_core::{ThrottleScope, Throttler};

    // Platform types
    pub use herald_core::{
        Author, Bot, BoxedBot, ChannelId, ChannelKind, ChannelTypes, GuildId, MessageEvent,
        Permissions, Reply, UserId,
    };

    // Errors raised by handlers
    pub use herald_core::{BoxError, SilentError, UserError};
}
