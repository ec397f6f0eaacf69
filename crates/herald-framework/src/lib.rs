//! # Herald Framework
//!
//! Command plumbing for Herald bots.
//!
//! This layer provides:
//! - Definitions: [`Source`], [`ModuleDefinition`] and [`CommandDefinition`]
//!   builders with inheritable [`Defaults`]
//! - The merge engine that turns ordered sources into a [`ResolvedTree`]
//! - The [`router`] that matches invoke text against a resolved tree
//! - The execution [`pipeline`]: typing indicator, channel and permission
//!   checks, throttling, restrictions, argument parsing and the handler
//! - Axum-style [`Handler`]s with [`FromContext`] extractors
//! - Argument configs, including clap-based parsing (with `clap` feature)
//!
//! ```rust,ignore
//! use herald::prelude::*;
//!
//! async fn ping() -> &'static str {
//!     "pong"
//! }
//!
//! let repository = PluginRepository::new(
//!     Source::new("builtin").command(CommandDefinition::new("ping", ping)),
//! );
//! let pipeline = Pipeline::builder().build();
//!
//! let tree = repository.resolve(&event).await;
//! let route = route("ping", &tree)?;
//! let ctx = InvokeContext::from_route(event, bot, "!", route);
//! pipeline.execute(Arc::new(ctx)).await;
//! ```

pub mod args;
pub mod context;
pub mod definition;
pub mod error;
pub mod extractor;
pub mod handler;
pub mod merge;
pub mod pipeline;
pub mod prefix;
pub mod repository;
pub mod restriction;
pub mod router;
pub mod tree;

#[cfg(test)]
mod testing;

pub use args::{ArgConfig, BoxedArgConfig, NoArgs, ParsedArgs, RawArgs, ShellArgs};
pub use context::InvokeContext;
pub use definition::{CommandDefinition, Defaults, LibraryDefaults, ModuleDefinition, Source};
pub use error::{ExtractError, ExtractResult};
pub use extractor::{Args, FromContext, State};
pub use handler::{BoxedHandler, Handler, HandlerResult, IntoReply, into_handler};
pub use merge::merge;
pub use pipeline::{
    ErrorHandler, Middleware, Next, Outcome, PanicHandler, Pipeline, PipelineBuilder,
    middleware_fn,
};
pub use prefix::{PrefixMatcher, Stripped};
pub use repository::{BoxedProvider, PluginProvider, PluginRepository};
pub use restriction::{BoxedRestriction, Restriction};
pub use router::{Route, route};
pub use tree::{
    CommandId, CommandRef, ModuleId, Provenance, ResolvedCommand, ResolvedModule, ResolvedTree,
    UnavailableSource,
};

#[cfg(feature = "clap")]
pub use args::ClapArgs;
