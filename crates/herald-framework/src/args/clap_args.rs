use std::marker::PhantomData;

use async_trait::async_trait;
use clap::{CommandFactory, Parser};
use clap::error::ErrorKind;
use herald_core::ArgumentError;

use super::{ArgConfig, ParsedArgs, shell_split};
use crate::context::InvokeContext;

/// Parses arguments with a `clap` parser. Parses to `T`.
///
/// The argument text is split with [`shell_split`] and the invoked name is
/// used as the program name, so `--help` output reads like the command.
/// Help and version requests become [`ArgumentError::Help`]; every other
/// clap error becomes [`ArgumentError::Invalid`] with clap's rendered message.
///
/// ```rust,ignore
/// #[derive(clap::Parser)]
/// struct BanArgs {
///     member: String,
///     #[arg(short, long, default_value_t = 0)]
///     days: u8,
/// }
///
/// CommandDefinition::new("ban", ban).args(ClapArgs::<BanArgs>::new())
/// ```
pub struct ClapArgs<T> {
    _marker: PhantomData<fn() -> T>,
}

impl<T> ClapArgs<T> {
    pub fn new() -> Self {
        Self {
            _marker: PhantomData,
        }
    }
}

impl<T> Default for ClapArgs<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> Clone for ClapArgs<T> {
    fn clone(&self) -> Self {
        Self::new()
    }
}

#[async_trait]
impl<T> ArgConfig for ClapArgs<T>
where
    T: Parser + Send + Sync + 'static,
{
    async fn parse(&self, ctx: &InvokeContext, raw: &str) -> Result<ParsedArgs, ArgumentError> {
        let mut argv = vec![ctx.invoked_with().to_owned()];
        argv.extend(shell_split(raw)?);

        match T::try_parse_from(argv) {
            Ok(parsed) => Ok(ParsedArgs::new(parsed)),
            Err(err) => match err.kind() {
                ErrorKind::DisplayHelp | ErrorKind::DisplayVersion => {
                    Err(ArgumentError::Help(err.to_string()))
                }
                _ => Err(ArgumentError::Invalid(err.to_string())),
            },
        }
    }

    fn usage(&self) -> Option<String> {
        Some(T::command().render_usage().to_string())
    }
}
