//! Matches invoke text against a resolved tree.
//!
//! The router reads one whitespace-delimited word at a time without
//! tokenizing the rest of the text. At every level commands are checked
//! before modules, so a command shadows a sibling module of the same name.
//!
//! ```text
//! "mod ban @User reason text"
//!  ^^^ module `mod` -> descend
//!      ^^^ command `mod.ban` -> remainder "@User reason text"
//! ```

use std::sync::Arc;

use herald_core::NotFound;
use tracing::trace;

use crate::tree::{CommandRef, ResolvedTree};

/// A successful match.
#[derive(Debug, Clone)]
pub struct Route<'a> {
    pub command: CommandRef,
    /// The name or alias that matched.
    pub invoked_with: &'a str,
    /// The text after the matched word, leading whitespace removed.
    pub remainder: &'a str,
}

/// Routes `text` (prefix already stripped) to a command.
pub fn route<'a>(text: &'a str, tree: &Arc<ResolvedTree>) -> Result<Route<'a>, NotFound> {
    let mut rest = text.trim_start();
    let mut level = tree.root();

    loop {
        let (word, after) = split_word(rest);
        if word.is_empty() {
            return Err(NotFound);
        }

        if let Some(id) = tree.find_command(level, word) {
            let command = CommandRef::new(Arc::clone(tree), id);
            trace!(command = %command.identifier(), invoked_with = word, "Routed invoke");
            return Ok(Route {
                command,
                invoked_with: word,
                remainder: after.trim_start(),
            });
        }

        let module = tree.find_module(level, word).ok_or(NotFound)?;
        level = tree.children(module);
        rest = after.trim_start();
    }
}

/// Splits off the first word of `text`, which must not start with
/// whitespace.
fn split_word(text: &str) -> (&str, &str) {
    match text.find(char::is_whitespace) {
        Some(end) => text.split_at(end),
        None => (text, ""),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::definition::{CommandDefinition, ModuleDefinition, Source};
    use crate::merge::merge;
    use crate::testing::noop;
    use tokio_test::{assert_err, assert_ok};

    fn tree(sources: &[Source]) -> Arc<ResolvedTree> {
        Arc::new(merge(sources, &Default::default()))
    }

    #[test]
    fn test_routes_into_module() {
        let tree = tree(&[Source::new("builtin").module(
            ModuleDefinition::new("mod").command(CommandDefinition::new("ban", noop)),
        )]);

        let route = assert_ok!(route("mod ban @User reason text", &tree));
        assert_eq!(route.command.identifier(), "mod.ban");
        assert_eq!(route.invoked_with, "ban");
        assert_eq!(route.remainder, "@User reason text");
    }

    #[test]
    fn test_command_shadows_module() {
        let tree = tree(&[Source::new("builtin")
            .command(CommandDefinition::new("x", noop))
            .module(ModuleDefinition::new("x").command(CommandDefinition::new("y", noop)))]);

        let route = assert_ok!(route("x y z", &tree));
        assert_eq!(route.command.identifier(), "x");
        assert_eq!(route.remainder, "y z");
    }

    #[test]
    fn test_alias_and_whitespace() {
        let tree = tree(&[Source::new("builtin")
            .command(CommandDefinition::new("help", noop).alias("h"))]);

        let matched = assert_ok!(route("  h \t  topic  ", &tree));
        assert_eq!(matched.command.name(), "help");
        assert_eq!(matched.invoked_with, "h");
        assert_eq!(matched.remainder, "topic  ");

        let matched = assert_ok!(route("help", &tree));
        assert_eq!(matched.remainder, "");
    }

    #[test]
    fn test_not_found() {
        let tree = tree(&[Source::new("builtin").module(
            ModuleDefinition::new("mod").command(CommandDefinition::new("ban", noop)),
        )]);

        assert_err!(route("", &tree));
        assert_err!(route("unknown", &tree));
        assert_err!(route("mod", &tree));
        assert_err!(route("mod kick", &tree));
        // Names are matched exactly.
        assert_err!(route("MOD ban", &tree));
    }
}
