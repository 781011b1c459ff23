//! Parsed client command.

use super::Verb;

/// A parsed client command line.
///
/// Immutable once produced; queued by the session until the matching reply
/// arrives.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedCommand {
    verb: Verb,
    args: String,
    line_len: usize,
}

impl ParsedCommand {
    /// Creates a parsed command.
    #[must_use]
    pub const fn new(verb: Verb, args: String, line_len: usize) -> Self {
        Self {
            verb,
            args,
            line_len,
        }
    }

    /// The command verb.
    #[must_use]
    pub const fn verb(&self) -> &Verb {
        &self.verb
    }

    /// Raw argument text after the verb token.
    #[must_use]
    pub fn args(&self) -> &str {
        &self.args
    }

    /// Length in bytes of the original line, terminator excluded.
    #[must_use]
    pub const fn line_len(&self) -> usize {
        self.line_len
    }
}
