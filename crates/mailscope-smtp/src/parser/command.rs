//! Client command parsing.

use crate::error::{Error, Result};
use crate::types::{ParsedCommand, Verb};

/// The end-of-data line a client sends to terminate the message payload
/// (`<CRLF>.<CRLF>` on the wire, so a lone `.` once framed).
pub const DATA_TERMINATOR: &[u8] = b".";

/// Returns `true` if a payload line is the data terminator.
#[must_use]
pub fn is_data_terminator(line: &[u8]) -> bool {
    line == DATA_TERMINATOR
}

/// Parses a complete client line into a command.
///
/// The line is split at the first SP run into a verb token and the raw
/// argument tail. Unknown verbs classify as [`Verb::Other`] and still
/// produce a valid command; only a line with no verb token at all is an
/// error, which callers count and drop without terminating the session.
///
/// # Errors
///
/// Returns [`Error::EmptyCommand`] for an empty or all-whitespace line and
/// [`Error::InvalidVerb`] when the verb token is not valid UTF-8.
pub fn parse_command(line: &[u8]) -> Result<ParsedCommand> {
    let (verb_bytes, arg_bytes) = match line.iter().position(|&byte| byte == b' ') {
        Some(index) => (&line[..index], &line[index + 1..]),
        None => (line, &line[line.len()..]),
    };
    if verb_bytes.is_empty() {
        return Err(Error::EmptyCommand);
    }
    let token = std::str::from_utf8(verb_bytes).map_err(|_| Error::InvalidVerb)?;
    let args = String::from_utf8_lossy(arg_bytes).trim_start().to_string();
    Ok(ParsedCommand::new(
        Verb::from_token(token),
        args,
        line.len(),
    ))
}
