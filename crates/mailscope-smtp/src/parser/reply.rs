//! Server reply parsing and multi-line assembly.

use crate::error::{Error, Result};
use crate::types::{Reply, ReplyCode};

/// Maximum number of accumulated lines per logical reply.
///
/// A run longer than this is treated as a parse error rather than allowed
/// to grow without bound.
pub const MAX_REPLY_LINES: usize = 64;

/// One parsed line of a reply run.
#[derive(Debug)]
struct ReplyLine {
    code: ReplyCode,
    last: bool,
    text: String,
}

impl ReplyLine {
    /// Reads `NNN<sep>text` where `<sep>` is `-` for a continuation line
    /// and SP or end-of-line for the final line of the run.
    fn parse(line: &[u8]) -> Result<Self> {
        if line.len() < 3 {
            return Err(Error::ReplyTooShort(
                String::from_utf8_lossy(line).into_owned(),
            ));
        }
        let (code_bytes, rest) = line.split_at(3);
        if !code_bytes.iter().all(u8::is_ascii_digit) {
            return Err(Error::InvalidReplyCode(
                String::from_utf8_lossy(code_bytes).into_owned(),
            ));
        }
        let code = u16::from(code_bytes[0] - b'0') * 100
            + u16::from(code_bytes[1] - b'0') * 10
            + u16::from(code_bytes[2] - b'0');
        if !(100..=599).contains(&code) {
            return Err(Error::InvalidReplyCode(
                String::from_utf8_lossy(code_bytes).into_owned(),
            ));
        }
        let (last, text) = match rest.first() {
            None => (true, &rest[..]),
            Some(b' ') => (true, &rest[1..]),
            Some(b'-') => (false, &rest[1..]),
            Some(&other) => return Err(Error::InvalidReplySeparator(char::from(other))),
        };
        Ok(Self {
            code: ReplyCode::new(code),
            last,
            text: String::from_utf8_lossy(text).into_owned(),
        })
    }
}

/// Assembles server lines into logical replies.
///
/// One accumulator serves the server-to-client direction of one
/// connection. Continuation lines (`250-...`) are buffered; a [`Reply`] is
/// yielded only once the final line of the run is seen, keyed by the final
/// line's code, so a multi-line reply always correlates as a single unit
/// against a single queued command.
#[derive(Debug, Default)]
pub struct ReplyAccumulator {
    lines: Vec<String>,
}

impl ReplyAccumulator {
    /// Creates an empty accumulator.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Consumes one server line.
    ///
    /// Returns `Ok(None)` while the reply run is still open and
    /// `Ok(Some(reply))` once the final line arrives. Any error resets the
    /// accumulator so the next line starts a fresh run.
    ///
    /// # Errors
    ///
    /// Returns an error for a line without a valid leading 3-digit code in
    /// 100..=599, an invalid separator, or a run exceeding
    /// [`MAX_REPLY_LINES`].
    pub fn push_line(&mut self, line: &[u8]) -> Result<Option<Reply>> {
        let parsed = match ReplyLine::parse(line) {
            Ok(parsed) => parsed,
            Err(err) => {
                self.lines.clear();
                return Err(err);
            }
        };
        if self.lines.len() >= MAX_REPLY_LINES {
            self.lines.clear();
            return Err(Error::ReplyTooLong(MAX_REPLY_LINES));
        }
        self.lines.push(parsed.text);
        if parsed.last {
            let lines = std::mem::take(&mut self.lines);
            return Ok(Some(Reply::new(parsed.code, lines)));
        }
        Ok(None)
    }

    /// Returns `true` if a reply run is currently open.
    #[must_use]
    pub fn is_mid_reply(&self) -> bool {
        !self.lines.is_empty()
    }
}
