//! Command and reply parsers.
//!
//! Both parsers consume complete lines produced by the
//! [framer](crate::framer) and never perform I/O. Command parsing is a
//! stateless function; reply parsing keeps per-direction accumulator state
//! so a multi-line reply correlates as a single unit.

mod command;
mod reply;

pub use command::{DATA_TERMINATOR, is_data_terminator, parse_command};
pub use reply::{MAX_REPLY_LINES, ReplyAccumulator};
