//! Core SMTP types.

mod command;
mod reply;
mod verb;

pub use command::ParsedCommand;
pub use reply::{Reply, ReplyCode};
pub use verb::Verb;
