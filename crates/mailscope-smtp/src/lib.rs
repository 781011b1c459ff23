//! # mailscope-smtp
//!
//! SMTP wire-protocol parsing for the mailscope traffic filter.
//!
//! This crate contains the pure, allocation-light protocol layer: it turns
//! arbitrary byte chunks into complete protocol lines, classifies client
//! lines into commands and server lines into (possibly multi-line) replies,
//! and exposes the reply-code classification used for metrics. It performs
//! no I/O and holds no shared state; everything here is a synchronous
//! transformation over buffered bytes.
//!
//! ## Modules
//!
//! - [`framer`]: CRLF line framing across chunk boundaries
//! - [`parser`]: command and reply parsers
//! - [`types`]: core SMTP types (verbs, commands, replies)
//!
//! ## Quick Start
//!
//! ```
//! use mailscope_smtp::framer::LineFramer;
//! use mailscope_smtp::parser::parse_command;
//! use mailscope_smtp::types::Verb;
//!
//! let mut framer = LineFramer::new();
//! let lines = framer.push(b"EHLO client.example.com\r\nNO");
//! assert_eq!(lines.len(), 1);
//!
//! let cmd = parse_command(&lines[0]).unwrap();
//! assert_eq!(*cmd.verb(), Verb::Ehlo);
//! assert_eq!(cmd.args(), "client.example.com");
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![forbid(unsafe_code)]

mod error;
pub mod framer;
pub mod parser;
pub mod types;

pub use error::{Error, Result};
pub use framer::LineFramer;
pub use parser::{ReplyAccumulator, is_data_terminator, parse_command};
pub use types::{ParsedCommand, Reply, ReplyCode, Verb};

/// SMTP protocol revision this crate parses.
pub const SMTP_VERSION: &str = "SMTP/ESMTP (RFC 5321)";
