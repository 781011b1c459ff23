//! # mailscope
//!
//! An observational SMTP protocol filter: it watches a bidirectional byte
//! stream flowing through a host proxy and produces per-verb,
//! per-reply-code operational metrics without altering the traffic it
//! observes.
//!
//! The filter is fail open by design. Parse errors, pipelining hiccups and
//! protocol-sequencing anomalies all degrade to counter increments; nothing
//! the filter does can reject, reorder or mutate a byte of the connection.
//!
//! ## Architecture
//!
//! ```text
//! raw chunks ──→ LineFramer ──→ command / reply parsers
//!                                       │
//!                                       ▼
//!                              Session state machine     (one per connection)
//!                                       │ events
//!                                       ▼
//!                              MetricsAggregator          (process-wide)
//! ```
//!
//! Framing and parsing live in [`mailscope_smtp`]; this crate adds the
//! per-connection [`Session`] state machine, the shared
//! [`MetricsAggregator`], configuration, and the host-facing
//! [`SmtpFilter`]/[`FilterFactory`] surface.
//!
//! ## Quick Start
//!
//! ```
//! use mailscope::{FilterConfig, FilterFactory};
//!
//! let factory = FilterFactory::new(FilterConfig { detailed_stats: true });
//! let mut filter = factory.new_filter();
//!
//! filter.on_new_connection();
//! filter.on_server_data(b"220 smtp.example.com ESMTP\r\n");
//! filter.on_client_data(b"EHLO client.example.com\r\n");
//! filter.on_server_data(b"250 Hello\r\n");
//! filter.on_connection_closed();
//!
//! let metrics = factory.metrics();
//! assert_eq!(metrics.value("smtp.connections.total"), Some(1));
//! assert_eq!(metrics.value("smtp.command.EHLO.total"), Some(1));
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![forbid(unsafe_code)]

pub mod config;
pub mod filter;
pub mod metrics;
pub mod session;

pub use config::{ConfigError, FilterConfig};
pub use filter::{FilterFactory, SmtpFilter};
pub use metrics::{Anomaly, MetricsAggregator, MetricsSink};
pub use session::{Session, SessionPhase, Transaction};
