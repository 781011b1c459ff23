//! Host-facing filter surface.
//!
//! The host proxy owns the transport: it delivers raw chunks in network
//! arrival order with serialized delivery per connection, and forwards the
//! original bytes to the peer itself. The filter only observes. One
//! [`SmtpFilter`] exists per connection; the [`FilterFactory`] holds what
//! all of them share.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use tracing::debug;

use crate::config::{ConfigError, FilterConfig};
use crate::metrics::MetricsAggregator;
use crate::session::Session;

static NEXT_INSTANCE_ID: AtomicU64 = AtomicU64::new(1);

/// Creates per-connection filter instances over a shared configuration and
/// a shared metrics aggregator.
#[derive(Debug)]
pub struct FilterFactory {
    config: FilterConfig,
    metrics: Arc<MetricsAggregator>,
}

impl FilterFactory {
    /// Creates a factory from an already-parsed configuration.
    #[must_use]
    pub fn new(config: FilterConfig) -> Self {
        Self {
            config,
            metrics: Arc::new(MetricsAggregator::new(config.detailed_stats)),
        }
    }

    /// Creates a factory from the raw JSON configuration blob the host
    /// provides at load time.
    ///
    /// # Errors
    ///
    /// Returns an error if the blob is not valid configuration JSON.
    pub fn from_raw_config(raw: &[u8]) -> Result<Self, ConfigError> {
        Ok(Self::new(FilterConfig::try_from(raw)?))
    }

    /// Creates a filter for a newly accepted connection.
    #[must_use]
    pub fn new_filter(&self) -> SmtpFilter {
        SmtpFilter {
            instance_id: NEXT_INSTANCE_ID.fetch_add(1, Ordering::Relaxed),
            config: self.config,
            session: Session::new(Arc::clone(&self.metrics)),
        }
    }

    /// The process-wide counters fed by every filter instance.
    #[must_use]
    pub fn metrics(&self) -> &Arc<MetricsAggregator> {
        &self.metrics
    }
}

/// Observes one SMTP connection.
///
/// All methods are purely observational: the host forwards the original
/// bytes unmodified and unreordered regardless of what the filter makes of
/// them.
#[derive(Debug)]
pub struct SmtpFilter {
    instance_id: u64,
    config: FilterConfig,
    session: Session<Arc<MetricsAggregator>>,
}

impl SmtpFilter {
    /// Called when the TCP connection is opened.
    pub fn on_new_connection(&mut self) {
        debug!(
            instance = self.instance_id,
            config = ?self.config,
            "new SMTP connection"
        );
        self.session.on_connect();
    }

    /// Called with each client-to-server chunk, in arrival order.
    pub fn on_client_data(&mut self, chunk: &[u8]) {
        debug!(instance = self.instance_id, len = chunk.len(), "-> chunk");
        self.session.client_data(chunk);
    }

    /// Called with each server-to-client chunk, in arrival order.
    pub fn on_server_data(&mut self, chunk: &[u8]) {
        debug!(instance = self.instance_id, len = chunk.len(), "<- chunk");
        self.session.server_data(chunk);
    }

    /// Called when the connection closes; flushes dangling-command and
    /// implicit-abort accounting.
    pub fn on_connection_closed(&mut self) {
        debug!(instance = self.instance_id, "connection closed");
        self.session.on_close();
    }

    /// The session driven by this filter.
    #[must_use]
    pub const fn session(&self) -> &Session<Arc<MetricsAggregator>> {
        &self.session
    }
}
