//! Process-wide metrics aggregation.
//!
//! Sessions never expose their internal state; they report through the
//! [`MetricsSink`] seam and the aggregator owns every counter. All counters
//! are increment-only atomics, independent per key, so concurrent sessions
//! never serialize against one another. Readers observe eventually
//! consistent totals.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use dashmap::DashMap;

use mailscope_smtp::{ReplyCode, Verb};

/// A protocol-sequencing anomaly observed by a session.
///
/// Anomalies are counted, never fatal: the session resolves each one with
/// the most forgiving reinterpretation and keeps forwarding traffic.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Anomaly {
    /// MAIL while a transaction was already open; the open transaction is
    /// abandoned and a fresh one started.
    NestedTransactionStart,
    /// RCPT with no open transaction; ignored for transaction purposes.
    RecipientWithoutTransaction,
    /// DATA with no open transaction or an empty recipient set; not armed.
    DataWithoutRecipient,
}

/// Sink for session events.
///
/// Every method is a no-op by default so tests can implement only what
/// they observe. [`MetricsAggregator`] implements the full set.
pub trait MetricsSink {
    /// A connection was opened.
    fn on_connect(&self) {}

    /// The server greeting arrived.
    fn on_connect_reply(&self, _code: ReplyCode) {}

    /// A client command was parsed and queued.
    fn on_command(&self, _verb: &Verb) {}

    /// A reply was correlated with a queued command.
    fn on_command_reply(&self, _verb: &Verb, _code: ReplyCode) {}

    /// The data terminator was seen; a commit outcome is now pending.
    fn on_commit(&self) {}

    /// The commit outcome reply arrived.
    fn on_commit_reply(&self, _code: ReplyCode) {}

    /// A command or reply line failed to parse.
    fn on_parse_error(&self) {}

    /// A protocol-sequencing anomaly was observed.
    fn on_anomaly(&self, _anomaly: Anomaly) {}

    /// The connection closed before this queued command got its reply.
    fn on_dangling_command(&self, _verb: &Verb) {}

    /// A reply arrived with nothing queued to correlate it against.
    fn on_orphan_reply(&self) {}

    /// The connection closed with a transaction still open.
    fn on_implicit_abort(&self) {}

    /// An open transaction was discarded without a terminal outcome.
    fn on_transaction_abandoned(&self) {}
}

impl<T: MetricsSink> MetricsSink for Arc<T> {
    fn on_connect(&self) {
        self.as_ref().on_connect();
    }

    fn on_connect_reply(&self, code: ReplyCode) {
        self.as_ref().on_connect_reply(code);
    }

    fn on_command(&self, verb: &Verb) {
        self.as_ref().on_command(verb);
    }

    fn on_command_reply(&self, verb: &Verb, code: ReplyCode) {
        self.as_ref().on_command_reply(verb, code);
    }

    fn on_commit(&self) {
        self.as_ref().on_commit();
    }

    fn on_commit_reply(&self, code: ReplyCode) {
        self.as_ref().on_commit_reply(code);
    }

    fn on_parse_error(&self) {
        self.as_ref().on_parse_error();
    }

    fn on_anomaly(&self, anomaly: Anomaly) {
        self.as_ref().on_anomaly(anomaly);
    }

    fn on_dangling_command(&self, verb: &Verb) {
        self.as_ref().on_dangling_command(verb);
    }

    fn on_orphan_reply(&self) {
        self.as_ref().on_orphan_reply();
    }

    fn on_implicit_abort(&self) {
        self.as_ref().on_implicit_abort();
    }

    fn on_transaction_abandoned(&self) {
        self.as_ref().on_transaction_abandoned();
    }
}

/// An increment-only counter.
#[derive(Debug, Default)]
struct Counter(AtomicU64);

impl Counter {
    fn inc(&self) {
        self.0.fetch_add(1, Ordering::Relaxed);
    }

    fn get(&self) -> u64 {
        self.0.load(Ordering::Relaxed)
    }
}

/// Process-wide SMTP counters fed by every active session.
///
/// Aggregate totals live in fixed atomic fields. Per-verb and per-code
/// breakdowns are keyed dynamically and maintained only when
/// `detailed_stats` is enabled, trading memory and CPU for granularity.
#[derive(Debug)]
pub struct MetricsAggregator {
    detailed: bool,

    connections_total: Counter,
    connections_parse_errors_total: Counter,
    connects_total: Counter,
    connects_replies_total: Counter,
    connects_replies_positive_total: Counter,
    connects_replies_negative_total: Counter,
    commands_total: Counter,
    commands_replies_total: Counter,
    commands_replies_positive_total: Counter,
    commands_replies_negative_total: Counter,
    commands_dangling_total: Counter,
    replies_orphan_total: Counter,
    anomalies_nested_transaction_start_total: Counter,
    anomalies_recipient_without_transaction_total: Counter,
    anomalies_data_without_recipient_total: Counter,
    transactions_commits_total: Counter,
    transactions_commits_replies_total: Counter,
    transactions_commits_replies_positive_total: Counter,
    transactions_commits_replies_negative_total: Counter,
    transactions_implicit_aborts_total: Counter,
    transactions_abandoned_total: Counter,
    mails_total: Counter,
    mails_sent_total: Counter,
    mails_rejected_total: Counter,

    per_key: DashMap<String, AtomicU64>,
}

impl MetricsAggregator {
    /// Creates an aggregator.
    ///
    /// `detailed` gates whether per-verb/per-code breakdowns are kept.
    #[must_use]
    pub fn new(detailed: bool) -> Self {
        Self {
            detailed,
            connections_total: Counter::default(),
            connections_parse_errors_total: Counter::default(),
            connects_total: Counter::default(),
            connects_replies_total: Counter::default(),
            connects_replies_positive_total: Counter::default(),
            connects_replies_negative_total: Counter::default(),
            commands_total: Counter::default(),
            commands_replies_total: Counter::default(),
            commands_replies_positive_total: Counter::default(),
            commands_replies_negative_total: Counter::default(),
            commands_dangling_total: Counter::default(),
            replies_orphan_total: Counter::default(),
            anomalies_nested_transaction_start_total: Counter::default(),
            anomalies_recipient_without_transaction_total: Counter::default(),
            anomalies_data_without_recipient_total: Counter::default(),
            transactions_commits_total: Counter::default(),
            transactions_commits_replies_total: Counter::default(),
            transactions_commits_replies_positive_total: Counter::default(),
            transactions_commits_replies_negative_total: Counter::default(),
            transactions_implicit_aborts_total: Counter::default(),
            transactions_abandoned_total: Counter::default(),
            mails_total: Counter::default(),
            mails_sent_total: Counter::default(),
            mails_rejected_total: Counter::default(),
            per_key: DashMap::new(),
        }
    }

    /// Returns `true` if per-verb/per-code breakdowns are maintained.
    #[must_use]
    pub const fn is_detailed(&self) -> bool {
        self.detailed
    }

    fn inc_key(&self, name: String) {
        self.per_key
            .entry(name)
            .or_default()
            .fetch_add(1, Ordering::Relaxed);
    }

    fn fixed(&self) -> [(&'static str, &Counter); 24] {
        [
            ("smtp.connections.total", &self.connections_total),
            (
                "smtp.connections.parse_errors.total",
                &self.connections_parse_errors_total,
            ),
            ("smtp.connects.total", &self.connects_total),
            ("smtp.connects.replies.total", &self.connects_replies_total),
            (
                "smtp.connects.replies.positive.total",
                &self.connects_replies_positive_total,
            ),
            (
                "smtp.connects.replies.negative.total",
                &self.connects_replies_negative_total,
            ),
            ("smtp.commands.total", &self.commands_total),
            ("smtp.commands.replies.total", &self.commands_replies_total),
            (
                "smtp.commands.replies.positive.total",
                &self.commands_replies_positive_total,
            ),
            (
                "smtp.commands.replies.negative.total",
                &self.commands_replies_negative_total,
            ),
            ("smtp.commands.dangling.total", &self.commands_dangling_total),
            ("smtp.replies.orphan.total", &self.replies_orphan_total),
            (
                "smtp.anomalies.nested_transaction_start.total",
                &self.anomalies_nested_transaction_start_total,
            ),
            (
                "smtp.anomalies.recipient_without_transaction.total",
                &self.anomalies_recipient_without_transaction_total,
            ),
            (
                "smtp.anomalies.data_without_recipient.total",
                &self.anomalies_data_without_recipient_total,
            ),
            (
                "smtp.transactions.commits.total",
                &self.transactions_commits_total,
            ),
            (
                "smtp.transactions.commits.replies.total",
                &self.transactions_commits_replies_total,
            ),
            (
                "smtp.transactions.commits.replies.positive.total",
                &self.transactions_commits_replies_positive_total,
            ),
            (
                "smtp.transactions.commits.replies.negative.total",
                &self.transactions_commits_replies_negative_total,
            ),
            (
                "smtp.transactions.implicit_aborts.total",
                &self.transactions_implicit_aborts_total,
            ),
            (
                "smtp.transactions.abandoned.total",
                &self.transactions_abandoned_total,
            ),
            ("smtp.mails.total", &self.mails_total),
            ("smtp.mails.sent.total", &self.mails_sent_total),
            ("smtp.mails.rejected.total", &self.mails_rejected_total),
        ]
    }

    /// Current value of a named counter.
    ///
    /// Detailed keys that were never incremented return `None`.
    #[must_use]
    pub fn value(&self, name: &str) -> Option<u64> {
        for (fixed_name, counter) in self.fixed() {
            if fixed_name == name {
                return Some(counter.get());
            }
        }
        self.per_key
            .get(name)
            .map(|entry| entry.load(Ordering::Relaxed))
    }

    /// Eventually consistent snapshot of every counter, sorted by name.
    #[must_use]
    pub fn snapshot(&self) -> Vec<(String, u64)> {
        let mut out: Vec<(String, u64)> = self
            .fixed()
            .into_iter()
            .map(|(name, counter)| (name.to_string(), counter.get()))
            .collect();
        for entry in &self.per_key {
            out.push((entry.key().clone(), entry.value().load(Ordering::Relaxed)));
        }
        out.sort_unstable();
        out
    }
}

impl MetricsSink for MetricsAggregator {
    fn on_connect(&self) {
        self.connections_total.inc();
        self.connects_total.inc();
    }

    fn on_connect_reply(&self, code: ReplyCode) {
        self.connects_replies_total.inc();
        if code.is_positive() {
            self.connects_replies_positive_total.inc();
        } else if code.is_negative() {
            self.connects_replies_negative_total.inc();
        }
        if self.detailed {
            self.inc_key(format!("smtp.connects.reply.{code}.total"));
        }
    }

    fn on_command(&self, verb: &Verb) {
        self.commands_total.inc();
        if self.detailed {
            self.inc_key(format!("smtp.command.{verb}.total"));
        }
    }

    fn on_command_reply(&self, verb: &Verb, code: ReplyCode) {
        self.commands_replies_total.inc();
        if code.is_positive() {
            self.commands_replies_positive_total.inc();
        } else if code.is_negative() {
            self.commands_replies_negative_total.inc();
        }
        if self.detailed {
            self.inc_key(format!("smtp.command.{verb}.replies.total"));
            self.inc_key(format!("smtp.command.{verb}.reply.{code}.total"));
            if code.is_positive() {
                self.inc_key(format!("smtp.command.{verb}.replies.positive.total"));
            } else if code.is_negative() {
                self.inc_key(format!("smtp.command.{verb}.replies.negative.total"));
            }
        }
    }

    fn on_commit(&self) {
        self.transactions_commits_total.inc();
        self.mails_total.inc();
    }

    fn on_commit_reply(&self, code: ReplyCode) {
        self.transactions_commits_replies_total.inc();
        if code.is_positive() {
            self.transactions_commits_replies_positive_total.inc();
            self.mails_sent_total.inc();
        } else if code.is_negative() {
            self.transactions_commits_replies_negative_total.inc();
            self.mails_rejected_total.inc();
        }
        if self.detailed {
            self.inc_key(format!("smtp.transactions.commits.reply.{code}.total"));
        }
    }

    fn on_parse_error(&self) {
        self.connections_parse_errors_total.inc();
    }

    fn on_anomaly(&self, anomaly: Anomaly) {
        match anomaly {
            Anomaly::NestedTransactionStart => {
                self.anomalies_nested_transaction_start_total.inc();
            }
            Anomaly::RecipientWithoutTransaction => {
                self.anomalies_recipient_without_transaction_total.inc();
            }
            Anomaly::DataWithoutRecipient => {
                self.anomalies_data_without_recipient_total.inc();
            }
        }
    }

    fn on_dangling_command(&self, verb: &Verb) {
        self.commands_dangling_total.inc();
        if self.detailed {
            self.inc_key(format!("smtp.command.{verb}.dangling.total"));
        }
    }

    fn on_orphan_reply(&self) {
        self.replies_orphan_total.inc();
    }

    fn on_implicit_abort(&self) {
        self.transactions_implicit_aborts_total.inc();
    }

    fn on_transaction_abandoned(&self) {
        self.transactions_abandoned_total.inc();
    }
}
