//! Per-connection session state machine.
//!
//! One [`Session`] instance tracks one SMTP connection: it frames both
//! directions, queues parsed commands, correlates each logical reply with
//! the oldest queued entry (the pipelining contract), and follows the mail
//! transaction lifecycle from MAIL through commit or abort. Everything it
//! learns leaves through the [`MetricsSink`]; the session never touches the
//! bytes the host forwards.
//!
//! The stance throughout is fail open: parse errors and sequencing
//! anomalies degrade to counter increments, never to a terminated
//! connection.

use std::collections::VecDeque;

use tracing::{debug, warn};

use mailscope_smtp::framer::LineFramer;
use mailscope_smtp::parser::{ReplyAccumulator, is_data_terminator, parse_command};
use mailscope_smtp::types::{ParsedCommand, Reply, Verb};

use crate::metrics::{Anomaly, MetricsSink};

/// Connection phase of a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SessionPhase {
    /// Waiting for the server greeting.
    #[default]
    AwaitingGreeting,
    /// Greeting seen; no mail transaction open.
    Ready,
    /// A mail transaction is open.
    InTransaction,
    /// A session-termination verb was seen.
    Closed,
    /// Interpretation stopped after an unrecoverable parse failure or a
    /// protocol change (STARTTLS, accepted unknown verb). Bytes keep
    /// flowing; the session no longer attempts correlation.
    Errored,
}

/// A single mail transaction.
///
/// At most one is open per session. Replacement is always an explicit
/// discard-then-create, never an error unwound through the state machine.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct Transaction {
    /// Raw argument text of the MAIL command (reverse-path).
    pub from: String,
    /// Raw argument text of each RCPT command, in issuance order.
    pub recipients: Vec<String>,
    /// DATA was issued with at least one recipient present.
    pub data_started: bool,
}

impl Transaction {
    fn new(from: String) -> Self {
        Self {
            from,
            recipients: Vec::new(),
            data_started: false,
        }
    }
}

/// An entry awaiting a server reply, in strict issuance order.
#[derive(Debug)]
enum PendingReply {
    /// The greeting the server owes a freshly opened connection.
    Connect,
    /// A queued client command.
    Command(ParsedCommand),
    /// The outcome of a completed data phase.
    Commit,
}

/// Tracks one SMTP connection.
///
/// The host guarantees serialized delivery per connection, so no method
/// here needs interior synchronization; the shared [`MetricsSink`] is the
/// only thing that crosses session boundaries.
#[derive(Debug)]
pub struct Session<S: MetricsSink> {
    phase: SessionPhase,
    client_framer: LineFramer,
    server_framer: LineFramer,
    replies: ReplyAccumulator,
    pending: VecDeque<PendingReply>,
    transaction: Option<Transaction>,
    in_data: bool,
    metrics: S,
}

impl<S: MetricsSink> Session<S> {
    /// Creates a session bound to a metrics sink.
    pub fn new(metrics: S) -> Self {
        Self {
            phase: SessionPhase::AwaitingGreeting,
            client_framer: LineFramer::new(),
            server_framer: LineFramer::new(),
            replies: ReplyAccumulator::new(),
            pending: VecDeque::new(),
            transaction: None,
            in_data: false,
            metrics,
        }
    }

    /// Current connection phase.
    #[must_use]
    pub const fn phase(&self) -> SessionPhase {
        self.phase
    }

    /// The open transaction, if any.
    #[must_use]
    pub const fn transaction(&self) -> Option<&Transaction> {
        self.transaction.as_ref()
    }

    /// Registers the connection and queues the expected server greeting.
    pub fn on_connect(&mut self) {
        self.metrics.on_connect();
        self.pending.push_back(PendingReply::Connect);
    }

    /// Consumes a chunk of client-to-server bytes.
    pub fn client_data(&mut self, chunk: &[u8]) {
        if self.phase == SessionPhase::Errored {
            return;
        }
        for line in self.client_framer.push(chunk) {
            if self.in_data {
                self.payload_line(&line);
            } else {
                self.command_line(&line);
            }
        }
    }

    /// Consumes a chunk of server-to-client bytes.
    pub fn server_data(&mut self, chunk: &[u8]) {
        if self.phase == SessionPhase::Errored {
            return;
        }
        for line in self.server_framer.push(chunk) {
            match self.replies.push_line(&line) {
                Ok(Some(reply)) => self.correlate(&reply),
                Ok(None) => {}
                Err(err) => {
                    warn!(error = %err, "unreadable reply stream, interpretation stops");
                    self.metrics.on_parse_error();
                    self.phase = SessionPhase::Errored;
                    return;
                }
            }
            if self.phase == SessionPhase::Errored {
                return;
            }
        }
    }

    /// Flushes dangling-command accounting on transport closure.
    pub fn on_close(&mut self) {
        while let Some(entry) = self.pending.pop_front() {
            if let PendingReply::Command(cmd) = entry {
                debug!(verb = %cmd.verb(), "command dangling at close");
                self.metrics.on_dangling_command(cmd.verb());
            }
        }
        if self.transaction.take().is_some() {
            self.metrics.on_implicit_abort();
        }
        self.phase = SessionPhase::Closed;
    }

    /// One framed client line while the data phase is open: payload until
    /// the terminator, which enqueues the commit outcome.
    fn payload_line(&mut self, line: &[u8]) {
        if !is_data_terminator(line) {
            return;
        }
        debug!("data terminator seen, commit pending");
        self.in_data = false;
        self.transaction = None;
        self.metrics.on_commit();
        self.pending.push_back(PendingReply::Commit);
    }

    /// One framed client line in command interpretation.
    fn command_line(&mut self, line: &[u8]) {
        let cmd = match parse_command(line) {
            Ok(cmd) => cmd,
            Err(err) => {
                debug!(error = %err, "dropping unparseable command line");
                self.metrics.on_parse_error();
                return;
            }
        };
        debug!(verb = %cmd.verb(), "command queued");
        self.metrics.on_command(cmd.verb());
        match cmd.verb() {
            Verb::Mail => {
                if self.transaction.is_some() {
                    debug!("transaction start while one is open, abandoning the old one");
                    self.metrics.on_anomaly(Anomaly::NestedTransactionStart);
                    self.metrics.on_transaction_abandoned();
                }
                self.transaction = Some(Transaction::new(cmd.args().to_string()));
                if self.phase == SessionPhase::Ready {
                    self.phase = SessionPhase::InTransaction;
                }
            }
            Verb::Rcpt => match self.transaction.as_mut() {
                Some(transaction) => transaction.recipients.push(cmd.args().to_string()),
                None => {
                    debug!("recipient with no open transaction");
                    self.metrics.on_anomaly(Anomaly::RecipientWithoutTransaction);
                }
            },
            Verb::Data => match self.transaction.as_mut() {
                Some(transaction) if !transaction.recipients.is_empty() => {
                    transaction.data_started = true;
                }
                _ => {
                    debug!("data start with no accepted recipient");
                    self.metrics.on_anomaly(Anomaly::DataWithoutRecipient);
                }
            },
            Verb::Quit => {
                if self.transaction.take().is_some() {
                    self.metrics.on_implicit_abort();
                }
                self.phase = SessionPhase::Closed;
            }
            _ => {}
        }
        self.pending.push_back(PendingReply::Command(cmd));
    }

    /// Pairs a logical reply with the oldest queued entry.
    fn correlate(&mut self, reply: &Reply) {
        match self.pending.pop_front() {
            None => {
                debug!(code = %reply.code(), "reply with nothing queued");
                self.metrics.on_orphan_reply();
            }
            Some(PendingReply::Connect) => {
                debug!(code = %reply.code(), "greeting received");
                self.metrics.on_connect_reply(reply.code());
                if self.phase == SessionPhase::AwaitingGreeting {
                    self.phase = SessionPhase::Ready;
                }
            }
            Some(PendingReply::Command(cmd)) => {
                debug!(verb = %cmd.verb(), code = %reply.code(), "reply correlated");
                self.metrics.on_command_reply(cmd.verb(), reply.code());
                self.apply_command_reply(&cmd, reply);
            }
            Some(PendingReply::Commit) => {
                debug!(code = %reply.code(), "transaction outcome received");
                self.metrics.on_commit_reply(reply.code());
                if self.phase == SessionPhase::InTransaction {
                    self.phase = SessionPhase::Ready;
                }
            }
        }
    }

    /// Verb-specific effect of a correlated reply.
    fn apply_command_reply(&mut self, cmd: &ParsedCommand, reply: &Reply) {
        let positive = reply.is_positive();
        // A reset or refusal only affects the transaction open as of the
        // command's issuance. If a MAIL is still awaiting its reply, the
        // current transaction postdates this command and survives it.
        let mail_pending = self
            .pending
            .iter()
            .any(|entry| matches!(entry, PendingReply::Command(c) if *c.verb() == Verb::Mail));
        match cmd.verb() {
            Verb::Helo | Verb::Ehlo | Verb::Rset => {
                if positive && !mail_pending {
                    self.abandon_open_transaction();
                }
            }
            Verb::Mail => {
                if !positive && !mail_pending {
                    // The transaction this MAIL opened never got off the
                    // ground; drop it without a terminal outcome.
                    self.transaction = None;
                    if self.phase == SessionPhase::InTransaction {
                        self.phase = SessionPhase::Ready;
                    }
                }
            }
            Verb::Rcpt => {
                if !positive && !mail_pending {
                    if let Some(transaction) = self.transaction.as_mut() {
                        transaction.recipients.pop();
                    }
                }
            }
            Verb::Data => match self.transaction.as_mut() {
                Some(transaction) if transaction.data_started => {
                    if positive {
                        self.in_data = true;
                    } else {
                        transaction.data_started = false;
                    }
                }
                _ => {}
            },
            Verb::StartTls => {
                if positive {
                    debug!("TLS negotiated, interpretation stops");
                    self.phase = SessionPhase::Errored;
                }
            }
            Verb::Other(_) => {
                if positive {
                    debug!(verb = %cmd.verb(), "accepted unknown verb, interpretation stops");
                    self.phase = SessionPhase::Errored;
                }
            }
            _ => {}
        }
    }

    fn abandon_open_transaction(&mut self) {
        if self.transaction.take().is_some() {
            self.metrics.on_transaction_abandoned();
        }
        if self.phase == SessionPhase::InTransaction {
            self.phase = SessionPhase::Ready;
        }
    }
}
