//! Integration tests for the SMTP filter.
//!
//! These drive the host-facing surface end to end with scripted traffic,
//! the way the proxy runtime would: chunk deliveries in network order,
//! serialized per connection, with the metrics aggregator shared across
//! connections.

use mailscope::{FilterConfig, FilterFactory, SessionPhase};

/// Installs a subscriber once so `RUST_LOG=debug cargo test` shows the
/// filter's tracing output.
fn init_tracing() {
    static INIT: std::sync::Once = std::sync::Once::new();
    INIT.call_once(|| {
        let _ = tracing_subscriber::fmt()
            .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
            .try_init();
    });
}

fn positive_replies(factory: &FilterFactory) -> u64 {
    let metrics = factory.metrics();
    metrics
        .value("smtp.connects.replies.positive.total")
        .unwrap_or(0)
        + metrics
            .value("smtp.commands.replies.positive.total")
            .unwrap_or(0)
        + metrics
            .value("smtp.transactions.commits.replies.positive.total")
            .unwrap_or(0)
}

/// The canonical happy path: greeting, EHLO, one committed transaction,
/// QUIT. Every reply in the exchange is positive.
#[test]
fn test_single_message_session() {
    init_tracing();
    let factory = FilterFactory::new(FilterConfig {
        detailed_stats: true,
    });
    let mut filter = factory.new_filter();

    filter.on_new_connection();
    filter.on_server_data(b"220 smtp.example.com ESMTP Postfix\r\n");
    filter.on_client_data(b"EHLO client.example.com\r\n");
    filter.on_server_data(b"250-smtp.example.com\r\n250-PIPELINING\r\n250 SIZE 35882577\r\n");
    filter.on_client_data(b"MAIL FROM:<alice@example.com>\r\n");
    filter.on_server_data(b"250 2.1.0 Ok\r\n");
    filter.on_client_data(b"RCPT TO:<bob@example.com>\r\n");
    filter.on_server_data(b"250 2.1.5 Ok\r\n");
    filter.on_client_data(b"DATA\r\n");
    filter.on_server_data(b"354 End data with <CR><LF>.<CR><LF>\r\n");
    filter.on_client_data(b"Subject: hello\r\n\r\nHi Bob!\r\n.\r\n");
    filter.on_server_data(b"250 2.0.0 Ok: queued as 12345\r\n");
    filter.on_client_data(b"QUIT\r\n");
    filter.on_server_data(b"221 2.0.0 Bye\r\n");
    filter.on_connection_closed();

    let metrics = factory.metrics();
    assert_eq!(metrics.value("smtp.connections.total"), Some(1));
    assert_eq!(metrics.value("smtp.connects.reply.220.total"), Some(1));
    assert_eq!(metrics.value("smtp.commands.total"), Some(5));
    assert_eq!(positive_replies(&factory), 7);
    assert_eq!(metrics.value("smtp.mails.total"), Some(1));
    assert_eq!(metrics.value("smtp.mails.sent.total"), Some(1));
    assert_eq!(metrics.value("smtp.mails.rejected.total"), Some(0));
    assert_eq!(metrics.value("smtp.commands.dangling.total"), Some(0));
    assert_eq!(metrics.value("smtp.connections.parse_errors.total"), Some(0));

    assert_eq!(metrics.value("smtp.command.EHLO.total"), Some(1));
    assert_eq!(metrics.value("smtp.command.MAIL.reply.250.total"), Some(1));
    assert_eq!(metrics.value("smtp.command.DATA.reply.354.total"), Some(1));
    assert_eq!(
        metrics.value("smtp.transactions.commits.reply.250.total"),
        Some(1)
    );
}

/// Same exchange but the server refuses the message after the data phase.
#[test]
fn test_rejected_message_session() {
    let factory = FilterFactory::new(FilterConfig::default());
    let mut filter = factory.new_filter();

    filter.on_new_connection();
    filter.on_server_data(b"220 ready\r\n");
    filter.on_client_data(b"EHLO c\r\nMAIL FROM:<a@b>\r\nRCPT TO:<c@d>\r\nDATA\r\n");
    filter.on_server_data(b"250 hi\r\n250 Ok\r\n250 Ok\r\n354 go\r\n");
    filter.on_client_data(b"unwanted\r\n.\r\n");
    filter.on_server_data(b"554 5.7.1 Rejected\r\n");
    filter.on_client_data(b"QUIT\r\n");
    filter.on_server_data(b"221 Bye\r\n");
    filter.on_connection_closed();

    let metrics = factory.metrics();
    assert_eq!(metrics.value("smtp.mails.total"), Some(1));
    assert_eq!(metrics.value("smtp.mails.sent.total"), Some(0));
    assert_eq!(metrics.value("smtp.mails.rejected.total"), Some(1));
    assert_eq!(
        metrics.value("smtp.transactions.commits.replies.negative.total"),
        Some(1)
    );
}

/// Chunk boundaries chosen by the transport never change the counters.
#[test]
fn test_byte_at_a_time_delivery_matches_bulk_delivery() {
    let script: [(bool, &[u8]); 7] = [
        (true, b"220 ready\r\n"),
        (false, b"EHLO c\r\n"),
        (true, b"250 hi\r\n"),
        (false, b"MAIL FROM:<a@b>\r\nRCPT TO:<c@d>\r\nDATA\r\n"),
        (true, b"250 Ok\r\n250 Ok\r\n354 go\r\n"),
        (false, b"Subject: x\r\n\r\nhello\r\n.\r\nQUIT\r\n"),
        (true, b"250 queued\r\n221 Bye\r\n"),
    ];

    let run = |chunk_size: usize| {
        let factory = FilterFactory::new(FilterConfig {
            detailed_stats: true,
        });
        let mut filter = factory.new_filter();
        filter.on_new_connection();
        for (from_server, bytes) in script {
            for chunk in bytes.chunks(chunk_size) {
                if from_server {
                    filter.on_server_data(chunk);
                } else {
                    filter.on_client_data(chunk);
                }
            }
        }
        filter.on_connection_closed();
        factory.metrics().snapshot()
    };

    let bulk = run(usize::MAX);
    assert_eq!(run(1), bulk);
    assert_eq!(run(3), bulk);
    assert_eq!(run(10), bulk);
}

/// Multiple connections feed the same aggregator without interference.
#[test]
fn test_connections_share_the_aggregator() {
    let factory = FilterFactory::new(FilterConfig::default());

    for _ in 0..3 {
        let mut filter = factory.new_filter();
        filter.on_new_connection();
        filter.on_server_data(b"220 ready\r\n");
        filter.on_client_data(b"NOOP\r\n");
        filter.on_server_data(b"250 Ok\r\n");
        filter.on_connection_closed();
    }

    let metrics = factory.metrics();
    assert_eq!(metrics.value("smtp.connections.total"), Some(3));
    assert_eq!(metrics.value("smtp.commands.total"), Some(3));
    assert_eq!(metrics.value("smtp.commands.replies.positive.total"), Some(3));
}

/// A command whose reply never arrives is dangling, not an error.
#[test]
fn test_close_with_unanswered_command() {
    let factory = FilterFactory::new(FilterConfig {
        detailed_stats: true,
    });
    let mut filter = factory.new_filter();

    filter.on_new_connection();
    filter.on_server_data(b"220 ready\r\n");
    filter.on_client_data(b"NOOP\r\nQUIT\r\n");
    filter.on_server_data(b"250 Ok\r\n");
    filter.on_connection_closed();

    let metrics = factory.metrics();
    assert_eq!(metrics.value("smtp.commands.dangling.total"), Some(1));
    assert_eq!(metrics.value("smtp.command.QUIT.dangling.total"), Some(1));
    assert_eq!(metrics.value("smtp.commands.replies.total"), Some(1));
    assert_eq!(metrics.value("smtp.connections.parse_errors.total"), Some(0));
}

/// Without detailed stats only aggregate counters exist.
#[test]
fn test_detailed_stats_off_keeps_only_aggregates() {
    let factory = FilterFactory::new(FilterConfig::default());
    let mut filter = factory.new_filter();

    filter.on_new_connection();
    filter.on_server_data(b"220 ready\r\n");
    filter.on_client_data(b"EHLO c\r\n");
    filter.on_server_data(b"250 hi\r\n");
    filter.on_connection_closed();

    let metrics = factory.metrics();
    assert_eq!(metrics.value("smtp.commands.total"), Some(1));
    assert_eq!(metrics.value("smtp.command.EHLO.total"), None);
    assert_eq!(metrics.value("smtp.connects.reply.220.total"), None);
    assert!(
        metrics
            .snapshot()
            .iter()
            .all(|(name, _)| !name.starts_with("smtp.command.EHLO"))
    );
}

/// Pipelined commands correlate with their replies in issuance order even
/// when every reply lands in a single chunk.
#[test]
fn test_pipelined_batch_correlates_in_order() {
    let factory = FilterFactory::new(FilterConfig {
        detailed_stats: true,
    });
    let mut filter = factory.new_filter();

    filter.on_new_connection();
    filter.on_server_data(b"220 ready\r\n");
    filter.on_client_data(b"EHLO c\r\nMAIL FROM:<a@b>\r\nRCPT TO:<x@y>\r\nRCPT TO:<z@w>\r\n");
    filter.on_server_data(b"250 hi\r\n250 Ok\r\n550 unknown user\r\n250 Ok\r\n");
    filter.on_connection_closed();

    let metrics = factory.metrics();
    assert_eq!(metrics.value("smtp.command.EHLO.replies.positive.total"), Some(1));
    assert_eq!(metrics.value("smtp.command.MAIL.replies.positive.total"), Some(1));
    assert_eq!(metrics.value("smtp.command.RCPT.replies.positive.total"), Some(1));
    assert_eq!(metrics.value("smtp.command.RCPT.replies.negative.total"), Some(1));
    // One transaction was still open at close.
    assert_eq!(
        metrics.value("smtp.transactions.implicit_aborts.total"),
        Some(1)
    );
}

/// An unparseable client line is counted and excluded from correlation
/// while the session keeps working.
#[test]
fn test_parse_error_is_fail_open() {
    let factory = FilterFactory::new(FilterConfig::default());
    let mut filter = factory.new_filter();

    filter.on_new_connection();
    filter.on_server_data(b"220 ready\r\n");
    filter.on_client_data(b"\r\n");
    filter.on_client_data(b"NOOP\r\n");
    filter.on_server_data(b"250 Ok\r\n");

    let metrics = factory.metrics();
    assert_eq!(metrics.value("smtp.connections.parse_errors.total"), Some(1));
    assert_eq!(metrics.value("smtp.commands.total"), Some(1));
    assert_eq!(metrics.value("smtp.commands.replies.positive.total"), Some(1));
    assert_ne!(filter.session().phase(), SessionPhase::Errored);
}
