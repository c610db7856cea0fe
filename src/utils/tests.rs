use super::error::Error;
use super::logging;

#[test]
fn logging_init_accepts_levels() {
    // Should not panic
    logging::init("info");
    logging::init("debug");
    logging::init("warn");
}

#[test]
fn unknown_level_falls_back_to_info() {
    assert_eq!(logging::level_from_str("verbose"), tracing::Level::INFO);
    assert_eq!(logging::level_from_str("WARNING"), tracing::Level::WARN);
    assert_eq!(logging::level_from_str("Trace"), tracing::Level::TRACE);
}

#[test]
fn errors_name_the_queue() {
    let err = Error::Publish {
        queue: "orders.dlq".to_string(),
        source: "channel closed".into(),
    };
    assert_eq!(
        err.to_string(),
        "failed to publish to queue 'orders.dlq': channel closed"
    );
}

#[test]
fn io_errors_convert_to_sink_errors() {
    let io = std::io::Error::new(std::io::ErrorKind::BrokenPipe, "pipe closed");
    let err: Error = io.into();
    assert!(matches!(err, Error::Sink(_)));
    assert!(std::error::Error::source(&err).is_some());
}
