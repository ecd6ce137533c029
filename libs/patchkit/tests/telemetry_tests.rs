#![allow(clippy::unwrap_used, clippy::expect_used)]

//! Global logging setup. Kept in its own test binary: it installs the
//! process-wide subscriber.

use patchkit::telemetry::{LogFormat, LoggingConfig, init_logging};

#[test]
fn first_init_installs_and_second_is_harmless() {
    let cfg = LoggingConfig {
        format: LogFormat::Json,
        ..LoggingConfig::default()
    };
    assert!(init_logging(&cfg));
    assert!(tracing::dispatcher::has_been_set());
    tracing::info!(target: "patchkit", "logging ready");

    assert!(!init_logging(&LoggingConfig::default()));
}
