//! Logging and tracing configuration for gkls
//!
//! Structured logging uses the `tracing` crate. Ingestion logs one `debug`
//! event per entry, a `warn` per entry that could not be decoded and `info`
//! events for run start, batch commits and completion. Forensic audit events
//! use the `forensic_audit` target (see [`crate::common::audit`]).
//!
//! # Environment Variable Control
//!
//! Set `RUST_LOG` to control log levels at runtime:
//! ```bash
//! RUST_LOG=debug gkls full_files.zip out.db                # Per-entry detail
//! RUST_LOG=gkls_lib::extra=trace gkls full_files.zip out.db # Attribute rule hits
//! RUST_LOG=forensic_audit=info,warn gkls full_files.zip out.db
//! ```

use tracing_subscriber::{fmt, prelude::*, EnvFilter};

fn default_filter() -> EnvFilter {
    if cfg!(any(debug_assertions, feature = "debug-logging")) {
        EnvFilter::new("gkls=debug,gkls_lib=debug,forensic_audit=info")
    } else {
        EnvFilter::new("gkls=info,gkls_lib=info,forensic_audit=info")
    }
}

/// Initialize the logging/tracing system
///
/// Call once at startup. Logs go to stderr so `--json` output stays clean.
pub fn init() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| default_filter());

    let subscriber = tracing_subscriber::registry().with(filter).with(
        fmt::layer()
            .with_writer(std::io::stderr)
            .with_target(true)
            .with_thread_ids(false)
            .with_file(false)
            .with_line_number(false)
            .compact(),
    );

    // Ignore error if already set
    let _ = tracing::subscriber::set_global_default(subscriber);
}

/// Initialize logging with file:line output, debug level by default
pub fn init_verbose() {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("gkls=trace,gkls_lib=debug,forensic_audit=info"));

    let subscriber = tracing_subscriber::registry().with(filter).with(
        fmt::layer()
            .with_writer(std::io::stderr)
            .with_target(true)
            .with_file(true)
            .with_line_number(true),
    );

    let _ = tracing::subscriber::set_global_default(subscriber);
}
