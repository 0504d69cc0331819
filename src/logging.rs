//! Subscriber setup for the binary. The library only emits events.

use tracing_subscriber::EnvFilter;

/// `RUST_LOG` wins when set; otherwise `info`, `debug` at `-v` and `trace`
/// from `-vv` up.
pub fn init(verbosity: u8) {
    let fallback = match verbosity {
        0 => "info",
        1 => "debug",
        _ => "trace",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(fallback));

    // A second init (tests, embedding) keeps the existing subscriber.
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .try_init();
}
