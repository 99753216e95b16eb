//! Logging setup for the `ofp` binary

use tracing::Level;

/// Install the global subscriber. `RUST_LOG` overrides `default_level`, e.g.
/// `RUST_LOG=ofp_io=debug ofp batch ...`.
pub fn init_logger(default_level: Level) {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::builder()
                .with_default_directive(default_level.into())
                .from_env_lossy(),
        )
        .with_target(true)
        .with_level(true)
        .with_thread_ids(false)
        .with_writer(std::io::stderr)
        .init();
}
