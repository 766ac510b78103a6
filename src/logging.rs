use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// Initialize tracing with a colored stdout layer.
///
/// - Default level: INFO for dependencies, DEBUG for this crate
/// - Override via the RUST_LOG env variable
///
/// Safe to call once per process; hosts embedding the crate can install
/// their own subscriber instead.
pub fn init() {
    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,polychat=debug"));

    let stdout_layer = fmt::layer()
        .with_target(true)
        .with_thread_ids(false)
        .with_file(true)
        .with_line_number(true)
        .compact();

    tracing_subscriber::registry()
        .with(env_filter)
        .with(stdout_layer)
        .init();

    tracing::debug!("Tracing initialized");
}
