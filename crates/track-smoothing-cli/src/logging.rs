/// Initialize the `fmt` subscriber on stderr, filtered by `RUST_LOG`.
///
/// If RUST_LOG is not set, a default is chosen so smoothing summaries show up
/// in debug builds and only warnings and progress do in release builds.
pub fn setup_logging() {
    use tracing_subscriber::EnvFilter;

    let defaulted = std::env::var("RUST_LOG").is_err();
    if defaulted {
        // Safety: single-threaded at startup
        unsafe {
            if cfg!(debug_assertions) {
                std::env::set_var("RUST_LOG", "debug");
            } else {
                std::env::set_var("RUST_LOG", "info");
            }
        }
    }

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    if defaulted {
        tracing::info!(
            "RUST_LOG set to default: {}",
            std::env::var("RUST_LOG").unwrap_or_default()
        );
    }
    tracing::info!("{} {}", env!("CARGO_PKG_NAME"), env!("CARGO_PKG_VERSION"));
}
