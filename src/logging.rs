use tracing_subscriber::EnvFilter;

/// Initialise logging. The default level is `info`; setting `debug_logging`
/// in the config file raises it to `debug` and allows `RUST_LOG` to override
/// the filter entirely.
pub fn init(debug: bool) {
    let filter = if debug {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("debug"))
    } else {
        // Ignore RUST_LOG so a stray environment variable cannot turn on
        // verbose output in production.
        EnvFilter::new("info")
    };

    let _ = tracing_subscriber::fmt().with_env_filter(filter).try_init();
}
