use tracing_subscriber::EnvFilter;

/// `RUST_LOG` when set, otherwise `debug` or `info`.
pub fn build_env_filter(verbose: bool) -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        if verbose {
            EnvFilter::new("debug")
        } else {
            EnvFilter::new("info")
        }
    })
}

/// Install a compact fmt subscriber on stderr so reports on stdout stay
/// machine readable.
pub fn init_tracing(verbose: bool) {
    tracing_subscriber::fmt()
        .with_env_filter(build_env_filter(verbose))
        .with_writer(std::io::stderr)
        .compact()
        .init();
}
