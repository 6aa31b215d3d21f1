use tracing_subscriber::EnvFilter;

/// Installs the tracing subscriber on stderr, keeping stdout clean for
/// the JSON report. `RUST_LOG` overrides the verbosity flags.
pub fn init_logging(verbosity: u8) {
    // 0 = warnings only, 1 (-v) = per-iteration progress with the client
    // library quieted, 2+ (-vv) = debug for everything.
    let default_filter = match verbosity {
        0 => "warn",
        1 => "info,palaver=warn",
        _ => "debug",
    };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .compact()
        .init();
}
