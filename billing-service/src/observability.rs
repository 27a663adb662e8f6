use tracing_subscriber::EnvFilter;

const DEFAULT_DIRECTIVES: &str = "billing_service=info,tariff_client=info,warn";

/// Installs the global fmt subscriber. `RUST_LOG` overrides the default
/// directives. Output goes to stderr so CLI tools can print JSON on stdout.
pub fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_DIRECTIVES));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}
