use anyhow::Result;
use tracing_subscriber::EnvFilter;

/// Initialize structured logging for binaries and integration tests.
/// Defaults to `ntrl=info` unless `RUST_LOG` overrides it.
pub fn init() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive("ntrl=info".parse()?))
        .init();
    Ok(())
}
