use crate::{errors::Error, Result};

/// Initialize tracing for the host process.
///
/// Default: info for our crates, warn for everything else. Can be overridden
/// with `RUST_LOG`. Calling this twice returns an error instead of panicking.
pub fn init(service_name: &str) -> Result<()> {
    use tracing_subscriber::{fmt, EnvFilter};

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        EnvFilter::new(format!(
            "warn,hkm=info,hkm_core=info,hkm_api=info,hkm_telegram=info,{}=info",
            service_name.replace('-', "_")
        ))
    });

    fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_ansi(true)
        .try_init()
        .map_err(|e| Error::Config(format!("logging already initialized: {e}")))
}
