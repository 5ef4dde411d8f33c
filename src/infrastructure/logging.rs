// Tracing subscriber setup
use tracing_subscriber::EnvFilter;

/// CI runs log outcomes only; local runs also log per-sensor progress.
pub fn default_filter(ci: bool) -> &'static str {
    if ci {
        "warn,rainfall_sync=info"
    } else {
        "warn,rainfall_sync=debug"
    }
}

/// `RUST_LOG` takes precedence over the default filter.
pub fn init_tracing(ci: bool) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_filter(ci)));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .init();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_filter_parses() {
        for ci in [true, false] {
            assert!(EnvFilter::try_new(default_filter(ci)).is_ok());
        }
        assert!(default_filter(true).ends_with("=info"));
    }
}
