//! Tracing/logging bootstrap, grounded in `axon::main`'s subscriber setup:
//! an `EnvFilter` layer plus an uncolored `fmt` layer, with an optional
//! rotating file appender for long-running kernel boots.

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Initialize the global tracing subscriber. Safe to call once at boot;
/// calling it twice (e.g. in tests) is a no-op after the first call.
pub fn init_tracing(log_dir: Option<&std::path::Path>) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    let registry = tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer().with_target(false));

    if let Some(dir) = log_dir {
        let file_appender = tracing_appender::rolling::daily(dir, "kernel.log");
        let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);
        // Leak the guard so the background writer thread survives for the
        // process lifetime; this mirrors long-running-server setups where
        // there is no natural point to drop it before shutdown.
        std::mem::forget(guard);
        let _ = registry
            .with(tracing_subscriber::fmt::layer().with_writer(non_blocking).with_ansi(false))
            .try_init();
    } else {
        let _ = registry.try_init();
    }
}
