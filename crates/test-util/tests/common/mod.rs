use once_cell::sync::Lazy;
use tracing_subscriber::prelude::*;

static LOGGER: Lazy<()> = Lazy::new(|| {
    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer().pretty().without_time())
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                tracing_subscriber::EnvFilter::new("info,terratest_test_util=debug")
            }),
        )
        .init();
});

pub fn init() {
    _ = Lazy::force(&LOGGER);
}
