use std::path::PathBuf;

use once_cell::sync::Lazy;
use tracing_subscriber::prelude::*;

static LOGGER: Lazy<()> = Lazy::new(|| {
    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer().pretty().without_time())
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                tracing_subscriber::EnvFilter::new(
                    "info,terratest_terraform=debug,terratest_test_util=debug",
                )
            }),
        )
        .init();
});

#[allow(unused)]
pub fn init() {
    _ = Lazy::force(&LOGGER);
}

/// Path of a Terraform template under `fixtures/`
#[allow(unused)]
pub fn fixture_dir(name: &str) -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR"))
        .join("fixtures")
        .join(name)
}

/// Helper function to create the `terratest` binary process
#[allow(unused)]
pub fn terratest() -> std::process::Command {
    std::process::Command::new(env!("CARGO_BIN_EXE_terratest"))
}
