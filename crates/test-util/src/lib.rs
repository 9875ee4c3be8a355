//! This crate contains utilities for testing infrastructure templates with [Terraform][terraform].
//!
//! You can use it to apply a template, check the outputs it produced, and destroy it again,
//! with the destroy guaranteed to run however the test exits.
//!
//! ## Quickstart
//!
//! ```rust,ignore
//! use terratest_terraform::Options;
//! use terratest_test_util::{assert_output_count, ProvisionTestRunner};
//!
//! #[tokio::test]
//! async fn gce_webserver_create() -> anyhow::Result<()> {
//!     let options = Options::new("fixtures/gce")
//!         .var("name", "server")
//!         .var("machine_type", "f1-micro")
//!         .var("zone", "us-central1-a")
//!         .with_default_retryable_errors();
//!
//!     // Apply, verify, and destroy, even if the verification fails or panics
//!     ProvisionTestRunner::new(options)
//!         .run(|outputs| async move {
//!             assert_output_count(&outputs, 2)?;
//!             Ok(())
//!         })
//!         .await?;
//!     Ok(())
//! }
//! ```
//!
//! When a test needs to keep hold of the resources across several steps, use
//! [`ProvisionTestRunner::apply`] instead: the [`Provisioned`] guard it returns destroys the
//! resources when dropped.
//!
//! [terraform]: https://developer.hashicorp.com/terraform

pub mod assert;
pub mod env;
pub mod error;
#[cfg(all(unix, feature = "fake"))]
pub mod fake;
pub mod runner;

/// Re-export of the Terraform CLI bindings
pub use terratest_terraform as terraform;

pub use crate::assert::assert_output_count;
pub use crate::env::EnvVarGuard;
pub use crate::error::{AssertionError, DestroyError, ProvisionError, RunError};
#[cfg(all(unix, feature = "fake"))]
pub use crate::fake::FakeTerraform;
pub use crate::runner::{ProvisionTestRunner, Provisioned};
