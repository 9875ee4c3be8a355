//! Drive the [Terraform][terraform] CLI from Rust tests.
//!
//! An [`Options`] value names a template directory and the inputs to apply it with. The functions
//! in this crate run the matching Terraform subcommands against it:
//!
//! ```rust,no_run
//! use terratest_terraform::{destroy, init_and_apply, output_all, Options};
//!
//! # async fn gce() -> Result<(), terratest_terraform::Error> {
//! let options = Options::new("fixtures/gce")
//!     .var("name", "server")
//!     .var("machine_type", "f1-micro")
//!     .var("zone", "us-central1-a")
//!     .with_default_retryable_errors();
//!
//! init_and_apply(&options).await?;
//! let outputs = output_all(&options).await?;
//! assert_eq!(outputs.len(), 2);
//! destroy(&options).await?;
//! # Ok(())
//! # }
//! ```
//!
//! Cleanup on every exit path is left to callers; `terratest-test-util` provides a runner and an
//! RAII guard for that.
//!
//! [terraform]: https://developer.hashicorp.com/terraform

pub mod args;
mod commands;
mod error;
pub mod options;
pub mod output;
mod run;
mod var;

pub use commands::{apply, destroy, destroy_blocking, init, init_and_apply, output, output_all};
pub use error::{Error, Result};
pub use options::{Options, RetryPolicy};
pub use output::{OutputEntry, Outputs};
pub use run::{run_terraform, run_terraform_blocking};
pub use var::Var;
