//! Provision a template, verify it, and destroy it again on every exit path

use std::any::Any;
use std::future::Future;
use std::panic::AssertUnwindSafe;

use futures::FutureExt as _;
use serde_json::Value;
use tracing::{error, info, instrument, warn};

use terratest_terraform::{self as terraform, Options, Outputs};

use crate::error::{
    error_chain, DestroyError, ProvisionError, RunError, VerifyError, VerifyPanic,
};

/// Runs the provision/verify/destroy cycle for one Terraform template.
///
/// ```rust,no_run
/// use terratest_terraform::Options;
/// use terratest_test_util::{assert_output_count, ProvisionTestRunner};
///
/// # async fn gce() -> anyhow::Result<()> {
/// let options = Options::new("fixtures/gce")
///     .var("name", "server")
///     .var("machine_type", "f1-micro")
///     .var("zone", "us-central1-a")
///     .with_default_retryable_errors();
///
/// ProvisionTestRunner::new(options)
///     .run(|outputs| async move {
///         assert_output_count(&outputs, 2)?;
///         Ok(())
///     })
///     .await?;
/// # Ok(())
/// # }
/// ```
#[derive(Clone, Debug)]
pub struct ProvisionTestRunner {
    options: Options,
}

impl ProvisionTestRunner {
    #[must_use]
    pub fn new(options: Options) -> Self {
        Self { options }
    }

    #[must_use]
    pub fn options(&self) -> &Options {
        &self.options
    }

    /// Run `terraform init` and `terraform apply`.
    ///
    /// On success the returned guard owns the provisioned resources: they are destroyed by
    /// [`Provisioned::destroy`] or, failing that, when the guard is dropped. On failure nothing is
    /// destroyed here, since no guard exists; [`ProvisionTestRunner::run`] takes care of that.
    #[instrument(skip_all, fields(dir = %self.options.terraform_dir.display()))]
    pub async fn apply(&self) -> Result<Provisioned<'_>, ProvisionError> {
        terraform::init_and_apply(&self.options)
            .await
            .map_err(|source| self.provision_error(source))?;
        info!("template applied");
        Ok(Provisioned {
            runner: self,
            released: false,
        })
    }

    /// Run `terraform destroy`
    #[instrument(skip_all, fields(dir = %self.options.terraform_dir.display()))]
    pub async fn destroy(&self) -> Result<(), DestroyError> {
        terraform::destroy(&self.options)
            .await
            .map_err(|source| self.destroy_error(source))?;
        info!("template destroyed");
        Ok(())
    }

    /// Apply the template, hand its outputs to `verify`, then destroy it.
    ///
    /// Destroy runs exactly once whatever happens after apply is attempted: when `verify`
    /// succeeds, returns an error, or panics, when the outputs cannot be read, and when apply
    /// itself fails (resources may have been partially created). A destroy failure is reported
    /// together with any earlier failure rather than in place of it.
    pub async fn run<F, Fut>(&self, verify: F) -> Result<(), RunError>
    where
        F: FnOnce(Outputs) -> Fut,
        Fut: Future<Output = anyhow::Result<()>>,
    {
        let provisioned = match self.apply().await {
            Ok(provisioned) => provisioned,
            Err(source) => {
                warn!("apply failed, destroying anything it created");
                let cleanup = self.destroy().await.err();
                return Err(RunError::Provision { source, cleanup });
            }
        };

        let outputs = match provisioned.output_all().await {
            Ok(outputs) => outputs,
            Err(source) => {
                let cleanup = provisioned.destroy().await.err();
                return Err(RunError::Provision { source, cleanup });
            }
        };

        let verified = AssertUnwindSafe(async move { verify(outputs).await })
            .catch_unwind()
            .await;
        let cleanup = provisioned.destroy().await;

        let source: VerifyError = match verified {
            Ok(Ok(())) => return cleanup.map_err(RunError::Destroy),
            Ok(Err(err)) => err.into(),
            Err(panic) => Box::new(VerifyPanic(panic_message(&*panic))),
        };
        Err(RunError::Verify {
            source,
            cleanup: cleanup.err(),
        })
    }

    fn provision_error(&self, source: terraform::Error) -> ProvisionError {
        ProvisionError {
            dir: self.options.terraform_dir.clone(),
            source,
        }
    }

    fn destroy_error(&self, source: terraform::Error) -> DestroyError {
        DestroyError {
            dir: self.options.terraform_dir.clone(),
            source,
        }
    }
}

/// Guard over resources created by [`ProvisionTestRunner::apply`].
///
/// Dropping the guard without calling [`Provisioned::destroy`] (an early return, a `?`, a panic
/// unwinding through the test) runs a blocking `terraform destroy` and logs any failure.
#[must_use = "dropping the guard destroys the provisioned resources"]
pub struct Provisioned<'a> {
    runner: &'a ProvisionTestRunner,
    released: bool,
}

impl Provisioned<'_> {
    /// Read every output of the applied template
    pub async fn output_all(&self) -> Result<Outputs, ProvisionError> {
        terraform::output_all(&self.runner.options)
            .await
            .map_err(|source| self.runner.provision_error(source))
    }

    /// Read a single output of the applied template
    pub async fn output(&self, name: &str) -> Result<Value, ProvisionError> {
        terraform::output(&self.runner.options, name)
            .await
            .map_err(|source| self.runner.provision_error(source))
    }

    /// Destroy the provisioned resources, consuming the guard
    pub async fn destroy(mut self) -> Result<(), DestroyError> {
        let result = self.runner.destroy().await;
        self.released = true;
        result
    }
}

impl Drop for Provisioned<'_> {
    fn drop(&mut self) {
        if self.released {
            return;
        }
        let options = &self.runner.options;
        warn!(
            dir = %options.terraform_dir.display(),
            "provisioned resources dropped without destroy, destroying now"
        );
        if let Err(source) = terraform::destroy_blocking(options) {
            let err = self.runner.destroy_error(source);
            error!(error = %error_chain(&err), "failed to destroy provisioned resources");
        }
    }
}

fn panic_message(panic: &(dyn Any + Send)) -> String {
    if let Some(s) = panic.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = panic.downcast_ref::<String>() {
        s.clone()
    } else {
        "non-string panic payload".to_string()
    }
}
