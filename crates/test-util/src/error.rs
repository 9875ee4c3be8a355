use std::error::Error as StdError;
use std::path::PathBuf;

/// Boxed error returned by (or synthesized for) a failed verification step
pub type VerifyError = Box<dyn StdError + Send + Sync + 'static>;

/// `terraform init`/`apply` failed, or the applied template's outputs could not be read
#[derive(Debug, thiserror::Error)]
#[error("failed to provision `{}`", .dir.display())]
pub struct ProvisionError {
    pub dir: PathBuf,
    #[source]
    pub source: terratest_terraform::Error,
}

/// `terraform destroy` failed
#[derive(Debug, thiserror::Error)]
#[error("failed to destroy `{}`", .dir.display())]
pub struct DestroyError {
    pub dir: PathBuf,
    #[source]
    pub source: terratest_terraform::Error,
}

/// An applied template produced a different number of outputs than expected
#[derive(Debug, PartialEq, Eq, thiserror::Error)]
#[error("expected {expected} outputs, found {actual}: [{}]", .names.join(", "))]
pub struct AssertionError {
    pub expected: usize,
    pub actual: usize,
    /// Names of the outputs that were found
    pub names: Vec<String>,
}

/// The verification step panicked
#[derive(Debug, thiserror::Error)]
#[error("verification panicked: {0}")]
pub struct VerifyPanic(pub String);

/// Outcome of a failed provision/verify/destroy run.
///
/// A failed destroy never replaces the failure that came before it: it is carried alongside as
/// `cleanup` and included in the message.
#[derive(Debug, thiserror::Error)]
pub enum RunError {
    /// Apply (or reading outputs) failed. Verification never ran.
    #[error("provisioning failed{}", cleanup_suffix(.cleanup))]
    Provision {
        #[source]
        source: ProvisionError,
        cleanup: Option<DestroyError>,
    },

    /// Verification returned an error or panicked
    #[error("verification failed{}", cleanup_suffix(.cleanup))]
    Verify {
        #[source]
        source: VerifyError,
        cleanup: Option<DestroyError>,
    },

    /// Everything passed except the final destroy
    #[error(transparent)]
    Destroy(DestroyError),
}

impl RunError {
    /// The destroy failure, if there was one
    #[must_use]
    pub fn destroy_error(&self) -> Option<&DestroyError> {
        match self {
            Self::Provision { cleanup, .. } | Self::Verify { cleanup, .. } => cleanup.as_ref(),
            Self::Destroy(err) => Some(err),
        }
    }
}

fn cleanup_suffix(cleanup: &Option<DestroyError>) -> String {
    cleanup.as_ref().map_or_else(String::new, |err| {
        format!(" (destroy also failed: {})", error_chain(err))
    })
}

/// Render an error and all of its sources on one line
pub(crate) fn error_chain(err: &(dyn StdError + 'static)) -> String {
    let mut out = err.to_string();
    let mut source = err.source();
    while let Some(err) = source {
        out.push_str(": ");
        out.push_str(&err.to_string());
        source = err.source();
    }
    out
}
