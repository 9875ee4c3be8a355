//! Options describing which template to run and how to run Terraform against it

use std::collections::BTreeMap;
use std::env;
use std::path::{Path, PathBuf};
use std::time::Duration;

use regex::Regex;

use crate::error::{Error, Result};
use crate::var::Var;

/// Executable used when neither [`Options::terraform_binary`] nor the
/// [`TERRAFORM_BINARY_ENV`] environment variable says otherwise
pub const DEFAULT_TERRAFORM_BINARY: &str = "terraform";

/// Environment variable overriding the Terraform executable (ex. `tofu`)
pub const TERRAFORM_BINARY_ENV: &str = "TERRATEST_TERRAFORM_BINARY";

pub const DEFAULT_MAX_RETRIES: u32 = 3;
pub const DEFAULT_TIME_BETWEEN_RETRIES: Duration = Duration::from_secs(5);

/// Failures known to be transient, keyed by a regex over Terraform's combined output
pub const DEFAULT_RETRYABLE_ERRORS: &[(&str, &str)] = &[
    (
        r".*read: connection reset by peer.*",
        "Failed to reach registry due to a transient network error.",
    ),
    (
        r".*unable to verify signature.*",
        "Failed to retrieve plugin due to a transient network error.",
    ),
    (
        r".*unable to verify checksum.*",
        "Failed to retrieve plugin due to a transient network error.",
    ),
    (
        r".*no provider exists with the given name.*",
        "Failed to retrieve plugin due to a transient network error.",
    ),
    (
        r".*registry service is unreachable.*",
        "Failed to retrieve plugin due to a transient network error.",
    ),
    (
        r".*Error installing provider.*",
        "Failed to install provider due to a transient network error.",
    ),
    (
        r".*Failed to query available provider packages.*",
        "Failed to retrieve plugin due to a transient network error.",
    ),
    (
        r".*timeout while waiting for plugin to start.*",
        "Failed to retrieve plugin due to a transient network error.",
    ),
    (
        r".*timed out waiting for server handshake.*",
        "Failed to retrieve plugin due to a transient network error.",
    ),
    (
        r"could not query provider registry for",
        "Failed to retrieve plugin due to a transient network error.",
    ),
];

/// Which failures of a Terraform command are worth running it again for
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Regex over combined stdout/stderr mapped to a description used when logging the retry
    pub retryable_errors: BTreeMap<String, String>,
    /// Number of reruns after the first attempt
    pub max_retries: u32,
    pub time_between_retries: Duration,
}

impl RetryPolicy {
    /// The retry policy used by [`Options::with_default_retryable_errors`]
    #[must_use]
    pub fn default_retryable() -> Self {
        Self {
            retryable_errors: DEFAULT_RETRYABLE_ERRORS
                .iter()
                .map(|(pattern, description)| ((*pattern).to_string(), (*description).to_string()))
                .collect(),
            max_retries: DEFAULT_MAX_RETRIES,
            time_between_retries: DEFAULT_TIME_BETWEEN_RETRIES,
        }
    }

    /// Compile the configured patterns, failing on the first invalid one
    pub(crate) fn compile(&self) -> Result<Vec<(Regex, &str)>> {
        self.retryable_errors
            .iter()
            .map(|(pattern, description)| {
                Regex::new(pattern)
                    .map(|re| (re, description.as_str()))
                    .map_err(|source| Error::InvalidRetryPattern {
                        pattern: pattern.clone(),
                        source,
                    })
            })
            .collect()
    }
}

/// Description of a Terraform template and the inputs to apply it with
///
/// ```
/// use terratest_terraform::Options;
///
/// let options = Options::new("fixtures/gce")
///     .var("name", "server")
///     .var("machine_type", "f1-micro")
///     .var("zone", "us-central1-a")
///     .with_default_retryable_errors();
/// assert_eq!(options.vars.len(), 3);
/// ```
#[derive(Clone, Debug, PartialEq)]
pub struct Options {
    /// Executable to run, `terraform` unless overridden
    pub terraform_binary: PathBuf,
    /// Directory containing the template. Terraform runs with this as its working directory.
    pub terraform_dir: PathBuf,
    /// Values passed with `-var` to `apply` and `destroy`
    pub vars: BTreeMap<String, Var>,
    /// Files passed with `-var-file` to `apply` and `destroy`
    pub var_files: Vec<PathBuf>,
    /// Extra environment for every invocation
    pub env_vars: BTreeMap<String, String>,
    /// Values passed with `-backend-config` to `init`
    pub backend_config: BTreeMap<String, String>,
    pub no_color: bool,
    /// Value for `-lock`, omitted when `None`
    pub lock: Option<bool>,
    /// Value for `-parallelism`, omitted when `None`
    pub parallelism: Option<u32>,
    /// Whether `init` upgrades modules and providers
    pub upgrade: bool,
    pub retry: RetryPolicy,
}

impl Default for Options {
    fn default() -> Self {
        Self {
            terraform_binary: default_terraform_binary(),
            terraform_dir: PathBuf::from("."),
            vars: BTreeMap::new(),
            var_files: Vec::new(),
            env_vars: BTreeMap::new(),
            backend_config: BTreeMap::new(),
            no_color: false,
            lock: None,
            parallelism: None,
            upgrade: false,
            retry: RetryPolicy::default(),
        }
    }
}

impl Options {
    /// Options for the template in `terraform_dir`, with everything else defaulted
    pub fn new(terraform_dir: impl AsRef<Path>) -> Self {
        Self {
            terraform_dir: terraform_dir.as_ref().to_path_buf(),
            ..Default::default()
        }
    }

    /// Set an input variable
    #[must_use]
    pub fn var(mut self, name: impl Into<String>, value: impl Into<Var>) -> Self {
        self.vars.insert(name.into(), value.into());
        self
    }

    /// Set several input variables at once
    #[must_use]
    pub fn vars<K, V>(mut self, vars: impl IntoIterator<Item = (K, V)>) -> Self
    where
        K: Into<String>,
        V: Into<Var>,
    {
        self.vars
            .extend(vars.into_iter().map(|(k, v)| (k.into(), v.into())));
        self
    }

    #[must_use]
    pub fn var_file(mut self, path: impl AsRef<Path>) -> Self {
        self.var_files.push(path.as_ref().to_path_buf());
        self
    }

    #[must_use]
    pub fn env_var(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.env_vars.insert(key.into(), value.into());
        self
    }

    #[must_use]
    pub fn terraform_binary(mut self, binary: impl AsRef<Path>) -> Self {
        self.terraform_binary = binary.as_ref().to_path_buf();
        self
    }

    /// Retry the transient provider and registry failures listed in [`DEFAULT_RETRYABLE_ERRORS`],
    /// keeping any patterns that were already configured
    #[must_use]
    pub fn with_default_retryable_errors(mut self) -> Self {
        let defaults = RetryPolicy::default_retryable();
        for (pattern, description) in defaults.retryable_errors {
            self.retry
                .retryable_errors
                .entry(pattern)
                .or_insert(description);
        }
        if self.retry.max_retries == 0 {
            self.retry.max_retries = defaults.max_retries;
        }
        if self.retry.time_between_retries.is_zero() {
            self.retry.time_between_retries = defaults.time_between_retries;
        }
        self
    }
}

/// Resolve the Terraform executable from [`TERRAFORM_BINARY_ENV`], falling back to
/// [`DEFAULT_TERRAFORM_BINARY`] on `PATH`
#[must_use]
pub fn default_terraform_binary() -> PathBuf {
    env::var_os(TERRAFORM_BINARY_ENV)
        .filter(|v| !v.is_empty())
        .map_or_else(|| PathBuf::from(DEFAULT_TERRAFORM_BINARY), PathBuf::from)
}
