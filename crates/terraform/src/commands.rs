//! The Terraform operations a test drives: init, apply, destroy, and output

use serde_json::Value;
use tracing::instrument;

use crate::args::{apply_args, destroy_args, init_args, output_args};
use crate::error::{Error, Result};
use crate::options::Options;
use crate::output::{parse_outputs, Outputs};
use crate::run::{run_terraform, run_terraform_blocking};

/// Run `terraform init`, returning its stdout
#[instrument(level = "debug", skip_all, fields(dir = %options.terraform_dir.display()))]
pub async fn init(options: &Options) -> Result<String> {
    run_terraform(options, &init_args(options)).await
}

/// Run `terraform apply -auto-approve`, returning its stdout
#[instrument(level = "debug", skip_all, fields(dir = %options.terraform_dir.display()))]
pub async fn apply(options: &Options) -> Result<String> {
    run_terraform(options, &apply_args(options)).await
}

/// Run `terraform init` followed by `terraform apply`, returning the stdout of `apply`
pub async fn init_and_apply(options: &Options) -> Result<String> {
    init(options).await?;
    apply(options).await
}

/// Run `terraform destroy -auto-approve`, returning its stdout
#[instrument(level = "debug", skip_all, fields(dir = %options.terraform_dir.display()))]
pub async fn destroy(options: &Options) -> Result<String> {
    run_terraform(options, &destroy_args(options)).await
}

/// Run `terraform destroy -auto-approve`, blocking the current thread until it finishes
pub fn destroy_blocking(options: &Options) -> Result<String> {
    run_terraform_blocking(options, &destroy_args(options))
}

/// Read every output of the applied template
#[instrument(level = "debug", skip_all, fields(dir = %options.terraform_dir.display()))]
pub async fn output_all(options: &Options) -> Result<Outputs> {
    let stdout = run_terraform(options, &output_args()).await?;
    parse_outputs(&stdout)
}

/// Read a single output of the applied template
pub async fn output(options: &Options, name: &str) -> Result<Value> {
    output_all(options)
        .await?
        .remove(name)
        .ok_or_else(|| Error::OutputNotFound(name.to_string()))
}
