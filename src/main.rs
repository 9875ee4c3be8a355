#![warn(clippy::pedantic)]

use std::io;
use std::path::PathBuf;
use std::time::Duration;

use anyhow::{self, Context};
use clap::{Parser, Subcommand};
use tracing::info;
use tracing_subscriber::prelude::*;

use terratest_terraform::options::TERRAFORM_BINARY_ENV;
use terratest_terraform::{Options, Outputs, Var};
use terratest_test_util::{assert_output_count, ProvisionTestRunner};

#[derive(Debug, Parser)]
#[command(version, about, long_about = None)]
struct Args {
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Run `terraform init` and `terraform apply`
    Apply(TemplateOpts),

    /// Run `terraform destroy`
    Destroy(TemplateOpts),

    /// Print the outputs of an applied template as JSON
    Output {
        #[command(flatten)]
        template: TemplateOpts,

        /// Print only this output
        name: Option<String>,
    },

    /// Apply the template, check its outputs, and destroy it again whatever the outcome
    Test {
        #[command(flatten)]
        template: TemplateOpts,

        /// Number of outputs the applied template must produce
        #[arg(long = "expect-outputs")]
        expect_outputs: Option<usize>,
    },
}

#[derive(Debug, clap::Args)]
struct TemplateOpts {
    /// Directory containing the Terraform template
    #[arg(long = "dir", env = "TERRATEST_DIR", default_value = ".")]
    dir: PathBuf,

    /// Terraform executable to run (defaults to `terraform` on PATH)
    #[arg(long = "terraform-binary", env = TERRAFORM_BINARY_ENV)]
    terraform_binary: Option<PathBuf>,

    /// Input variable as NAME=VALUE, passed to Terraform as a string
    #[arg(long = "var", value_name = "NAME=VALUE", value_parser = parse_string_var)]
    vars: Vec<(String, String)>,

    /// Input variable as NAME=JSON, for numbers, bools, lists, and maps
    #[arg(long = "var-json", value_name = "NAME=JSON", value_parser = parse_json_var)]
    json_vars: Vec<(String, Var)>,

    /// Variable definitions file passed with `-var-file`
    #[arg(long = "var-file")]
    var_files: Vec<PathBuf>,

    /// Disable color in Terraform output
    #[arg(long = "no-color")]
    no_color: bool,

    /// Retry the known transient provider and registry errors
    #[arg(long = "retry-default-errors")]
    retry_default_errors: bool,

    /// Number of reruns of a command that failed with a retryable error
    #[arg(long = "max-retries")]
    max_retries: Option<u32>,

    /// Pause between reruns (ex. `5s`, `1m`)
    #[arg(long = "time-between-retries", value_parser = humantime::parse_duration)]
    time_between_retries: Option<Duration>,
}

impl TemplateOpts {
    fn into_options(self) -> Options {
        let mut options = Options::new(self.dir)
            .vars(self.vars)
            .vars(self.json_vars);
        if let Some(binary) = self.terraform_binary {
            options = options.terraform_binary(binary);
        }
        options.var_files = self.var_files;
        options.no_color = self.no_color;
        if self.retry_default_errors {
            options = options.with_default_retryable_errors();
        }
        if let Some(max_retries) = self.max_retries {
            options.retry.max_retries = max_retries;
        }
        if let Some(time_between_retries) = self.time_between_retries {
            options.retry.time_between_retries = time_between_retries;
        }
        options
    }
}

fn split_var(s: &str) -> Result<(&str, &str), String> {
    match s.split_once('=') {
        Some((name, _)) if name.is_empty() => Err(format!("missing variable name in `{s}`")),
        Some(pair) => Ok(pair),
        None => Err(format!("expected NAME=VALUE, got `{s}`")),
    }
}

fn parse_string_var(s: &str) -> Result<(String, String), String> {
    let (name, value) = split_var(s)?;
    Ok((name.to_string(), value.to_string()))
}

fn parse_json_var(s: &str) -> Result<(String, Var), String> {
    let (name, value) = split_var(s)?;
    let value = serde_json::from_str(value)
        .map_err(|e| format!("invalid JSON value for `{name}`: {e}"))?;
    Ok((name.to_string(), value))
}

fn print_json(value: &impl serde::Serialize) -> anyhow::Result<()> {
    println!(
        "{}",
        serde_json::to_string_pretty(value).context("failed to encode outputs")?
    );
    Ok(())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let Args { command } = Args::parse();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::fmt::layer()
                .pretty()
                .without_time()
                .with_writer(io::stderr),
        )
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    match command {
        Command::Apply(template) => {
            let options = template.into_options();
            terratest_terraform::init_and_apply(&options)
                .await
                .context("failed to apply template")?;
        }
        Command::Destroy(template) => {
            let options = template.into_options();
            terratest_terraform::destroy(&options)
                .await
                .context("failed to destroy template")?;
        }
        Command::Output { template, name } => {
            let options = template.into_options();
            if let Some(name) = name {
                let value = terratest_terraform::output(&options, &name)
                    .await
                    .context("failed to read output")?;
                print_json(&value)?;
            } else {
                let outputs = terratest_terraform::output_all(&options)
                    .await
                    .context("failed to read outputs")?;
                print_json(&outputs)?;
            }
        }
        Command::Test {
            template,
            expect_outputs,
        } => {
            let runner = ProvisionTestRunner::new(template.into_options());
            runner
                .run(|outputs: Outputs| async move {
                    print_json(&outputs)?;
                    if let Some(expected) = expect_outputs {
                        assert_output_count(&outputs, expected)?;
                    }
                    Ok(())
                })
                .await
                .context("template test failed")?;
            info!("template test passed");
        }
    }
    Ok(())
}
