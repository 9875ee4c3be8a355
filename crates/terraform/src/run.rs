//! Running the Terraform binary, with retries for known-transient failures

use std::io::{BufRead as _, Read};
use std::process::{Output, Stdio};

use regex::Regex;
use tokio::io::{AsyncBufReadExt as _, AsyncRead, BufReader};
use tracing::{info, warn};

use crate::error::{Error, Result};
use crate::options::Options;

/// Run Terraform with `args` in the template directory, returning its stdout.
///
/// Each line Terraform prints is logged at `info` as it arrives.
///
/// Failed runs whose output matches one of `options.retry.retryable_errors` are rerun up to
/// `options.retry.max_retries` times, sleeping `options.retry.time_between_retries` in between.
pub async fn run_terraform(options: &Options, args: &[String]) -> Result<String> {
    let retryable = options.retry.compile()?;
    let mut attempt = 0;
    loop {
        let output = stream_output(options, args).await?;
        match check_output(options, args, output, &retryable, attempt)? {
            Some(stdout) => return Ok(stdout),
            None => {
                attempt += 1;
                tokio::time::sleep(options.retry.time_between_retries).await;
            }
        }
    }
}

/// Blocking equivalent of [`run_terraform`], for contexts that cannot await (ex. `Drop`)
pub fn run_terraform_blocking(options: &Options, args: &[String]) -> Result<String> {
    let retryable = options.retry.compile()?;
    let mut attempt = 0;
    loop {
        let output = stream_output_blocking(options, args)?;
        match check_output(options, args, output, &retryable, attempt)? {
            Some(stdout) => return Ok(stdout),
            None => {
                attempt += 1;
                std::thread::sleep(options.retry.time_between_retries);
            }
        }
    }
}

async fn stream_output(options: &Options, args: &[String]) -> Result<Output> {
    let command = command_line(options, args);
    let mut child = command_builder(options, args)
        .spawn()
        .map_err(|source| spawn_error(options, source))?;
    let (stdout, stderr) = tokio::join!(
        forward_lines(child.stdout.take(), &command, "stdout"),
        forward_lines(child.stderr.take(), &command, "stderr"),
    );
    let status = child
        .wait()
        .await
        .map_err(|source| spawn_error(options, source))?;
    Ok(Output {
        status,
        stdout,
        stderr,
    })
}

fn stream_output_blocking(options: &Options, args: &[String]) -> Result<Output> {
    let command = command_line(options, args);
    let mut child = std_command(options, args)
        .spawn()
        .map_err(|source| spawn_error(options, source))?;
    let stdout = child.stdout.take();
    let stderr = child.stderr.take();
    let (stdout, stderr) = std::thread::scope(|s| {
        let stdout = s.spawn(|| forward_lines_blocking(stdout, &command, "stdout"));
        let stderr = forward_lines_blocking(stderr, &command, "stderr");
        (stdout.join().unwrap_or_default(), stderr)
    });
    let status = child.wait().map_err(|source| spawn_error(options, source))?;
    Ok(Output {
        status,
        stdout,
        stderr,
    })
}

/// Log every line of `reader` and return everything read
async fn forward_lines(
    reader: Option<impl AsyncRead + Unpin>,
    command: &str,
    stream: &'static str,
) -> Vec<u8> {
    let mut collected = Vec::new();
    let Some(reader) = reader else {
        return collected;
    };
    let mut lines = BufReader::new(reader).split(b'\n');
    while let Ok(Some(line)) = lines.next_segment().await {
        info!(command, stream, "{}", String::from_utf8_lossy(&line));
        collected.extend_from_slice(&line);
        collected.push(b'\n');
    }
    collected
}

fn forward_lines_blocking(reader: Option<impl Read>, command: &str, stream: &str) -> Vec<u8> {
    let mut collected = Vec::new();
    let Some(reader) = reader else {
        return collected;
    };
    for line in std::io::BufReader::new(reader).split(b'\n') {
        let Ok(line) = line else { break };
        info!(command, stream, "{}", String::from_utf8_lossy(&line));
        collected.extend_from_slice(&line);
        collected.push(b'\n');
    }
    collected
}

fn command_builder(options: &Options, args: &[String]) -> tokio::process::Command {
    let mut cmd = tokio::process::Command::new(&options.terraform_binary);
    cmd.args(args)
        .current_dir(&options.terraform_dir)
        .env("TF_IN_AUTOMATION", "1")
        .envs(&options.env_vars)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true);
    cmd
}

fn std_command(options: &Options, args: &[String]) -> std::process::Command {
    let mut cmd = std::process::Command::new(&options.terraform_binary);
    cmd.args(args)
        .current_dir(&options.terraform_dir)
        .env("TF_IN_AUTOMATION", "1")
        .envs(&options.env_vars)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped());
    cmd
}

fn command_line(options: &Options, args: &[String]) -> String {
    let mut line = options.terraform_binary.display().to_string();
    for arg in args {
        line.push(' ');
        line.push_str(arg);
    }
    line
}

fn spawn_error(options: &Options, source: std::io::Error) -> Error {
    Error::Spawn {
        binary: options.terraform_binary.display().to_string(),
        source,
    }
}

/// Inspect a finished run. Returns stdout on success, `None` if the run should be retried, or
/// the failure otherwise.
fn check_output(
    options: &Options,
    args: &[String],
    output: Output,
    retryable: &[(Regex, &str)],
    attempt: u32,
) -> Result<Option<String>> {
    let command = command_line(options, args);
    let stdout = String::from_utf8_lossy(&output.stdout).into_owned();
    let stderr = String::from_utf8_lossy(&output.stderr).into_owned();
    if output.status.success() {
        info!(%command, "terraform command succeeded");
        return Ok(Some(stdout));
    }

    if attempt < options.retry.max_retries {
        let combined = format!("{stdout}\n{stderr}");
        if let Some((re, description)) = retryable.iter().find(|(re, _)| re.is_match(&combined)) {
            warn!(
                %command,
                pattern = re.as_str(),
                attempt = attempt + 1,
                max_retries = options.retry.max_retries,
                "{description} Retrying in {:?}",
                options.retry.time_between_retries
            );
            return Ok(None);
        }
    }

    Err(Error::CommandFailed {
        command,
        code: output.status.code(),
        stdout,
        stderr,
    })
}
