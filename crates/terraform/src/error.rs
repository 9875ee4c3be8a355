use std::io;

/// Errors produced while running the Terraform CLI
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// The Terraform binary could not be started at all
    #[error("failed to spawn `{binary}`")]
    Spawn {
        binary: String,
        #[source]
        source: io::Error,
    },

    /// Terraform ran and exited unsuccessfully
    #[error("`{command}` exited with {}: {}", exit_code_str(.code), .stderr.trim())]
    CommandFailed {
        command: String,
        /// Exit code, if the process was not killed by a signal
        code: Option<i32>,
        stdout: String,
        stderr: String,
    },

    #[error("invalid retryable error pattern `{pattern}`")]
    InvalidRetryPattern {
        pattern: String,
        #[source]
        source: regex::Error,
    },

    #[error("failed to decode `terraform output -json`")]
    DecodeOutput(#[source] serde_json::Error),

    #[error("output `{0}` not found")]
    OutputNotFound(String),
}

fn exit_code_str(code: &Option<i32>) -> String {
    code.map_or_else(|| "no exit code".to_string(), |c| format!("exit code {c}"))
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
