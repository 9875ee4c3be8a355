//! A scriptable stand-in for the Terraform binary.
//!
//! [`FakeTerraform`] writes a small shell script that understands `init`, `apply`, `output`, and
//! `destroy`, records every invocation, and fails on demand. It lets the provision/verify/destroy
//! cycle be exercised without a cloud account.

use std::collections::BTreeMap;
use std::fmt::Write as _;
use std::fs;
use std::io::ErrorKind;
use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};
use std::thread;
use std::time::Duration;

use anyhow::{bail, Context as _, Result};
use serde_json::{json, Map, Value};
use tempfile::TempDir;

use terratest_terraform::Options;

const SCRIPT_NAME: &str = "terraform";
const INVOCATIONS_LOG: &str = "invocations.log";
const OUTPUTS_FILE: &str = "outputs.json";
const APPLY_ATTEMPTS_FILE: &str = "apply.attempts";
const ENVIRONMENT_FILE: &str = "environment";

/// `ETXTBSY`: another thread forked while the script was still open for writing
const TEXT_FILE_BUSY: i32 = 26;

/// Builder for a [`FakeTerraform`]
#[derive(Clone, Debug, Default)]
pub struct FakeTerraformBuilder {
    outputs: Map<String, Value>,
    raw_outputs: Option<String>,
    init_exit_code: i32,
    apply_exit_code: i32,
    destroy_exit_code: i32,
    transient_apply_failures: u32,
    transient_message: String,
}

impl FakeTerraformBuilder {
    /// Declare an output that `terraform output -json` reports after apply
    #[must_use]
    pub fn output(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.outputs.insert(
            name.into(),
            json!({ "sensitive": false, "type": "string", "value": value.into() }),
        );
        self
    }

    /// Make `terraform output -json` print `document` verbatim instead of the declared outputs
    #[must_use]
    pub fn raw_outputs(mut self, document: impl Into<String>) -> Self {
        self.raw_outputs = Some(document.into());
        self
    }

    #[must_use]
    pub fn init_exit_code(mut self, code: i32) -> Self {
        self.init_exit_code = code;
        self
    }

    #[must_use]
    pub fn apply_exit_code(mut self, code: i32) -> Self {
        self.apply_exit_code = code;
        self
    }

    #[must_use]
    pub fn destroy_exit_code(mut self, code: i32) -> Self {
        self.destroy_exit_code = code;
        self
    }

    /// Make the first `count` applies fail with `message` on stderr before succeeding
    #[must_use]
    pub fn transient_apply_failures(mut self, count: u32, message: impl Into<String>) -> Self {
        self.transient_apply_failures = count;
        self.transient_message = message.into();
        self
    }

    /// Write the script into a fresh temporary directory
    pub fn build(self) -> Result<FakeTerraform> {
        let dir = tempfile::tempdir().context("failed to create temporary directory")?;
        let state_dir = dir.path();

        let outputs = match self.raw_outputs {
            Some(document) => document.into_bytes(),
            None => serde_json::to_vec_pretty(&Value::Object(self.outputs))
                .context("failed to encode fake outputs")?,
        };
        fs::write(state_dir.join(OUTPUTS_FILE), outputs).context("failed to write fake outputs")?;

        let binary = state_dir.join(SCRIPT_NAME);
        let script = script(
            state_dir,
            self.init_exit_code,
            self.apply_exit_code,
            self.destroy_exit_code,
            self.transient_apply_failures,
            &self.transient_message,
        );
        fs::write(&binary, script).context("failed to write fake terraform script")?;
        fs::set_permissions(&binary, fs::Permissions::from_mode(0o755))
            .context("failed to make fake terraform script executable")?;
        wait_until_executable(&binary)?;

        Ok(FakeTerraform { dir, binary })
    }
}

/// A fake Terraform binary living in its own temporary directory, removed on drop
pub struct FakeTerraform {
    dir: TempDir,
    binary: PathBuf,
}

impl FakeTerraform {
    #[must_use]
    pub fn builder() -> FakeTerraformBuilder {
        FakeTerraformBuilder::default()
    }

    /// Path of the fake executable
    #[must_use]
    pub fn binary(&self) -> &Path {
        &self.binary
    }

    /// Directory the fake keeps its state in, also usable as a template directory
    #[must_use]
    pub fn dir(&self) -> &Path {
        self.dir.path()
    }

    /// [`Options`] pointing at this fake, with the fake's directory as the template directory
    #[must_use]
    pub fn options(&self) -> Options {
        Options::new(self.dir()).terraform_binary(self.binary())
    }

    /// Every recorded invocation, one space-joined argument list per entry
    pub fn invocations(&self) -> Result<Vec<String>> {
        let path = self.dir().join(INVOCATIONS_LOG);
        match fs::read_to_string(&path) {
            Ok(log) => Ok(log.lines().map(ToString::to_string).collect()),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(Vec::new()),
            Err(e) => Err(e).with_context(|| format!("failed to read `{}`", path.display())),
        }
    }

    /// Subcommands in invocation order (ex. `["init", "apply", "output", "destroy"]`)
    pub fn subcommands(&self) -> Result<Vec<String>> {
        Ok(self
            .invocations()?
            .iter()
            .filter_map(|line| line.split_whitespace().next())
            .map(ToString::to_string)
            .collect())
    }

    /// Environment of the most recent invocation
    pub fn environment(&self) -> Result<BTreeMap<String, String>> {
        let path = self.dir().join(ENVIRONMENT_FILE);
        let env = fs::read_to_string(&path)
            .with_context(|| format!("failed to read `{}`", path.display()))?;
        Ok(env
            .lines()
            .filter_map(|line| line.split_once('='))
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect())
    }

    /// Number of times `subcommand` was invoked
    pub fn count(&self, subcommand: &str) -> Result<usize> {
        Ok(self
            .subcommands()?
            .iter()
            .filter(|s| *s == subcommand)
            .count())
    }
}

fn script(
    state_dir: &Path,
    init_exit_code: i32,
    apply_exit_code: i32,
    destroy_exit_code: i32,
    transient_apply_failures: u32,
    transient_message: &str,
) -> String {
    let state = shell_quote(&state_dir.display().to_string());
    let transient = shell_quote(transient_message);
    let mut script = String::from("#!/bin/sh\n");
    let _ = write!(
        script,
        r#"state={state}
if [ "$1" = "version" ]; then
    echo "Terraform v1.9.0 (fake)"
    exit 0
fi
printf '%s\n' "$*" >> "$state/{INVOCATIONS_LOG}"
env > "$state/{ENVIRONMENT_FILE}"
case "$1" in
init)
    echo "Terraform has been successfully initialized!"
    exit {init_exit_code}
    ;;
apply)
    attempts=$(cat "$state/{APPLY_ATTEMPTS_FILE}" 2>/dev/null || echo 0)
    attempts=$((attempts + 1))
    echo "$attempts" > "$state/{APPLY_ATTEMPTS_FILE}"
    if [ "$attempts" -le {transient_apply_failures} ]; then
        echo {transient} >&2
        exit 1
    fi
    if [ {apply_exit_code} -ne 0 ]; then
        echo "Error: fake apply failure" >&2
        exit {apply_exit_code}
    fi
    echo "Apply complete! Resources: 1 added, 0 changed, 0 destroyed."
    ;;
output)
    cat "$state/{OUTPUTS_FILE}"
    ;;
destroy)
    if [ {destroy_exit_code} -ne 0 ]; then
        echo "Error: fake destroy failure" >&2
        exit {destroy_exit_code}
    fi
    echo "Destroy complete! Resources: 1 destroyed."
    ;;
*)
    echo "unsupported subcommand: $1" >&2
    exit 2
    ;;
esac
"#
    );
    script
}

fn shell_quote(s: &str) -> String {
    format!("'{}'", s.replace('\'', r"'\''"))
}

/// Run `version` until the kernel stops reporting the script as busy
fn wait_until_executable(binary: &Path) -> Result<()> {
    for _ in 0..50 {
        match Command::new(binary)
            .arg("version")
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .status()
        {
            Ok(status) if status.success() => return Ok(()),
            Ok(status) => bail!("fake terraform `version` exited with {status}"),
            Err(e) if e.raw_os_error() == Some(TEXT_FILE_BUSY) => {
                thread::sleep(Duration::from_millis(10));
            }
            Err(e) => return Err(e).context("failed to run fake terraform"),
        }
    }
    bail!("fake terraform at `{}` stayed busy", binary.display())
}
