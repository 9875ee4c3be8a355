//! Scoped changes to the process environment

use std::ffi::{OsStr, OsString};

/// Restores an environment variable to its previous value (or absence) when dropped, including
/// when a failing assertion unwinds past it.
///
/// The environment is process-wide: tests using this guard should also be marked
/// `#[serial_test::serial]`.
#[must_use = "the variable is restored as soon as the guard is dropped"]
pub struct EnvVarGuard {
    var_name: OsString,
    var_value: Option<OsString>,
}

impl Drop for EnvVarGuard {
    fn drop(&mut self) {
        if let Some(val) = self.var_value.take() {
            std::env::set_var(&self.var_name, val);
        } else {
            std::env::remove_var(&self.var_name);
        }
    }
}

impl EnvVarGuard {
    /// Sets the environment variable `key` to `val` and returns a guard that will reset the
    /// environment variable to its original value when dropped.
    pub fn set(key: impl AsRef<OsStr>, val: impl AsRef<OsStr>) -> Self {
        let guard = Self::save(key);
        std::env::set_var(&guard.var_name, val);
        guard
    }

    /// Removes the environment variable `key` until the guard is dropped
    pub fn remove(key: impl AsRef<OsStr>) -> Self {
        let guard = Self::save(key);
        std::env::remove_var(&guard.var_name);
        guard
    }

    fn save(key: impl AsRef<OsStr>) -> Self {
        let var_name = OsString::from(key.as_ref());
        let var_value = std::env::var_os(&var_name);
        Self {
            var_name,
            var_value,
        }
    }
}
