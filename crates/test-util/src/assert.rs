//! Assertions over the outputs of an applied template

use terratest_terraform::Outputs;

use crate::error::AssertionError;

/// Ensure that an applied template produced exactly `expected` outputs
pub fn assert_output_count(outputs: &Outputs, expected: usize) -> Result<(), AssertionError> {
    if outputs.len() == expected {
        return Ok(());
    }
    Err(AssertionError {
        expected,
        actual: outputs.len(),
        names: outputs.keys().cloned().collect(),
    })
}
