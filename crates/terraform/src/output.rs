//! Decoding of `terraform output -json`

use std::collections::BTreeMap;

use serde::Deserialize;
use serde_json::Value;

use crate::error::{Error, Result};

/// Output values produced by an applied template, keyed by output name
pub type Outputs = BTreeMap<String, Value>;

/// One entry of the `terraform output -json` document
#[derive(Clone, Debug, PartialEq, Deserialize)]
pub struct OutputEntry {
    #[serde(default)]
    pub sensitive: bool,
    /// Terraform type constraint of the value (ex. `"string"` or `["list", "string"]`)
    #[serde(rename = "type", default)]
    pub ty: Value,
    pub value: Value,
}

/// Decode the full `terraform output -json` document
pub fn parse_output_entries(json: &str) -> Result<BTreeMap<String, OutputEntry>> {
    let json = json.trim();
    // Older Terraform releases print nothing at all when no outputs are declared
    if json.is_empty() {
        return Ok(BTreeMap::new());
    }
    serde_json::from_str(json).map_err(Error::DecodeOutput)
}

/// Decode `terraform output -json` into just the output values
pub fn parse_outputs(json: &str) -> Result<Outputs> {
    Ok(parse_output_entries(json)?
        .into_iter()
        .map(|(name, entry)| (name, entry.value))
        .collect())
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    const GCE_OUTPUTS: &str = r#"{
        "instance_id": {"sensitive": false, "type": "string", "value": "1234567890"},
        "public_ip": {"sensitive": false, "type": "string", "value": "34.68.1.2"}
    }"#;

    #[test]
    fn values_are_extracted() {
        let outputs = parse_outputs(GCE_OUTPUTS).expect("failed to parse outputs");
        assert_eq!(outputs.len(), 2);
        assert_eq!(outputs["public_ip"], json!("34.68.1.2"));
    }

    #[test]
    fn entries_keep_metadata() {
        let entries = parse_output_entries(
            r#"{"password": {"sensitive": true, "type": ["list", "string"], "value": ["a"]}}"#,
        )
        .expect("failed to parse outputs");
        let entry = &entries["password"];
        assert!(entry.sensitive);
        assert_eq!(entry.ty, json!(["list", "string"]));
    }

    #[test]
    fn empty_document_has_no_outputs() {
        assert!(parse_outputs("{}\n").expect("empty object").is_empty());
        assert!(parse_outputs("").expect("empty string").is_empty());
    }

    #[test]
    fn garbage_is_a_decode_error() {
        assert!(matches!(
            parse_outputs("Error: no state"),
            Err(Error::DecodeOutput(_))
        ));
    }
}
