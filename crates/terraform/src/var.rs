//! Input variable values and their `-var` rendering

use std::collections::BTreeMap;
use std::fmt::{self, Display, Write as _};

use serde::de::{self, Visitor};
use serde::{Deserialize, Deserializer, Serialize};

/// A value supplied to a Terraform input variable.
///
/// Terraform variables may be strings, numbers, bools, or arbitrarily nested lists and maps of
/// those. Deserialization is untagged, so any JSON document without `null`s converts directly:
///
/// ```
/// use terratest_terraform::Var;
///
/// let var: Var = serde_json::from_str(r#"{"tags": ["web", "test"], "replicas": 2}"#).unwrap();
/// assert_eq!(var.to_string(), r#"{"replicas" = 2, "tags" = ["web", "test"]}"#);
/// ```
///
/// Integers must fit in an `i64`. Larger ones are rejected rather than rounded to a float.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Var {
    Bool(bool),
    Int(i64),
    Float(#[serde(deserialize_with = "float_only")] f64),
    String(String),
    List(Vec<Var>),
    Map(BTreeMap<String, Var>),
}

/// Accept only JSON numbers written with a fraction or exponent
fn float_only<'de, D: Deserializer<'de>>(deserializer: D) -> Result<f64, D::Error> {
    struct FloatVisitor;

    impl Visitor<'_> for FloatVisitor {
        type Value = f64;

        fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
            f.write_str("a floating point number")
        }

        fn visit_f64<E: de::Error>(self, v: f64) -> Result<f64, E> {
            Ok(v)
        }
    }

    deserializer.deserialize_f64(FloatVisitor)
}

impl Var {
    /// Render this value as the right-hand side of a `-var name=value` argument.
    ///
    /// A top-level string is passed through untouched, which is what the Terraform CLI expects
    /// for `string` variables. Everything else is written as an HCL expression.
    #[must_use]
    pub fn to_arg_value(&self) -> String {
        match self {
            Self::String(s) => s.clone(),
            other => other.to_hcl(),
        }
    }

    /// Render this value as an HCL expression, quoting strings
    #[must_use]
    pub fn to_hcl(&self) -> String {
        let mut out = String::new();
        self.write_hcl(&mut out);
        out
    }

    fn write_hcl(&self, out: &mut String) {
        match self {
            Self::Bool(b) => {
                let _ = write!(out, "{b}");
            }
            Self::Int(n) => {
                let _ = write!(out, "{n}");
            }
            Self::Float(n) => {
                let _ = write!(out, "{n}");
            }
            Self::String(s) => write_quoted(out, s),
            Self::List(items) => {
                out.push('[');
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        out.push_str(", ");
                    }
                    item.write_hcl(out);
                }
                out.push(']');
            }
            Self::Map(entries) => {
                out.push('{');
                for (i, (key, value)) in entries.iter().enumerate() {
                    if i > 0 {
                        out.push_str(", ");
                    }
                    write_quoted(out, key);
                    out.push_str(" = ");
                    value.write_hcl(out);
                }
                out.push('}');
            }
        }
    }
}

fn write_quoted(out: &mut String, s: &str) {
    out.push('"');
    let mut chars = s.chars().peekable();
    while let Some(c) = chars.next() {
        match c {
            '"' => out.push_str("\\\""),
            '\\' => out.push_str("\\\\"),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            '\t' => out.push_str("\\t"),
            // `${` and `%{` open template sequences inside HCL strings
            '$' | '%' if chars.peek() == Some(&'{') => {
                out.push(c);
                out.push(c);
            }
            c => out.push(c),
        }
    }
    out.push('"');
}

impl Display for Var {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_arg_value())
    }
}

impl From<&str> for Var {
    fn from(s: &str) -> Self {
        Self::String(s.to_string())
    }
}

impl From<String> for Var {
    fn from(s: String) -> Self {
        Self::String(s)
    }
}

impl From<bool> for Var {
    fn from(b: bool) -> Self {
        Self::Bool(b)
    }
}

impl From<i32> for Var {
    fn from(n: i32) -> Self {
        Self::Int(n.into())
    }
}

impl From<i64> for Var {
    fn from(n: i64) -> Self {
        Self::Int(n)
    }
}

impl From<u32> for Var {
    fn from(n: u32) -> Self {
        Self::Int(n.into())
    }
}

impl From<f64> for Var {
    fn from(n: f64) -> Self {
        Self::Float(n)
    }
}

impl<T: Into<Var>> From<Vec<T>> for Var {
    fn from(items: Vec<T>) -> Self {
        Self::List(items.into_iter().map(Into::into).collect())
    }
}

impl<K: Into<String>, V: Into<Var>> From<BTreeMap<K, V>> for Var {
    fn from(entries: BTreeMap<K, V>) -> Self {
        Self::Map(
            entries
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        )
    }
}

impl<K: Into<String>, V: Into<Var>, const N: usize> From<[(K, V); N]> for Var {
    fn from(entries: [(K, V); N]) -> Self {
        Self::Map(
            entries
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        )
    }
}
