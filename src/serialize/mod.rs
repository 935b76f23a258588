//! Serializer backends for parsed values.
//!
//! Six backends share the recursive shape and the hard depth bound of
//! [`MAX_DEPTH`]. The literal grammar cannot express cyclic tables and
//! ownership makes self-reference unrepresentable, so the depth bound is
//! the only guard the recursion needs.

mod json;
mod msgpack;
mod sql;
mod xml;

pub use json::{to_natural_json, to_typed_json};
pub use msgpack::{to_msgpack, to_sql_blob};
pub use sql::{to_sql_literal, TableSql};
pub use xml::to_xml;

use thiserror::Error;

use crate::literal::quote;
use crate::predicates::is_identifier;
use crate::value::{self, Value, MAX_DEPTH};

#[derive(Debug, Error, PartialEq)]
pub enum SerError {
    #[error("Maximal depth reached!")]
    MaxDepth,

    #[error("MessagePack encoding failed: {0}")]
    Encode(String),
}

pub(crate) fn check_depth(depth: usize) -> Result<(), SerError> {
    if depth > MAX_DEPTH {
        Err(SerError::MaxDepth)
    } else {
        Ok(())
    }
}

/// Canonical TSV nested form: numbers plain, strings double-quoted,
/// tables braced with positional elements first and keyed entries sorted
/// by key. Nil positional slots serialize as empty pieces.
pub fn to_canonical(v: &Value) -> Result<String, SerError> {
    canonical_at(v, 1)
}

fn canonical_at(v: &Value, depth: usize) -> Result<String, SerError> {
    check_depth(depth)?;
    match v {
        Value::Nil => Ok(String::new()),
        Value::Bool(b) => Ok(b.to_string()),
        Value::Int(_) | Value::Float(_) => Ok(value::to_plain_number(v)),
        Value::Str(s) => Ok(quote(s)),
        Value::Table(t) => {
            let mut parts = Vec::with_capacity(t.seq.len() + t.entries.len());
            for elem in &t.seq {
                parts.push(canonical_at(elem, depth + 1)?);
            }
            for (k, val) in t.sorted_entries() {
                let key = canonical_key(k, depth + 1)?;
                parts.push(format!("{}={}", key, canonical_at(val, depth + 1)?));
            }
            Ok(format!("{{{}}}", parts.join(",")))
        }
    }
}

/// Identifier keys print bare so the literal parser can read them back;
/// anything else falls through to its scalar form.
fn canonical_key(k: &Value, depth: usize) -> Result<String, SerError> {
    match k {
        Value::Str(s) if is_identifier(s) => Ok(s.clone()),
        other => canonical_at(other, depth),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::value::Table;

    fn deep_table(levels: usize) -> Value {
        let mut v = Value::Int(1);
        for _ in 0..levels {
            v = Value::Table(Table { seq: vec![v], entries: vec![] });
        }
        v
    }

    #[test]
    fn canonical_scalars() {
        assert_eq!(to_canonical(&Value::Int(42)).unwrap(), "42");
        assert_eq!(to_canonical(&Value::Bool(true)).unwrap(), "true");
        assert_eq!(to_canonical(&Value::Str("a\tb".into())).unwrap(), "\"a\\tb\"");
        assert_eq!(to_canonical(&Value::Nil).unwrap(), "");
    }

    #[test]
    fn canonical_table_sorts_keys() {
        let mut t = Table::new();
        t.set(Value::Str("b".into()), Value::Int(2));
        t.set(Value::Str("a".into()), Value::Int(1));
        assert_eq!(to_canonical(&Value::Table(t)).unwrap(), "{a=1,b=2}");
    }

    #[test]
    fn canonical_mixed_table() {
        let mut t = Table::new();
        t.seq.push(Value::Int(1));
        t.seq.push(Value::Nil);
        t.set(Value::Str("k".into()), Value::Str("v".into()));
        assert_eq!(to_canonical(&Value::Table(t)).unwrap(), "{1,,k=\"v\"}");
    }

    #[test]
    fn depth_ten_serializes_eleven_fails() {
        assert!(to_canonical(&deep_table(10)).is_ok());
        let err = to_canonical(&deep_table(11)).unwrap_err();
        assert_eq!(err.to_string(), "Maximal depth reached!");
    }

    #[test]
    fn canonical_round_trips_through_literal_parser() {
        let mut inner = Table::new();
        inner.seq.push(Value::Int(2));
        inner.seq.push(Value::Int(3));
        let mut t = Table::new();
        t.set(Value::Str("a".into()), Value::Int(1));
        t.set(Value::Str("b".into()), Value::Table(inner));
        let v = Value::Table(t);
        let text = to_canonical(&v).unwrap();
        assert_eq!(text, "{a=1,b={2,3}}");
        let mut bad = crate::report::BadVal::discarding();
        let reparsed = crate::literal::parse_table_literal(&mut bad, &text).unwrap();
        assert_eq!(to_canonical(&reparsed).unwrap(), text);
    }
}
