//! Typed and natural JSON backends.
//!
//! The typed form preserves the exact table shape: `[size, elem, ...]`
//! for sequences, `[0, ["k","v"], ...]` for maps, and a mixture for mixed
//! tables. Integers ride as `{"int":"N"}` strings to survive 64-bit
//! round-trips; non-finite floats as `{"float":"nan"|"inf"|"-inf"}`.
//!
//! The natural form is plain JSON: arrays, objects with sorted keys,
//! integers as numbers, non-finite floats as `"NAN"`, `"INF"`, `"-INF"`.

use serde_json::{json, Map, Number};

use super::{check_depth, SerError};
use crate::value::{Value, to_plain_number};

pub fn to_typed_json(v: &Value) -> Result<String, SerError> {
    let json = typed_at(v, 1)?;
    Ok(json.to_string())
}

fn typed_at(v: &Value, depth: usize) -> Result<serde_json::Value, SerError> {
    check_depth(depth)?;
    Ok(match v {
        Value::Nil => serde_json::Value::Null,
        Value::Bool(b) => json!(b),
        Value::Int(i) => json!({ "int": i.to_string() }),
        Value::Float(f) => {
            if f.is_nan() {
                json!({ "float": "nan" })
            } else if f.is_infinite() {
                json!({ "float": if *f > 0.0 { "inf" } else { "-inf" } })
            } else {
                match Number::from_f64(*f) {
                    Some(n) => serde_json::Value::Number(n),
                    None => json!({ "float": "nan" }),
                }
            }
        }
        Value::Str(s) => json!(s),
        Value::Table(t) => {
            let mut out = Vec::with_capacity(1 + t.seq.len() + t.entries.len());
            out.push(json!(t.seq.len()));
            for elem in &t.seq {
                out.push(typed_at(elem, depth + 1)?);
            }
            for (k, val) in t.sorted_entries() {
                out.push(serde_json::Value::Array(vec![
                    typed_at(k, depth + 1)?,
                    typed_at(val, depth + 1)?,
                ]));
            }
            serde_json::Value::Array(out)
        }
    })
}

pub fn to_natural_json(v: &Value) -> Result<String, SerError> {
    let json = natural_at(v, 1)?;
    Ok(json.to_string())
}

fn natural_at(v: &Value, depth: usize) -> Result<serde_json::Value, SerError> {
    check_depth(depth)?;
    Ok(match v {
        Value::Nil => serde_json::Value::Null,
        Value::Bool(b) => json!(b),
        Value::Int(i) => json!(i),
        Value::Float(f) => {
            if f.is_nan() {
                json!("NAN")
            } else if f.is_infinite() {
                json!(if *f > 0.0 { "INF" } else { "-INF" })
            } else {
                match Number::from_f64(*f) {
                    Some(n) => serde_json::Value::Number(n),
                    None => json!("NAN"),
                }
            }
        }
        Value::Str(s) => json!(s),
        Value::Table(t) => {
            if t.entries.is_empty() {
                let mut out = Vec::with_capacity(t.seq.len());
                for elem in &t.seq {
                    out.push(natural_at(elem, depth + 1)?);
                }
                serde_json::Value::Array(out)
            } else {
                // serde_json's default map is ordered by key.
                let mut out = Map::new();
                for (i, elem) in t.seq.iter().enumerate() {
                    out.insert((i + 1).to_string(), natural_at(elem, depth + 1)?);
                }
                for (k, val) in t.sorted_entries() {
                    out.insert(natural_key(k), natural_at(val, depth + 1)?);
                }
                serde_json::Value::Object(out)
            }
        }
    })
}

fn natural_key(k: &Value) -> String {
    match k {
        Value::Str(s) => s.clone(),
        Value::Int(_) | Value::Float(_) => to_plain_number(k),
        Value::Bool(b) => b.to_string(),
        _ => String::new(),
    }
}
