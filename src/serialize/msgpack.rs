//! MessagePack backend, plus the `X'..'` SQL-BLOB hex wrapping.

use serde::ser::{Serialize, SerializeMap, SerializeSeq, Serializer};

use super::{check_depth, SerError};
use crate::value::{Table, Value};

struct MsgpackValue<'a>(&'a Value);

impl Serialize for MsgpackValue<'_> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self.0 {
            Value::Nil => serializer.serialize_unit(),
            Value::Bool(b) => serializer.serialize_bool(*b),
            Value::Int(i) => serializer.serialize_i64(*i),
            Value::Float(f) => serializer.serialize_f64(*f),
            Value::Str(s) => serializer.serialize_str(s),
            Value::Table(t) => serialize_table(t, serializer),
        }
    }
}

/// A pure sequence encodes as an array; anything keyed encodes as a map,
/// with positional elements keyed 1..n first.
fn serialize_table<S: Serializer>(t: &Table, serializer: S) -> Result<S::Ok, S::Error> {
    if t.entries.is_empty() {
        let mut seq = serializer.serialize_seq(Some(t.seq.len()))?;
        for elem in &t.seq {
            seq.serialize_element(&MsgpackValue(elem))?;
        }
        seq.end()
    } else {
        let mut map = serializer.serialize_map(Some(t.seq.len() + t.entries.len()))?;
        for (i, elem) in t.seq.iter().enumerate() {
            map.serialize_entry(&(i as i64 + 1), &MsgpackValue(elem))?;
        }
        for (k, v) in t.sorted_entries() {
            map.serialize_entry(&MsgpackValue(k), &MsgpackValue(v))?;
        }
        map.end()
    }
}

fn value_depth(v: &Value) -> usize {
    match v {
        Value::Table(t) => {
            let inner = t
                .seq
                .iter()
                .chain(t.entries.iter().flat_map(|(k, v)| [k, v]))
                .map(value_depth)
                .max()
                .unwrap_or(0);
            inner + 1
        }
        _ => 0,
    }
}

pub fn to_msgpack(v: &Value) -> Result<Vec<u8>, SerError> {
    check_depth(value_depth(v))?;
    rmp_serde::to_vec(&MsgpackValue(v)).map_err(|e| SerError::Encode(e.to_string()))
}

/// MessagePack bytes wrapped as a SQL BLOB literal: `X'68656c..'`.
pub fn to_sql_blob(v: &Value) -> Result<String, SerError> {
    let bytes = to_msgpack(v)?;
    Ok(format!("X'{}'", hex::encode_upper(bytes)))
}
