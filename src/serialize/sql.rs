//! SQL literal backend.
//!
//! Strings single-quote with `'` doubled and backslashes doubled; null
//! bytes are stripped before quoting. Booleans emit `1`/`0`, nil emits
//! `NULL`. Nested tables go through a pluggable sub-serializer and the
//! resulting text is quoted like a string.

use super::{check_depth, to_canonical, to_typed_json, SerError};
use crate::value::{to_plain_number, Value};

/// How a nested table is rendered before being quoted into the literal.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, strum_macros::Display, strum_macros::EnumString)]
#[strum(serialize_all = "snake_case")]
pub enum TableSql {
    #[default]
    Canonical,
    TypedJson,
}

impl TableSql {
    fn render(&self, v: &Value) -> Result<String, SerError> {
        match self {
            TableSql::Canonical => to_canonical(v),
            TableSql::TypedJson => to_typed_json(v),
        }
    }
}

pub fn to_sql_literal(v: &Value, table_sql: TableSql) -> Result<String, SerError> {
    check_depth(1)?;
    Ok(match v {
        Value::Nil => "NULL".to_string(),
        Value::Bool(true) => "1".to_string(),
        Value::Bool(false) => "0".to_string(),
        Value::Int(_) | Value::Float(_) => to_plain_number(v),
        Value::Str(s) => quote_sql(s),
        Value::Table(_) => quote_sql(&table_sql.render(v)?),
    })
}

fn quote_sql(s: &str) -> String {
    let mut out = String::with_capacity(s.len() + 2);
    out.push('\'');
    for c in s.chars() {
        match c {
            // Null bytes are stripped rather than escaped.
            '\0' => {}
            '\'' => out.push_str("''"),
            '\\' => out.push_str("\\\\"),
            other => out.push(other),
        }
    }
    out.push('\'');
    out
}
