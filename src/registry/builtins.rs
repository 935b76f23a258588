//! Built-in primitives and their parsers.
//!
//! Bootstrap installs every primitive with its declared extension link
//! (`integer → number`, `identifier → name`, ...). Each primitive parser
//! is a predicate plus a reformatter producing the canonical cell text.

use std::rc::Rc;

use base64::Engine as _;

use super::{ParseContext, ParserEntry, Payload, Registry, TypeKind};
use crate::literal;
use crate::predicates;
use crate::report::BadVal;
use crate::value::{self, Value};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, strum_macros::Display, strum_macros::EnumIter)]
#[strum(serialize_all = "snake_case")]
pub enum Primitive {
    String,
    Number,
    Boolean,
    Nil,
    Integer,
    Float,
    Long,
    Ubyte,
    Uint,
    Name,
    Identifier,
    Ascii,
    Text,
    Asciitext,
    Markdown,
    Asciimarkdown,
    Comment,
    Percent,
    Http,
    Regex,
    Version,
    CmpVersion,
    Ratio,
    Raw,
    Any,
    Table,
    Hexbytes,
    Base64bytes,
}

impl Primitive {
    /// Registered spelling. `cmp_version` is the one name the snake_case
    /// derive cannot produce from the variant alone.
    pub fn spec_name(&self) -> &'static str {
        match self {
            Primitive::CmpVersion => "cmp_version",
            Primitive::String => "string",
            Primitive::Number => "number",
            Primitive::Boolean => "boolean",
            Primitive::Nil => "nil",
            Primitive::Integer => "integer",
            Primitive::Float => "float",
            Primitive::Long => "long",
            Primitive::Ubyte => "ubyte",
            Primitive::Uint => "uint",
            Primitive::Name => "name",
            Primitive::Identifier => "identifier",
            Primitive::Ascii => "ascii",
            Primitive::Text => "text",
            Primitive::Asciitext => "asciitext",
            Primitive::Markdown => "markdown",
            Primitive::Asciimarkdown => "asciimarkdown",
            Primitive::Comment => "comment",
            Primitive::Percent => "percent",
            Primitive::Http => "http",
            Primitive::Regex => "regex",
            Primitive::Version => "version",
            Primitive::Ratio => "ratio",
            Primitive::Raw => "raw",
            Primitive::Any => "any",
            Primitive::Table => "table",
            Primitive::Hexbytes => "hexbytes",
            Primitive::Base64bytes => "base64bytes",
        }
    }

    /// Declared extension parent, or `None` for root primitives.
    pub fn parent(&self) -> Option<&'static str> {
        match self {
            Primitive::Integer | Primitive::Float | Primitive::Long | Primitive::Percent => {
                Some("number")
            }
            Primitive::Ubyte | Primitive::Uint => Some("integer"),
            Primitive::Name => Some("ascii"),
            Primitive::Identifier => Some("name"),
            Primitive::Text | Primitive::Comment | Primitive::Ascii => Some("string"),
            Primitive::Markdown => Some("text"),
            Primitive::Asciitext => Some("ascii"),
            Primitive::Asciimarkdown => Some("asciitext"),
            Primitive::Hexbytes | Primitive::Base64bytes => Some("ascii"),
            _ => None,
        }
    }
}

pub(super) fn install(registry: &mut Registry) {
    use strum::IntoEnumIterator;
    for prim in Primitive::iter() {
        let name = prim.spec_name();
        let entry = Rc::new(ParserEntry {
            canonical_spec: name.to_string(),
            kind: TypeKind::Primitive,
            parent_spec: prim.parent().map(|p| p.to_string()),
            is_builtin: true,
            payload: Payload::Primitive(prim),
        });
        registry.insert(name.to_string(), entry);
    }
}

/// Escape `text` content for a TSV cell: real newline, tab, and backslash
/// become two-character escapes.
pub fn escape_text(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        match c {
            '\\' => out.push_str("\\\\"),
            '\n' => out.push_str("\\n"),
            '\t' => out.push_str("\\t"),
            other => out.push(other),
        }
    }
    out
}

/// Inverse of [`escape_text`].
pub fn unescape_text(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    let mut chars = s.chars();
    while let Some(c) = chars.next() {
        if c == '\\' {
            match chars.next() {
                Some('n') => out.push('\n'),
                Some('t') => out.push('\t'),
                Some('\\') => out.push('\\'),
                Some(other) => {
                    out.push('\\');
                    out.push(other);
                }
                None => out.push('\\'),
            }
        } else {
            out.push(c);
        }
    }
    out
}

/// Does a plain string need quoting when it appears inside a container cell?
fn needs_quoting(s: &str) -> bool {
    s.is_empty()
        || s.chars()
            .any(|c| matches!(c, ',' | '{' | '}' | '=' | '"' | '\'' | '\n' | '\t' | '\\' | '|'))
}

fn string_value(input: &str, ctx: ParseContext) -> Option<(String, String)> {
    match ctx {
        ParseContext::Tsv => Some((input.to_string(), input.to_string())),
        ParseContext::Parsed => {
            if input.starts_with('\'') || input.starts_with('"') {
                let unquoted = literal::unquote(input)?;
                Some((unquoted.clone(), literal::quote(&unquoted)))
            } else if needs_quoting(input) {
                // Bare text that would be ambiguous must have been quoted.
                None
            } else {
                Some((input.to_string(), input.to_string()))
            }
        }
    }
}

pub(super) fn parse_primitive(
    prim: Primitive,
    bad: &mut BadVal,
    input: &str,
    ctx: ParseContext,
) -> Option<(Value, String)> {
    let kind = prim.spec_name();
    let fail = |bad: &mut BadVal, reason: &str| {
        bad.fail(kind, input, Some(reason));
        None
    };
    match prim {
        Primitive::String | Primitive::Comment => match string_value(input, ctx) {
            Some((v, r)) => Some((Value::Str(v), r)),
            None => fail(bad, "malformed string"),
        },
        Primitive::Ascii => match string_value(input, ctx) {
            Some((v, r)) if predicates::is_valid_ascii(&v) => Some((Value::Str(v), r)),
            Some(_) => fail(bad, "not ASCII"),
            None => fail(bad, "malformed string"),
        },
        Primitive::Text | Primitive::Markdown => match ctx {
            ParseContext::Tsv => {
                let unescaped = unescape_text(input);
                Some((Value::Str(unescaped.clone()), escape_text(&unescaped)))
            }
            ParseContext::Parsed => match string_value(input, ctx) {
                Some((v, r)) => Some((Value::Str(v), r)),
                None => fail(bad, "malformed string"),
            },
        },
        Primitive::Asciitext | Primitive::Asciimarkdown => {
            if !predicates::is_valid_ascii(input) {
                return fail(bad, "not ASCII");
            }
            match ctx {
                ParseContext::Tsv => {
                    let unescaped = unescape_text(input);
                    Some((Value::Str(unescaped.clone()), escape_text(&unescaped)))
                }
                ParseContext::Parsed => match string_value(input, ctx) {
                    Some((v, r)) => Some((Value::Str(v), r)),
                    None => fail(bad, "malformed string"),
                },
            }
        }
        Primitive::Number => match value::parse_number(input) {
            Some(v) => {
                let r = value::to_plain_number(&v);
                Some((v, r))
            }
            None => fail(bad, "not a number"),
        },
        Primitive::Integer | Primitive::Long => {
            if !predicates::is_integer_value(input) {
                return fail(bad, "not an integer");
            }
            match input.parse::<i64>() {
                Ok(i) => Some((Value::Int(i), i.to_string())),
                Err(_) => fail(bad, "integer out of range"),
            }
        }
        Primitive::Ubyte => {
            if !predicates::is_integer_value(input) {
                return fail(bad, "not an integer");
            }
            match input.parse::<i64>() {
                Ok(i) if (0..=255).contains(&i) => Some((Value::Int(i), i.to_string())),
                _ => fail(bad, "not in 0..255"),
            }
        }
        Primitive::Uint => {
            if !predicates::is_integer_value(input) {
                return fail(bad, "not an integer");
            }
            match input.parse::<i64>() {
                Ok(i) if i >= 0 => Some((Value::Int(i), i.to_string())),
                _ => fail(bad, "negative"),
            }
        }
        Primitive::Float => match input.parse::<f64>() {
            Ok(f) if f.is_finite() => Some((Value::Float(f), value::format_float(f))),
            _ => fail(bad, "not a float"),
        },
        Primitive::Boolean => match input.to_ascii_lowercase().as_str() {
            "true" => Some((Value::Bool(true), "true".to_string())),
            "false" => Some((Value::Bool(false), "false".to_string())),
            _ => fail(bad, "not a boolean"),
        },
        Primitive::Nil => {
            if input.is_empty() {
                Some((Value::Nil, String::new()))
            } else {
                fail(bad, "nil cells must be empty")
            }
        }
        Primitive::Name => {
            if predicates::is_name(input) {
                Some((Value::Str(input.to_string()), input.to_string()))
            } else {
                fail(bad, "not a dotted name")
            }
        }
        Primitive::Identifier => {
            if predicates::is_identifier(input) {
                Some((Value::Str(input.to_string()), input.to_string()))
            } else {
                fail(bad, "not an identifier")
            }
        }
        Primitive::Percent => {
            if !predicates::is_percent(input) {
                return fail(bad, "not a percentage");
            }
            let fraction = if let Some(stripped) = input.strip_suffix('%') {
                stripped.parse::<f64>().ok()? / 100.0
            } else {
                let (num, den) = input.split_once('/')?;
                num.parse::<f64>().ok()? / den.parse::<f64>().ok()?
            };
            let reformatted = format!("{}%", value::to_plain_number(&Value::Float(fraction * 100.0)));
            Some((Value::Float(fraction), reformatted))
        }
        Primitive::Ratio => {
            if !predicates::is_ratio(input) {
                return fail(bad, "not a ratio");
            }
            let (num, den) = input.split_once('/')?;
            let f = num.parse::<f64>().ok()? / den.parse::<f64>().ok()?;
            Some((Value::Float(f), input.to_string()))
        }
        Primitive::Http => {
            if predicates::is_http_url(input) {
                Some((Value::Str(input.to_string()), input.to_string()))
            } else {
                fail(bad, "not an HTTP URL")
            }
        }
        Primitive::Regex => {
            if predicates::is_regex(input) {
                Some((Value::Str(input.to_string()), input.to_string()))
            } else {
                fail(bad, "not a valid regular expression")
            }
        }
        Primitive::Version => match semver::Version::parse(input) {
            Ok(v) => {
                let canonical = v.to_string();
                Some((Value::Str(canonical.clone()), canonical))
            }
            Err(_) => fail(bad, "not a version"),
        },
        Primitive::CmpVersion => {
            for op in predicates::CMP_VERSION_OPS {
                if let Some(rest) = input.strip_prefix(op) {
                    return match semver::Version::parse(rest) {
                        Ok(v) => {
                            let norm_op = if *op == "==" { "=" } else { op };
                            let canonical = format!("{norm_op}{v}");
                            Some((Value::Str(canonical.clone()), canonical))
                        }
                        Err(_) => fail(bad, "not a comparable version"),
                    };
                }
            }
            fail(bad, "missing comparison operator")
        }
        Primitive::Raw => Some((Value::Str(input.to_string()), input.to_string())),
        Primitive::Any => parse_any(bad, input, ctx),
        Primitive::Table => {
            let v = literal::parse_table_literal(bad, input)?;
            match crate::serialize::to_canonical(&v) {
                Ok(reformatted) => Some((v, reformatted)),
                Err(e) => {
                    bad.fail("table", input, Some(&e.to_string()));
                    None
                }
            }
        }
        Primitive::Hexbytes => {
            if predicates::is_hex_bytes(input) {
                let upper = input.to_ascii_uppercase();
                Some((Value::Str(upper.clone()), upper))
            } else {
                fail(bad, "not even-length hex")
            }
        }
        Primitive::Base64bytes => {
            match base64::engine::general_purpose::STANDARD.decode(input) {
                Ok(bytes) => {
                    let canonical = base64::engine::general_purpose::STANDARD.encode(bytes);
                    Some((Value::Str(canonical.clone()), canonical))
                }
                Err(_) => fail(bad, "not base64"),
            }
        }
    }
}

/// `any` accepts booleans, numbers, tables, and finally strings.
fn parse_any(bad: &mut BadVal, input: &str, ctx: ParseContext) -> Option<(Value, String)> {
    match input {
        "true" => return Some((Value::Bool(true), "true".to_string())),
        "false" => return Some((Value::Bool(false), "false".to_string())),
        _ => {}
    }
    if let Some(v) = value::parse_number(input) {
        let r = value::to_plain_number(&v);
        return Some((v, r));
    }
    if input.starts_with('{') {
        let mut probe = BadVal::discarding();
        if let Some(v) = literal::parse_table_literal(&mut probe, input) {
            if let Ok(reformatted) = crate::serialize::to_canonical(&v) {
                return Some((v, reformatted));
            }
        }
    }
    match string_value(input, ctx) {
        Some((v, r)) => Some((Value::Str(v), r)),
        None => {
            bad.fail("any", input, Some("malformed string"));
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(prim: Primitive, input: &str) -> Option<(Value, String)> {
        let mut bad = BadVal::discarding();
        parse_primitive(prim, &mut bad, input, ParseContext::Tsv)
    }

    #[test]
    fn integer_bounds() {
        assert_eq!(parse(Primitive::Integer, "42"), Some((Value::Int(42), "42".into())));
        assert!(parse(Primitive::Integer, "4.2").is_none());
        assert!(parse(Primitive::Ubyte, "256").is_none());
        assert_eq!(parse(Primitive::Ubyte, "255"), Some((Value::Int(255), "255".into())));
        assert!(parse(Primitive::Uint, "-1").is_none());
    }

    #[test]
    fn float_always_carries_point() {
        assert_eq!(parse(Primitive::Float, "3"), Some((Value::Float(3.0), "3.0".into())));
        assert_eq!(parse(Primitive::Float, "2.5"), Some((Value::Float(2.5), "2.5".into())));
    }

    #[test]
    fn number_rejects_non_finite() {
        assert!(parse(Primitive::Number, "nan").is_none());
        assert!(parse(Primitive::Number, "1/0").is_none());
        assert_eq!(parse(Primitive::Number, "3.0"), Some((Value::Float(3.0), "3".into())));
    }

    #[test]
    fn percent_reformats_canonically() {
        assert_eq!(parse(Primitive::Percent, "1/2"), Some((Value::Float(0.5), "50%".into())));
        assert_eq!(
            parse(Primitive::Percent, "12.5%"),
            Some((Value::Float(0.125), "12.5%".into()))
        );
    }

    #[test]
    fn text_unescapes_and_reescapes() {
        let (v, r) = parse(Primitive::Text, "line1\\nline2\\tend").unwrap();
        assert_eq!(v, Value::Str("line1\nline2\tend".into()));
        assert_eq!(r, "line1\\nline2\\tend");
    }

    #[test]
    fn hexbytes_uppercases() {
        assert_eq!(
            parse(Primitive::Hexbytes, "deadbeef"),
            Some((Value::Str("DEADBEEF".into()), "DEADBEEF".into()))
        );
        assert!(parse(Primitive::Hexbytes, "abc").is_none());
    }

    #[test]
    fn base64_round_trips_canonically() {
        let (v, r) = parse(Primitive::Base64bytes, "aGVsbG8=").unwrap();
        assert_eq!(v, Value::Str("aGVsbG8=".into()));
        assert_eq!(r, "aGVsbG8=");
    }

    #[test]
    fn cmp_version_normalizes_double_equals() {
        let (_, r) = parse(Primitive::CmpVersion, "==1.2.3").unwrap();
        assert_eq!(r, "=1.2.3");
        let (_, r) = parse(Primitive::CmpVersion, ">=2.0.0").unwrap();
        assert_eq!(r, ">=2.0.0");
    }

    #[test]
    fn any_discriminates() {
        assert_eq!(parse(Primitive::Any, "true"), Some((Value::Bool(true), "true".into())));
        assert_eq!(parse(Primitive::Any, "7"), Some((Value::Int(7), "7".into())));
        assert!(matches!(parse(Primitive::Any, "{1,2}"), Some((Value::Table(_), _))));
        assert_eq!(
            parse(Primitive::Any, "hello"),
            Some((Value::Str("hello".into()), "hello".into()))
        );
    }

    #[test]
    fn version_is_strict() {
        assert!(parse(Primitive::Version, "1.2").is_none());
        assert!(parse(Primitive::Version, "1.2.3").is_some());
    }
}
