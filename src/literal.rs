//! Single-line table-literal parsing.
//!
//! Cells of `table` type carry a Lua-style literal: `{}`, `{1,2}`,
//! `{a=1,b={2,3}}`, `{_1=1,_2=2}`, with `'` or `"` quoted strings. The
//! splitting helpers here are shared with the container cell parsers,
//! which see the same comma/quote/brace syntax without the outer braces.

use crate::report::BadVal;
use crate::value::{self, Table, Value, MAX_DEPTH};

/// Split a cell at top-level commas, respecting `{...}` nesting and both
/// quote styles. An empty input yields no pieces.
pub fn split_top_level(input: &str) -> Vec<String> {
    split_on(input, ',')
}

/// Split a `k=v` item at the first top-level `=`.
pub fn split_key_value(item: &str) -> Option<(String, String)> {
    let mut depth = 0usize;
    let mut quote: Option<char> = None;
    let mut escaped = false;
    for (i, c) in item.char_indices() {
        if escaped {
            escaped = false;
            continue;
        }
        match c {
            '\\' if quote.is_some() => escaped = true,
            q @ ('\'' | '"') => match quote {
                Some(open) if open == q => quote = None,
                Some(_) => {}
                None => quote = Some(q),
            },
            '{' if quote.is_none() => depth += 1,
            '}' if quote.is_none() => depth = depth.saturating_sub(1),
            '=' if quote.is_none() && depth == 0 => {
                return Some((item[..i].to_string(), item[i + 1..].to_string()));
            }
            _ => {}
        }
    }
    None
}

fn split_on(input: &str, sep: char) -> Vec<String> {
    if input.is_empty() {
        return Vec::new();
    }
    let mut pieces = Vec::new();
    let mut current = String::new();
    let mut depth = 0usize;
    let mut quote: Option<char> = None;
    let mut escaped = false;
    for c in input.chars() {
        if escaped {
            current.push(c);
            escaped = false;
            continue;
        }
        match c {
            '\\' if quote.is_some() => {
                current.push(c);
                escaped = true;
            }
            q @ ('\'' | '"') => {
                match quote {
                    Some(open) if open == q => quote = None,
                    Some(_) => {}
                    None => quote = Some(q),
                }
                current.push(c);
            }
            '{' if quote.is_none() => {
                depth += 1;
                current.push(c);
            }
            '}' if quote.is_none() => {
                depth = depth.saturating_sub(1);
                current.push(c);
            }
            c if c == sep && quote.is_none() && depth == 0 => {
                pieces.push(std::mem::take(&mut current));
            }
            _ => current.push(c),
        }
    }
    pieces.push(current);
    pieces
}

/// Remove surrounding quotes and process escapes. Returns `None` if the
/// input is not a quoted string.
pub fn unquote(s: &str) -> Option<String> {
    let bytes = s.as_bytes();
    if bytes.len() < 2 {
        return None;
    }
    let open = bytes[0];
    if open != b'\'' && open != b'"' {
        return None;
    }
    if bytes[bytes.len() - 1] != open {
        return None;
    }
    let inner = &s[1..s.len() - 1];
    let mut out = String::new();
    let mut escaped = false;
    for c in inner.chars() {
        if escaped {
            match c {
                'n' => out.push('\n'),
                't' => out.push('\t'),
                other => out.push(other),
            }
            escaped = false;
        } else if c == '\\' {
            escaped = true;
        } else if c as u32 == open as u32 {
            // Unescaped quote before the end of the string.
            return None;
        } else {
            out.push(c);
        }
    }
    if escaped {
        return None;
    }
    Some(out)
}

/// Double-quote a string with `\\`, `\"`, `\n`, `\t` escapes.
pub fn quote(s: &str) -> String {
    let mut out = String::with_capacity(s.len() + 2);
    out.push('"');
    for c in s.chars() {
        match c {
            '\\' => out.push_str("\\\\"),
            '"' => out.push_str("\\\""),
            '\n' => out.push_str("\\n"),
            '\t' => out.push_str("\\t"),
            other => out.push(other),
        }
    }
    out.push('"');
    out
}

struct LiteralParser<'a> {
    input: &'a [u8],
    text: &'a str,
    pos: usize,
}

impl<'a> LiteralParser<'a> {
    fn peek(&self) -> Option<u8> {
        self.input.get(self.pos).copied()
    }

    fn bump(&mut self) -> Option<u8> {
        let b = self.peek()?;
        self.pos += 1;
        Some(b)
    }

    fn table(&mut self, depth: usize) -> Result<Table, &'static str> {
        if depth > MAX_DEPTH {
            return Err("exceeds maximum depth");
        }
        if self.bump() != Some(b'{') {
            return Err("expected '{'");
        }
        let mut table = Table::new();
        if self.peek() == Some(b'}') {
            self.bump();
            return Ok(table);
        }
        loop {
            let start = self.pos;
            // Lookahead for `ident=`: scan an identifier and check for '='.
            if let Some((key, after)) = self.try_key(start) {
                self.pos = after;
                let val = self.value(depth)?;
                table.set(Value::Str(key), val);
            } else {
                let val = self.value(depth)?;
                table.seq.push(val);
            }
            match self.bump() {
                Some(b',') => continue,
                Some(b'}') => break,
                _ => return Err("unterminated table"),
            }
        }
        Ok(table)
    }

    /// If an identifier followed by `=` starts at `start`, return it and
    /// the position just past the `=`.
    fn try_key(&self, start: usize) -> Option<(String, usize)> {
        let mut i = start;
        while i < self.input.len() {
            let b = self.input[i];
            if b.is_ascii_alphanumeric() || b == b'_' {
                i += 1;
            } else {
                break;
            }
        }
        if i == start || self.input.get(i) != Some(&b'=') {
            return None;
        }
        let key = &self.text[start..i];
        if crate::predicates::is_identifier(key) {
            Some((key.to_string(), i + 1))
        } else {
            None
        }
    }

    fn value(&mut self, depth: usize) -> Result<Value, &'static str> {
        match self.peek() {
            Some(b'{') => Ok(Value::Table(self.table(depth + 1)?)),
            Some(b'\'') | Some(b'"') => self.string(),
            Some(_) => self.scalar(),
            None => Err("unexpected end of input"),
        }
    }

    fn string(&mut self) -> Result<Value, &'static str> {
        let Some(open) = self.bump() else {
            return Err("unterminated string");
        };
        let mut out: Vec<u8> = Vec::new();
        loop {
            match self.bump() {
                Some(b'\\') => match self.bump() {
                    Some(b'n') => out.push(b'\n'),
                    Some(b't') => out.push(b'\t'),
                    Some(b'\\') => out.push(b'\\'),
                    Some(b'\'') => out.push(b'\''),
                    Some(b'"') => out.push(b'"'),
                    _ => return Err("bad escape"),
                },
                Some(b) if b == open => {
                    return String::from_utf8(out)
                        .map(Value::Str)
                        .map_err(|_| "invalid UTF-8 in string");
                }
                Some(b) => out.push(b),
                None => return Err("unterminated string"),
            }
        }
    }

    fn scalar(&mut self) -> Result<Value, &'static str> {
        let start = self.pos;
        while let Some(b) = self.peek() {
            if b == b',' || b == b'}' || b == b'=' {
                break;
            }
            self.pos += 1;
        }
        let word = &self.text[start..self.pos];
        match word {
            "true" => Ok(Value::Bool(true)),
            "false" => Ok(Value::Bool(false)),
            "nil" => Ok(Value::Nil),
            _ => value::parse_number(word).ok_or("bad scalar"),
        }
    }
}

/// Parse a single-line table literal. The top level must be a table;
/// scalars are rejected with `"not a table"`.
pub fn parse_table_literal(bad: &mut BadVal, input: &str) -> Option<Value> {
    if !input.starts_with('{') {
        bad.fail("table", input, Some("not a table"));
        return None;
    }
    let mut parser = LiteralParser {
        input: input.as_bytes(),
        text: input,
        pos: 0,
    };
    match parser.table(1) {
        Ok(table) if parser.pos == input.len() => Some(Value::Table(table)),
        Ok(_) => {
            bad.fail("table", input, Some("trailing characters"));
            None
        }
        Err(reason) => {
            bad.fail("table", input, Some(reason));
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(input: &str) -> Option<Value> {
        let mut bad = BadVal::discarding();
        parse_table_literal(&mut bad, input)
    }

    #[test]
    fn empty_table() {
        assert_eq!(parse("{}"), Some(Value::Table(Table::new())));
    }

    #[test]
    fn positional_elements() {
        let v = parse("{1,2,3}").unwrap();
        match v {
            Value::Table(t) => {
                assert_eq!(t.seq, vec![Value::Int(1), Value::Int(2), Value::Int(3)]);
            }
            _ => panic!(),
        }
    }

    #[test]
    fn keyed_and_nested() {
        let v = parse("{a=1,b={2,3}}").unwrap();
        let t = match v {
            Value::Table(t) => t,
            _ => panic!(),
        };
        assert_eq!(t.get(&Value::Str("a".into())), Some(&Value::Int(1)));
        match t.get(&Value::Str("b".into())) {
            Some(Value::Table(inner)) => assert_eq!(inner.seq.len(), 2),
            other => panic!("expected nested table, got {other:?}"),
        }
    }

    #[test]
    fn tuple_style_keys() {
        let v = parse("{_1=10,_2=20}").unwrap();
        let t = match v {
            Value::Table(t) => t,
            _ => panic!(),
        };
        assert_eq!(t.get(&Value::Str("_1".into())), Some(&Value::Int(10)));
    }

    #[test]
    fn quoted_strings_with_escapes() {
        let v = parse(r#"{'it''s ok'}"#);
        assert!(v.is_none(), "single-quote inside single-quoted needs escape");
        let v = parse(r#"{"a\tb","c\\d"}"#).unwrap();
        match v {
            Value::Table(t) => {
                assert_eq!(t.seq[0], Value::Str("a\tb".into()));
                assert_eq!(t.seq[1], Value::Str("c\\d".into()));
            }
            _ => panic!(),
        }
    }

    #[test]
    fn non_table_top_rejected() {
        let mut bad = BadVal::buffering("x.tsv");
        assert!(parse_table_literal(&mut bad, "42").is_none());
        assert!(bad.messages()[0].contains("not a table"));
        assert!(parse("\"abc\"").is_none());
        assert!(parse("true").is_none());
    }

    #[test]
    fn depth_limit() {
        let deep_ok = format!("{}1{}", "{".repeat(10), "}".repeat(10));
        assert!(parse(&deep_ok).is_some());
        let too_deep = format!("{}1{}", "{".repeat(11), "}".repeat(11));
        let mut bad = BadVal::buffering("x.tsv");
        assert!(parse_table_literal(&mut bad, &too_deep).is_none());
        assert!(bad.messages()[0].contains("exceeds maximum depth"));
    }

    #[test]
    fn split_respects_nesting_and_quotes() {
        assert_eq!(split_top_level("1,{2,3},\"a,b\""), vec!["1", "{2,3}", "\"a,b\""]);
        assert_eq!(split_top_level(""), Vec::<String>::new());
        assert_eq!(split_top_level("a"), vec!["a"]);
        assert_eq!(split_top_level("a,,b"), vec!["a", "", "b"]);
    }

    #[test]
    fn key_value_split() {
        assert_eq!(
            split_key_value("a={1=2}"),
            Some(("a".into(), "{1=2}".into()))
        );
        assert_eq!(
            split_key_value("k=\"v=w\""),
            Some(("k".into(), "\"v=w\"".into()))
        );
        assert_eq!(split_key_value("novalue"), None);
    }

    #[test]
    fn quote_round_trip() {
        let original = "line1\nline2\t\"quoted\"\\end";
        let quoted = quote(original);
        assert_eq!(unquote(&quoted), Some(original.to_string()));
    }
}
