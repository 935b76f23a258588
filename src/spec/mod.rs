//! Type-specification parsing.
//!
//! Hand-written recursive descent over a tiny token set: identifiers,
//! `{`, `}`, `,`, `:`, `|`, end of input. Whitespace is not tolerated
//! anywhere in a spec. On any error a single `"Bad type"` diagnostic is
//! emitted and `None` returned.

pub mod ast;

pub use ast::{is_keyword, TypeAst, KEYWORDS};

use crate::predicates::is_identifier;
use crate::report::BadVal;
use crate::value::MAX_DEPTH;

#[derive(Debug, Clone, PartialEq)]
enum Token {
    Ident(String),
    LBrace,
    RBrace,
    Comma,
    Colon,
    Pipe,
    End,
}

fn tokenize(input: &str) -> Result<Vec<Token>, ()> {
    let mut tokens = Vec::new();
    let mut chars = input.char_indices().peekable();
    while let Some((start, c)) = chars.next() {
        match c {
            '{' => tokens.push(Token::LBrace),
            '}' => tokens.push(Token::RBrace),
            ',' => tokens.push(Token::Comma),
            ':' => tokens.push(Token::Colon),
            '|' => tokens.push(Token::Pipe),
            c if c.is_ascii_alphanumeric() || c == '_' || c == '.' => {
                let mut end = start + c.len_utf8();
                while let Some(&(i, n)) = chars.peek() {
                    if n.is_ascii_alphanumeric() || n == '_' || n == '.' {
                        chars.next();
                        end = i + n.len_utf8();
                    } else {
                        break;
                    }
                }
                tokens.push(Token::Ident(input[start..end].to_string()));
            }
            _ => return Err(()),
        }
    }
    tokens.push(Token::End);
    Ok(tokens)
}

struct Parser {
    tokens: Vec<Token>,
    pos: usize,
}

/// One entry inside braces, before disambiguation.
enum Entry {
    Positional(TypeAst),
    Keyed(String, TypeAst),
    /// Map pair whose key is itself a composite spec.
    SpecKeyed(TypeAst, TypeAst),
}

impl Parser {
    fn peek(&self) -> &Token {
        &self.tokens[self.pos]
    }

    fn next(&mut self) -> Token {
        let t = self.tokens[self.pos].clone();
        if self.pos < self.tokens.len() - 1 {
            self.pos += 1;
        }
        t
    }

    fn eat(&mut self, expected: &Token) -> Result<(), ()> {
        if self.peek() == expected {
            self.next();
            Ok(())
        } else {
            Err(())
        }
    }

    fn ident(&mut self) -> Result<String, ()> {
        match self.next() {
            Token::Ident(s) => Ok(s),
            _ => Err(()),
        }
    }

    fn union(&mut self, depth: usize) -> Result<TypeAst, ()> {
        if depth > MAX_DEPTH {
            return Err(());
        }
        let first = self.item(depth)?;
        if *self.peek() != Token::Pipe {
            return Ok(first);
        }
        let mut members = vec![first];
        while *self.peek() == Token::Pipe {
            self.next();
            members.push(self.item(depth)?);
        }
        // `string` must come after every other member; only `nil` may
        // trail it.
        for (i, m) in members.iter().enumerate() {
            if matches!(m, TypeAst::Name(n) if n == "string") {
                let rest_is_nil = members[i + 1..]
                    .iter()
                    .all(|m| matches!(m, TypeAst::Name(n) if n == "nil"));
                if !rest_is_nil {
                    return Err(());
                }
            }
        }
        Ok(TypeAst::Union(members))
    }

    fn item(&mut self, depth: usize) -> Result<TypeAst, ()> {
        match self.peek() {
            Token::Ident(_) => {
                let name = self.ident()?;
                Ok(TypeAst::Name(name))
            }
            Token::LBrace => self.brace(depth + 1),
            _ => Err(()),
        }
    }

    fn brace(&mut self, depth: usize) -> Result<TypeAst, ()> {
        if depth > MAX_DEPTH {
            return Err(());
        }
        self.eat(&Token::LBrace)?;

        // `{enum:...}`, `{extends:...}` and `{extends,Tag}` have dedicated
        // leading keywords; everything else is entry-list disambiguation.
        if let Token::Ident(head) = self.peek() {
            match head.as_str() {
                "enum" if self.tokens.get(self.pos + 1) == Some(&Token::Colon) => {
                    return self.enum_body();
                }
                "extends" => {
                    return self.extends_body(depth);
                }
                _ => {}
            }
        }

        let mut entries = Vec::new();
        loop {
            entries.push(self.entry(depth)?);
            match self.next() {
                Token::Comma => continue,
                Token::RBrace => break,
                _ => return Err(()),
            }
        }
        disambiguate(entries)
    }

    fn enum_body(&mut self) -> Result<TypeAst, ()> {
        self.ident()?; // enum
        self.eat(&Token::Colon)?;
        let mut labels = vec![self.label()?];
        while *self.peek() == Token::Pipe {
            self.next();
            labels.push(self.label()?);
        }
        self.eat(&Token::RBrace)?;
        Ok(TypeAst::Enum(labels))
    }

    fn label(&mut self) -> Result<String, ()> {
        let l = self.ident()?;
        if is_identifier(&l) { Ok(l) } else { Err(()) }
    }

    fn extends_body(&mut self, depth: usize) -> Result<TypeAst, ()> {
        self.ident()?; // extends
        match self.next() {
            Token::Colon => {
                let ancestor = self.union(depth)?;
                match self.next() {
                    Token::RBrace => Ok(TypeAst::AncestorConstraint(Box::new(ancestor))),
                    Token::Comma => {
                        // Record inheritance: the parent must be a plain name.
                        let parent = match ancestor {
                            TypeAst::Name(n) => n,
                            _ => return Err(()),
                        };
                        let mut extra = Vec::new();
                        loop {
                            let field = self.field(depth)?;
                            extra.push(field);
                            match self.next() {
                                Token::Comma => continue,
                                Token::RBrace => break,
                                _ => return Err(()),
                            }
                        }
                        check_fields(&extra)?;
                        Ok(TypeAst::Extends { parent, extra })
                    }
                    _ => Err(()),
                }
            }
            Token::Comma => {
                let tag = self.ident()?;
                if !is_identifier(&tag) {
                    return Err(());
                }
                self.eat(&Token::RBrace)?;
                Ok(TypeAst::TypeTagUse(tag))
            }
            _ => Err(()),
        }
    }

    fn field(&mut self, depth: usize) -> Result<(String, TypeAst), ()> {
        let name = self.ident()?;
        self.eat(&Token::Colon)?;
        let spec = self.union(depth)?;
        Ok((name, spec))
    }

    fn entry(&mut self, depth: usize) -> Result<Entry, ()> {
        // An identifier followed by `:` reads as a key; whether it means a
        // map key type or a record field name is decided by arity later.
        if let Token::Ident(_) = self.peek() {
            if self.tokens.get(self.pos + 1) == Some(&Token::Colon) {
                let key = self.ident()?;
                self.eat(&Token::Colon)?;
                let spec = self.union(depth)?;
                return Ok(Entry::Keyed(key, spec));
            }
        }
        let spec = self.union(depth)?;
        if *self.peek() == Token::Colon {
            self.next();
            let value = self.union(depth)?;
            return Ok(Entry::SpecKeyed(spec, value));
        }
        Ok(Entry::Positional(spec))
    }
}

fn disambiguate(entries: Vec<Entry>) -> Result<TypeAst, ()> {
    match entries.len() {
        0 => Err(()),
        1 => match entries.into_iter().next().unwrap() {
            Entry::Positional(elem) => {
                check_map_element(&elem, false)?;
                Ok(TypeAst::Array(Box::new(elem)))
            }
            // A single key-value pair is always a map, never a one-field record.
            Entry::Keyed(key, value) => {
                let key_ast = TypeAst::Name(key);
                check_map_element(&key_ast, true)?;
                check_map_element(&value, true)?;
                Ok(TypeAst::Map(Box::new(key_ast), Box::new(value)))
            }
            Entry::SpecKeyed(key, value) => {
                check_map_element(&key, true)?;
                check_map_element(&value, true)?;
                Ok(TypeAst::Map(Box::new(key), Box::new(value)))
            }
        },
        _ => {
            let all_positional = entries.iter().all(|e| matches!(e, Entry::Positional(_)));
            let all_keyed = entries.iter().all(|e| matches!(e, Entry::Keyed(..)));
            if all_positional {
                let positions = entries
                    .into_iter()
                    .map(|e| match e {
                        Entry::Positional(t) => t,
                        _ => unreachable!(),
                    })
                    .collect();
                Ok(TypeAst::Tuple(positions))
            } else if all_keyed {
                let fields: Vec<(String, TypeAst)> = entries
                    .into_iter()
                    .map(|e| match e {
                        Entry::Keyed(k, v) => (k, v),
                        _ => unreachable!(),
                    })
                    .collect();
                check_fields(&fields)?;
                Ok(TypeAst::Record(fields))
            } else {
                Err(())
            }
        }
    }
}

/// Map keys and values must never admit nil; arrays reject a bare `nil`
/// element type as well.
fn check_map_element(ast: &TypeAst, is_map_position: bool) -> Result<(), ()> {
    if is_map_position && ast.admits_nil_syntactically() {
        return Err(());
    }
    if !is_map_position && matches!(ast, TypeAst::Name(n) if n == "nil") {
        return Err(());
    }
    Ok(())
}

fn check_fields(fields: &[(String, TypeAst)]) -> Result<(), ()> {
    for (i, (name, _)) in fields.iter().enumerate() {
        if !is_identifier(name) || is_keyword(name) {
            return Err(());
        }
        if fields[..i].iter().any(|(prev, _)| prev == name) {
            return Err(());
        }
    }
    Ok(())
}

/// Parse a type specification string. Emits one `"Bad type"` diagnostic
/// and returns `None` on any syntax or structural error.
pub fn parse_spec(bad: &mut BadVal, input: &str) -> Option<TypeAst> {
    match try_parse(input) {
        Ok(ast) => Some(ast),
        Err(()) => {
            bad.fail("type", input, Some("Cannot parse type specification"));
            None
        }
    }
}

fn try_parse(input: &str) -> Result<TypeAst, ()> {
    if input.is_empty() {
        return Err(());
    }
    let tokens = tokenize(input)?;
    let mut parser = Parser { tokens, pos: 0 };
    let ast = parser.union(0)?;
    parser.eat(&Token::End)?;
    Ok(ast)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(input: &str) -> Option<TypeAst> {
        let mut bad = BadVal::discarding();
        parse_spec(&mut bad, input)
    }

    #[test]
    fn primitive_name() {
        assert_eq!(parse("string"), Some(TypeAst::Name("string".into())));
    }

    #[test]
    fn array_of_string() {
        assert_eq!(
            parse("{string}"),
            Some(TypeAst::Array(Box::new(TypeAst::Name("string".into()))))
        );
    }

    #[test]
    fn single_pair_is_map_not_record() {
        let ast = parse("{name:string}").unwrap();
        assert!(matches!(ast, TypeAst::Map(..)));
    }

    #[test]
    fn two_pairs_make_a_record() {
        let ast = parse("{name:string,age:number}").unwrap();
        match ast {
            TypeAst::Record(fields) => {
                assert_eq!(fields.len(), 2);
                assert_eq!(fields[0].0, "name");
            }
            other => panic!("expected record, got {other:?}"),
        }
    }

    #[test]
    fn tuple_needs_two_positions() {
        let ast = parse("{integer,integer,string}").unwrap();
        assert!(matches!(ast, TypeAst::Tuple(ref p) if p.len() == 3));
    }

    #[test]
    fn union_parses_flat() {
        let ast = parse("integer|float|string").unwrap();
        assert!(matches!(ast, TypeAst::Union(ref m) if m.len() == 3));
    }

    #[test]
    fn string_must_be_last_in_union() {
        assert!(parse("string|integer").is_none());
        assert!(parse("integer|string").is_some());
        // Only nil may trail string.
        assert!(parse("string|nil").is_some());
    }

    #[test]
    fn nil_map_key_rejected() {
        assert!(parse("{nil:string}").is_none());
        assert!(parse("{number|nil:string}").is_none());
        assert!(parse("{name:number|nil}").is_none());
    }

    #[test]
    fn enum_form() {
        assert_eq!(
            parse("{enum:red|green|blue}"),
            Some(TypeAst::Enum(vec!["red".into(), "green".into(), "blue".into()]))
        );
    }

    #[test]
    fn extends_forms() {
        assert_eq!(
            parse("{extends:Item}"),
            Some(TypeAst::AncestorConstraint(Box::new(TypeAst::Name("Item".into()))))
        );
        let ast = parse("{extends:Item,weight:number}").unwrap();
        assert!(matches!(ast, TypeAst::Extends { ref parent, .. } if parent == "Item"));
        assert_eq!(parse("{extends,Weapon}"), Some(TypeAst::TypeTagUse("Weapon".into())));
    }

    #[test]
    fn keyword_field_name_rejected() {
        assert!(parse("{end:string,a:number}").is_none());
    }

    #[test]
    fn duplicate_field_rejected() {
        assert!(parse("{a:string,a:number}").is_none());
    }

    #[test]
    fn whitespace_is_an_error() {
        assert!(parse("{name: string,age:number}").is_none());
        assert!(parse(" string").is_none());
    }

    #[test]
    fn composite_map_key_allowed() {
        let ast = parse("{{string}:number}").unwrap();
        assert!(matches!(ast, TypeAst::Map(..)));
    }

    #[test]
    fn depth_limit_enforced() {
        let nested = format!("{}string{}", "{".repeat(11), "}".repeat(11));
        assert!(parse(&nested).is_none());
        let ok = format!("{}string{}", "{".repeat(9), "}".repeat(9));
        assert!(parse(&ok).is_some());
    }

    #[test]
    fn garbage_reports_single_diagnostic() {
        let mut bad = BadVal::buffering("Files.tsv");
        bad.line_no = 3;
        assert!(parse_spec(&mut bad, "{{").is_none());
        assert_eq!(bad.errors(), 1);
        assert!(bad.messages()[0].contains("Cannot parse type specification"));
    }

    #[test]
    fn union_members_may_be_composite() {
        let ast = parse("{integer}|nil").unwrap();
        assert!(matches!(ast, TypeAst::Union(ref m) if m.len() == 2));
    }
}
