//! Cell parsing, default values, and comparators for registered types.
//!
//! Every parser returns the parsed value together with the canonical
//! reformatted cell text; parsing the reformatted text again is a fixed
//! point. Containers recurse through registry lookups with the shared
//! depth bound.

use std::cmp::Ordering;

use super::{builtins, Constraint, ParseContext, ParserEntry, Payload, Primitive, Registry, TypeKind};
use crate::literal::{split_key_value, split_top_level};
use crate::report::BadVal;
use crate::value::{self, Table, Value, MAX_DEPTH};

impl Registry {
    /// Parse one cell against a registered type. Empty cells produce the
    /// type's default value. Failures report through `bad` and yield `None`.
    pub fn parse_cell(
        &self,
        entry: &ParserEntry,
        bad: &mut BadVal,
        input: &str,
        ctx: ParseContext,
    ) -> Option<(Value, String)> {
        self.parse_cell_at(entry, bad, input, ctx, 0)
    }

    fn parse_cell_at(
        &self,
        entry: &ParserEntry,
        bad: &mut BadVal,
        input: &str,
        ctx: ParseContext,
        depth: usize,
    ) -> Option<(Value, String)> {
        if depth > MAX_DEPTH {
            bad.fail(&entry.kind.to_string(), input, Some("Maximal depth reached!"));
            return None;
        }
        if input.is_empty() && !matches!(entry.kind, TypeKind::Primitive) {
            return Some((self.default_value(entry), String::new()));
        }
        match &entry.payload {
            Payload::Primitive(prim) => {
                if input.is_empty() {
                    return Some((self.default_value(entry), String::new()));
                }
                builtins::parse_primitive(*prim, bad, input, ctx)
            }
            Payload::Enum { labels } => {
                let lower = input.to_lowercase();
                if labels.contains(&lower) {
                    Some((Value::Str(lower.clone()), lower))
                } else {
                    bad.fail("enum", input, Some("not an allowed label"));
                    None
                }
            }
            Payload::Array { elem } => {
                let (inner, wrap) = container_input(&entry.kind, bad, input, ctx)?;
                let (v, r) = self.parse_array(elem, bad, inner, depth)?;
                Some((v, wrap_reformat(r, wrap)))
            }
            Payload::Map { key, value } => {
                let (inner, wrap) = container_input(&entry.kind, bad, input, ctx)?;
                let (v, r) = self.parse_map(key, value, bad, inner, depth)?;
                Some((v, wrap_reformat(r, wrap)))
            }
            Payload::Tuple { positions } => {
                let (inner, wrap) = container_input(&entry.kind, bad, input, ctx)?;
                let (v, r) = self.parse_tuple(positions, bad, inner, depth)?;
                Some((v, wrap_reformat(r, wrap)))
            }
            Payload::Record { fields, optional } => {
                let (inner, wrap) = container_input(&entry.kind, bad, input, ctx)?;
                let (v, r) = self.parse_record(fields, optional, bad, inner, depth)?;
                Some((v, wrap_reformat(r, wrap)))
            }
            Payload::Union { members } => self.parse_union(members, bad, input, ctx, depth),
            Payload::Alias { target } => {
                let target_entry = self.get(target)?;
                self.parse_cell_at(&target_entry, bad, input, ctx, depth)
            }
            Payload::Restriction { parent, constraint } => {
                self.parse_restricted(parent, constraint, bad, input, ctx, depth)
            }
            Payload::TypeTag { members, .. } => {
                if self.tag_members_accept(members, input) {
                    Some((Value::Str(input.to_string()), input.to_string()))
                } else {
                    bad.fail("type tag", input, Some("not a member type"));
                    None
                }
            }
            Payload::AncestorConstraint { ancestor } => {
                if self.contains(input) && self.extends_or_restrict(input, ancestor) {
                    Some((Value::Str(input.to_string()), input.to_string()))
                } else {
                    bad.fail("type name", input, Some("does not extend the required ancestor"));
                    None
                }
            }
        }
    }

    fn parse_array(
        &self,
        elem_spec: &str,
        bad: &mut BadVal,
        input: &str,
        depth: usize,
    ) -> Option<(Value, String)> {
        let elem = self.get(elem_spec)?;
        let elem_nilable = self.admits_nil(elem_spec);
        let mut seq = Vec::new();
        let mut reformatted = Vec::new();
        let mut ok = true;
        for piece in split_top_level(input) {
            if piece.is_empty() {
                // Sparse positions are preserved; nil elements reformat
                // back to an empty piece.
                seq.push(if elem_nilable { Value::Nil } else { self.default_value(&elem) });
                reformatted.push(String::new());
                continue;
            }
            match self.parse_cell_at(&elem, bad, &piece, ParseContext::Parsed, depth + 1) {
                Some((v, r)) => {
                    seq.push(v);
                    reformatted.push(r);
                }
                None => ok = false,
            }
        }
        if !ok {
            return None;
        }
        Some((
            Value::Table(Table { seq, entries: vec![] }),
            reformatted.join(","),
        ))
    }

    fn parse_map(
        &self,
        key_spec: &str,
        value_spec: &str,
        bad: &mut BadVal,
        input: &str,
        depth: usize,
    ) -> Option<(Value, String)> {
        let key_entry = self.get(key_spec)?;
        let value_entry = self.get(value_spec)?;
        let mut table = Table::new();
        let mut pairs: Vec<(Value, String, String)> = Vec::new();
        for piece in split_top_level(input) {
            let Some((raw_key, raw_value)) = split_key_value(&piece) else {
                bad.fail("map", &piece, Some("missing '='"));
                return None;
            };
            let (k, kr) = self.parse_cell_at(&key_entry, bad, &raw_key, ParseContext::Parsed, depth + 1)?;
            let (v, vr) =
                self.parse_cell_at(&value_entry, bad, &raw_value, ParseContext::Parsed, depth + 1)?;
            if matches!(k, Value::Nil) {
                bad.fail("map", &raw_key, Some("nil map key"));
                return None;
            }
            if table.get(&k).is_some() {
                bad.fail("map", &raw_key, Some("duplicate key"));
                return None;
            }
            table.set(k.clone(), v);
            pairs.push((k, kr, vr));
        }
        pairs.sort_by(|a, b| value::compare(&a.0, &b.0));
        let reformatted: Vec<String> = pairs
            .into_iter()
            .map(|(_, kr, vr)| format!("{kr}={vr}"))
            .collect();
        Some((Value::Table(table), reformatted.join(",")))
    }

    fn parse_tuple(
        &self,
        positions: &[String],
        bad: &mut BadVal,
        input: &str,
        depth: usize,
    ) -> Option<(Value, String)> {
        let pieces = split_top_level(input);
        if pieces.len() != positions.len() {
            bad.fail(
                "tuple",
                input,
                Some(&format!("expected {} items, found {}", positions.len(), pieces.len())),
            );
            return None;
        }
        let mut seq = Vec::with_capacity(positions.len());
        let mut reformatted = Vec::with_capacity(positions.len());
        for (piece, pos_spec) in pieces.iter().zip(positions) {
            let pos_entry = self.get(pos_spec)?;
            if piece.is_empty() && self.admits_nil(pos_spec) {
                seq.push(Value::Nil);
                reformatted.push(String::new());
                continue;
            }
            let (v, r) = self.parse_cell_at(&pos_entry, bad, piece, ParseContext::Parsed, depth + 1)?;
            seq.push(v);
            reformatted.push(r);
        }
        Some((
            Value::Table(Table { seq, entries: vec![] }),
            reformatted.join(","),
        ))
    }

    fn parse_record(
        &self,
        fields: &std::collections::BTreeMap<String, String>,
        optional: &std::collections::BTreeSet<String>,
        bad: &mut BadVal,
        input: &str,
        depth: usize,
    ) -> Option<(Value, String)> {
        let mut table = Table::new();
        let mut reformats: std::collections::BTreeMap<String, String> = Default::default();
        for piece in split_top_level(input) {
            let Some((name, raw_value)) = split_key_value(&piece) else {
                bad.fail("record", &piece, Some("missing '='"));
                return None;
            };
            let Some(field_spec) = fields.get(&name) else {
                bad.fail("record field", &name, Some("unknown field"));
                return None;
            };
            if reformats.contains_key(&name) {
                bad.fail("record field", &name, Some("duplicate field"));
                return None;
            }
            let field_entry = self.get(field_spec)?;
            let (v, r) =
                self.parse_cell_at(&field_entry, bad, &raw_value, ParseContext::Parsed, depth + 1)?;
            if !matches!(v, Value::Nil) {
                table.set(Value::Str(name.clone()), v);
            }
            reformats.insert(name, r);
        }
        for (name, _) in fields {
            if !reformats.contains_key(name) && !optional.contains(name) {
                bad.fail("record field", name, Some("missing required field"));
                return None;
            }
        }
        // Reformatted form lists present fields alphabetically.
        let parts: Vec<String> = reformats
            .iter()
            .filter(|(_, r)| !r.is_empty())
            .map(|(n, r)| format!("{n}={r}"))
            .collect();
        Some((Value::Table(table), parts.join(",")))
    }

    fn parse_union(
        &self,
        members: &[String],
        bad: &mut BadVal,
        input: &str,
        ctx: ParseContext,
        depth: usize,
    ) -> Option<(Value, String)> {
        for member_spec in members {
            let Some(member) = self.get(member_spec) else {
                continue;
            };
            let mut probe = BadVal::discarding();
            if let Some(result) = self.parse_cell_at(&member, &mut probe, input, ctx, depth) {
                return Some(result);
            }
        }
        bad.fail("union", input, Some("no member matched"));
        None
    }

    fn parse_restricted(
        &self,
        parent_spec: &str,
        constraint: &Constraint,
        bad: &mut BadVal,
        input: &str,
        ctx: ParseContext,
        depth: usize,
    ) -> Option<(Value, String)> {
        // Union restrictions re-drive member selection rather than
        // post-filtering the parent's parse result.
        if let Constraint::UnionSubset { members } = constraint {
            return self.parse_union(members, bad, input, ctx, depth);
        }
        let parent = self.get(parent_spec)?;
        let (v, r) = self.parse_cell_at(&parent, bad, input, ctx, depth)?;
        match constraint {
            Constraint::NumberRange { min, max } => {
                let n = v.as_f64()?;
                if min.map(|m| n < m).unwrap_or(false) || max.map(|m| n > m).unwrap_or(false) {
                    bad.fail("number", input, Some("value out of range"));
                    return None;
                }
            }
            Constraint::StringLen { min_len, max_len, pattern } => {
                let s = v.as_str()?;
                let len = s.chars().count();
                if min_len.map(|m| len < m).unwrap_or(false) {
                    bad.fail("string", input, Some("too short"));
                    return None;
                }
                if max_len.map(|m| len > m).unwrap_or(false) {
                    bad.fail("string", input, Some("too long"));
                    return None;
                }
                if let Some(re) = pattern {
                    if !re.is_match(s) {
                        bad.fail("string", input, Some("pattern mismatch"));
                        return None;
                    }
                }
            }
            Constraint::EnumSubset { values } => {
                let s = v.as_str()?;
                if !values.iter().any(|allowed| allowed == s) {
                    bad.fail("enum", input, Some("not an allowed label"));
                    return None;
                }
            }
            Constraint::Predicate { name, func } => {
                if !func(&v) {
                    bad.fail(name, input, Some("validation failed"));
                    return None;
                }
            }
            Constraint::Expr { source, program } => {
                if !crate::validator::run_constraint(program, &v) {
                    bad.fail("value", input, Some(&format!("failed validator: {source}")));
                    return None;
                }
            }
            Constraint::UnionSubset { .. } => unreachable!(),
        }
        Some((v, r))
    }

    /// Recursive type-tag membership: a name is accepted if it equals or
    /// extends a member, or is covered by a member that is itself a tag.
    fn tag_members_accept(&self, members: &std::collections::BTreeSet<String>, name: &str) -> bool {
        if !self.contains(name) {
            return false;
        }
        for member in members {
            if member == name || self.extends_or_restrict(name, member) {
                return true;
            }
            if let Some(member_entry) = self.get(member) {
                if let Payload::TypeTag { members: inner, .. } = &member_entry.payload {
                    // Tags cannot contain themselves; registration rejects
                    // conflicting redeclarations, so plain recursion is safe.
                    if inner != members && self.tag_members_accept(inner, name) {
                        return true;
                    }
                }
            }
        }
        false
    }

    /// The value an empty cell produces for this type.
    pub fn default_value(&self, entry: &ParserEntry) -> Value {
        match &entry.payload {
            Payload::Primitive(prim) => match prim {
                Primitive::Number
                | Primitive::Integer
                | Primitive::Long
                | Primitive::Ubyte
                | Primitive::Uint => Value::Int(0),
                Primitive::Float | Primitive::Percent | Primitive::Ratio => Value::Float(0.0),
                Primitive::Boolean => Value::Bool(false),
                Primitive::Nil => Value::Nil,
                Primitive::Table => Value::Table(Table::new()),
                Primitive::Version => Value::Str("0.0.0".into()),
                Primitive::CmpVersion => Value::Str("=0.0.0".into()),
                _ => Value::Str(String::new()),
            },
            Payload::Enum { labels } => {
                Value::Str(labels.first().cloned().unwrap_or_default())
            }
            Payload::Array { .. }
            | Payload::Map { .. }
            | Payload::Tuple { .. }
            | Payload::Record { .. } => Value::Table(Table::new()),
            Payload::Union { members } => {
                if members.iter().any(|m| m == "nil") {
                    return Value::Nil;
                }
                match members.first().and_then(|m| self.get(m)) {
                    Some(first) => self.default_value(&first),
                    None => Value::Nil,
                }
            }
            Payload::Alias { target } | Payload::Restriction { parent: target, .. } => {
                match self.get(target) {
                    Some(t) => self.default_value(&t),
                    None => Value::Nil,
                }
            }
            Payload::TypeTag { .. } | Payload::AncestorConstraint { .. } => Value::Str(String::new()),
        }
    }

    /// Total-order comparator honoring per-kind rules (enum label order,
    /// union member index, element comparators inside containers).
    pub fn compare_values(&self, entry: &ParserEntry, a: &Value, b: &Value) -> Ordering {
        self.compare_at(entry, a, b, 0)
    }

    fn compare_at(&self, entry: &ParserEntry, a: &Value, b: &Value, depth: usize) -> Ordering {
        if depth > MAX_DEPTH {
            return value::compare(a, b);
        }
        match &entry.payload {
            Payload::Enum { labels } => match (a, b) {
                (Value::Str(x), Value::Str(y)) => {
                    let ix = labels.iter().position(|l| l == x);
                    let iy = labels.iter().position(|l| l == y);
                    ix.cmp(&iy)
                }
                _ => value::compare(a, b),
            },
            Payload::Array { elem } => self.compare_seq_with(elem, a, b, depth),
            Payload::Tuple { positions } => match (a, b) {
                (Value::Table(ta), Value::Table(tb)) => {
                    for (i, pos_spec) in positions.iter().enumerate() {
                        let x = ta.seq.get(i).unwrap_or(&Value::Nil);
                        let y = tb.seq.get(i).unwrap_or(&Value::Nil);
                        let ord = match self.get(pos_spec) {
                            Some(pos) => self.compare_at(&pos, x, y, depth + 1),
                            None => value::compare(x, y),
                        };
                        if ord != Ordering::Equal {
                            return ord;
                        }
                    }
                    Ordering::Equal
                }
                _ => value::compare(a, b),
            },
            Payload::Map { value: value_spec, .. } => match (a, b) {
                (Value::Table(ta), Value::Table(tb)) => {
                    let ea = ta.sorted_entries();
                    let eb = tb.sorted_entries();
                    for ((ka, va), (kb, vb)) in ea.iter().zip(&eb) {
                        let ord = value::compare(ka, kb);
                        if ord != Ordering::Equal {
                            return ord;
                        }
                        let ord = match self.get(value_spec) {
                            Some(ve) => self.compare_at(&ve, va, vb, depth + 1),
                            None => value::compare(va, vb),
                        };
                        if ord != Ordering::Equal {
                            return ord;
                        }
                    }
                    ea.len().cmp(&eb.len())
                }
                _ => value::compare(a, b),
            },
            Payload::Record { fields, .. } => match (a, b) {
                (Value::Table(ta), Value::Table(tb)) => {
                    for (name, field_spec) in fields {
                        let key = Value::Str(name.clone());
                        let x = ta.get(&key).unwrap_or(&Value::Nil);
                        let y = tb.get(&key).unwrap_or(&Value::Nil);
                        let ord = match self.get(field_spec) {
                            Some(fe) => self.compare_at(&fe, x, y, depth + 1),
                            None => value::compare(x, y),
                        };
                        if ord != Ordering::Equal {
                            return ord;
                        }
                    }
                    Ordering::Equal
                }
                _ => value::compare(a, b),
            },
            Payload::Union { members } => {
                // nil sorts lowest; otherwise member index first, then the
                // chosen member's own comparator.
                match (matches!(a, Value::Nil), matches!(b, Value::Nil)) {
                    (true, true) => return Ordering::Equal,
                    (true, false) => return Ordering::Less,
                    (false, true) => return Ordering::Greater,
                    _ => {}
                }
                let ia = self.union_member_index(members, a);
                let ib = self.union_member_index(members, b);
                if ia != ib {
                    return ia.cmp(&ib);
                }
                match ia.and_then(|i| self.get(&members[i])) {
                    Some(member) => self.compare_at(&member, a, b, depth + 1),
                    None => value::compare(a, b),
                }
            }
            Payload::Alias { target } | Payload::Restriction { parent: target, .. } => {
                match self.get(target) {
                    Some(t) => self.compare_at(&t, a, b, depth),
                    None => value::compare(a, b),
                }
            }
            _ => value::compare(a, b),
        }
    }

    fn compare_seq_with(&self, elem_spec: &str, a: &Value, b: &Value, depth: usize) -> Ordering {
        match (a, b) {
            (Value::Table(ta), Value::Table(tb)) => {
                let elem = self.get(elem_spec);
                for (x, y) in ta.seq.iter().zip(&tb.seq) {
                    let ord = match &elem {
                        Some(e) => self.compare_at(e, x, y, depth + 1),
                        None => value::compare(x, y),
                    };
                    if ord != Ordering::Equal {
                        return ord;
                    }
                }
                ta.seq.len().cmp(&tb.seq.len())
            }
            _ => value::compare(a, b),
        }
    }

    fn union_member_index(&self, members: &[String], v: &Value) -> Option<usize> {
        members.iter().position(|m| self.value_matches(m, v))
    }

    /// Structural check that a value could have come from the given spec.
    /// Used only for union member selection in comparisons.
    fn value_matches(&self, spec: &str, v: &Value) -> bool {
        let Some(entry) = self.resolve(spec) else {
            return false;
        };
        match &entry.payload {
            Payload::Primitive(prim) => match prim {
                Primitive::Nil => matches!(v, Value::Nil),
                Primitive::Boolean => matches!(v, Value::Bool(_)),
                Primitive::Number
                | Primitive::Integer
                | Primitive::Float
                | Primitive::Long
                | Primitive::Ubyte
                | Primitive::Uint
                | Primitive::Percent
                | Primitive::Ratio => matches!(v, Value::Int(_) | Value::Float(_)),
                Primitive::Table => matches!(v, Value::Table(_)),
                Primitive::Any => true,
                _ => matches!(v, Value::Str(_)),
            },
            Payload::Enum { labels } => {
                matches!(v, Value::Str(s) if labels.contains(&s.to_lowercase()))
            }
            Payload::Array { .. }
            | Payload::Map { .. }
            | Payload::Tuple { .. }
            | Payload::Record { .. } => matches!(v, Value::Table(_)),
            Payload::Union { members } => members.iter().any(|m| self.value_matches(m, v)),
            Payload::Restriction { parent, .. } => self.value_matches(parent, v),
            _ => matches!(v, Value::Str(_)),
        }
    }
}

/// A container cell at top level is unbraced (`1,2,3`); nested inside
/// another container it must be brace-wrapped (`{1,2},{3}`). Returns the
/// text to parse and whether the reformatted form needs braces back.
fn container_input<'a>(
    kind: &TypeKind,
    bad: &mut BadVal,
    input: &'a str,
    ctx: ParseContext,
) -> Option<(&'a str, bool)> {
    match ctx {
        ParseContext::Tsv => Some((input, false)),
        ParseContext::Parsed => {
            if input.starts_with('{') && input.ends_with('}') && input.len() >= 2 {
                Some((&input[1..input.len() - 1], true))
            } else {
                bad.fail(&kind.to_string(), input, Some("expected a braced table"));
                None
            }
        }
    }
}

fn wrap_reformat(r: String, wrap: bool) -> String {
    if wrap { format!("{{{r}}}") } else { r }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn setup() -> Registry {
        Registry::bootstrap()
    }

    fn parse(registry: &mut Registry, spec: &str, input: &str) -> Option<(Value, String)> {
        let mut bad = BadVal::discarding();
        let entry = registry.parse_type(&mut bad, spec)?;
        registry.parse_cell(&entry, &mut bad, input, ParseContext::Tsv)
    }

    #[test]
    fn array_round_trip() {
        let mut r = setup();
        let (v, text) = parse(&mut r, "{integer}", "1,2,3").unwrap();
        assert_eq!(text, "1,2,3");
        match v {
            Value::Table(ref t) => assert_eq!(t.seq.len(), 3),
            _ => panic!(),
        }
        let (v2, text2) = parse(&mut r, "{integer}", &text).unwrap();
        assert_eq!(text2, text);
        assert_eq!(v2, v);
    }

    #[test]
    fn empty_array_cell() {
        let mut r = setup();
        let (v, text) = parse(&mut r, "{integer}", "").unwrap();
        assert_eq!(v, Value::Table(Table::new()));
        assert_eq!(text, "");
    }

    #[test]
    fn sparse_array_preserves_nil_slots() {
        let mut r = setup();
        let (v, text) = parse(&mut r, "{integer|nil}", "1,,3").unwrap();
        match v {
            Value::Table(t) => {
                assert_eq!(t.seq[1], Value::Nil);
                assert_eq!(t.seq.len(), 3);
            }
            _ => panic!(),
        }
        assert_eq!(text, "1,,3");
    }

    #[test]
    fn map_sorts_and_rejects_duplicates() {
        let mut r = setup();
        let (_, text) = parse(&mut r, "{identifier:integer}", "b=2,a=1").unwrap();
        assert_eq!(text, "a=1,b=2");
        assert!(parse(&mut r, "{identifier:integer}", "a=1,a=2").is_none());
    }

    #[test]
    fn tuple_arity_is_fixed() {
        let mut r = setup();
        assert!(parse(&mut r, "{integer,integer}", "1,2").is_some());
        assert!(parse(&mut r, "{integer,integer}", "1,2,3").is_none());
        assert!(parse(&mut r, "{integer,integer}", "1").is_none());
    }

    #[test]
    fn record_requires_fields_and_sorts_reformat() {
        let mut r = setup();
        let (_, text) = parse(&mut r, "{name:string,age:number}", "name=bob,age=3").unwrap();
        assert_eq!(text, "age=3,name=bob");
        assert!(parse(&mut r, "{name:string,age:number}", "name=bob").is_none());
        assert!(parse(&mut r, "{name:string,age:number}", "name=bob,age=3,x=1").is_none());
    }

    #[test]
    fn optional_record_field_may_be_missing() {
        let mut r = setup();
        let (v, _) = parse(&mut r, "{id:integer,note:string|nil}", "id=1").unwrap();
        match v {
            Value::Table(t) => assert!(t.get(&Value::Str("note".into())).is_none()),
            _ => panic!(),
        }
    }

    #[test]
    fn union_tries_members_in_order() {
        let mut r = setup();
        let (v, _) = parse(&mut r, "integer|string", "42").unwrap();
        assert_eq!(v, Value::Int(42));
        let (v, _) = parse(&mut r, "integer|string", "hello").unwrap();
        assert_eq!(v, Value::Str("hello".into()));
    }

    #[test]
    fn union_with_nil_takes_empty() {
        let mut r = setup();
        let (v, text) = parse(&mut r, "integer|nil", "").unwrap();
        assert_eq!(v, Value::Nil);
        assert_eq!(text, "");
        let (v, _) = parse(&mut r, "{integer}|nil", "1,2").unwrap();
        assert!(matches!(v, Value::Table(_)));
    }

    #[test]
    fn enum_is_case_insensitive() {
        let mut r = setup();
        let (v, text) = parse(&mut r, "{enum:Red|Green}", "RED").unwrap();
        assert_eq!(v, Value::Str("red".into()));
        assert_eq!(text, "red");
        assert!(parse(&mut r, "{enum:red|green}", "blue").is_none());
    }

    #[test]
    fn union_default_is_nil_when_nil_present() {
        let mut r = setup();
        let mut bad = BadVal::discarding();
        let entry = r.parse_type(&mut bad, "string|nil").unwrap();
        assert_eq!(r.default_value(&entry), Value::Nil);
        let entry = r.parse_type(&mut bad, "number|string").unwrap();
        assert_eq!(r.default_value(&entry), Value::Int(0));
    }

    #[test]
    fn enum_comparator_uses_label_order() {
        let mut r = setup();
        let mut bad = BadVal::discarding();
        let entry = r.parse_type(&mut bad, "{enum:small|medium|large}").unwrap();
        // Labels sort alphabetically at registration: large, medium, small.
        let large = Value::Str("large".into());
        let small = Value::Str("small".into());
        assert_eq!(r.compare_values(&entry, &large, &small), Ordering::Less);
    }

    #[test]
    fn union_comparator_orders_by_member_index() {
        let mut r = setup();
        let mut bad = BadVal::discarding();
        let entry = r.parse_type(&mut bad, "number|string").unwrap();
        let n = Value::Int(99);
        let s = Value::Str("aaa".into());
        assert_eq!(r.compare_values(&entry, &n, &s), Ordering::Less);
        assert_eq!(r.compare_values(&entry, &Value::Nil, &n), Ordering::Less);
    }

    #[test]
    fn depth_guard_fires_on_pathological_nesting() {
        let mut r = setup();
        // Nested array types bounded by the spec parser; drive the value
        // parser directly with a deep literal through `table`.
        let deep = format!("{}1{}", "{".repeat(11), "}".repeat(11));
        assert!(parse(&mut r, "table", &deep).is_none());
    }

    #[test]
    fn nested_containers_round_trip() {
        let mut r = setup();
        let (v, text) = parse(&mut r, "{{integer}}", "{1,2},{3}").unwrap();
        assert_eq!(text, "{1,2},{3}");
        let (v2, text2) = parse(&mut r, "{{integer}}", &text).unwrap();
        assert_eq!((v2, text2), (v, text));
    }
}
