//! Integration tests for the type registry and parsing engine.

use std::rc::Rc;

use proptest::prelude::*;

use tabform::registry::ParseContext;
use tabform::value::{identifier_to_number, number_to_identifier};
use tabform::{BadVal, Registry, Value};

fn registry() -> Registry {
    Registry::bootstrap()
}

fn parse_cell(r: &mut Registry, spec: &str, input: &str) -> Option<(Value, String)> {
    let mut bad = BadVal::discarding();
    let entry = r.parse_type(&mut bad, spec)?;
    r.parse_cell(&entry, &mut bad, input, ParseContext::Tsv)
}

/// Parsing the reformatted form is a fixed point: same value, same text.
fn assert_round_trip(r: &mut Registry, spec: &str, input: &str) {
    let (v1, s1) = parse_cell(r, spec, input)
        .unwrap_or_else(|| panic!("'{input}' must parse as {spec}"));
    let (v2, s2) = parse_cell(r, spec, &s1)
        .unwrap_or_else(|| panic!("reformatted '{s1}' must re-parse as {spec}"));
    assert_eq!(v1, v2, "value changed across reformat for {spec} '{input}'");
    assert_eq!(s1, s2, "reformat not stable for {spec} '{input}'");
}

#[test]
fn round_trip_primitives() {
    let mut r = registry();
    for (spec, inputs) in [
        ("string", vec!["hello", "with space", ""]),
        ("number", vec!["42", "-7", "2.5", "1e3", "0"]),
        ("integer", vec!["0", "-42", "9223372036854775807"]),
        ("float", vec!["3", "2.25", "-0.5"]),
        ("boolean", vec!["true", "false", "TRUE"]),
        ("name", vec!["a.b.c", "single"]),
        ("identifier", vec!["foo_bar", "_x1"]),
        ("percent", vec!["50%", "1/2", "-12.5%"]),
        ("ratio", vec!["1/2", "3/4"]),
        ("http", vec!["http://example.com", "https://example.com:8080/a?b=1#c"]),
        ("version", vec!["1.2.3", "0.1.0"]),
        ("cmp_version", vec![">=1.0.0", "==2.0.0", "~1.2.3"]),
        ("hexbytes", vec!["deadbeef", "00FF"]),
        ("base64bytes", vec!["aGVsbG8=", ""]),
        ("text", vec!["line1\\nline2", "tab\\there"]),
        ("raw", vec!["anything goes {here}"]),
        ("any", vec!["true", "42", "{1,2}", "plain"]),
        ("table", vec!["{}", "{1,2}", "{a=1,b={2,3}}"]),
    ] {
        for input in inputs {
            assert_round_trip(&mut r, spec, input);
        }
    }
}

#[test]
fn round_trip_composites_to_depth_three() {
    let mut r = registry();
    for (spec, inputs) in [
        ("{integer}", vec!["", "1,2,3"]),
        ("{integer|nil}", vec!["1,,3"]),
        ("{name:integer}", vec!["a=1,b=2", ""]),
        ("{integer,string}", vec!["1,x"]),
        ("{id:identifier,hp:integer}", vec!["id=a,hp=3", "hp=3,id=a"]),
        ("integer|string", vec!["42", "hello"]),
        ("{integer}|nil", vec!["", "1,2"]),
        ("{{integer}}", vec!["{1,2},{3}"]),
        ("{name:{integer}}", vec!["a={1,2}"]),
        ("{pos:{integer,integer},tag:string}", vec!["pos={1,2},tag=x"]),
    ] {
        for input in inputs {
            assert_round_trip(&mut r, spec, input);
        }
    }
}

#[test]
fn canonical_spec_stability() {
    let mut r = registry();
    let mut bad = BadVal::discarding();
    let pairs = [
        ("{name:string,age:number}", "{age:number,name:string}"),
        ("{enum:b|a}", "{enum:A|B}"),
        ("integer|integer|string", "integer|string"),
    ];
    for (a, b) in pairs {
        let ea = r.parse_type(&mut bad, a).unwrap();
        let eb = r.parse_type(&mut bad, b).unwrap();
        assert!(
            Rc::ptr_eq(&ea, &eb),
            "'{a}' and '{b}' must share one registry entry"
        );
    }
}

#[test]
fn subtyping_is_strict_and_transitive() {
    let mut r = registry();
    let mut bad = BadVal::discarding();
    for spec in ["string", "integer", "{integer}", "{enum:a|b}", "integer|nil"] {
        r.parse_type(&mut bad, spec).unwrap();
        assert!(!r.extends_or_restrict(spec, spec), "{spec} must not extend itself");
    }
    // Declared pairs are asymmetric.
    for (child, parent) in [
        ("integer", "number"),
        ("ubyte", "integer"),
        ("identifier", "name"),
        ("markdown", "text"),
    ] {
        assert!(r.extends_or_restrict(child, parent));
        assert!(!r.extends_or_restrict(parent, child));
    }
    // Transitivity.
    assert!(r.extends_or_restrict("ubyte", "number"));
    assert!(r.extends_or_restrict("asciimarkdown", "string"));
}

#[test]
fn union_subtyping_rules() {
    let mut r = registry();
    let mut bad = BadVal::discarding();
    for spec in ["integer|float", "integer|string", "integer|nil"] {
        r.parse_type(&mut bad, spec).unwrap();
    }
    assert!(r.extends_or_restrict("integer|float", "number"));
    assert!(!r.extends_or_restrict("integer|string", "number"));
    assert!(!r.extends_or_restrict("integer|nil", "number"));
    assert!(r.extends_or_restrict("integer", "integer|string"));
}

#[test]
fn custom_type_hierarchy_end_to_end() {
    let mut r = registry();
    let mut bad = BadVal::buffering("types");
    r.register_record_type(
        &mut bad,
        "item",
        &[("id".into(), "identifier".into()), ("name".into(), "string".into())],
        None,
    )
    .unwrap();
    r.register_record_type(
        &mut bad,
        "weapon",
        &[
            ("id".into(), "identifier".into()),
            ("name".into(), "string".into()),
            ("damage".into(), "integer".into()),
        ],
        Some("item"),
    )
    .unwrap();
    r.register_type_tag(&mut bad, "equipment", "item", &["weapon".into()])
        .unwrap();
    assert_eq!(bad.errors(), 0, "{:?}", bad.messages());

    assert!(r.extends_or_restrict("weapon", "item"));
    assert!(!r.extends_or_restrict("item", "weapon"));

    // Ancestor constraints and tag uses accept type names.
    let (v, _) = parse_cell(&mut r, "{extends:item}", "weapon").unwrap();
    assert_eq!(v, Value::Str("weapon".into()));
    assert!(parse_cell(&mut r, "{extends:item}", "item").is_none());
    let (v, _) = parse_cell(&mut r, "{extends,equipment}", "weapon").unwrap();
    assert_eq!(v, Value::Str("weapon".into()));
}

#[test]
fn depth_bound_on_literals_and_serialization() {
    let mut r = registry();
    let ten = format!("{}1{}", "{".repeat(10), "}".repeat(10));
    let eleven = format!("{}1{}", "{".repeat(11), "}".repeat(11));
    assert!(parse_cell(&mut r, "table", &ten).is_some());
    assert!(parse_cell(&mut r, "table", &eleven).is_none());
}

#[test]
fn diagnostics_format() {
    let mut r = registry();
    let mut bad = BadVal::buffering("Items.tsv");
    bad.line_no = 7;
    let entry = r.parse_type(&mut bad, "integer").unwrap();
    assert!(r.parse_cell(&entry, &mut bad, "soon", ParseContext::Tsv).is_none());
    insta::assert_snapshot!(
        bad.messages().join("\n"),
        @"ERROR Bad integer  in Items.tsv on line 7: 'soon' (not an integer)"
    );
}

#[test]
fn union_default_respects_string_rule() {
    let mut r = registry();
    let mut bad = BadVal::discarding();
    let entry = r.parse_type(&mut bad, "string|nil").unwrap();
    assert_eq!(r.default_value(&entry), Value::Nil);
    let entry = r.parse_type(&mut bad, "integer|string").unwrap();
    assert_eq!(r.default_value(&entry), Value::Int(0));
}

proptest! {
    #[test]
    fn integer_identifier_round_trip(x in any::<i64>()) {
        let v = Value::Int(x);
        let id = number_to_identifier(&v);
        prop_assert!(tabform::predicates::is_identifier(&id));
        prop_assert_eq!(identifier_to_number(&id), Some(v));
    }

    #[test]
    fn float_identifier_round_trip(x in 1e-15f64..1e15f64) {
        let v = Value::Float(x);
        let id = number_to_identifier(&v);
        prop_assert!(tabform::predicates::is_identifier(&id));
        prop_assert_eq!(identifier_to_number(&id), Some(v));
    }

    #[test]
    fn integer_cells_round_trip(x in any::<i64>()) {
        let mut r = registry();
        let input = x.to_string();
        let mut bad = BadVal::discarding();
        let entry = r.parse_type(&mut bad, "integer").unwrap();
        let (v, s) = r.parse_cell(&entry, &mut bad, &input, ParseContext::Tsv).unwrap();
        prop_assert_eq!(v, Value::Int(x));
        prop_assert_eq!(s, input);
    }

    #[test]
    fn integer_arrays_round_trip(xs in proptest::collection::vec(any::<i64>(), 0..8)) {
        let mut r = registry();
        let input: Vec<String> = xs.iter().map(|x| x.to_string()).collect();
        let input = input.join(",");
        let mut bad = BadVal::discarding();
        let entry = r.parse_type(&mut bad, "{integer}").unwrap();
        let (v1, s1) = r.parse_cell(&entry, &mut bad, &input, ParseContext::Tsv).unwrap();
        let (v2, s2) = r.parse_cell(&entry, &mut bad, &s1, ParseContext::Tsv).unwrap();
        prop_assert_eq!(v1, v2);
        prop_assert_eq!(s1, s2);
    }
}
