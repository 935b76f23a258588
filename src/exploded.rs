//! Exploded-column analysis.
//!
//! Flat column headers encode nested structure: dotted paths make records
//! (`location.level`), `_N` suffixes make tuples (`position._1`), and
//! bracket suffixes make collections (`items[1]` array element,
//! `items[1]=` map value paired with the `items[1]` key column).
//! The analyzer rebuilds the structure tree from the header, validates
//! index density and key/value pairing, and reassembles a nested value per
//! row.

use std::collections::BTreeMap;

use indexmap::IndexMap;

use crate::predicates::is_identifier;
use crate::report::BadVal;
use crate::value::{Table, Value};

/// One header column as seen by the analyzer.
#[derive(Debug, Clone)]
pub struct ExplodedColumn {
    pub idx: usize,
    pub name: String,
}

/// Reconstructed structure for one top-level exploded field.
#[derive(Debug, Clone, PartialEq)]
pub enum Structure {
    /// A single column holds this value.
    Leaf(usize),
    Record(IndexMap<String, Structure>),
    Tuple(Vec<Structure>),
    /// Dense 1-based element structures.
    Array(Vec<Structure>),
    /// `(key column, value column)` pairs in index order.
    Map(Vec<(usize, usize)>),
}

#[derive(Debug)]
enum Seg {
    Field(String),
    TupleIdx(usize),
    /// `base[N]` or `base[N]=`.
    Coll {
        base: String,
        index: usize,
        is_value: bool,
    },
}

/// Does this column name use any of the explosion conventions?
pub fn is_exploded_name(name: &str) -> bool {
    name.contains('.') || name.contains('[') || name.split('.').any(|p| parse_tuple_idx(p).is_some())
}

fn parse_tuple_idx(part: &str) -> Option<usize> {
    let digits = part.strip_prefix('_')?;
    if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    digits.parse().ok()
}

fn parse_segments(name: &str) -> Option<Vec<Seg>> {
    let mut segs = Vec::new();
    for part in name.split('.') {
        if let Some(idx) = parse_tuple_idx(part) {
            if idx == 0 {
                return None;
            }
            segs.push(Seg::TupleIdx(idx));
        } else if let Some(open) = part.find('[') {
            let base = &part[..open];
            let rest = &part[open + 1..];
            let (digits, is_value) = match rest.strip_suffix("]=") {
                Some(d) => (d, true),
                None => (rest.strip_suffix(']')?, false),
            };
            let index: usize = digits.parse().ok()?;
            if index == 0 || !is_identifier(base) {
                return None;
            }
            segs.push(Seg::Coll {
                base: base.to_string(),
                index,
                is_value,
            });
        } else if is_identifier(part) {
            segs.push(Seg::Field(part.to_string()));
        } else {
            return None;
        }
    }
    if segs.is_empty() { None } else { Some(segs) }
}

#[derive(Debug, Default)]
struct CollSlot {
    key_col: Option<usize>,
    value_col: Option<usize>,
}

#[derive(Debug)]
enum Node {
    Leaf(usize),
    Record(IndexMap<String, Node>),
    Tuple(BTreeMap<usize, Node>),
    Collection(BTreeMap<usize, CollSlot>),
}

fn insert_path(bad: &mut BadVal, node: &mut Node, name: &str, segs: &[Seg], col: usize) -> bool {
    let (seg, rest) = match segs.split_first() {
        Some(x) => x,
        None => return false,
    };
    match seg {
        Seg::Field(field) => {
            let map = match node {
                Node::Record(map) => map,
                _ => {
                    bad.fail("column", name, Some("conflicting structure at path"));
                    return false;
                }
            };
            if rest.is_empty() {
                if map.insert(field.clone(), Node::Leaf(col)).is_some() {
                    bad.fail("column", name, Some("duplicate column path"));
                    return false;
                }
                true
            } else {
                let child = map
                    .entry(field.clone())
                    .or_insert_with(|| empty_node_for(&rest[0]));
                insert_path(bad, child, name, rest, col)
            }
        }
        Seg::TupleIdx(idx) => {
            let map = match node {
                Node::Tuple(map) => map,
                _ => {
                    bad.fail("column", name, Some("conflicting structure at path"));
                    return false;
                }
            };
            if rest.is_empty() {
                if map.insert(*idx, Node::Leaf(col)).is_some() {
                    bad.fail("column", name, Some("duplicate tuple index"));
                    return false;
                }
                true
            } else {
                let child = map.entry(*idx).or_insert_with(|| empty_node_for(&rest[0]));
                insert_path(bad, child, name, rest, col)
            }
        }
        Seg::Coll { base, index, is_value } => {
            // The collection itself hangs off a record field named `base`.
            let map = match node {
                Node::Record(map) => map,
                _ => {
                    bad.fail("column", name, Some("conflicting structure at path"));
                    return false;
                }
            };
            let coll = map
                .entry(base.clone())
                .or_insert_with(|| Node::Collection(BTreeMap::new()));
            let slots = match coll {
                Node::Collection(slots) => slots,
                _ => {
                    bad.fail("column", name, Some("conflicting structure at path"));
                    return false;
                }
            };
            if !rest.is_empty() {
                bad.fail("column", name, Some("collection columns cannot nest further"));
                return false;
            }
            let slot = slots.entry(*index).or_default();
            let target = if *is_value { &mut slot.value_col } else { &mut slot.key_col };
            if target.is_some() {
                bad.fail("column", name, Some("duplicate column path"));
                return false;
            }
            *target = Some(col);
            true
        }
    }
}

fn empty_node_for(seg: &Seg) -> Node {
    match seg {
        Seg::Field(_) | Seg::Coll { .. } => Node::Record(IndexMap::new()),
        Seg::TupleIdx(_) => Node::Tuple(BTreeMap::new()),
    }
}

/// Analyze the header and return the structure of each top-level exploded
/// field, in first-appearance order. Non-exploded columns are not included.
pub fn analyze_exploded_columns(
    bad: &mut BadVal,
    columns: &[ExplodedColumn],
) -> Option<IndexMap<String, Structure>> {
    let mut root = Node::Record(IndexMap::new());
    let mut ok = true;
    for col in columns {
        if !is_exploded_name(&col.name) {
            continue;
        }
        let Some(segs) = parse_segments(&col.name) else {
            bad.fail("column", &col.name, Some("malformed exploded column name"));
            ok = false;
            continue;
        };
        if !insert_path(bad, &mut root, &col.name, &segs, col.idx) {
            ok = false;
        }
    }
    if !ok {
        return None;
    }
    let Node::Record(top) = root else { unreachable!() };
    let mut out = IndexMap::new();
    for (name, node) in top {
        match finalize(bad, &name, node) {
            Some(structure) => {
                out.insert(name, structure);
            }
            None => ok = false,
        }
    }
    if ok { Some(out) } else { None }
}

/// Validate collection and tuple density while converting the build tree
/// into the final structure.
fn finalize(bad: &mut BadVal, name: &str, node: Node) -> Option<Structure> {
    match node {
        Node::Leaf(col) => Some(Structure::Leaf(col)),
        Node::Record(map) => {
            let mut out = IndexMap::new();
            for (field, child) in map {
                out.insert(field.clone(), finalize(bad, &format!("{name}.{field}"), child)?);
            }
            Some(Structure::Record(out))
        }
        Node::Tuple(map) => {
            let arity = map.len();
            for want in 1..=arity {
                if !map.contains_key(&want) {
                    bad.fail("column", name, Some(&format!("missing tuple index {want}")));
                    return None;
                }
            }
            let mut finals = Vec::with_capacity(arity);
            for (_, child) in map {
                finals.push(finalize(bad, name, child)?);
            }
            Some(Structure::Tuple(finals))
        }
        Node::Collection(slots) => {
            let is_map = slots.values().any(|s| s.value_col.is_some());
            let max = slots.keys().copied().max().unwrap_or(0);
            for want in 1..=max {
                if !slots.contains_key(&want) {
                    bad.fail("column", name, Some(&format!("missing index {want}")));
                    return None;
                }
            }
            if is_map {
                let mut pairs = Vec::with_capacity(slots.len());
                for (idx, slot) in &slots {
                    let key = match slot.key_col {
                        Some(c) => c,
                        None => {
                            bad.fail(
                                "column",
                                &format!("{name}[{idx}]"),
                                Some("missing key column"),
                            );
                            return None;
                        }
                    };
                    let value = match slot.value_col {
                        Some(c) => c,
                        None => {
                            bad.fail(
                                "column",
                                &format!("{name}[{idx}]"),
                                Some("missing value column"),
                            );
                            return None;
                        }
                    };
                    pairs.push((key, value));
                }
                Some(Structure::Map(pairs))
            } else {
                let mut elems = Vec::with_capacity(slots.len());
                for (idx, slot) in &slots {
                    match slot.key_col {
                        Some(c) => elems.push(Structure::Leaf(c)),
                        None => {
                            bad.fail(
                                "column",
                                &format!("{name}[{idx}]"),
                                Some("missing key column"),
                            );
                            return None;
                        }
                    }
                }
                Some(Structure::Array(elems))
            }
        }
    }
}

/// Rebuild the nested value for one row. Nil leaves are preserved in
/// arrays and tuples; a nil map key skips that entry; nil record fields
/// are omitted.
pub fn assemble_exploded_value(row: &[Value], structure: &Structure) -> Value {
    match structure {
        Structure::Leaf(col) => row.get(*col).cloned().unwrap_or(Value::Nil),
        Structure::Record(fields) => {
            let mut t = Table::new();
            for (name, child) in fields {
                let v = assemble_exploded_value(row, child);
                if !matches!(v, Value::Nil) {
                    t.set(Value::Str(name.clone()), v);
                }
            }
            Value::Table(t)
        }
        Structure::Tuple(items) | Structure::Array(items) => {
            let seq = items.iter().map(|c| assemble_exploded_value(row, c)).collect();
            Value::Table(Table { seq, entries: vec![] })
        }
        Structure::Map(pairs) => {
            let mut t = Table::new();
            for (key_col, value_col) in pairs {
                let k = row.get(*key_col).cloned().unwrap_or(Value::Nil);
                if matches!(k, Value::Nil) {
                    continue;
                }
                let v = row.get(*value_col).cloned().unwrap_or(Value::Nil);
                t.set(k, v);
            }
            Value::Table(t)
        }
    }
}

/// Detect the tuple shape of a parsed table: keys `_1.._k` densely
/// numbered and nothing else. Returns the indices when it is one.
pub fn is_tuple_structure(t: &Table) -> (bool, Vec<usize>) {
    if !t.seq.is_empty() || t.entries.is_empty() {
        return (false, vec![]);
    }
    let mut indices = Vec::with_capacity(t.entries.len());
    for (k, _) in &t.entries {
        match k {
            Value::Str(s) => match parse_tuple_idx(s) {
                Some(i) => indices.push(i),
                None => return (false, vec![]),
            },
            _ => return (false, vec![]),
        }
    }
    indices.sort_unstable();
    for (want, got) in (1..=indices.len()).zip(&indices) {
        if want != *got {
            return (false, vec![]);
        }
    }
    (true, indices)
}

/// Header cell for a re-collapsed column.
pub fn generate_collapsed_column_spec(field_name: &str, subtype_spec: &str) -> String {
    format!("{field_name}:{subtype_spec}")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cols(names: &[&str]) -> Vec<ExplodedColumn> {
        names
            .iter()
            .enumerate()
            .map(|(idx, name)| ExplodedColumn { idx, name: name.to_string() })
            .collect()
    }

    #[test]
    fn record_with_nested_tuple() {
        let mut bad = BadVal::discarding();
        let header = cols(&["id", "location.level", "location.position._1", "location.position._2"]);
        let out = analyze_exploded_columns(&mut bad, &header).unwrap();
        assert_eq!(out.len(), 1);
        let location = &out["location"];
        match location {
            Structure::Record(fields) => {
                assert_eq!(fields["level"], Structure::Leaf(1));
                assert_eq!(
                    fields["position"],
                    Structure::Tuple(vec![Structure::Leaf(2), Structure::Leaf(3)])
                );
            }
            other => panic!("expected record, got {other:?}"),
        }
    }

    #[test]
    fn dense_array_accepted_gap_rejected() {
        let mut bad = BadVal::discarding();
        let out = analyze_exploded_columns(&mut bad, &cols(&["items[1]", "items[2]"])).unwrap();
        assert_eq!(out["items"], Structure::Array(vec![Structure::Leaf(0), Structure::Leaf(1)]));

        let mut bad = BadVal::buffering("x.tsv");
        assert!(analyze_exploded_columns(&mut bad, &cols(&["items[1]", "items[3]"])).is_none());
        assert!(bad.messages()[0].contains("missing index 2"));
    }

    #[test]
    fn map_columns_must_pair() {
        let mut bad = BadVal::discarding();
        let out =
            analyze_exploded_columns(&mut bad, &cols(&["stats[1]", "stats[1]=", "stats[2]", "stats[2]="]))
                .unwrap();
        assert_eq!(out["stats"], Structure::Map(vec![(0, 1), (2, 3)]));

        let mut bad = BadVal::buffering("x.tsv");
        assert!(analyze_exploded_columns(&mut bad, &cols(&["stats[1]", "stats[1]=", "stats[2]"])).is_none());
        assert!(bad.messages()[0].contains("missing value column"));

        let mut bad = BadVal::buffering("x.tsv");
        assert!(analyze_exploded_columns(&mut bad, &cols(&["stats[1]=", "stats[1]"])).is_some());
        let mut bad = BadVal::buffering("x.tsv");
        let res = analyze_exploded_columns(&mut bad, &cols(&["stats[1]", "stats[1]=", "stats[2]="]));
        assert!(res.is_none());
        assert!(bad.messages()[0].contains("missing key column"));
    }

    #[test]
    fn dotted_collection_base() {
        let mut bad = BadVal::discarding();
        let out = analyze_exploded_columns(&mut bad, &cols(&["player.inventory[1]", "player.inventory[2]"]))
            .unwrap();
        match &out["player"] {
            Structure::Record(fields) => {
                assert_eq!(
                    fields["inventory"],
                    Structure::Array(vec![Structure::Leaf(0), Structure::Leaf(1)])
                );
            }
            other => panic!("expected record, got {other:?}"),
        }
    }

    #[test]
    fn assembly_preserves_nil_array_slots_and_skips_nil_map_keys() {
        let structure = Structure::Array(vec![
            Structure::Leaf(0),
            Structure::Leaf(1),
            Structure::Leaf(2),
        ]);
        let row = vec![Value::Int(1), Value::Nil, Value::Int(3)];
        match assemble_exploded_value(&row, &structure) {
            Value::Table(t) => {
                assert_eq!(t.seq, vec![Value::Int(1), Value::Nil, Value::Int(3)]);
            }
            _ => panic!(),
        }

        let map = Structure::Map(vec![(0, 1), (2, 3)]);
        let row = vec![
            Value::Str("hp".into()),
            Value::Int(10),
            Value::Nil,
            Value::Int(99),
        ];
        match assemble_exploded_value(&row, &map) {
            Value::Table(t) => {
                assert_eq!(t.entries.len(), 1);
                assert_eq!(t.get(&Value::Str("hp".into())), Some(&Value::Int(10)));
            }
            _ => panic!(),
        }
    }

    #[test]
    fn tuple_structure_detection() {
        let mut t = Table::new();
        t.set(Value::Str("_1".into()), Value::Int(1));
        t.set(Value::Str("_2".into()), Value::Int(2));
        assert_eq!(is_tuple_structure(&t), (true, vec![1, 2]));

        let mut gap = Table::new();
        gap.set(Value::Str("_1".into()), Value::Int(1));
        gap.set(Value::Str("_3".into()), Value::Int(3));
        assert_eq!(is_tuple_structure(&gap).0, false);

        let mut mixed = Table::new();
        mixed.set(Value::Str("_1".into()), Value::Int(1));
        mixed.set(Value::Str("name".into()), Value::Int(2));
        assert_eq!(is_tuple_structure(&mixed).0, false);
    }

    #[test]
    fn collapsed_spec() {
        assert_eq!(
            generate_collapsed_column_spec("location", "{level:name,position:{integer,integer}}"),
            "location:{level:name,position:{integer,integer}}"
        );
    }

    #[test]
    fn non_exploded_columns_are_ignored() {
        let mut bad = BadVal::discarding();
        let out = analyze_exploded_columns(&mut bad, &cols(&["id", "name"])).unwrap();
        assert!(out.is_empty());
    }
}
