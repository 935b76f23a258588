//! Registration operations: aliases, enums, restrictions, type tags, and
//! the data-driven batch form used by `custom_type_def` rows.

use std::collections::BTreeSet;
use std::rc::Rc;

use regex::Regex;

use super::{record_canonical, Constraint, ParserEntry, Payload, Registry, TypeKind};
use crate::report::BadVal;
use crate::value::Value;

/// One data row of a `custom_type_def` file. Exactly one restriction
/// category may be populated: numeric bounds, string bounds/pattern,
/// `values`, `members`, or `validate`; an empty row is a plain alias.
#[derive(Debug, Clone, Default)]
pub struct TypeSpecRow {
    pub name: String,
    pub parent: String,
    pub min: Option<f64>,
    pub max: Option<f64>,
    pub min_len: Option<usize>,
    pub max_len: Option<usize>,
    pub pattern: Option<String>,
    pub values: Vec<String>,
    pub members: Vec<String>,
    pub validate: Option<String>,
}

impl TypeSpecRow {
    fn category_count(&self) -> usize {
        let numeric = self.min.is_some() || self.max.is_some();
        let string = self.min_len.is_some() || self.max_len.is_some() || self.pattern.is_some();
        [
            numeric,
            string,
            !self.values.is_empty(),
            !self.members.is_empty(),
            self.validate.is_some(),
        ]
        .iter()
        .filter(|&&x| x)
        .count()
    }
}

/// Sanitize a bound for use inside an auto-generated alias name.
fn bound_ident(n: f64) -> String {
    crate::value::to_plain_number(&if n.fract() == 0.0 {
        Value::Int(n as i64)
    } else {
        Value::Float(n)
    })
    .replace('-', "m")
    .replace('.', "_")
}

impl Registry {
    fn insert_named(&mut self, name: &str, entry: ParserEntry) -> Rc<ParserEntry> {
        let rc = Rc::new(entry);
        self.insert(name.to_string(), rc.clone());
        rc
    }

    fn name_taken(&self, bad: &mut BadVal, name: &str) -> bool {
        if self.contains(name) {
            bad.fail("type", name, Some("name already registered"));
            true
        } else {
            false
        }
    }

    /// Register `name` as an alias of `target_spec`. Idempotent when the
    /// existing alias has the same target; a conflicting target errors.
    pub fn register_alias(
        &mut self,
        bad: &mut BadVal,
        name: &str,
        target_spec: &str,
    ) -> Option<Rc<ParserEntry>> {
        let target = self.parse_type(bad, target_spec)?;
        if let Some(existing) = self.get(name) {
            return match &existing.payload {
                Payload::Alias { target: t } if *t == target.canonical_spec => Some(existing),
                _ => {
                    bad.fail("type", name, Some("conflicting registration"));
                    None
                }
            };
        }
        Some(self.insert_named(
            name,
            ParserEntry {
                canonical_spec: name.to_string(),
                kind: TypeKind::Alias,
                parent_spec: Some(target.canonical_spec.clone()),
                is_builtin: false,
                payload: Payload::Alias {
                    target: target.canonical_spec.clone(),
                },
            },
        ))
    }

    /// Register an enum from labels (lowercased, sorted, deduplicated),
    /// optionally aliased under a name.
    pub fn register_enum(
        &mut self,
        bad: &mut BadVal,
        labels: &[String],
        alias_name: Option<&str>,
    ) -> Option<Rc<ParserEntry>> {
        if labels.is_empty() {
            bad.fail("enum", "", Some("no labels"));
            return None;
        }
        let mut labels: Vec<String> = labels.iter().map(|l| l.to_lowercase()).collect();
        labels.sort();
        labels.dedup();
        let canonical = format!("{{enum:{}}}", labels.join("|"));
        let entry = match self.get(&canonical) {
            Some(e) => e,
            None => {
                let e = Rc::new(ParserEntry {
                    canonical_spec: canonical.clone(),
                    kind: TypeKind::Enum,
                    parent_spec: Some("string".into()),
                    is_builtin: false,
                    payload: Payload::Enum { labels },
                });
                self.insert(canonical.clone(), e.clone());
                e
            }
        };
        if let Some(name) = alias_name {
            self.register_alias(bad, name, &canonical)?;
        }
        Some(entry)
    }

    /// Restrict a numeric type to `[min, max]`. The parent must extend
    /// `number`. When no alias name is given one is generated from the
    /// bounds; a zero minimum is omitted from the generated name.
    pub fn restrict_number(
        &mut self,
        bad: &mut BadVal,
        parent: &str,
        min: Option<f64>,
        max: Option<f64>,
        alias_name: Option<&str>,
    ) -> Option<Rc<ParserEntry>> {
        if parent != "number" && !self.extends_or_restrict(parent, "number") {
            bad.fail("type", parent, Some("parent does not extend number"));
            return None;
        }
        if min.is_none() && max.is_none() {
            bad.fail("type", parent, Some("no bounds given"));
            return None;
        }
        let name = match alias_name {
            Some(n) => n.to_string(),
            None => {
                let mut parts = vec![parent.to_string()];
                if let Some(m) = min {
                    if m != 0.0 {
                        parts.push(format!("min{}", bound_ident(m)));
                    }
                }
                if let Some(m) = max {
                    parts.push(format!("max{}", bound_ident(m)));
                }
                parts.join("_")
            }
        };
        if self.name_taken(bad, &name) {
            return None;
        }
        Some(self.insert_named(
            &name,
            ParserEntry {
                canonical_spec: name.clone(),
                kind: TypeKind::Restriction,
                parent_spec: Some(parent.to_string()),
                is_builtin: false,
                payload: Payload::Restriction {
                    parent: parent.to_string(),
                    constraint: Constraint::NumberRange { min, max },
                },
            },
        ))
    }

    /// Restrict a string type by length bounds and/or pattern. A pattern
    /// requires at least one length bound to be specified as well.
    pub fn restrict_string(
        &mut self,
        bad: &mut BadVal,
        parent: &str,
        min_len: Option<usize>,
        max_len: Option<usize>,
        pattern: Option<&str>,
        alias_name: Option<&str>,
    ) -> Option<Rc<ParserEntry>> {
        if parent != "string" && !self.extends_or_restrict(parent, "string") {
            bad.fail("type", parent, Some("parent does not extend string"));
            return None;
        }
        if pattern.is_some() && min_len.is_none() && max_len.is_none() {
            bad.fail("type", parent, Some("pattern requires a length bound"));
            return None;
        }
        if min_len.is_none() && max_len.is_none() && pattern.is_none() {
            bad.fail("type", parent, Some("no restriction given"));
            return None;
        }
        let compiled = match pattern {
            Some(p) => match Regex::new(p) {
                Ok(re) => Some(re),
                Err(_) => {
                    bad.fail("regex", p, Some("not a valid regular expression"));
                    return None;
                }
            },
            None => None,
        };
        let name = match alias_name {
            Some(n) => n.to_string(),
            None => {
                let mut parts = vec![parent.to_string()];
                if let Some(m) = min_len {
                    parts.push(format!("minlen{m}"));
                }
                if let Some(m) = max_len {
                    parts.push(format!("maxlen{m}"));
                }
                parts.join("_")
            }
        };
        if self.name_taken(bad, &name) {
            return None;
        }
        Some(self.insert_named(
            &name,
            ParserEntry {
                canonical_spec: name.clone(),
                kind: TypeKind::Restriction,
                parent_spec: Some(parent.to_string()),
                is_builtin: false,
                payload: Payload::Restriction {
                    parent: parent.to_string(),
                    constraint: Constraint::StringLen {
                        min_len,
                        max_len,
                        pattern: compiled,
                    },
                },
            },
        ))
    }

    /// Restrict an arbitrary parent with a named predicate function.
    pub fn restrict_with_validator(
        &mut self,
        bad: &mut BadVal,
        parent: &str,
        alias_name: &str,
        predicate_name: &'static str,
        predicate: fn(&Value) -> bool,
    ) -> Option<Rc<ParserEntry>> {
        if self.parse_type(bad, parent).is_none() {
            return None;
        }
        if self.name_taken(bad, alias_name) {
            return None;
        }
        Some(self.insert_named(
            alias_name,
            ParserEntry {
                canonical_spec: alias_name.to_string(),
                kind: TypeKind::Restriction,
                parent_spec: Some(parent.to_string()),
                is_builtin: false,
                payload: Payload::Restriction {
                    parent: parent.to_string(),
                    constraint: Constraint::Predicate {
                        name: predicate_name,
                        func: predicate,
                    },
                },
            },
        ))
    }

    /// Restrict a registered enum to a subset of its labels.
    pub fn restrict_enum(
        &mut self,
        bad: &mut BadVal,
        parent: &str,
        allowed: &[String],
        alias_name: Option<&str>,
    ) -> Option<Rc<ParserEntry>> {
        let parent_entry = self.resolve(parent)?;
        let labels = match &parent_entry.payload {
            Payload::Enum { labels } => labels.clone(),
            _ => {
                bad.fail("type", parent, Some("parent is not an enum"));
                return None;
            }
        };
        let allowed: Vec<String> = allowed.iter().map(|l| l.to_lowercase()).collect();
        for label in &allowed {
            if !labels.contains(label) {
                bad.fail("enum", label, Some("not a label of the parent enum"));
                return None;
            }
        }
        let name = match alias_name {
            Some(n) => n.to_string(),
            None => format!("{}_{}", parent, allowed.join("_")),
        };
        if self.name_taken(bad, &name) {
            return None;
        }
        Some(self.insert_named(
            &name,
            ParserEntry {
                canonical_spec: name.clone(),
                kind: TypeKind::Restriction,
                parent_spec: Some(parent.to_string()),
                is_builtin: false,
                payload: Payload::Restriction {
                    parent: parent.to_string(),
                    constraint: Constraint::EnumSubset { values: allowed },
                },
            },
        ))
    }

    /// Restrict a registered union to a subset of its members, preserving
    /// the parent's member order.
    pub fn restrict_union(
        &mut self,
        bad: &mut BadVal,
        parent: &str,
        allowed: &[String],
        alias_name: Option<&str>,
    ) -> Option<Rc<ParserEntry>> {
        let parent_entry = self.resolve(parent)?;
        let members = match &parent_entry.payload {
            Payload::Union { members } => members.clone(),
            _ => {
                bad.fail("type", parent, Some("parent is not a union"));
                return None;
            }
        };
        let mut allowed_canonical = Vec::new();
        for spec in allowed {
            let entry = self.parse_type(bad, spec)?;
            allowed_canonical.push(entry.canonical_spec.clone());
        }
        for a in &allowed_canonical {
            if !members.contains(a) {
                bad.fail("type", a, Some("not a member of the parent union"));
                return None;
            }
        }
        // Member order comes from the parent union, not the request.
        let kept: Vec<String> = members
            .into_iter()
            .filter(|m| allowed_canonical.contains(m))
            .collect();
        let name = match alias_name {
            Some(n) => n.to_string(),
            None => format!("{}_restricted", parent),
        };
        if self.name_taken(bad, &name) {
            return None;
        }
        Some(self.insert_named(
            &name,
            ParserEntry {
                canonical_spec: name.clone(),
                kind: TypeKind::Restriction,
                parent_spec: Some(parent.to_string()),
                is_builtin: false,
                payload: Payload::Restriction {
                    parent: parent.to_string(),
                    constraint: Constraint::UnionSubset { members: kept },
                },
            },
        ))
    }

    /// Register (or merge) a type tag. A second declaration with the same
    /// ancestor merges its members; a conflicting ancestor errors.
    pub fn register_type_tag(
        &mut self,
        bad: &mut BadVal,
        name: &str,
        ancestor_spec: &str,
        members: &[String],
    ) -> Option<Rc<ParserEntry>> {
        let ancestor = self.parse_type(bad, ancestor_spec)?;
        let ancestor_c = ancestor.canonical_spec.clone();
        let mut member_set = BTreeSet::new();
        for m in members {
            if self.parse_type(bad, m).is_none() {
                return None;
            }
            if !self.extends_or_restrict(m, &ancestor_c) {
                bad.fail("type", m, Some("does not extend the tag ancestor"));
                return None;
            }
            member_set.insert(m.clone());
        }
        if let Some(existing) = self.get(name) {
            match &existing.payload {
                Payload::TypeTag { ancestor: prev, members: prev_members } => {
                    if *prev != ancestor_c {
                        bad.fail("type tag", name, Some("conflicting ancestor"));
                        return None;
                    }
                    member_set.extend(prev_members.iter().cloned());
                }
                _ => {
                    bad.fail("type", name, Some("conflicting registration"));
                    return None;
                }
            }
        }
        Some(self.insert_named(
            name,
            ParserEntry {
                canonical_spec: name.to_string(),
                kind: TypeKind::Typetag,
                parent_spec: None,
                is_builtin: false,
                payload: Payload::TypeTag {
                    ancestor: ancestor_c,
                    members: member_set,
                },
            },
        ))
    }

    /// Register a named record type (the column structure of a data file),
    /// optionally inheriting a parent record by name.
    pub fn register_record_type(
        &mut self,
        bad: &mut BadVal,
        name: &str,
        fields: &[(String, String)],
        parent: Option<&str>,
    ) -> Option<Rc<ParserEntry>> {
        let mut resolved = std::collections::BTreeMap::new();
        for (field_name, field_spec) in fields {
            if crate::spec::is_keyword(field_name) || !crate::predicates::is_identifier(field_name) {
                bad.fail("record field", field_name, Some("invalid field name"));
                return None;
            }
            let entry = self.parse_type(bad, field_spec)?;
            if resolved
                .insert(field_name.clone(), entry.canonical_spec.clone())
                .is_some()
            {
                bad.fail("record field", field_name, Some("duplicate field"));
                return None;
            }
        }
        let parent_spec = match parent {
            Some(p) => {
                if self.record_fields(p).is_none() {
                    bad.fail("type", p, Some("parent is not a record type"));
                    return None;
                }
                p.to_string()
            }
            None => "table".to_string(),
        };
        if let Some(existing) = self.get(name) {
            // Idempotent on identical shape.
            if let Payload::Record { fields: prev, .. } = &existing.payload {
                if *prev == resolved {
                    return Some(existing);
                }
            }
            bad.fail("type", name, Some("conflicting registration"));
            return None;
        }
        let optional = resolved
            .iter()
            .filter(|(_, spec)| self.admits_nil(spec))
            .map(|(n, _)| n.clone())
            .collect();
        // Key the structural form too so anonymous specs find this entry.
        let structural = record_canonical(&resolved);
        let entry = Rc::new(ParserEntry {
            canonical_spec: name.to_string(),
            kind: TypeKind::Record,
            parent_spec: Some(parent_spec),
            is_builtin: false,
            payload: Payload::Record {
                fields: resolved,
                optional,
            },
        });
        self.insert(name.to_string(), entry.clone());
        if !self.contains(&structural) {
            self.insert(structural, entry.clone());
        }
        Some(entry)
    }

    /// Data-driven batch registration from `custom_type_def` rows. Returns
    /// the number of rows that registered successfully.
    pub fn register_types_from_spec(&mut self, bad: &mut BadVal, rows: &[TypeSpecRow]) -> usize {
        let mut registered = 0;
        for row in rows {
            if self.register_type_from_row(bad, row).is_some() {
                registered += 1;
            }
        }
        registered
    }

    fn register_type_from_row(&mut self, bad: &mut BadVal, row: &TypeSpecRow) -> Option<()> {
        if !crate::predicates::is_name(&row.name) {
            bad.fail("type", &row.name, Some("invalid type name"));
            return None;
        }
        if row.parent.is_empty() {
            bad.fail("type", &row.name, Some("missing parent"));
            return None;
        }
        if row.category_count() > 1 {
            bad.fail("type", &row.name, Some("conflicting restriction categories"));
            return None;
        }
        if row.min.is_some() || row.max.is_some() {
            self.restrict_number(bad, &row.parent, row.min, row.max, Some(&row.name))?;
        } else if row.min_len.is_some() || row.max_len.is_some() || row.pattern.is_some() {
            self.restrict_string(
                bad,
                &row.parent,
                row.min_len,
                row.max_len,
                row.pattern.as_deref(),
                Some(&row.name),
            )?;
        } else if !row.values.is_empty() {
            self.restrict_enum(bad, &row.parent, &row.values, Some(&row.name))?;
        } else if !row.members.is_empty() {
            self.register_type_tag(bad, &row.name, &row.parent, &row.members)?;
        } else if let Some(expr) = &row.validate {
            let program = match crate::validator::compile(expr) {
                Ok(p) => p,
                Err(_) => {
                    bad.fail("value", expr, Some("failed to compile"));
                    return None;
                }
            };
            if self.parse_type(bad, &row.parent).is_none() {
                return None;
            }
            if self.name_taken(bad, &row.name) {
                return None;
            }
            self.insert_named(
                &row.name,
                ParserEntry {
                    canonical_spec: row.name.clone(),
                    kind: TypeKind::Restriction,
                    parent_spec: Some(row.parent.clone()),
                    is_builtin: false,
                    payload: Payload::Restriction {
                        parent: row.parent.clone(),
                        constraint: Constraint::Expr {
                            source: expr.clone(),
                            program: Rc::new(program),
                        },
                    },
                },
            );
        } else {
            self.register_alias(bad, &row.name, &row.parent)?;
        }
        Some(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::ParseContext;

    fn setup() -> (Registry, BadVal) {
        (Registry::bootstrap(), BadVal::discarding())
    }

    fn parse_ok(r: &mut Registry, spec: &str, input: &str) -> Option<Value> {
        let mut bad = BadVal::discarding();
        let entry = r.parse_type(&mut bad, spec)?;
        r.parse_cell(&entry, &mut bad, input, ParseContext::Tsv).map(|(v, _)| v)
    }

    #[test]
    fn alias_is_idempotent_and_conflicts_error() {
        let (mut r, mut bad) = setup();
        assert!(r.register_alias(&mut bad, "count", "integer").is_some());
        assert!(r.register_alias(&mut bad, "count", "integer").is_some());
        let mut bad = BadVal::buffering("t");
        assert!(r.register_alias(&mut bad, "count", "string").is_none());
        assert_eq!(bad.errors(), 1);
    }

    #[test]
    fn number_restriction_enforces_bounds() {
        let (mut r, mut bad) = setup();
        r.restrict_number(&mut bad, "integer", Some(0.0), Some(100.0), Some("pct_points"))
            .unwrap();
        assert_eq!(parse_ok(&mut r, "pct_points", "50"), Some(Value::Int(50)));
        assert!(parse_ok(&mut r, "pct_points", "101").is_none());
        assert!(parse_ok(&mut r, "pct_points", "-1").is_none());
    }

    #[test]
    fn number_restriction_auto_name_omits_zero_min() {
        let (mut r, mut bad) = setup();
        let entry = r.restrict_number(&mut bad, "integer", Some(0.0), Some(100.0), None).unwrap();
        assert_eq!(entry.canonical_spec, "integer_max100");
        let entry = r.restrict_number(&mut bad, "integer", Some(1.0), Some(10.0), None).unwrap();
        assert_eq!(entry.canonical_spec, "integer_min1_max10");
    }

    #[test]
    fn string_restriction_checks_length_and_pattern() {
        let (mut r, mut bad) = setup();
        r.restrict_string(&mut bad, "string", Some(2), Some(5), Some("^[a-z]+$"), Some("tag"))
            .unwrap();
        assert!(parse_ok(&mut r, "tag", "abc").is_some());
        assert!(parse_ok(&mut r, "tag", "a").is_none());
        assert!(parse_ok(&mut r, "tag", "toolong").is_none());
        assert!(parse_ok(&mut r, "tag", "ABC").is_none());
    }

    #[test]
    fn pattern_without_length_bound_is_rejected() {
        let (mut r, _) = setup();
        let mut bad = BadVal::buffering("t");
        assert!(r
            .restrict_string(&mut bad, "string", None, None, Some("^x$"), Some("bad"))
            .is_none());
    }

    #[test]
    fn restriction_parent_must_extend_number() {
        let (mut r, _) = setup();
        let mut bad = BadVal::buffering("t");
        assert!(r.restrict_number(&mut bad, "string", Some(0.0), None, Some("x")).is_none());
    }

    #[test]
    fn enum_subset() {
        let (mut r, mut bad) = setup();
        r.register_enum(
            &mut bad,
            &["red".into(), "green".into(), "blue".into()],
            Some("color"),
        )
        .unwrap();
        r.restrict_enum(&mut bad, "color", &["red".into(), "blue".into()], Some("warm"))
            .unwrap();
        assert!(parse_ok(&mut r, "warm", "red").is_some());
        assert!(parse_ok(&mut r, "warm", "green").is_none());
        let mut bad = BadVal::buffering("t");
        assert!(r
            .restrict_enum(&mut bad, "color", &["purple".into()], Some("nope"))
            .is_none());
    }

    #[test]
    fn union_restriction_preserves_parent_order() {
        let (mut r, mut bad) = setup();
        r.register_alias(&mut bad, "num_or_text", "integer|float|string").unwrap();
        let entry = r
            .restrict_union(
                &mut bad,
                "num_or_text",
                &["string".into(), "integer".into()],
                Some("narrow"),
            )
            .unwrap();
        match &entry.payload {
            Payload::Restriction {
                constraint: Constraint::UnionSubset { members },
                ..
            } => assert_eq!(members, &["integer".to_string(), "string".to_string()]),
            other => panic!("unexpected payload {other:?}"),
        }
    }

    #[test]
    fn type_tag_merges_on_same_ancestor() {
        let (mut r, mut bad) = setup();
        r.register_record_type(
            &mut bad,
            "item",
            &[("id".into(), "integer".into()), ("name".into(), "string".into())],
            None,
        )
        .unwrap();
        r.register_record_type(
            &mut bad,
            "weapon",
            &[
                ("id".into(), "integer".into()),
                ("name".into(), "string".into()),
                ("damage".into(), "integer".into()),
            ],
            Some("item"),
        )
        .unwrap();
        r.register_record_type(
            &mut bad,
            "armor",
            &[
                ("id".into(), "integer".into()),
                ("name".into(), "string".into()),
                ("defense".into(), "integer".into()),
            ],
            Some("item"),
        )
        .unwrap();
        r.register_type_tag(&mut bad, "gear", "item", &["weapon".into()]).unwrap();
        r.register_type_tag(&mut bad, "gear", "item", &["armor".into()]).unwrap();
        let entry = r.get("gear").unwrap();
        match &entry.payload {
            Payload::TypeTag { members, .. } => {
                assert!(members.contains("weapon") && members.contains("armor"));
            }
            _ => panic!(),
        }
        // Conflicting ancestor errors.
        let mut bad = BadVal::buffering("t");
        assert!(r.register_type_tag(&mut bad, "gear", "weapon", &[]).is_none());
    }

    #[test]
    fn type_tag_accepts_member_subtypes() {
        let (mut r, mut bad) = setup();
        r.register_record_type(
            &mut bad,
            "item",
            &[("id".into(), "integer".into()), ("name".into(), "string".into())],
            None,
        )
        .unwrap();
        r.register_record_type(
            &mut bad,
            "weapon",
            &[
                ("id".into(), "integer".into()),
                ("name".into(), "string".into()),
                ("damage".into(), "integer".into()),
            ],
            Some("item"),
        )
        .unwrap();
        r.register_record_type(
            &mut bad,
            "sword",
            &[
                ("id".into(), "integer".into()),
                ("name".into(), "string".into()),
                ("damage".into(), "integer".into()),
                ("reach".into(), "integer".into()),
            ],
            Some("weapon"),
        )
        .unwrap();
        r.register_type_tag(&mut bad, "melee", "item", &["weapon".into()]).unwrap();
        assert_eq!(parse_ok(&mut r, "{extends,melee}", "weapon"), Some(Value::Str("weapon".into())));
        assert_eq!(parse_ok(&mut r, "{extends,melee}", "sword"), Some(Value::Str("sword".into())));
        assert!(parse_ok(&mut r, "{extends,melee}", "item").is_none());
        assert!(parse_ok(&mut r, "{extends,melee}", "no_such").is_none());
    }

    #[test]
    fn ancestor_constraint_accepts_extending_names() {
        let (mut r, mut bad) = setup();
        r.register_record_type(
            &mut bad,
            "item",
            &[("id".into(), "integer".into()), ("name".into(), "string".into())],
            None,
        )
        .unwrap();
        r.register_record_type(
            &mut bad,
            "weapon",
            &[
                ("id".into(), "integer".into()),
                ("name".into(), "string".into()),
                ("damage".into(), "integer".into()),
            ],
            Some("item"),
        )
        .unwrap();
        assert_eq!(
            parse_ok(&mut r, "{extends:item}", "weapon"),
            Some(Value::Str("weapon".into()))
        );
        // Strict relation: the ancestor itself is not accepted.
        assert!(parse_ok(&mut r, "{extends:item}", "item").is_none());
    }

    #[test]
    fn batch_rows_reject_mixed_categories() {
        let (mut r, _) = setup();
        let mut bad = BadVal::buffering("custom_types.tsv");
        let rows = vec![TypeSpecRow {
            name: "broken".into(),
            parent: "integer".into(),
            min: Some(0.0),
            min_len: Some(2),
            ..Default::default()
        }];
        assert_eq!(r.register_types_from_spec(&mut bad, &rows), 0);
        assert!(bad.messages()[0].contains("conflicting restriction categories"));
    }

    #[test]
    fn batch_rows_register_each_category() {
        let (mut r, mut bad) = setup();
        r.register_enum(&mut bad, &["low".into(), "high".into()], Some("level")).unwrap();
        let rows = vec![
            TypeSpecRow {
                name: "health".into(),
                parent: "integer".into(),
                min: Some(0.0),
                max: Some(999.0),
                ..Default::default()
            },
            TypeSpecRow {
                name: "short_name".into(),
                parent: "string".into(),
                max_len: Some(16),
                ..Default::default()
            },
            TypeSpecRow {
                name: "only_low".into(),
                parent: "level".into(),
                values: vec!["low".into()],
                ..Default::default()
            },
            TypeSpecRow {
                name: "speed".into(),
                parent: "number".into(),
                ..Default::default()
            },
        ];
        assert_eq!(r.register_types_from_spec(&mut bad, &rows), 4);
        assert!(parse_ok(&mut r, "health", "500").is_some());
        assert!(parse_ok(&mut r, "health", "1000").is_none());
        assert!(parse_ok(&mut r, "short_name", "ok").is_some());
        assert!(parse_ok(&mut r, "only_low", "high").is_none());
        assert_eq!(parse_ok(&mut r, "speed", "1.5"), Some(Value::Float(1.5)));
    }
}
