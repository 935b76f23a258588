//! The strict subtyping relation over registered types.
//!
//! `extends_or_restrict` is the reflexive-free transitive closure of the
//! declared alias/restriction/inheritance links plus the structural rules
//! for composites. Equality is canonical-spec identity; a type never
//! extends itself.

use std::collections::HashSet;

use super::{Payload, Registry};

impl Registry {
    /// Canonical identity for a spec: the registered canonical spec when
    /// the name is known, otherwise the text itself.
    fn canonical_of(&self, spec: &str) -> String {
        match self.get(spec) {
            Some(entry) => entry.canonical_spec.clone(),
            None => spec.to_string(),
        }
    }

    /// Strict extension: `A extends A` is always false; the relation is
    /// transitive across declared links and structural composite rules.
    pub fn extends_or_restrict(&self, child: &str, parent: &str) -> bool {
        let child_c = self.canonical_of(child);
        let parent_c = self.canonical_of(parent);
        if child_c == parent_c {
            return false;
        }
        let mut visited = HashSet::new();
        self.extends_inner(&child_c, &parent_c, &mut visited)
    }

    fn eq_or_extends(&self, a: &str, b: &str, visited: &mut HashSet<(String, String)>) -> bool {
        let ac = self.canonical_of(a);
        let bc = self.canonical_of(b);
        ac == bc || self.extends_inner(&ac, &bc, visited)
    }

    fn extends_inner(
        &self,
        child: &str,
        parent: &str,
        visited: &mut HashSet<(String, String)>,
    ) -> bool {
        if !visited.insert((child.to_string(), parent.to_string())) {
            return false;
        }
        let Some(child_entry) = self.get(child) else {
            return false;
        };

        // Declared links: alias target, restriction parent, record parent,
        // primitive extension, structural-kind parent.
        if let Some(declared) = &child_entry.parent_spec {
            if self.eq_or_extends(declared, parent, visited) {
                return true;
            }
        }

        let Some(parent_entry) = self.get(parent) else {
            return false;
        };

        // Unions containing nil never extend a non-union ancestor.
        match (&child_entry.payload, &parent_entry.payload) {
            (Payload::Union { members }, Payload::Union { members: parent_members }) => {
                members.iter().all(|m| {
                    parent_members
                        .iter()
                        .any(|pm| self.eq_or_extends(m, pm, visited))
                })
            }
            (Payload::Union { members }, _) => {
                !members.iter().any(|m| m == "nil")
                    && members.iter().all(|m| self.eq_or_extends(m, parent, visited))
            }
            (_, Payload::Union { members }) => members
                .iter()
                .any(|m| self.eq_or_extends(child, m, visited)),
            (Payload::Array { elem: child_elem }, Payload::Array { elem: parent_elem }) => {
                self.eq_or_extends(child_elem, parent_elem, visited)
            }
            (Payload::Map { key: ck, value: cv }, Payload::Map { key: pk, value: pv }) => {
                self.eq_or_extends(ck, pk, visited) && self.eq_or_extends(cv, pv, visited)
            }
            (Payload::Tuple { positions: cp }, Payload::Tuple { positions: pp }) => {
                cp.len() == pp.len()
                    && cp
                        .iter()
                        .zip(pp)
                        .all(|(c, p)| self.eq_or_extends(c, p, visited))
            }
            (
                Payload::Record { fields: child_fields, .. },
                Payload::Record { fields: parent_fields, .. },
            ) => parent_fields.iter().all(|(name, parent_spec)| {
                child_fields
                    .get(name)
                    .map(|child_spec| self.eq_or_extends(child_spec, parent_spec, visited))
                    .unwrap_or(false)
            }),
            _ => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::report::BadVal;

    fn setup() -> Registry {
        Registry::bootstrap()
    }

    #[test]
    fn relation_is_strict() {
        let r = setup();
        for t in ["string", "number", "integer", "table", "any"] {
            assert!(!r.extends_or_restrict(t, t), "{t} must not extend itself");
        }
    }

    #[test]
    fn declared_primitive_links() {
        let r = setup();
        assert!(r.extends_or_restrict("integer", "number"));
        assert!(!r.extends_or_restrict("number", "integer"));
        assert!(r.extends_or_restrict("identifier", "name"));
    }

    #[test]
    fn transitivity_through_the_chain() {
        let r = setup();
        // ubyte -> integer -> number
        assert!(r.extends_or_restrict("ubyte", "integer"));
        assert!(r.extends_or_restrict("ubyte", "number"));
        // asciimarkdown -> asciitext -> ascii -> string
        assert!(r.extends_or_restrict("asciimarkdown", "string"));
        // identifier -> name -> ascii -> string
        assert!(r.extends_or_restrict("identifier", "string"));
    }

    #[test]
    fn arrays_are_covariant() {
        let mut r = setup();
        let mut bad = BadVal::discarding();
        r.parse_type(&mut bad, "{integer}").unwrap();
        r.parse_type(&mut bad, "{number}").unwrap();
        assert!(r.extends_or_restrict("{integer}", "{number}"));
        assert!(!r.extends_or_restrict("{number}", "{integer}"));
        assert!(!r.extends_or_restrict("{integer}", "{integer}"));
    }

    #[test]
    fn union_to_ancestor_rules() {
        let mut r = setup();
        let mut bad = BadVal::discarding();
        r.parse_type(&mut bad, "integer|float").unwrap();
        r.parse_type(&mut bad, "integer|string").unwrap();
        r.parse_type(&mut bad, "integer|nil").unwrap();
        assert!(r.extends_or_restrict("integer|float", "number"));
        assert!(!r.extends_or_restrict("integer|string", "number"));
        assert!(!r.extends_or_restrict("integer|nil", "number"));
    }

    #[test]
    fn member_extends_union() {
        let mut r = setup();
        let mut bad = BadVal::discarding();
        r.parse_type(&mut bad, "integer|string").unwrap();
        assert!(r.extends_or_restrict("integer", "integer|string"));
        // ubyte extends integer which is a member.
        assert!(r.extends_or_restrict("ubyte", "integer|string"));
        assert!(!r.extends_or_restrict("boolean", "integer|string"));
    }

    #[test]
    fn union_subset_extends_union() {
        let mut r = setup();
        let mut bad = BadVal::discarding();
        r.parse_type(&mut bad, "integer|float|string").unwrap();
        r.parse_type(&mut bad, "integer|float").unwrap();
        assert!(r.extends_or_restrict("integer|float", "integer|float|string"));
        assert!(!r.extends_or_restrict("integer|float|string", "integer|float"));
    }

    #[test]
    fn record_extension_requires_compatible_fields() {
        let mut r = setup();
        let mut bad = BadVal::discarding();
        r.parse_type(&mut bad, "{id:integer,name:string}").unwrap();
        r.parse_type(&mut bad, "{id:number,name:string}").unwrap();
        r.parse_type(&mut bad, "{id:integer,name:string,extra:boolean}").unwrap();
        // Narrower field type: extends.
        assert!(r.extends_or_restrict("{id:integer,name:string}", "{id:number,name:string}"));
        // Extra fields: extends.
        assert!(r.extends_or_restrict(
            "{id:integer,name:string,extra:boolean}",
            "{id:integer,name:string}"
        ));
        // Missing field: does not extend.
        assert!(!r.extends_or_restrict("{id:integer,name:string}", "{id:integer,name:string,extra:boolean}"));
    }

    #[test]
    fn records_extend_the_table_kind() {
        let mut r = setup();
        let mut bad = BadVal::discarding();
        r.parse_type(&mut bad, "{id:integer,name:string}").unwrap();
        assert!(r.extends_or_restrict("{id:integer,name:string}", "table"));
        assert!(r.extends_or_restrict("{integer}", "table"));
    }

    #[test]
    fn alias_extends_its_target() {
        let mut r = setup();
        let mut bad = BadVal::discarding();
        r.register_alias(&mut bad, "count", "integer").unwrap();
        assert!(r.extends_or_restrict("count", "integer"));
        assert!(r.extends_or_restrict("count", "number"));
        assert!(!r.extends_or_restrict("integer", "count"));
    }
}
