//! Type registry and parser factory.
//!
//! The registry is the central shared structure: every type specification
//! compiles into a [`ParserEntry`] keyed by its canonical spec. Entries are
//! data-driven — a kind plus the canonical specs of element types — so cell
//! parsing, comparison, and default construction are all recursive walks
//! over registry lookups rather than captured closures.
//!
//! Mutation happens in two phases: bootstrap (primitives and their
//! extension links) and manifest loading (aliases, restrictions, custom
//! records, type tags). During data parsing only idempotent lazy insertion
//! of derived composite entries occurs.

mod builtins;
mod extends;
mod parse;
mod restrict;

pub use builtins::Primitive;
pub use restrict::TypeSpecRow;

use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::rc::Rc;

use regex::Regex;

use crate::report::BadVal;
use crate::spec::{self, TypeAst};
use crate::validator::Program;

/// What a cell string is being parsed from: a raw TSV field, or a piece of
/// an already-split container (where strings may be quoted and `""` means
/// nil for nil-admitting element types).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParseContext {
    Tsv,
    Parsed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, strum_macros::Display)]
#[strum(serialize_all = "snake_case")]
pub enum TypeKind {
    Primitive,
    Enum,
    Array,
    Map,
    Tuple,
    Record,
    Union,
    Alias,
    Restriction,
    Typetag,
    AncestorConstraint,
}

/// Additional predicate attached to a restriction entry.
#[derive(Debug, Clone)]
pub enum Constraint {
    NumberRange {
        min: Option<f64>,
        max: Option<f64>,
    },
    StringLen {
        min_len: Option<usize>,
        max_len: Option<usize>,
        pattern: Option<Regex>,
    },
    EnumSubset {
        values: Vec<String>,
    },
    UnionSubset {
        members: Vec<String>,
    },
    Predicate {
        name: &'static str,
        func: fn(&crate::value::Value) -> bool,
    },
    Expr {
        source: String,
        program: Rc<Program>,
    },
}

/// Kind-specific data of a registry entry. Element and field types are
/// referenced by canonical spec; they are always registered before the
/// entry holding them is finalized.
#[derive(Debug, Clone)]
pub enum Payload {
    Primitive(Primitive),
    Enum {
        labels: Vec<String>,
    },
    Array {
        elem: String,
    },
    Map {
        key: String,
        value: String,
    },
    Tuple {
        positions: Vec<String>,
    },
    Record {
        fields: BTreeMap<String, String>,
        optional: BTreeSet<String>,
    },
    Union {
        members: Vec<String>,
    },
    Alias {
        target: String,
    },
    Restriction {
        parent: String,
        constraint: Constraint,
    },
    TypeTag {
        ancestor: String,
        members: BTreeSet<String>,
    },
    AncestorConstraint {
        ancestor: String,
    },
}

#[derive(Debug)]
pub struct ParserEntry {
    pub canonical_spec: String,
    pub kind: TypeKind,
    /// Declared parent for primitives/aliases/restrictions/records; the
    /// structural kind (`table`, `string`) for composites; `None` for
    /// root primitives and unions.
    pub parent_spec: Option<String>,
    pub is_builtin: bool,
    pub payload: Payload,
}

/// The registry value. Threaded explicitly through the loader and the
/// pipeline; there is no ambient singleton.
#[derive(Debug, Default)]
pub struct Registry {
    entries: HashMap<String, Rc<ParserEntry>>,
}

impl Registry {
    /// A registry populated with the built-in primitives and their
    /// extension links.
    pub fn bootstrap() -> Self {
        let mut registry = Self::default();
        builtins::install(&mut registry);
        registry
    }

    pub fn get(&self, spec: &str) -> Option<Rc<ParserEntry>> {
        self.entries.get(spec).cloned()
    }

    pub fn contains(&self, spec: &str) -> bool {
        self.entries.contains_key(spec)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// True if `name` resolves without any custom registrations having been
    /// consulted — probes with a discarding reporter.
    pub fn is_builtin_type(&self, name: &str) -> bool {
        self.entries.get(name).map(|e| e.is_builtin).unwrap_or(false)
    }

    pub(crate) fn insert(&mut self, key: String, entry: Rc<ParserEntry>) {
        self.entries.insert(key, entry);
    }

    /// Resolve a spec string to a registered entry, lazily compiling and
    /// inserting composite entries on first use. Registration is keyed by
    /// canonical spec, so syntactically different but equivalent specs
    /// share one entry.
    pub fn parse_type(&mut self, bad: &mut BadVal, spec_str: &str) -> Option<Rc<ParserEntry>> {
        if let Some(entry) = self.entries.get(spec_str) {
            return Some(entry.clone());
        }
        let ast = spec::parse_spec(bad, spec_str)?;
        let canonical = ast.canonical();
        if let Some(entry) = self.entries.get(&canonical) {
            return Some(entry.clone());
        }
        self.register_ast(bad, &ast)
    }

    /// Register a parsed AST, recursively registering element types first.
    pub(crate) fn register_ast(&mut self, bad: &mut BadVal, ast: &TypeAst) -> Option<Rc<ParserEntry>> {
        let canonical = ast.canonical();
        if let Some(entry) = self.entries.get(&canonical) {
            return Some(entry.clone());
        }
        let entry = match ast {
            TypeAst::Name(name) => {
                bad.fail("type", name, Some("unknown type"));
                return None;
            }
            TypeAst::Enum(labels) => {
                let mut labels: Vec<String> = labels.iter().map(|l| l.to_lowercase()).collect();
                labels.sort();
                labels.dedup();
                Rc::new(ParserEntry {
                    canonical_spec: canonical.clone(),
                    kind: TypeKind::Enum,
                    parent_spec: Some("string".into()),
                    is_builtin: false,
                    payload: Payload::Enum { labels },
                })
            }
            TypeAst::Array(elem) => {
                let elem_entry = self.register_ast(bad, elem)?;
                Rc::new(ParserEntry {
                    canonical_spec: canonical.clone(),
                    kind: TypeKind::Array,
                    parent_spec: Some("table".into()),
                    is_builtin: false,
                    payload: Payload::Array {
                        elem: elem_entry.canonical_spec.clone(),
                    },
                })
            }
            TypeAst::Map(key, value) => {
                let key_entry = self.register_ast(bad, key)?;
                let value_entry = self.register_ast(bad, value)?;
                // The syntactic nil check already ran; re-check after alias
                // resolution.
                if self.admits_nil(&key_entry.canonical_spec)
                    || self.admits_nil(&value_entry.canonical_spec)
                {
                    bad.fail("type", &canonical, Some("map key and value types must not admit nil"));
                    return None;
                }
                Rc::new(ParserEntry {
                    canonical_spec: canonical.clone(),
                    kind: TypeKind::Map,
                    parent_spec: Some("table".into()),
                    is_builtin: false,
                    payload: Payload::Map {
                        key: key_entry.canonical_spec.clone(),
                        value: value_entry.canonical_spec.clone(),
                    },
                })
            }
            TypeAst::Tuple(positions) => {
                let mut specs = Vec::with_capacity(positions.len());
                for p in positions {
                    specs.push(self.register_ast(bad, p)?.canonical_spec.clone());
                }
                Rc::new(ParserEntry {
                    canonical_spec: canonical.clone(),
                    kind: TypeKind::Tuple,
                    parent_spec: Some("table".into()),
                    is_builtin: false,
                    payload: Payload::Tuple { positions: specs },
                })
            }
            TypeAst::Record(field_list) => {
                let mut fields = BTreeMap::new();
                for (name, field_ast) in field_list {
                    let field_entry = self.register_ast(bad, field_ast)?;
                    fields.insert(name.clone(), field_entry.canonical_spec.clone());
                }
                let optional = self.optional_fields(&fields);
                Rc::new(ParserEntry {
                    canonical_spec: canonical.clone(),
                    kind: TypeKind::Record,
                    parent_spec: Some("table".into()),
                    is_builtin: false,
                    payload: Payload::Record { fields, optional },
                })
            }
            TypeAst::Union(member_list) => {
                let mut members: Vec<String> = Vec::new();
                for m in member_list {
                    let member_entry = self.register_ast(bad, m)?;
                    let c = member_entry.canonical_spec.clone();
                    if !members.contains(&c) {
                        members.push(c);
                    }
                }
                if let Some(pos) = members.iter().position(|m| m == "string") {
                    let s = members.remove(pos);
                    members.push(s);
                }
                Rc::new(ParserEntry {
                    canonical_spec: canonical.clone(),
                    kind: TypeKind::Union,
                    parent_spec: None,
                    is_builtin: false,
                    payload: Payload::Union { members },
                })
            }
            TypeAst::Extends { parent, extra } => {
                return self.register_extends(bad, &canonical, parent, extra);
            }
            TypeAst::AncestorConstraint(ancestor) => {
                let ancestor_entry = self.register_ast_or_name(bad, ancestor)?;
                Rc::new(ParserEntry {
                    canonical_spec: canonical.clone(),
                    kind: TypeKind::AncestorConstraint,
                    parent_spec: None,
                    is_builtin: false,
                    payload: Payload::AncestorConstraint {
                        ancestor: ancestor_entry.canonical_spec.clone(),
                    },
                })
            }
            TypeAst::TypeTagUse(tag_name) => {
                let Some(entry) = self.entries.get(tag_name).cloned() else {
                    bad.fail("type", tag_name, Some("unknown type tag"));
                    return None;
                };
                if entry.kind != TypeKind::Typetag {
                    bad.fail("type", tag_name, Some("not a type tag"));
                    return None;
                }
                self.entries.insert(canonical, entry.clone());
                return Some(entry);
            }
        };
        self.entries.insert(canonical, entry.clone());
        Some(entry)
    }

    /// Like [`register_ast`], but a bare name resolves against the registry
    /// instead of erroring — ancestors and extends-parents are references,
    /// not fresh definitions.
    fn register_ast_or_name(&mut self, bad: &mut BadVal, ast: &TypeAst) -> Option<Rc<ParserEntry>> {
        if let TypeAst::Name(name) = ast {
            let entry = self.entries.get(name).cloned();
            if entry.is_none() {
                bad.fail("type", name, Some("unknown type"));
            }
            return entry;
        }
        self.register_ast(bad, ast)
    }

    fn register_extends(
        &mut self,
        bad: &mut BadVal,
        extends_canonical: &str,
        parent: &str,
        extra: &[(String, TypeAst)],
    ) -> Option<Rc<ParserEntry>> {
        let Some(parent_entry) = self.entries.get(parent).cloned() else {
            bad.fail("type", parent, Some("unknown parent record"));
            return None;
        };
        let parent_fields = match self.record_fields(&parent_entry.canonical_spec) {
            Some(f) => f,
            None => {
                bad.fail("type", parent, Some("parent is not a record type"));
                return None;
            }
        };
        let mut fields = parent_fields;
        for (name, field_ast) in extra {
            if fields.contains_key(name) {
                bad.fail("record field", name, Some("duplicates an inherited field"));
                return None;
            }
            let field_entry = self.register_ast(bad, field_ast)?;
            fields.insert(name.clone(), field_entry.canonical_spec.clone());
        }
        let merged_canonical = record_canonical(&fields);
        if let Some(existing) = self.entries.get(&merged_canonical) {
            let existing = existing.clone();
            self.entries.insert(extends_canonical.to_string(), existing.clone());
            return Some(existing);
        }
        let optional = self.optional_fields(&fields);
        let entry = Rc::new(ParserEntry {
            canonical_spec: merged_canonical.clone(),
            kind: TypeKind::Record,
            parent_spec: Some(parent.to_string()),
            is_builtin: false,
            payload: Payload::Record { fields, optional },
        });
        self.entries.insert(merged_canonical, entry.clone());
        self.entries.insert(extends_canonical.to_string(), entry.clone());
        Some(entry)
    }

    /// Fields of a record entry, following alias and restriction links.
    pub(crate) fn record_fields(&self, spec: &str) -> Option<BTreeMap<String, String>> {
        let entry = self.entries.get(spec)?;
        match &entry.payload {
            Payload::Record { fields, .. } => Some(fields.clone()),
            Payload::Alias { target } => self.record_fields(target),
            Payload::Restriction { parent, .. } => self.record_fields(parent),
            _ => None,
        }
    }

    fn optional_fields(&self, fields: &BTreeMap<String, String>) -> BTreeSet<String> {
        fields
            .iter()
            .filter(|(_, spec)| self.admits_nil(spec))
            .map(|(name, _)| name.clone())
            .collect()
    }

    /// Whether values of this spec may be nil, following aliases.
    pub fn admits_nil(&self, spec: &str) -> bool {
        let Some(entry) = self.entries.get(spec) else {
            return false;
        };
        match &entry.payload {
            Payload::Primitive(Primitive::Nil) => true,
            Payload::Union { members } => members.iter().any(|m| m == "nil"),
            Payload::Alias { target } => self.admits_nil(target),
            Payload::Restriction { parent, .. } => self.admits_nil(parent),
            _ => false,
        }
    }

    /// Follow alias and restriction links down to the underlying entry
    /// that defines parse behavior.
    pub(crate) fn resolve(&self, spec: &str) -> Option<Rc<ParserEntry>> {
        let entry = self.entries.get(spec)?;
        match &entry.payload {
            Payload::Alias { target } => self.resolve(target),
            _ => Some(entry.clone()),
        }
    }
}

pub(crate) fn record_canonical(fields: &BTreeMap<String, String>) -> String {
    let parts: Vec<String> = fields.iter().map(|(n, s)| format!("{n}:{s}")).collect();
    format!("{{{}}}", parts.join(","))
}
