//! Typed AST for type specifications.
//!
//! The AST decouples the spec grammar from the registry. Each variant
//! carries only what registration needs; canonicalization lives here so
//! that syntactically different but equivalent specs key the same
//! registry entry.

use std::fmt;

/// Reserved words of the validator expression language. Record field names
/// must not collide with these.
pub const KEYWORDS: &[&str] = &[
    "and", "break", "do", "else", "elseif", "end", "false", "for", "function", "goto", "if", "in",
    "local", "nil", "not", "or", "repeat", "return", "then", "true", "until", "while",
];

pub fn is_keyword(s: &str) -> bool {
    KEYWORDS.contains(&s)
}

/// A parsed type specification.
#[derive(Debug, Clone, PartialEq)]
pub enum TypeAst {
    /// A primitive or registered type name.
    Name(String),
    /// `{enum:a|b|c}`
    Enum(Vec<String>),
    /// `{T}`
    Array(Box<TypeAst>),
    /// `{K:V}` — exactly one key/value pair.
    Map(Box<TypeAst>, Box<TypeAst>),
    /// `{T1,T2,..}` — at least two positions.
    Tuple(Vec<TypeAst>),
    /// `{f1:T1,f2:T2,..}` — at least two fields, declaration order.
    Record(Vec<(String, TypeAst)>),
    /// `A|B|C` — flat, declaration order, `string` last.
    Union(Vec<TypeAst>),
    /// `{extends:Parent,f1:T1,..}`
    Extends {
        parent: String,
        extra: Vec<(String, TypeAst)>,
    },
    /// `{extends:T}` — accepts names of types extending T.
    AncestorConstraint(Box<TypeAst>),
    /// `{extends,TagName}` — accepts names of types covered by the tag.
    TypeTagUse(String),
}

impl TypeAst {
    /// True if a value of this spec can be nil without consulting the
    /// registry: the literal `nil` type or a union carrying it. Alias
    /// indirection is resolved at registration time.
    pub fn admits_nil_syntactically(&self) -> bool {
        match self {
            TypeAst::Name(n) => n == "nil",
            TypeAst::Union(members) => members.iter().any(|m| m.admits_nil_syntactically()),
            _ => false,
        }
    }

    /// The canonical textual form: record fields sorted, union members
    /// deduplicated in declaration order with `string` forced last, enum
    /// labels lowercased and sorted, no whitespace anywhere.
    pub fn canonical(&self) -> String {
        match self {
            TypeAst::Name(n) => n.clone(),
            TypeAst::Enum(labels) => {
                let mut labels: Vec<String> = labels.iter().map(|l| l.to_lowercase()).collect();
                labels.sort();
                labels.dedup();
                format!("{{enum:{}}}", labels.join("|"))
            }
            TypeAst::Array(elem) => format!("{{{}}}", elem.canonical()),
            TypeAst::Map(k, v) => format!("{{{}:{}}}", k.canonical(), v.canonical()),
            TypeAst::Tuple(positions) => {
                let inner: Vec<String> = positions.iter().map(|p| p.canonical()).collect();
                format!("{{{}}}", inner.join(","))
            }
            TypeAst::Record(fields) => format!("{{{}}}", canonical_fields(fields)),
            TypeAst::Union(members) => canonical_union(members),
            TypeAst::Extends { parent, extra } => {
                format!("{{extends:{},{}}}", parent, canonical_fields(extra))
            }
            TypeAst::AncestorConstraint(ancestor) => {
                format!("{{extends:{}}}", ancestor.canonical())
            }
            TypeAst::TypeTagUse(name) => format!("{{extends,{}}}", name),
        }
    }
}

fn canonical_fields(fields: &[(String, TypeAst)]) -> String {
    let mut sorted: Vec<&(String, TypeAst)> = fields.iter().collect();
    sorted.sort_by(|a, b| a.0.cmp(&b.0));
    let parts: Vec<String> = sorted
        .iter()
        .map(|(name, spec)| format!("{}:{}", name, spec.canonical()))
        .collect();
    parts.join(",")
}

/// Deduplicate by canonical form preserving first occurrence, then move
/// `string` to the end. The caller has already rejected unions where
/// `string` precedes another member in the source text.
fn canonical_union(members: &[TypeAst]) -> String {
    let mut seen: Vec<String> = Vec::new();
    for m in members {
        let c = m.canonical();
        if !seen.contains(&c) {
            seen.push(c);
        }
    }
    if let Some(pos) = seen.iter().position(|c| c == "string") {
        let s = seen.remove(pos);
        seen.push(s);
    }
    seen.join("|")
}

impl fmt::Display for TypeAst {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.canonical())
    }
}
