//! Package discovery and manifest loading.
//!
//! A package is a directory holding `Manifest.transposed.tsv` (rows of
//! `key:type<TAB>value`) and `files.tsv` (one row per data file). The
//! loader orders packages topologically by declared dependencies, orders
//! files by `loadOrder` within each package with priorities offset across
//! packages, registers custom types and per-file record types, and
//! enforces parent/child record compatibility before any data parsing.

use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};

use thiserror::Error;
use tracing::{debug, warn};

use crate::exploded::{self, Structure};
use crate::join::JoinMeta;
use crate::literal::{parse_table_literal, split_top_level};
use crate::registry::{Registry, TypeSpecRow};
use crate::report::BadVal;
use crate::tsv::{parse_tsv, TsvFile};
use crate::validator::ValidatorSpec;
use crate::value::Value;

#[derive(Debug, Error)]
pub enum LoadError {
    #[error("IO error reading {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("missing manifest field '{field}' in {package}")]
    MissingField { package: String, field: String },

    #[error("cycle in package dependencies involving '{package}'")]
    DependencyCycle { package: String },

    #[error("package error in {package}: {message}")]
    Package { package: String, message: String },
}

/// Parsed `Manifest.transposed.tsv` plus the inline declarations it may
/// carry.
#[derive(Debug, Clone, Default)]
pub struct Manifest {
    pub package_id: String,
    pub name: String,
    pub version: String,
    pub description: String,
    pub dependencies: Vec<String>,
    pub custom_types: Vec<TypeSpecRow>,
    pub row_validators: Vec<ValidatorSpec>,
    pub file_validators: Vec<ValidatorSpec>,
    pub package_validators: Vec<ValidatorSpec>,
    pub dir: PathBuf,
}

/// One row of `files.tsv`, with its global priority assigned.
#[derive(Debug, Clone)]
pub struct FileEntry {
    pub file_name: String,
    pub type_name: String,
    pub super_type: Option<String>,
    pub base_type: bool,
    pub publish_context: Option<String>,
    pub publish_column: Option<String>,
    pub load_order: f64,
    pub description: String,
    pub join: JoinMeta,
    pub package_id: String,
    pub priority: i64,
    pub path: PathBuf,
}

/// Everything downstream stages need.
#[derive(Debug, Default)]
pub struct LoadedPackages {
    /// Packages in topological order.
    pub packages: Vec<Manifest>,
    /// Files in global processing order.
    pub files: Vec<FileEntry>,
    /// Lowercased file name to global priority.
    pub priorities: HashMap<String, i64>,
    /// Lowercased file name to owning package id.
    pub file_package: HashMap<String, String>,
    /// Type name to declared super type.
    pub extends: HashMap<String, String>,
    /// Lowercased file name to raw parsed TSV.
    pub raw_files: HashMap<String, TsvFile>,
}

/// The type name whose files carry custom type definitions.
pub const CUSTOM_TYPE_DEF: &str = "custom_type_def";

/// The bootstrap files descriptor is exempt from cross-package duplicate
/// warnings.
const FILES_DESCRIPTOR: &str = "files.tsv";

fn read_file(path: &Path) -> Result<String, LoadError> {
    std::fs::read_to_string(path).map_err(|source| LoadError::Io {
        path: path.to_path_buf(),
        source,
    })
}

fn parse_manifest(bad: &mut BadVal, dir: &Path) -> Result<Manifest, LoadError> {
    let path = dir.join("Manifest.transposed.tsv");
    let content = read_file(&path)?;
    let package = dir.display().to_string();
    let mut manifest = Manifest {
        dir: dir.to_path_buf(),
        ..Manifest::default()
    };
    bad.at(path.display().to_string(), 0);
    for (i, line) in content.lines().enumerate() {
        bad.line_no = i + 1;
        if line.is_empty() {
            continue;
        }
        let Some((key_spec, value)) = line.split_once('\t') else {
            bad.fail("manifest row", line, Some("expected key:type<TAB>value"));
            continue;
        };
        let key = key_spec.split_once(':').map(|(k, _)| k).unwrap_or(key_spec);
        match key {
            "package_id" => manifest.package_id = value.to_string(),
            "name" => manifest.name = value.to_string(),
            "version" => manifest.version = value.to_string(),
            "description" => manifest.description = value.to_string(),
            "dependencies" => {
                manifest.dependencies = split_top_level(value)
                    .into_iter()
                    .filter(|s| !s.is_empty())
                    .collect();
            }
            "custom_types" => {
                if let Some(Value::Table(t)) = parse_table_literal(bad, value) {
                    for item in &t.seq {
                        if let Some(row) = type_spec_row_from_value(item) {
                            manifest.custom_types.push(row);
                        } else {
                            bad.fail("custom type", value, Some("malformed custom type record"));
                        }
                    }
                }
            }
            "row_validators" | "file_validators" | "package_validators" => {
                if let Some(Value::Table(t)) = parse_table_literal(bad, value) {
                    let specs: Vec<ValidatorSpec> =
                        t.seq.iter().filter_map(ValidatorSpec::from_value).collect();
                    match key {
                        "row_validators" => manifest.row_validators = specs,
                        "file_validators" => manifest.file_validators = specs,
                        _ => manifest.package_validators = specs,
                    }
                }
            }
            _ => {
                // Unknown manifest keys are tolerated.
            }
        }
    }
    for (field, value) in [
        ("package_id", &manifest.package_id),
        ("name", &manifest.name),
        ("version", &manifest.version),
        ("description", &manifest.description),
    ] {
        if value.is_empty() {
            return Err(LoadError::MissingField {
                package,
                field: field.to_string(),
            });
        }
    }
    Ok(manifest)
}

fn type_spec_row_from_value(v: &Value) -> Option<TypeSpecRow> {
    let Value::Table(t) = v else { return None };
    let get_str = |k: &str| -> Option<String> {
        t.get(&Value::Str(k.into())).and_then(|v| v.as_str()).map(|s| s.to_string())
    };
    let get_num = |k: &str| -> Option<f64> { t.get(&Value::Str(k.into())).and_then(|v| v.as_f64()) };
    let get_list = |k: &str| -> Vec<String> {
        match t.get(&Value::Str(k.into())) {
            Some(Value::Table(inner)) => inner
                .seq
                .iter()
                .filter_map(|v| v.as_str().map(|s| s.to_string()))
                .collect(),
            _ => Vec::new(),
        }
    };
    Some(TypeSpecRow {
        name: get_str("name")?,
        parent: get_str("parent")?,
        min: get_num("min"),
        max: get_num("max"),
        min_len: get_num("minLen").map(|n| n as usize),
        max_len: get_num("maxLen").map(|n| n as usize),
        pattern: get_str("pattern"),
        values: get_list("values"),
        members: get_list("members"),
        validate: get_str("validate"),
    })
}

/// Columns of a `custom_type_def` data row. Extra columns are ignored.
fn type_spec_row_from_tsv(file: &TsvFile, row: &[String]) -> TypeSpecRow {
    let cell = |name: &str| -> String {
        file.column(name).map(|c| row[c].clone()).unwrap_or_default()
    };
    let opt = |name: &str| -> Option<String> {
        let v = cell(name);
        if v.is_empty() { None } else { Some(v) }
    };
    let list = |name: &str| -> Vec<String> {
        split_top_level(&cell(name)).into_iter().filter(|s| !s.is_empty()).collect()
    };
    TypeSpecRow {
        name: cell("name"),
        parent: cell("parent"),
        min: opt("min").and_then(|v| v.parse().ok()),
        max: opt("max").and_then(|v| v.parse().ok()),
        min_len: opt("minLen").and_then(|v| v.parse().ok()),
        max_len: opt("maxLen").and_then(|v| v.parse().ok()),
        pattern: opt("pattern"),
        values: list("values"),
        members: list("members"),
        validate: opt("validate"),
    }
}

fn parse_files_descriptor(
    bad: &mut BadVal,
    dir: &Path,
    package_id: &str,
) -> Result<Vec<FileEntry>, LoadError> {
    let path = dir.join(FILES_DESCRIPTOR);
    let content = read_file(&path)?;
    bad.at(path.display().to_string(), 1);
    let Some(table) = parse_tsv(bad, &path.display().to_string(), &content) else {
        return Err(LoadError::Package {
            package: package_id.to_string(),
            message: "malformed files.tsv".to_string(),
        });
    };
    let mut entries = Vec::new();
    for (i, row) in table.rows.iter().enumerate() {
        bad.line_no = table.line_of_row(i);
        let cell = |name: &str| -> String {
            table.column(name).map(|c| row[c].clone()).unwrap_or_default()
        };
        let opt = |name: &str| -> Option<String> {
            let v = cell(name);
            if v.is_empty() { None } else { Some(v) }
        };
        let file_name = cell("fileName");
        let type_name = cell("typeName");
        if file_name.is_empty() || type_name.is_empty() {
            bad.fail("files row", &row.join("\t"), Some("missing fileName or typeName"));
            continue;
        }
        let load_order: f64 = cell("loadOrder").parse().unwrap_or(0.0);
        entries.push(FileEntry {
            path: dir.join(&file_name),
            file_name,
            type_name,
            super_type: opt("superType"),
            base_type: cell("baseType") == "true",
            publish_context: opt("publishContext"),
            publish_column: opt("publishColumn"),
            load_order,
            description: cell("description"),
            join: JoinMeta {
                join_into: opt("joinInto"),
                join_column: opt("joinColumn"),
                export: cell("export") == "true",
                joined_type_name: opt("joinedTypeName"),
            },
            package_id: package_id.to_string(),
            priority: 0,
        });
    }
    Ok(entries)
}

/// Topological sort, dependencies first. Unknown dependencies warn;
/// cycles error.
fn order_packages(manifests: Vec<Manifest>) -> Result<Vec<Manifest>, LoadError> {
    let ids: HashSet<String> = manifests.iter().map(|m| m.package_id.clone()).collect();
    let mut ordered: Vec<Manifest> = Vec::with_capacity(manifests.len());
    let mut placed: HashSet<String> = HashSet::new();
    let mut remaining = manifests;
    while !remaining.is_empty() {
        let mut progressed = false;
        let mut still: Vec<Manifest> = Vec::new();
        for m in remaining {
            let ready = m.dependencies.iter().all(|d| placed.contains(d) || !ids.contains(d));
            for d in &m.dependencies {
                if !ids.contains(d) {
                    warn!(package = %m.package_id, dependency = %d, "unknown package dependency");
                }
            }
            if ready {
                placed.insert(m.package_id.clone());
                ordered.push(m);
                progressed = true;
            } else {
                still.push(m);
            }
        }
        if !progressed {
            let package = still
                .first()
                .map(|m| m.package_id.clone())
                .unwrap_or_default();
            return Err(LoadError::DependencyCycle { package });
        }
        remaining = still;
    }
    Ok(ordered)
}

/// Is this type a `custom_type_def` file type, directly or through the
/// declared `superType` hierarchy?
pub fn is_custom_type_file(type_name: &str, extends: &HashMap<String, String>) -> bool {
    let mut current = type_name;
    let mut hops = 0;
    loop {
        if current == CUSTOM_TYPE_DEF {
            return true;
        }
        match extends.get(current) {
            Some(parent) if hops < 64 => {
                current = parent;
                hops += 1;
            }
            _ => return false,
        }
    }
}

/// Derive the record-field spec of a file's header: plain columns map
/// directly, exploded columns collapse through their reconstructed
/// structure.
fn header_fields(bad: &mut BadVal, file: &TsvFile) -> Option<Vec<(String, String)>> {
    let exploded_cols: Vec<exploded::ExplodedColumn> = file
        .header
        .iter()
        .enumerate()
        .map(|(idx, c)| exploded::ExplodedColumn { idx, name: c.name.clone() })
        .collect();
    let structures = exploded::analyze_exploded_columns(bad, &exploded_cols)?;
    let mut fields = Vec::new();
    for col in &file.header {
        if !exploded::is_exploded_name(&col.name) {
            fields.push((col.name.clone(), col.spec.clone()));
        }
    }
    for (name, structure) in &structures {
        fields.push((name.clone(), structure_spec(structure, file)));
    }
    Some(fields)
}

/// Collapse a reconstructed structure back into a type spec, reading leaf
/// specs from the header.
fn structure_spec(structure: &Structure, file: &TsvFile) -> String {
    match structure {
        Structure::Leaf(col) => file.header[*col].spec.clone(),
        Structure::Record(fields) => {
            let mut parts: Vec<String> = fields
                .iter()
                .map(|(n, s)| format!("{n}:{}", structure_spec(s, file)))
                .collect();
            parts.sort();
            format!("{{{}}}", parts.join(","))
        }
        Structure::Tuple(items) => {
            let parts: Vec<String> = items.iter().map(|s| structure_spec(s, file)).collect();
            format!("{{{}}}", parts.join(","))
        }
        Structure::Array(items) => {
            let elem = items
                .first()
                .map(|s| structure_spec(s, file))
                .unwrap_or_else(|| "any".to_string());
            format!("{{{elem}}}")
        }
        Structure::Map(pairs) => {
            let (k, v) = pairs
                .first()
                .map(|(k, v)| (file.header[*k].spec.clone(), file.header[*v].spec.clone()))
                .unwrap_or_else(|| ("name".to_string(), "any".to_string()));
            format!("{{{k}:{v}}}")
        }
    }
}

/// Load a set of package directories: discover, order, register types,
/// and check record compatibility. Data parsing happens downstream.
pub fn load_packages(
    bad: &mut BadVal,
    registry: &mut Registry,
    dirs: &[PathBuf],
) -> Result<LoadedPackages, LoadError> {
    let mut manifests = Vec::with_capacity(dirs.len());
    for dir in dirs {
        manifests.push(parse_manifest(bad, dir)?);
    }
    let packages = order_packages(manifests)?;

    let mut out = LoadedPackages::default();
    let mut priority: i64 = 0;

    for manifest in &packages {
        debug!(package = %manifest.package_id, "loading package");
        registry.register_types_from_spec(bad, &manifest.custom_types);

        let mut entries = parse_files_descriptor(bad, &manifest.dir, &manifest.package_id)?;
        entries.sort_by(|a, b| {
            a.load_order
                .partial_cmp(&b.load_order)
                .unwrap_or(std::cmp::Ordering::Equal)
        });

        let mut seen_files: HashSet<String> = HashSet::new();
        let mut seen_types: HashSet<String> = HashSet::new();
        for mut entry in entries {
            let file_lc = entry.file_name.to_lowercase();
            let type_lc = entry.type_name.to_lowercase();
            bad.at(
                manifest.dir.join(FILES_DESCRIPTOR).display().to_string(),
                0,
            );
            if !seen_files.insert(file_lc.clone()) || !seen_types.insert(type_lc.clone()) {
                bad.fail(
                    "files row",
                    &entry.file_name,
                    Some("duplicate file or type within package"),
                );
                continue;
            }
            if out.file_package.contains_key(&file_lc) && file_lc != FILES_DESCRIPTOR {
                warn!(file = %entry.file_name, "duplicate file name across packages");
                bad.warn_msg(&format!(
                    "duplicate file name '{}' across packages",
                    entry.file_name
                ));
            }
            priority += 1;
            entry.priority = priority;
            if let Some(parent) = &entry.super_type {
                out.extends.insert(entry.type_name.clone(), parent.clone());
            }
            out.priorities.insert(file_lc.clone(), priority);
            out.file_package
                .insert(file_lc.clone(), manifest.package_id.clone());

            // Read the data file now: custom-type files must register
            // immediately so later files in the same package see their
            // types; every file registers its record type from the header.
            let content = read_file(&entry.path)?;
            bad.at(entry.path.display().to_string(), 1);
            let Some(raw) = parse_tsv(bad, &entry.path.display().to_string(), &content) else {
                continue;
            };

            if is_custom_type_file(&entry.type_name, &out.extends) {
                let rows: Vec<TypeSpecRow> = raw
                    .rows
                    .iter()
                    .map(|row| type_spec_row_from_tsv(&raw, row))
                    .collect();
                registry.register_types_from_spec(bad, &rows);
            }

            if let Some(fields) = header_fields(bad, &raw) {
                if fields.len() >= 2 {
                    registry.register_record_type(
                        bad,
                        &entry.type_name,
                        &fields,
                        entry.super_type.as_deref(),
                    );
                }
            }

            out.raw_files.insert(file_lc, raw);
            out.files.push(entry);
        }
    }

    check_record_compatibility(bad, registry, &out);
    out.packages = packages;
    Ok(out)
}

/// Parent/child field compatibility, checked before any data parsing:
/// every child record must extend its declared parent; sibling children
/// of one parent must agree on shared field types.
fn check_record_compatibility(bad: &mut BadVal, registry: &Registry, loaded: &LoadedPackages) {
    let mut children_of: HashMap<&str, Vec<&str>> = HashMap::new();
    for (child, parent) in &loaded.extends {
        children_of.entry(parent.as_str()).or_default().push(child.as_str());
        // The declared parent link alone does not prove compatibility;
        // compare the field structures directly.
        let (Some(child_fields), Some(parent_fields)) =
            (registry.record_fields(child), registry.record_fields(parent))
        else {
            continue;
        };
        for (field, parent_spec) in &parent_fields {
            let compatible = match child_fields.get(field) {
                Some(child_spec) => {
                    child_spec == parent_spec
                        || registry.extends_or_restrict(child_spec, parent_spec)
                }
                None => false,
            };
            if !compatible {
                bad.fail(
                    "type",
                    child,
                    Some(&format!(
                        "record field '{field}' is not compatible with parent '{parent}'"
                    )),
                );
            }
        }
    }
    for (parent, children) in &children_of {
        let parent_fields = registry.record_fields(parent).unwrap_or_default();
        let mut field_types: HashMap<String, (&str, String)> = HashMap::new();
        for child in children {
            let Some(fields) = registry.record_fields(child) else { continue };
            for (field, spec) in fields {
                if parent_fields.contains_key(&field) {
                    continue;
                }
                match field_types.get(&field) {
                    None => {
                        field_types.insert(field, (child, spec));
                    }
                    Some((other, other_spec)) => {
                        let compatible = *other_spec == spec
                            || registry.extends_or_restrict(&spec, other_spec)
                            || registry.extends_or_restrict(other_spec, &spec);
                        if !compatible {
                            bad.fail(
                                "record field",
                                &field,
                                Some(&format!(
                                    "conflicting types in sibling sub-types '{child}' and '{other}'"
                                )),
                            );
                        }
                    }
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn write(dir: &Path, name: &str, content: &str) {
        std::fs::write(dir.join(name), content).unwrap();
    }

    fn manifest_content(id: &str, deps: &str) -> String {
        let mut s = format!(
            "package_id:name\t{id}\nname:string\t{id} package\nversion:version\t1.0.0\ndescription:text\ttest package\n"
        );
        if !deps.is_empty() {
            s.push_str(&format!("dependencies:{{name}}\t{deps}\n"));
        }
        s
    }

    fn base_package(dir: &Path) {
        write(
            dir,
            "Manifest.transposed.tsv",
            &manifest_content("base", ""),
        );
        write(
            dir,
            "files.tsv",
            "fileName:string\ttypeName:name\tsuperType:name|nil\tbaseType:boolean\tpublishContext:name|nil\tpublishColumn:name|nil\tloadOrder:number\tdescription:text\n\
             Types.tsv\tcustom_type_def\t\ttrue\t\t\t1\tcustom types\n\
             Items.tsv\titem\t\ttrue\t\t\t2\titems\n",
        );
        write(
            dir,
            "Types.tsv",
            "name:name\tparent:name\tmin:number|nil\tmax:number|nil\tminLen:integer|nil\tmaxLen:integer|nil\tpattern:string|nil\tvalues:{identifier}|nil\tmembers:{name}|nil\tvalidate:string|nil\n\
             health\tinteger\t0\t999\t\t\t\t\t\t\n",
        );
        write(
            dir,
            "Items.tsv",
            "id:identifier\tname:string\thp:health\nsword\tSword\t10\n",
        );
    }

    #[test]
    fn loads_and_orders_a_package() {
        let tmp = tempfile::tempdir().unwrap();
        base_package(tmp.path());
        let mut bad = BadVal::buffering("loader");
        let mut registry = Registry::bootstrap();
        let loaded =
            load_packages(&mut bad, &mut registry, &[tmp.path().to_path_buf()]).unwrap();
        assert_eq!(bad.errors(), 0, "diagnostics: {:?}", bad.messages());
        assert_eq!(loaded.files.len(), 2);
        assert_eq!(loaded.files[0].file_name, "Types.tsv");
        assert!(loaded.priorities["items.tsv"] > loaded.priorities["types.tsv"]);
        // Custom type registered from the data rows.
        assert!(registry.contains("health"));
        // Record type registered from the header.
        assert!(registry.contains("item"));
    }

    #[test]
    fn package_dependency_order_and_cycle() {
        let tmp = tempfile::tempdir().unwrap();
        let a = tmp.path().join("a");
        let b = tmp.path().join("b");
        std::fs::create_dir_all(&a).unwrap();
        std::fs::create_dir_all(&b).unwrap();
        // a depends on b, so b loads first even though a is listed first.
        write(&a, "Manifest.transposed.tsv", &manifest_content("a", "b"));
        write(&a, "files.tsv", "fileName:string\ttypeName:name\tsuperType:name|nil\tbaseType:boolean\tpublishContext:name|nil\tpublishColumn:name|nil\tloadOrder:number\tdescription:text\nA.tsv\ta_rows\t\ttrue\t\t\t1\ta\n");
        write(&a, "A.tsv", "id:identifier\tv:integer\nx\t1\n");
        write(&b, "Manifest.transposed.tsv", &manifest_content("b", ""));
        write(&b, "files.tsv", "fileName:string\ttypeName:name\tsuperType:name|nil\tbaseType:boolean\tpublishContext:name|nil\tpublishColumn:name|nil\tloadOrder:number\tdescription:text\nB.tsv\tb_rows\t\ttrue\t\t\t1\tb\n");
        write(&b, "B.tsv", "id:identifier\tv:integer\ny\t2\n");

        let mut bad = BadVal::discarding();
        let mut registry = Registry::bootstrap();
        let loaded = load_packages(&mut bad, &mut registry, &[a.clone(), b.clone()]).unwrap();
        assert_eq!(loaded.packages[0].package_id, "b");
        assert!(loaded.priorities["a.tsv"] > loaded.priorities["b.tsv"]);

        // Cycle: b also depends on a.
        write(&b, "Manifest.transposed.tsv", &manifest_content("b", "a"));
        let mut registry = Registry::bootstrap();
        let err = load_packages(&mut bad, &mut registry, &[a, b]).unwrap_err();
        assert!(matches!(err, LoadError::DependencyCycle { .. }));
    }

    #[test]
    fn missing_manifest_field_errors() {
        let tmp = tempfile::tempdir().unwrap();
        write(
            tmp.path(),
            "Manifest.transposed.tsv",
            "package_id:name\tp\nname:string\tp\n",
        );
        write(tmp.path(), "files.tsv", "fileName:string\ttypeName:name\n");
        let mut bad = BadVal::discarding();
        let mut registry = Registry::bootstrap();
        let err =
            load_packages(&mut bad, &mut registry, &[tmp.path().to_path_buf()]).unwrap_err();
        assert!(matches!(err, LoadError::MissingField { ref field, .. } if field == "version"));
    }

    #[test]
    fn duplicate_type_within_package_is_an_error() {
        let tmp = tempfile::tempdir().unwrap();
        write(
            tmp.path(),
            "Manifest.transposed.tsv",
            &manifest_content("p", ""),
        );
        write(
            tmp.path(),
            "files.tsv",
            "fileName:string\ttypeName:name\tsuperType:name|nil\tbaseType:boolean\tpublishContext:name|nil\tpublishColumn:name|nil\tloadOrder:number\tdescription:text\n\
             A.tsv\tsame\t\ttrue\t\t\t1\ta\n\
             B.tsv\tsame\t\ttrue\t\t\t2\tb\n",
        );
        write(tmp.path(), "A.tsv", "id:identifier\tv:integer\n");
        write(tmp.path(), "B.tsv", "id:identifier\tv:integer\n");
        let mut bad = BadVal::buffering("loader");
        let mut registry = Registry::bootstrap();
        let loaded =
            load_packages(&mut bad, &mut registry, &[tmp.path().to_path_buf()]).unwrap();
        assert_eq!(loaded.files.len(), 1);
        assert!(bad.errors() > 0);
    }

    #[test]
    fn incompatible_child_record_reports() {
        let tmp = tempfile::tempdir().unwrap();
        write(
            tmp.path(),
            "Manifest.transposed.tsv",
            &manifest_content("p", ""),
        );
        write(
            tmp.path(),
            "files.tsv",
            "fileName:string\ttypeName:name\tsuperType:name|nil\tbaseType:boolean\tpublishContext:name|nil\tpublishColumn:name|nil\tloadOrder:number\tdescription:text\n\
             Items.tsv\titem\t\ttrue\t\t\t1\titems\n\
             Weapons.tsv\tweapon\titem\tfalse\t\t\t2\tweapons\n",
        );
        write(tmp.path(), "Items.tsv", "id:identifier\thp:integer\n");
        // `hp` widens integer to string in the child: incompatible.
        write(tmp.path(), "Weapons.tsv", "id:identifier\thp:string\tdamage:integer\n");
        let mut bad = BadVal::buffering("loader");
        let mut registry = Registry::bootstrap();
        load_packages(&mut bad, &mut registry, &[tmp.path().to_path_buf()]).unwrap();
        assert!(
            bad.messages().iter().any(|m| m.contains("not compatible")),
            "diagnostics: {:?}",
            bad.messages()
        );
    }

    #[test]
    fn custom_type_def_subtype_rows_also_register() {
        let tmp = tempfile::tempdir().unwrap();
        write(
            tmp.path(),
            "Manifest.transposed.tsv",
            &manifest_content("p", ""),
        );
        write(
            tmp.path(),
            "files.tsv",
            "fileName:string\ttypeName:name\tsuperType:name|nil\tbaseType:boolean\tpublishContext:name|nil\tpublishColumn:name|nil\tloadOrder:number\tdescription:text\n\
             Types.tsv\tcustom_type_def\t\ttrue\t\t\t1\tbase defs\n\
             MoreTypes.tsv\tgame_type_def\tcustom_type_def\tfalse\t\t\t2\tgame defs\n",
        );
        write(
            tmp.path(),
            "Types.tsv",
            "name:name\tparent:name\tmin:number|nil\tmax:number|nil\tminLen:integer|nil\tmaxLen:integer|nil\tpattern:string|nil\tvalues:{identifier}|nil\tmembers:{name}|nil\tvalidate:string|nil\n\
             mana\tinteger\t0\t100\t\t\t\t\t\t\n",
        );
        // The subtype file has an extra column, which is ignored for
        // registration purposes.
        write(
            tmp.path(),
            "MoreTypes.tsv",
            "name:name\tparent:name\tmin:number|nil\tmax:number|nil\tminLen:integer|nil\tmaxLen:integer|nil\tpattern:string|nil\tvalues:{identifier}|nil\tmembers:{name}|nil\tvalidate:string|nil\tnote:string|nil\n\
             stamina\tinteger\t0\t50\t\t\t\t\t\t\tcore stat\n",
        );
        let mut bad = BadVal::buffering("loader");
        let mut registry = Registry::bootstrap();
        load_packages(&mut bad, &mut registry, &[tmp.path().to_path_buf()]).unwrap();
        assert_eq!(bad.errors(), 0, "diagnostics: {:?}", bad.messages());
        assert!(registry.contains("mana"));
        assert!(registry.contains("stamina"));
    }

    #[test]
    fn manifest_inline_custom_types() {
        let tmp = tempfile::tempdir().unwrap();
        let mut content = manifest_content("p", "");
        content.push_str(
            "custom_types:{table}\t{{name=\"slot\",parent=\"integer\",min=1,max=12}}\n",
        );
        write(tmp.path(), "Manifest.transposed.tsv", &content);
        write(
            tmp.path(),
            "files.tsv",
            "fileName:string\ttypeName:name\tsuperType:name|nil\tbaseType:boolean\tpublishContext:name|nil\tpublishColumn:name|nil\tloadOrder:number\tdescription:text\n\
             Items.tsv\titem\t\ttrue\t\t\t1\titems\n",
        );
        write(tmp.path(), "Items.tsv", "id:identifier\tslot_no:slot\nsword\t3\n");
        let mut bad = BadVal::buffering("loader");
        let mut registry = Registry::bootstrap();
        load_packages(&mut bad, &mut registry, &[tmp.path().to_path_buf()]).unwrap();
        assert_eq!(bad.errors(), 0, "diagnostics: {:?}", bad.messages());
        assert!(registry.contains("slot"));
    }
}
