//! Exporters for the parsed dataset.
//!
//! Each exporter writes one file per exported table into the export
//! directory (created if absent), optionally under a format subdirectory.
//! Exporters run in declared order and a failing exporter halts the rest.

use std::path::PathBuf;

use tracing::{error, info};

use crate::serialize::{self, TableSql};
use crate::tsv::HeaderCol;
use crate::value::{Table, Value};

/// Parameters handed to every exporter, merged with the exporter's own
/// subdirectory declaration.
#[derive(Debug, Clone, Default)]
pub struct ExportParams {
    pub export_dir: PathBuf,
    pub format_subdir: Option<String>,
    pub table_sql: TableSql,
}

/// One exported table: its name, typed header, and fully-parsed rows.
#[derive(Debug, Clone)]
pub struct ExportFile {
    pub name: String,
    pub header: Vec<HeaderCol>,
    pub rows: Vec<Vec<Value>>,
}

impl ExportFile {
    /// Rows as a sequence of record tables keyed by column name.
    pub fn rows_value(&self) -> Value {
        let mut seq = Vec::with_capacity(self.rows.len());
        for row in &self.rows {
            let mut record = Table::new();
            for (col, v) in self.header.iter().zip(row) {
                if !matches!(v, Value::Nil) {
                    record.set(Value::Str(col.name.clone()), v.clone());
                }
            }
            seq.push(Value::Table(record));
        }
        Value::Table(Table { seq, entries: vec![] })
    }
}

/// The full dataset offered to exporters.
#[derive(Debug, Clone, Default)]
pub struct ExportResult {
    pub files: Vec<ExportFile>,
}

/// An exporter backend. Returns false on failure, which halts the chain.
pub trait Exporter {
    fn name(&self) -> &'static str;

    /// Subdirectory this exporter writes under, joined with any
    /// `format_subdir` from the parameters.
    fn subdir(&self) -> &'static str;

    fn export(&self, result: &ExportResult, params: &ExportParams) -> bool;
}

fn target_dir(exporter: &dyn Exporter, params: &ExportParams) -> Option<PathBuf> {
    let mut dir = params.export_dir.clone();
    if let Some(sub) = &params.format_subdir {
        dir = dir.join(sub);
    }
    dir = dir.join(exporter.subdir());
    if let Err(e) = std::fs::create_dir_all(&dir) {
        error!(exporter = exporter.name(), error = %e, "cannot create export directory");
        return None;
    }
    Some(dir)
}

fn write_out(exporter: &dyn Exporter, path: &PathBuf, bytes: &[u8]) -> bool {
    match std::fs::write(path, bytes) {
        Ok(()) => true,
        Err(e) => {
            error!(exporter = exporter.name(), path = %path.display(), error = %e, "write failed");
            false
        }
    }
}

/// Run exporters in order; the first failure halts the remainder.
pub fn run_exporters(
    exporters: &[Box<dyn Exporter>],
    result: &ExportResult,
    params: &ExportParams,
) -> bool {
    for exporter in exporters {
        info!(exporter = exporter.name(), "exporting");
        if !exporter.export(result, params) {
            error!(exporter = exporter.name(), "exporter failed, halting export chain");
            return false;
        }
    }
    true
}

/// Build the exporter list for the configured format names.
pub fn exporters_for(formats: &[String]) -> Vec<Box<dyn Exporter>> {
    formats
        .iter()
        .filter_map(|f| -> Option<Box<dyn Exporter>> {
            match f.as_str() {
                "json" => Some(Box::new(TypedJsonExporter)),
                "natural-json" => Some(Box::new(NaturalJsonExporter)),
                "xml" => Some(Box::new(XmlExporter)),
                "sql" => Some(Box::new(SqlExporter)),
                "msgpack" => Some(Box::new(MsgpackExporter)),
                _ => None,
            }
        })
        .collect()
}

pub struct TypedJsonExporter;

impl Exporter for TypedJsonExporter {
    fn name(&self) -> &'static str {
        "typed-json"
    }

    fn subdir(&self) -> &'static str {
        "json"
    }

    fn export(&self, result: &ExportResult, params: &ExportParams) -> bool {
        let Some(dir) = target_dir(self, params) else { return false };
        for file in &result.files {
            let text = match serialize::to_typed_json(&file.rows_value()) {
                Ok(t) => t,
                Err(e) => {
                    error!(file = %file.name, error = %e, "typed JSON serialization failed");
                    return false;
                }
            };
            if !write_out(self, &dir.join(format!("{}.json", file.name)), text.as_bytes()) {
                return false;
            }
        }
        true
    }
}

pub struct NaturalJsonExporter;

impl Exporter for NaturalJsonExporter {
    fn name(&self) -> &'static str {
        "natural-json"
    }

    fn subdir(&self) -> &'static str {
        "natural-json"
    }

    fn export(&self, result: &ExportResult, params: &ExportParams) -> bool {
        let Some(dir) = target_dir(self, params) else { return false };
        for file in &result.files {
            let text = match serialize::to_natural_json(&file.rows_value()) {
                Ok(t) => t,
                Err(e) => {
                    error!(file = %file.name, error = %e, "natural JSON serialization failed");
                    return false;
                }
            };
            if !write_out(self, &dir.join(format!("{}.json", file.name)), text.as_bytes()) {
                return false;
            }
        }
        true
    }
}

pub struct XmlExporter;

impl Exporter for XmlExporter {
    fn name(&self) -> &'static str {
        "xml"
    }

    fn subdir(&self) -> &'static str {
        "xml"
    }

    fn export(&self, result: &ExportResult, params: &ExportParams) -> bool {
        let Some(dir) = target_dir(self, params) else { return false };
        for file in &result.files {
            let text = match serialize::to_xml(&file.rows_value()) {
                Ok(t) => t,
                Err(e) => {
                    error!(file = %file.name, error = %e, "XML serialization failed");
                    return false;
                }
            };
            if !write_out(self, &dir.join(format!("{}.xml", file.name)), text.as_bytes()) {
                return false;
            }
        }
        true
    }
}

pub struct SqlExporter;

impl Exporter for SqlExporter {
    fn name(&self) -> &'static str {
        "sql"
    }

    fn subdir(&self) -> &'static str {
        "sql"
    }

    fn export(&self, result: &ExportResult, params: &ExportParams) -> bool {
        let Some(dir) = target_dir(self, params) else { return false };
        for file in &result.files {
            let mut out = String::new();
            let columns: Vec<&str> = file.header.iter().map(|c| c.name.as_str()).collect();
            for row in &file.rows {
                let mut literals = Vec::with_capacity(row.len());
                for v in row {
                    match serialize::to_sql_literal(v, params.table_sql) {
                        Ok(l) => literals.push(l),
                        Err(e) => {
                            error!(file = %file.name, error = %e, "SQL serialization failed");
                            return false;
                        }
                    }
                }
                out.push_str(&format!(
                    "INSERT INTO {} ({}) VALUES ({});\n",
                    file.name,
                    columns.join(", "),
                    literals.join(", ")
                ));
            }
            if !write_out(self, &dir.join(format!("{}.sql", file.name)), out.as_bytes()) {
                return false;
            }
        }
        true
    }
}

pub struct MsgpackExporter;

impl Exporter for MsgpackExporter {
    fn name(&self) -> &'static str {
        "msgpack"
    }

    fn subdir(&self) -> &'static str {
        "msgpack"
    }

    fn export(&self, result: &ExportResult, params: &ExportParams) -> bool {
        let Some(dir) = target_dir(self, params) else { return false };
        for file in &result.files {
            let bytes = match serialize::to_msgpack(&file.rows_value()) {
                Ok(b) => b,
                Err(e) => {
                    error!(file = %file.name, error = %e, "MessagePack serialization failed");
                    return false;
                }
            };
            if !write_out(self, &dir.join(format!("{}.msgpack", file.name)), &bytes) {
                return false;
            }
        }
        true
    }
}
