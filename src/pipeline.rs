//! The reformatter pipeline.
//!
//! Drives the whole sequence: discover packages, load manifests, order
//! files, parse every cell with its column type parser, reconstruct
//! exploded columns, join secondary files, run validators, write back
//! reformatted TSV, and hand the dataset to exporters.
//!
//! Errors accumulate in the [`BadVal`] reporter and never short-circuit a
//! file: all cells are attempted. A nonzero error count at the end means
//! overall failure even when partial output was written.

use std::collections::HashMap;
use std::path::PathBuf;
use std::rc::Rc;

use tracing::{debug, info};

use crate::export::{run_exporters, ExportFile, ExportParams, ExportResult, Exporter};
use crate::exploded::{self, Structure};
use crate::join::{self, JoinMeta};
use crate::manifest::{self, FileEntry, LoadError, LoadedPackages};
use crate::registry::{ParseContext, ParserEntry, Registry};
use crate::report::{BadVal, Severity};
use crate::tsv::{write_tsv, TsvFile};
use crate::validator::{self, Scope};
use crate::value::{Table, Value};

#[derive(Debug, Clone)]
pub struct PipelineOptions {
    /// Write reformatted TSV back over the source files.
    pub write_back: bool,
}

impl Default for PipelineOptions {
    fn default() -> Self {
        Self { write_back: true }
    }
}

#[derive(Debug, Default)]
pub struct PipelineResult {
    pub export: ExportResult,
    pub files_written: usize,
    pub files_processed: usize,
}

/// One file after cell parsing.
struct FileData {
    reformatted: TsvFile,
    values: Vec<Vec<Value>>,
    /// Row record values (plain columns plus assembled exploded fields).
    row_records: Vec<Value>,
    had_errors: bool,
}

pub struct Pipeline {
    pub registry: Registry,
    options: PipelineOptions,
}

impl Pipeline {
    pub fn new(options: PipelineOptions) -> Self {
        Self {
            registry: Registry::bootstrap(),
            options,
        }
    }

    /// Run the full pipeline over the given package directories, then the
    /// exporters in declared order.
    pub fn run(
        &mut self,
        bad: &mut BadVal,
        dirs: &[PathBuf],
        exporters: &[Box<dyn Exporter>],
        export_params: &ExportParams,
    ) -> Result<PipelineResult, LoadError> {
        let loaded = manifest::load_packages(bad, &mut self.registry, dirs)?;
        let mut result = PipelineResult::default();
        let mut data: HashMap<String, FileData> = HashMap::new();

        for entry in &loaded.files {
            let file_lc = entry.file_name.to_lowercase();
            let Some(raw) = loaded.raw_files.get(&file_lc) else {
                continue;
            };
            result.files_processed += 1;
            let errors_before = bad.errors();
            let Some(file_data) = self.process_file(bad, &loaded, entry, raw) else {
                continue;
            };
            let clean = bad.errors() == errors_before;
            if clean && self.options.write_back {
                let text = write_tsv(&file_data.reformatted);
                if let Err(e) = std::fs::write(&entry.path, text) {
                    bad.at(entry.path.display().to_string(), 0);
                    bad.fail_msg(&format!("cannot write reformatted file: {e}"));
                } else {
                    result.files_written += 1;
                }
            }
            data.insert(file_lc, file_data);
        }

        self.run_package_validators(bad, &loaded, &data);
        result.export = self.build_export(bad, &loaded, &data);

        if !exporters.is_empty() {
            run_exporters(exporters, &result.export, export_params);
        }
        info!(
            files = result.files_processed,
            written = result.files_written,
            errors = bad.errors(),
            warnings = bad.warnings(),
            "pipeline finished"
        );
        Ok(result)
    }

    /// Parse and reformat every cell of one file, rebuild exploded values,
    /// and run row- and file-scope validators.
    fn process_file(
        &mut self,
        bad: &mut BadVal,
        loaded: &LoadedPackages,
        entry: &FileEntry,
        raw: &TsvFile,
    ) -> Option<FileData> {
        debug!(file = %entry.file_name, "processing");
        let source = raw.source_name.clone();
        bad.at(source.clone(), 1);

        // Compile one parser per column.
        let mut column_entries: Vec<Rc<ParserEntry>> = Vec::with_capacity(raw.header.len());
        for col in &raw.header {
            match self.registry.parse_type(bad, &col.spec) {
                Some(parser) => column_entries.push(parser),
                None => return None,
            }
        }

        let exploded_cols: Vec<exploded::ExplodedColumn> = raw
            .header
            .iter()
            .enumerate()
            .map(|(idx, c)| exploded::ExplodedColumn { idx, name: c.name.clone() })
            .collect();
        let structures = exploded::analyze_exploded_columns(bad, &exploded_cols)?;

        let errors_before = bad.errors();
        let mut reformatted = raw.clone();
        let mut values: Vec<Vec<Value>> = Vec::with_capacity(raw.rows.len());
        for (i, row) in raw.rows.iter().enumerate() {
            bad.at(source.clone(), raw.line_of_row(i));
            let mut parsed_row = Vec::with_capacity(row.len());
            for (col_idx, cell) in row.iter().enumerate() {
                match self.registry.parse_cell(
                    &column_entries[col_idx],
                    bad,
                    cell,
                    ParseContext::Tsv,
                ) {
                    Some((v, r)) => {
                        reformatted.rows[i][col_idx] = r;
                        parsed_row.push(v);
                    }
                    None => parsed_row.push(Value::Nil),
                }
            }
            values.push(parsed_row);
        }

        let row_records: Vec<Value> = values
            .iter()
            .map(|row| build_row_record(&raw.header, row, &structures))
            .collect();

        let manifest = loaded
            .packages
            .iter()
            .find(|p| p.package_id == entry.package_id);
        if let Some(manifest) = manifest {
            self.run_row_and_file_validators(bad, raw, &row_records, manifest);
        }

        Some(FileData {
            reformatted,
            values,
            row_records,
            had_errors: bad.errors() > errors_before,
        })
    }

    fn run_row_and_file_validators(
        &self,
        bad: &mut BadVal,
        raw: &TsvFile,
        row_records: &[Value],
        manifest: &manifest::Manifest,
    ) {
        let source = raw.source_name.clone();
        if !manifest.row_validators.is_empty() {
            // One accumulator for the whole file, shared across rows.
            let mut ctx = Value::Table(Table::new());
            for (i, record) in row_records.iter().enumerate() {
                bad.at(source.clone(), raw.line_of_row(i));
                let vars = validator::row_vars(record.clone(), i + 1, &raw.source_name);
                let failures =
                    validator::run_scope(Scope::Row, &manifest.row_validators, &vars, &mut ctx);
                report_failures(bad, "row validator", &failures);
            }
        }
        if !manifest.file_validators.is_empty() {
            bad.at(source, 1);
            let rows = Value::Table(Table {
                seq: row_records.to_vec(),
                entries: vec![],
            });
            let vars = validator::file_vars(rows, &raw.source_name);
            let mut ctx = Value::Table(Table::new());
            let failures =
                validator::run_scope(Scope::File, &manifest.file_validators, &vars, &mut ctx);
            report_failures(bad, "file validator", &failures);
        }
    }

    fn run_package_validators(
        &self,
        bad: &mut BadVal,
        loaded: &LoadedPackages,
        data: &HashMap<String, FileData>,
    ) {
        for manifest in &loaded.packages {
            if manifest.package_validators.is_empty() {
                continue;
            }
            let mut files_table = Table::new();
            for entry in &loaded.files {
                if entry.package_id != manifest.package_id {
                    continue;
                }
                let file_lc = entry.file_name.to_lowercase();
                if let Some(file_data) = data.get(&file_lc) {
                    let rows = Value::Table(Table {
                        seq: file_data.row_records.clone(),
                        entries: vec![],
                    });
                    files_table.set(Value::Str(entry.file_name.clone()), rows);
                }
            }
            bad.at(format!("package {}", manifest.package_id), 0);
            let vars = validator::package_vars(Value::Table(files_table), &manifest.package_id);
            let mut ctx = Value::Table(Table::new());
            let failures = validator::run_scope(
                Scope::Package,
                &manifest.package_validators,
                &vars,
                &mut ctx,
            );
            report_failures(bad, "package validator", &failures);
        }
    }

    /// Join secondaries into their primaries and collect export-eligible
    /// files.
    fn build_export(
        &mut self,
        bad: &mut BadVal,
        loaded: &LoadedPackages,
        data: &HashMap<String, FileData>,
    ) -> ExportResult {
        let join_meta: Vec<(String, JoinMeta)> = loaded
            .files
            .iter()
            .map(|e| (e.file_name.clone(), e.join.clone()))
            .collect();
        let groups = join::group_secondary_files(&join_meta);
        let entry_by_lc: HashMap<String, &FileEntry> = loaded
            .files
            .iter()
            .map(|e| (e.file_name.to_lowercase(), e))
            .collect();

        let mut export = ExportResult::default();
        for entry in &loaded.files {
            let file_lc = entry.file_name.to_lowercase();
            let Some(file_data) = data.get(&file_lc) else { continue };
            if file_data.had_errors || !join::should_export(&entry.join) {
                continue;
            }
            if entry.join.is_secondary() {
                export.files.push(ExportFile {
                    name: entry.type_name.clone(),
                    header: file_data.reformatted.header.clone(),
                    rows: file_data.values.clone(),
                });
                continue;
            }
            match groups.get(&file_lc) {
                None => {
                    export.files.push(ExportFile {
                        name: entry.type_name.clone(),
                        header: file_data.reformatted.header.clone(),
                        rows: file_data.values.clone(),
                    });
                }
                Some(secondary_names) => {
                    let mut secondaries: Vec<(&TsvFile, &str)> = Vec::new();
                    let mut complete = true;
                    for name in secondary_names {
                        let (Some(sec_data), Some(sec_entry)) =
                            (data.get(name), entry_by_lc.get(name))
                        else {
                            complete = false;
                            continue;
                        };
                        match sec_entry.join.join_column.as_deref() {
                            Some(col) => secondaries.push((&sec_data.reformatted, col)),
                            None => {
                                bad.at(sec_entry.path.display().to_string(), 1);
                                bad.fail(
                                    "join column",
                                    &sec_entry.file_name,
                                    Some("joinInto without joinColumn"),
                                );
                                complete = false;
                            }
                        }
                    }
                    if !complete {
                        continue;
                    }
                    let Some(joined) =
                        join::join_files(bad, &file_data.reformatted, &secondaries)
                    else {
                        continue;
                    };
                    let Some(rows) = self.reparse_joined(&joined) else {
                        continue;
                    };
                    let name = entry
                        .join
                        .joined_type_name
                        .clone()
                        .unwrap_or_else(|| entry.type_name.clone());
                    export.files.push(ExportFile {
                        name,
                        header: joined.header.clone(),
                        rows,
                    });
                }
            }
        }
        export
    }

    /// Re-parse a joined file's cells to values. The cells were already
    /// validated in their source files, so diagnostics are discarded.
    fn reparse_joined(&mut self, joined: &TsvFile) -> Option<Vec<Vec<Value>>> {
        let mut probe = BadVal::discarding();
        let mut column_entries = Vec::with_capacity(joined.header.len());
        for col in &joined.header {
            column_entries.push(self.registry.parse_type(&mut probe, &col.spec)?);
        }
        let mut rows = Vec::with_capacity(joined.rows.len());
        for row in &joined.rows {
            let mut parsed = Vec::with_capacity(row.len());
            for (col_idx, cell) in row.iter().enumerate() {
                let v = self
                    .registry
                    .parse_cell(&column_entries[col_idx], &mut probe, cell, ParseContext::Tsv)
                    .map(|(v, _)| v)
                    .unwrap_or(Value::Nil);
                parsed.push(v);
            }
            rows.push(parsed);
        }
        Some(rows)
    }
}

/// Build the `self` record a row validator sees: plain columns by name,
/// exploded top-level fields assembled from their leaf columns.
fn build_row_record(
    header: &[crate::tsv::HeaderCol],
    row: &[Value],
    structures: &indexmap::IndexMap<String, Structure>,
) -> Value {
    let mut record = Table::new();
    for (i, col) in header.iter().enumerate() {
        if exploded::is_exploded_name(&col.name) {
            continue;
        }
        let v = row.get(i).cloned().unwrap_or(Value::Nil);
        if !matches!(v, Value::Nil) {
            record.set(Value::Str(col.name.clone()), v);
        }
    }
    for (name, structure) in structures {
        let v = exploded::assemble_exploded_value(row, structure);
        if !matches!(v, Value::Nil) {
            record.set(Value::Str(name.clone()), v);
        }
    }
    Value::Table(record)
}

fn report_failures(bad: &mut BadVal, kind: &str, failures: &[validator::ValidatorFailure]) {
    for failure in failures {
        match failure.level {
            Severity::Error => bad.fail(kind, &failure.message, None),
            Severity::Warning => bad.warn(kind, &failure.message, None),
        }
    }
}
