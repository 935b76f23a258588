//! Secondary-file joining.
//!
//! A package's `files.tsv` can direct a secondary file into a primary one
//! (`joinInto`/`joinColumn`). The join is a left-outer join on the primary:
//! every primary row keeps its cells and gains the secondary's non-key
//! columns; a secondary row with no matching primary key is an error.

use std::collections::HashMap;

use crate::report::BadVal;
use crate::tsv::{HeaderCol, TsvFile};

/// Join directives for one file, read from `files.tsv`.
#[derive(Debug, Clone, Default)]
pub struct JoinMeta {
    /// Lowercased name of the primary file this one joins into.
    pub join_into: Option<String>,
    pub join_column: Option<String>,
    /// Secondary files export only when explicitly requested.
    pub export: bool,
    pub joined_type_name: Option<String>,
}

impl JoinMeta {
    pub fn is_secondary(&self) -> bool {
        self.join_into.is_some()
    }
}

/// Primary files always export; secondary files only with `export=true`.
pub fn should_export(meta: &JoinMeta) -> bool {
    !meta.is_secondary() || meta.export
}

/// Group secondary file names under their primary, preserving encounter
/// order of the input.
pub fn group_secondary_files(
    files: &[(String, JoinMeta)],
) -> HashMap<String, Vec<String>> {
    let mut groups: HashMap<String, Vec<String>> = HashMap::new();
    for (name, meta) in files {
        if let Some(primary) = &meta.join_into {
            groups
                .entry(primary.to_lowercase())
                .or_default()
                .push(name.to_lowercase());
        }
    }
    groups
}

/// Index a file's rows by the cell text of `column_name`. Duplicate keys
/// keep the first row and report an error.
pub fn build_join_index<'a>(
    bad: &mut BadVal,
    file: &'a TsvFile,
    column_name: &str,
) -> Option<HashMap<String, &'a [String]>> {
    let Some(col) = file.column(column_name) else {
        bad.at(file.source_name.clone(), 1);
        bad.fail("join column", column_name, Some("no such column"));
        return None;
    };
    let mut index: HashMap<String, &[String]> = HashMap::new();
    let mut ok = true;
    for (i, row) in file.rows.iter().enumerate() {
        let key = &row[col];
        if index.contains_key(key) {
            bad.at(file.source_name.clone(), file.line_of_row(i));
            bad.fail("join key", key, Some("duplicate key"));
            ok = false;
            continue;
        }
        index.insert(key.clone(), row.as_slice());
    }
    if ok { Some(index) } else { None }
}

/// Column names shared by primary and secondary besides the join column.
/// Returns `None` when there are no conflicts.
pub fn detect_column_conflicts(
    primary_header: &[HeaderCol],
    secondary_header: &[HeaderCol],
    join_column: &str,
) -> Option<Vec<String>> {
    let conflicts: Vec<String> = secondary_header
        .iter()
        .filter(|c| c.name != join_column)
        .filter(|c| primary_header.iter().any(|p| p.name == c.name))
        .map(|c| c.name.clone())
        .collect();
    if conflicts.is_empty() { None } else { Some(conflicts) }
}

/// Left-outer join of one or more secondaries into a primary. All
/// secondaries must use the same join column; column conflicts abort.
/// Missing secondary entries leave empty cells; secondary rows never
/// matched by any primary row are errors.
pub fn join_files(
    bad: &mut BadVal,
    primary: &TsvFile,
    secondaries: &[(&TsvFile, &str)],
) -> Option<TsvFile> {
    let mut join_column: Option<&str> = None;
    for (_, col) in secondaries {
        match join_column {
            None => join_column = Some(col),
            Some(prev) if prev == *col => {}
            Some(prev) => {
                bad.at(primary.source_name.clone(), 1);
                bad.fail(
                    "join column",
                    col,
                    Some(&format!("all secondaries must join on '{prev}'")),
                );
                return None;
            }
        }
    }
    let Some(join_column) = join_column else {
        return Some(primary.clone());
    };
    let Some(primary_key_col) = primary.column(join_column) else {
        bad.at(primary.source_name.clone(), 1);
        bad.fail("join column", join_column, Some("no such column"));
        return None;
    };

    let mut header = primary.header.clone();
    let mut rows: Vec<Vec<String>> = primary.rows.clone();

    for (secondary, _) in secondaries {
        if let Some(conflicts) = detect_column_conflicts(&primary.header, &secondary.header, join_column)
        {
            bad.at(secondary.source_name.clone(), 1);
            bad.fail(
                "join",
                &conflicts.join(","),
                Some("column names conflict with the primary file"),
            );
            return None;
        }
        let index = build_join_index(bad, secondary, join_column)?;
        let Some(secondary_key_col) = secondary.column(join_column) else {
            return None;
        };
        let extra_cols: Vec<usize> = (0..secondary.header.len())
            .filter(|&i| i != secondary_key_col)
            .collect();
        for &i in &extra_cols {
            header.push(secondary.header[i].clone());
        }

        let mut matched: std::collections::HashSet<&str> = Default::default();
        for (row_idx, row) in rows.iter_mut().enumerate() {
            let key = primary.rows[row_idx][primary_key_col].as_str();
            match index.get(key) {
                Some(secondary_row) => {
                    matched.insert(key);
                    for &i in &extra_cols {
                        row.push(secondary_row[i].clone());
                    }
                }
                None => {
                    for _ in &extra_cols {
                        row.push(String::new());
                    }
                }
            }
        }
        let mut orphaned = false;
        for (i, secondary_row) in secondary.rows.iter().enumerate() {
            let key = secondary_row[secondary_key_col].as_str();
            if !matched.contains(key) {
                bad.at(secondary.source_name.clone(), secondary.line_of_row(i));
                bad.fail("join key", key, Some("no matching primary row"));
                orphaned = true;
            }
        }
        if orphaned {
            return None;
        }
    }

    Some(TsvFile {
        source_name: primary.source_name.clone(),
        header,
        rows,
    })
}
