//! Raw TSV splitting and writing.
//!
//! A data file is a header row of `name:type` cells followed by data rows.
//! This adapter only splits and rejoins; all cell interpretation happens in
//! the registry layer.

use crate::report::BadVal;

#[derive(Debug, Clone, PartialEq)]
pub struct HeaderCol {
    pub name: String,
    pub spec: String,
}

impl HeaderCol {
    /// Render back to the `name:spec` header cell form.
    pub fn to_cell(&self) -> String {
        format!("{}:{}", self.name, self.spec)
    }
}

#[derive(Debug, Clone)]
pub struct TsvFile {
    pub source_name: String,
    pub header: Vec<HeaderCol>,
    pub rows: Vec<Vec<String>>,
}

impl TsvFile {
    /// Index of a column by name, or `None`.
    pub fn column(&self, name: &str) -> Option<usize> {
        self.header.iter().position(|c| c.name == name)
    }

    /// 1-based source line of a data row (line 1 is the header).
    pub fn line_of_row(&self, row_idx: usize) -> usize {
        row_idx + 2
    }
}

/// Split file content into header and data rows. Short rows pad with empty
/// cells; over-long rows are an error. A header cell without `:` is an
/// error.
pub fn parse_tsv(bad: &mut BadVal, source_name: &str, content: &str) -> Option<TsvFile> {
    let mut lines = content.lines();
    let Some(header_line) = lines.next() else {
        bad.at(source_name, 1);
        bad.fail_msg("empty file");
        return None;
    };
    bad.at(source_name, 1);
    let mut header = Vec::new();
    for cell in header_line.split('\t') {
        match cell.split_once(':') {
            Some((name, spec)) if !name.is_empty() && !spec.is_empty() => {
                header.push(HeaderCol {
                    name: name.to_string(),
                    spec: spec.to_string(),
                });
            }
            _ => {
                bad.fail("header", cell, Some("expected name:type"));
                return None;
            }
        }
    }
    let mut rows = Vec::new();
    let mut ok = true;
    for (i, line) in lines.enumerate() {
        let mut cells: Vec<String> = line.split('\t').map(|s| s.to_string()).collect();
        if cells.len() > header.len() {
            bad.at(source_name, i + 2);
            bad.fail_msg(&format!(
                "row has {} cells but the header declares {}",
                cells.len(),
                header.len()
            ));
            ok = false;
            continue;
        }
        cells.resize(header.len(), String::new());
        rows.push(cells);
    }
    if !ok {
        return None;
    }
    Some(TsvFile {
        source_name: source_name.to_string(),
        header,
        rows,
    })
}

/// Render a file back to TSV text with a trailing newline.
pub fn write_tsv(file: &TsvFile) -> String {
    let mut out = String::new();
    let header: Vec<String> = file.header.iter().map(|c| c.to_cell()).collect();
    out.push_str(&header.join("\t"));
    out.push('\n');
    for row in &file.rows {
        out.push_str(&row.join("\t"));
        out.push('\n');
    }
    out
}
