//! Metadata sheets exported as CSV or TSV.
//!
//! Row 1 holds the unit of every column, row 2 the attribute name, and every
//! following row is one record. Excel workbooks have to be exported first
//! (the `Metadata` sheet only).

use std::fs::File;
use std::io::Read;

use camino::{Utf8Path, Utf8PathBuf};
use csv::ReaderBuilder;
use tracing::{debug, warn};

use crate::domain::{MetadataAttribute, MetadataRecord, RecordRef};
use crate::error::SubmitError;
use crate::naming;

pub const SHEET_EXTENSIONS: [&str; 3] = ["csv", "tsv", "tab"];

#[derive(Debug, Clone)]
pub struct MetadataSheet {
    path: Utf8PathBuf,
    records: Vec<MetadataRecord>,
}

impl MetadataSheet {
    pub fn read(path: &Utf8Path) -> Result<Self, SubmitError> {
        let file = File::open(path.as_std_path())
            .map_err(|err| SubmitError::Filesystem(format!("open {path}: {err}")))?;
        let records = Self::parse(file, delimiter_for(path), path)?;
        debug!(sheet = %path, records = records.len(), "read metadata sheet");
        Ok(Self {
            path: path.to_path_buf(),
            records,
        })
    }

    /// Records are tagged with `source` so that rows of different sheets
    /// in one batch can be told apart.
    pub fn parse<R: Read>(
        reader: R,
        delimiter: u8,
        source: &Utf8Path,
    ) -> Result<Vec<MetadataRecord>, SubmitError> {
        let invalid = |message: String| SubmitError::InvalidSheet {
            path: source.to_string(),
            message,
        };

        let mut csv = ReaderBuilder::new()
            .has_headers(false)
            .flexible(true)
            .delimiter(delimiter)
            .from_reader(reader);
        // Rows are keyed by their line in the file so errors point at the sheet.
        let mut rows = Vec::new();
        for (index, row) in csv.records().enumerate() {
            let row = row.map_err(|err| invalid(err.to_string()))?;
            let line = row
                .position()
                .map(|position| position.line() as usize)
                .unwrap_or(index + 1);
            let cells = row
                .iter()
                .map(|cell| cell.trim_start_matches('\u{feff}').trim().to_string())
                .collect::<Vec<_>>();
            rows.push((line, cells));
        }

        let mut rows = rows.into_iter();
        let (Some((_, units)), Some((names_line, names))) = (rows.next(), rows.next()) else {
            return Err(invalid(
                "expected a unit row and an attribute name row".to_string(),
            ));
        };
        for (index, name) in names.iter().enumerate() {
            if !name.is_empty() && names[..index].contains(name) {
                return Err(SubmitError::DuplicateAttribute {
                    record: RecordRef::in_sheet(source, names_line),
                    name: name.clone(),
                });
            }
        }

        let mut records = Vec::new();
        for (row, cells) in rows {
            if cells.iter().all(String::is_empty) {
                warn!(sheet = %source, row, "skipping empty row");
                continue;
            }
            let attributes = names
                .iter()
                .enumerate()
                .filter(|(_, name)| !name.is_empty())
                .filter_map(|(column, name)| {
                    let value = cells.get(column).filter(|value| !value.is_empty())?;
                    let unit = units.get(column).cloned().unwrap_or_default();
                    Some(MetadataAttribute::new(name.clone(), value.clone(), unit))
                })
                .collect();
            records.push(MetadataRecord::at(
                RecordRef::in_sheet(source, row),
                attributes,
            )?);
        }
        Ok(records)
    }

    pub fn path(&self) -> &Utf8Path {
        &self.path
    }

    pub fn records(&self) -> &[MetadataRecord] {
        &self.records
    }

    pub fn into_records(self) -> Vec<MetadataRecord> {
        self.records
    }
}

pub fn delimiter_for(path: &Utf8Path) -> u8 {
    match naming::extension(path.as_str()) {
        Some("tsv" | "tab") => b'\t',
        _ => b',',
    }
}
