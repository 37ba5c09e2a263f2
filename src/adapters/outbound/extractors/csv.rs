use crate::ports::outbound::{DepFile, Extractor};
use crate::sbom_generation::domain::{sort_records, Ecosystem, PackageManager, PackageRecord};
use crate::shared::error::ExtractError;
use crate::shared::position::text_to_lines;
use std::path::Path;

const MIN_FIELDS: usize = 4;

/// Splits one CSV row, honouring double-quoted fields and `""` escapes.
fn split_row(row: &str) -> Result<Vec<String>, String> {
    let mut fields = Vec::new();
    let mut field = String::new();
    let mut quoted = false;
    let mut chars = row.chars().peekable();

    while let Some(c) = chars.next() {
        match c {
            '"' if quoted => {
                if chars.peek() == Some(&'"') {
                    chars.next();
                    field.push('"');
                } else {
                    quoted = false;
                }
            }
            '"' if field.is_empty() => quoted = true,
            ',' if !quoted => fields.push(std::mem::take(&mut field)),
            _ => field.push(c),
        }
    }
    if quoted {
        return Err("unterminated quoted field".to_string());
    }
    fields.push(field);

    Ok(fields)
}

/// Builds a record from `ecosystem, compare-as, name, version-or-commit`.
///
/// A row without an ecosystem describes a commit rather than a version.
fn record_from_row(fields: &[String]) -> Result<PackageRecord, String> {
    if fields.len() < MIN_FIELDS {
        return Err(format!("not enough fields (expected at least {})", MIN_FIELDS));
    }

    let ecosystem: Ecosystem = fields[0].parse()?;
    let compare_as: Ecosystem = fields[1].parse()?;
    let name = fields[2].as_str();
    let mut version = fields[3].clone();
    let mut commit = String::new();

    if ecosystem == Ecosystem::Unspecified {
        if version.is_empty() {
            return Err("field 4 is empty (must be a commit)".to_string());
        }
        commit = std::mem::take(&mut version);
    }
    if name.is_empty() {
        return Err("field 3 is empty (must be the name of a package)".to_string());
    }

    let mut record = PackageRecord::new(name, version, ecosystem, PackageManager::Unknown)
        .with_commit(commit);
    if compare_as != Ecosystem::Unspecified && compare_as != ecosystem {
        record.compare_as = Some(compare_as);
    }
    Ok(record)
}

/// Reads rows of a prepared package list, one package per row.
///
/// # Errors
/// The row number and reason of the first malformed row.
pub fn records_from_rows<S: AsRef<str>>(rows: &[S]) -> Result<Vec<PackageRecord>, String> {
    let mut records = Vec::new();
    for (index, row) in rows.iter().enumerate() {
        let row = row.as_ref();
        if row.trim().is_empty() {
            continue;
        }
        let record = split_row(row)
            .and_then(|fields| record_from_row(&fields))
            .map_err(|reason| format!("row {}: {}", index + 1, reason))?;
        records.push(record);
    }
    sort_records(&mut records);

    Ok(records)
}

/// Extractor for prepared CSV package lists. Never chosen by filename; it is
/// only used when requested by id.
#[derive(Debug, Default)]
pub struct CsvExtractor;

impl CsvExtractor {
    pub fn new() -> Self {
        Self
    }
}

impl Extractor for CsvExtractor {
    fn should_extract(&self, _path: &str) -> bool {
        false
    }

    fn extract(&self, file: &dyn DepFile) -> Result<Vec<PackageRecord>, ExtractError> {
        records_from_rows(&text_to_lines(file.text()))
            .map_err(|reason| ExtractError::parse(Path::new(file.path()), reason))
    }
}
