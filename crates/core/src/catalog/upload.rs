//! Uploaded catalog files: spreadsheet workbooks or delimited text.

use std::ffi::OsStr;
use std::io::Cursor;
use std::path::Path;

use calamine::{open_workbook_auto_from_rs, Data, Reader};

use super::ingest::{CatalogParser, ColumnMap};
use super::CatalogRow;
use crate::errors::SubstitutionError;

const WORKBOOK_EXTENSIONS: [&str; 5] = ["xlsx", "xlsm", "xlsb", "xls", "ods"];
const ZIP_MAGIC: &[u8] = b"PK\x03\x04";
const OLE_MAGIC: &[u8] = &[0xD0, 0xCF, 0x11, 0xE0, 0xA1, 0xB1, 0x1A, 0xE1];

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum UploadFormat {
    Workbook,
    Delimited,
}

impl UploadFormat {
    /// File extension first, then the container signature of the contents.
    pub fn detect(file_name: Option<&str>, contents: &[u8]) -> Self {
        let extension = file_name
            .and_then(|name| Path::new(name).extension())
            .and_then(OsStr::to_str);
        let workbook_extension = extension.is_some_and(|extension| {
            WORKBOOK_EXTENSIONS.iter().any(|known| extension.eq_ignore_ascii_case(known))
        });

        if workbook_extension || contents.starts_with(ZIP_MAGIC) || contents.starts_with(OLE_MAGIC)
        {
            Self::Workbook
        } else {
            Self::Delimited
        }
    }
}

/// Parses an uploaded catalog file of either format.
pub fn parse_upload(
    file_name: Option<&str>,
    contents: &[u8],
) -> Result<Vec<CatalogRow>, SubstitutionError> {
    match UploadFormat::detect(file_name, contents) {
        UploadFormat::Workbook => parse_workbook(contents),
        UploadFormat::Delimited => {
            let text = std::str::from_utf8(contents).map_err(|_| {
                SubstitutionError::format(0, "upload is neither a workbook nor UTF-8 text")
            })?;
            let text = text.strip_prefix('\u{feff}').unwrap_or(text);
            CatalogParser::sniff(text).parse_str(text)
        }
    }
}

/// Reads the first worksheet. Its first row is the header; see [`ColumnMap::resolve`].
pub fn parse_workbook(contents: &[u8]) -> Result<Vec<CatalogRow>, SubstitutionError> {
    let mut workbook = open_workbook_auto_from_rs(Cursor::new(contents))
        .map_err(|error| SubstitutionError::format(0, format!("unreadable workbook: {error}")))?;
    let range = workbook
        .worksheet_range_at(0)
        .ok_or_else(|| SubstitutionError::format(0, "workbook has no worksheets"))?
        .map_err(|error| SubstitutionError::format(0, format!("unreadable worksheet: {error}")))?;

    let mut records = range.rows().map(|cells| cells.iter().map(cell_text).collect::<Vec<_>>());
    let Some(header) = records.next() else {
        return Ok(Vec::new());
    };
    let columns = ColumnMap::resolve(&header)?;

    let mut rows = Vec::new();
    for (offset, cells) in records.enumerate() {
        if cells.iter().all(String::is_empty) {
            continue;
        }
        rows.push(columns.project(offset + 1, &cells, false)?);
    }
    Ok(rows)
}

fn cell_text(cell: &Data) -> String {
    match cell {
        Data::Empty => String::new(),
        Data::String(text) => text.trim().to_owned(),
        // whole numbers come back as floats; codes must not grow a `.0`
        Data::Float(value) if value.fract() == 0.0 && value.abs() < 1e15 => {
            (*value as i64).to_string()
        }
        Data::Float(value) => value.to_string(),
        Data::Int(value) => value.to_string(),
        other => other.to_string(),
    }
}
