//! Minimal `.xlsx` reader: the first worksheet as rows of cell text.
//!
//! An xlsx workbook is a zip archive of XML parts. Only two parts matter
//! here: `xl/sharedStrings.xml` (the string table cells point into) and
//! `xl/worksheets/sheet1.xml`. Formulas, styles and number formats are
//! ignored; each cell yields the text of its cached value.

use quick_xml::escape::resolve_predefined_entity;
use quick_xml::events::{BytesRef, BytesStart, Event};
use quick_xml::reader::Reader;
use std::io::{Cursor, Read};
use thiserror::Error;
use zip::ZipArchive;
use zip::result::ZipError;

const SHARED_STRINGS_PART: &str = "xl/sharedStrings.xml";
const FIRST_SHEET_PART: &str = "xl/worksheets/sheet1.xml";

/// Decompressed size cap for a single workbook part.
const MAX_PART_SIZE: u64 = 64 * 1024 * 1024;

/// Excel's last column is XFD.
const MAX_COLUMNS: usize = 16_384;

#[derive(Debug, Error)]
pub enum SpreadsheetError {
    #[error("The file is not a valid Excel workbook: {0}")]
    Archive(#[from] ZipError),

    #[error("The workbook has no worksheet")]
    MissingWorksheet,

    #[error("Malformed workbook XML in {part}: {source}")]
    Xml {
        part: &'static str,
        #[source]
        source: quick_xml::Error,
    },

    #[error("Failed to read {part}: {source}")]
    Io {
        part: &'static str,
        #[source]
        source: std::io::Error,
    },

    #[error("Cell {reference} points to missing shared string {index}")]
    SharedString { reference: String, index: usize },

    #[error("Cell '{reference}' is beyond the last Excel column")]
    ColumnOutOfRange { reference: String },

    #[error("{part} is larger than {limit} bytes once decompressed")]
    PartTooLarge { part: &'static str, limit: u64 },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Row {
    /// 1-based row number as shown in Excel.
    pub number: u32,
    /// Cell text by zero-based column; gaps are empty strings.
    pub cells: Vec<String>,
}

impl Row {
    pub fn cell(&self, column: usize) -> &str {
        self.cells.get(column).map(String::as_str).unwrap_or("")
    }

    pub fn is_blank(&self) -> bool {
        self.cells.iter().all(|c| c.trim().is_empty())
    }
}

/// Reads every row of the first worksheet of an xlsx workbook.
pub fn read_first_sheet(bytes: &[u8]) -> Result<Vec<Row>, SpreadsheetError> {
    let mut archive = ZipArchive::new(Cursor::new(bytes))?;

    let shared = match read_part(&mut archive, SHARED_STRINGS_PART, MAX_PART_SIZE)? {
        Some(xml) => parse_shared_strings(&xml)?,
        None => Vec::new(),
    };

    let sheet = read_part(&mut archive, FIRST_SHEET_PART, MAX_PART_SIZE)?
        .ok_or(SpreadsheetError::MissingWorksheet)?;

    parse_sheet(&sheet, &shared)
}

fn read_part(
    archive: &mut ZipArchive<Cursor<&[u8]>>,
    part: &'static str,
    limit: u64,
) -> Result<Option<String>, SpreadsheetError> {
    let file = match archive.by_name(part) {
        Ok(file) => file,
        Err(ZipError::FileNotFound) => return Ok(None),
        Err(e) => return Err(e.into()),
    };
    if file.size() > limit {
        return Err(SpreadsheetError::PartTooLarge { part, limit });
    }

    // The declared size can lie; never inflate past the limit.
    let mut xml = String::new();
    file.take(limit + 1)
        .read_to_string(&mut xml)
        .map_err(|source| SpreadsheetError::Io { part, source })?;
    if xml.len() as u64 > limit {
        return Err(SpreadsheetError::PartTooLarge { part, limit });
    }
    Ok(Some(xml))
}

/// Appends the text of a predefined entity (`&amp;`) or character
/// reference (`&#10;`, `&#x41;`). Unknown entities are dropped.
fn push_reference(out: &mut String, reference: &BytesRef<'_>) -> Result<(), quick_xml::Error> {
    if let Some(c) = reference.resolve_char_ref()? {
        out.push(c);
    } else if let Some(text) = resolve_predefined_entity(&reference.decode()?) {
        out.push_str(text);
    }
    Ok(())
}

fn parse_shared_strings(xml: &str) -> Result<Vec<String>, SpreadsheetError> {
    let part = SHARED_STRINGS_PART;
    let mut reader = Reader::from_str(xml);
    let mut buf = Vec::new();

    let mut strings = Vec::new();
    let mut current = String::new();
    let mut in_text = false;
    // Phonetic runs (<rPh>) repeat the text in another script; skip them.
    let mut in_phonetic = false;

    loop {
        match reader.read_event_into(&mut buf) {
            Ok(Event::Start(e)) => match e.local_name().as_ref() {
                b"si" => current.clear(),
                b"t" if !in_phonetic => in_text = true,
                b"rPh" => in_phonetic = true,
                _ => (),
            },
            Ok(Event::Empty(e)) if e.local_name().as_ref() == b"si" => {
                strings.push(String::new());
            }
            Ok(Event::End(e)) => match e.local_name().as_ref() {
                b"si" => strings.push(std::mem::take(&mut current)),
                b"t" => in_text = false,
                b"rPh" => in_phonetic = false,
                _ => (),
            },
            Ok(Event::Text(e)) if in_text => {
                current.push_str(&String::from_utf8_lossy(e.as_ref()));
            }
            Ok(Event::CData(e)) if in_text => {
                current.push_str(&String::from_utf8_lossy(e.as_ref()));
            }
            Ok(Event::GeneralRef(e)) if in_text => {
                push_reference(&mut current, &e)
                    .map_err(|source| SpreadsheetError::Xml { part, source })?;
            }
            Ok(Event::Eof) => break,
            Err(source) => return Err(SpreadsheetError::Xml { part, source }),
            _ => (),
        }
        buf.clear();
    }

    Ok(strings)
}

/// Zero-based column of an A1-style reference ("C7" -> 2), `None` when the
/// reference has no column letters.
fn column_index(reference: &str) -> Result<Option<usize>, SpreadsheetError> {
    let out_of_range = || SpreadsheetError::ColumnOutOfRange {
        reference: reference.to_string(),
    };

    let mut index = 0usize;
    for letter in reference.bytes().take_while(u8::is_ascii_alphabetic) {
        let digit = (letter.to_ascii_uppercase() - b'A') as usize + 1;
        index = index
            .checked_mul(26)
            .and_then(|i| i.checked_add(digit))
            .filter(|i| *i <= MAX_COLUMNS)
            .ok_or_else(out_of_range)?;
    }
    Ok(index.checked_sub(1))
}

fn attribute(e: &BytesStart<'_>, name: &[u8]) -> Option<String> {
    e.attributes()
        .flatten()
        .find(|attr| attr.key.local_name().as_ref() == name)
        .map(|attr| String::from_utf8_lossy(&attr.value).into_owned())
}

#[derive(Default)]
struct PendingCell {
    reference: String,
    column: usize,
    kind: Option<String>,
    value: String,
}

impl PendingCell {
    fn resolve(self, shared: &[String]) -> Result<(usize, String), SpreadsheetError> {
        let text = match self.kind.as_deref() {
            Some("s") => {
                let index: usize = self.value.trim().parse().unwrap_or(usize::MAX);
                shared
                    .get(index)
                    .cloned()
                    .ok_or(SpreadsheetError::SharedString {
                        reference: self.reference,
                        index,
                    })?
            }
            Some("b") => match self.value.trim() {
                "1" => "TRUE".to_string(),
                _ => "FALSE".to_string(),
            },
            Some("inlineStr") | Some("str") | Some("e") => self.value,
            // Numbers: Excel stores integral codes as e.g. "1200" but some
            // writers emit "1200.0".
            _ => match self.value.strip_suffix(".0") {
                Some(integral) if integral.bytes().all(|b| b.is_ascii_digit() || b == b'-') => {
                    integral.to_string()
                }
                _ => self.value,
            },
        };
        Ok((self.column, text))
    }
}

fn parse_sheet(xml: &str, shared: &[String]) -> Result<Vec<Row>, SpreadsheetError> {
    let part = FIRST_SHEET_PART;
    let mut reader = Reader::from_str(xml);
    let mut buf = Vec::new();

    let mut rows: Vec<Row> = Vec::new();
    let mut row: Option<Row> = None;
    let mut cell: Option<PendingCell> = None;
    let mut in_value = false;
    let mut next_row_number = 1u32;

    loop {
        match reader.read_event_into(&mut buf) {
            Ok(Event::Start(e)) => match e.local_name().as_ref() {
                b"row" => {
                    let number = attribute(&e, b"r")
                        .and_then(|r| r.parse().ok())
                        .unwrap_or(next_row_number);
                    next_row_number = number.saturating_add(1);
                    row = Some(Row {
                        number,
                        cells: Vec::new(),
                    });
                }
                b"c" => {
                    let next_column = row.as_ref().map(|r| r.cells.len()).unwrap_or(0);
                    let reference = attribute(&e, b"r").unwrap_or_default();
                    let column = column_index(&reference)?.unwrap_or(next_column);
                    if column >= MAX_COLUMNS {
                        return Err(SpreadsheetError::ColumnOutOfRange { reference });
                    }
                    cell = Some(PendingCell {
                        column,
                        reference,
                        kind: attribute(&e, b"t"),
                        value: String::new(),
                    });
                }
                b"v" | b"t" => in_value = cell.is_some(),
                _ => (),
            },
            Ok(Event::End(e)) => match e.local_name().as_ref() {
                b"v" | b"t" => in_value = false,
                b"c" => {
                    if let (Some(pending), Some(current)) = (cell.take(), row.as_mut()) {
                        let (column, text) = pending.resolve(shared)?;
                        if current.cells.len() <= column {
                            current.cells.resize(column + 1, String::new());
                        }
                        current.cells[column] = text;
                    }
                }
                b"row" => {
                    if let Some(done) = row.take() {
                        rows.push(done);
                    }
                }
                _ => (),
            },
            Ok(Event::Empty(e)) if e.local_name().as_ref() == b"row" => {
                let number = attribute(&e, b"r")
                    .and_then(|r| r.parse().ok())
                    .unwrap_or(next_row_number);
                next_row_number = number.saturating_add(1);
            }
            Ok(Event::Text(e)) if in_value => {
                if let Some(pending) = cell.as_mut() {
                    pending.value.push_str(&String::from_utf8_lossy(e.as_ref()));
                }
            }
            Ok(Event::GeneralRef(e)) if in_value => {
                if let Some(pending) = cell.as_mut() {
                    push_reference(&mut pending.value, &e)
                        .map_err(|source| SpreadsheetError::Xml { part, source })?;
                }
            }
            Ok(Event::Eof) => break,
            Err(source) => return Err(SpreadsheetError::Xml { part, source }),
            _ => (),
        }
        buf.clear();
    }

    Ok(rows)
}
