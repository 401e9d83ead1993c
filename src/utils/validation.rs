use std::path::Path;
use thiserror::Error;

use crate::models::Environment;

/// Only spreadsheets in this format are accepted for benefit uploads.
pub const EXCEL_EXTENSION: &str = "xlsx";

/// Rejected explicitly, with its own message, before the Excel check.
const UNSUPPORTED_CSV_EXTENSION: &str = "CSV";

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{message}")]
pub struct ValidationError {
    pub code: &'static str,
    pub message: String,
}

impl ValidationError {
    pub fn new(code: &'static str, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }

    pub fn missing_file() -> Self {
        Self::new(
            "MISSING_FILE",
            "The file param can not be empty. Please, verify and try again.",
        )
    }

    pub fn multiple_files() -> Self {
        Self::new(
            "MULTIPLE_FILES",
            "Upload only one file. Please, verify and try again.",
        )
    }
}

/// Checks an uploaded filename, in order: CSV token, Excel extension, then
/// that it is a bare file name safe to join onto the temp directory.
pub fn validate_excel_filename(filename: &str) -> Result<(), ValidationError> {
    let extension = Path::new(filename)
        .extension()
        .and_then(|ext| ext.to_str());

    if extension == Some(UNSUPPORTED_CSV_EXTENSION) {
        return Err(ValidationError::new(
            "UNSUPPORTED_FORMAT",
            "At the moment, the APP only support Excels files.",
        ));
    }

    if extension != Some(EXCEL_EXTENSION) {
        return Err(ValidationError::new(
            "NOT_AN_EXCEL",
            "The file uploaded is not an Excel. Please, verify the file and try again.",
        ));
    }

    validate_bare_filename(filename)
}

/// The name must be a single path component: no separators, no `..`,
/// nothing that would resolve outside the staging directory.
pub fn validate_bare_filename(filename: &str) -> Result<(), ValidationError> {
    let invalid = || {
        ValidationError::new(
            "INVALID_FILENAME",
            format!("Invalid filename '{}'. Please, rename the file and try again.", filename),
        )
    };

    if filename.trim().is_empty()
        || filename.contains(['/', '\\', '\0'])
        || filename == "."
        || filename == ".."
    {
        return Err(invalid());
    }

    match Path::new(filename).file_name().and_then(|name| name.to_str()) {
        Some(name) if name == filename => Ok(()),
        _ => Err(invalid()),
    }
}

/// Runs every upload check in the documented order and returns the parsed
/// environment.
pub fn validate_upload(filename: &str, environment: &str) -> Result<Environment, ValidationError> {
    validate_excel_filename(filename)?;
    environment.parse()
}
