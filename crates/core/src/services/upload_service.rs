use crate::errors::CoreError;
use crate::models::requests::UploadFile;

/// Spreadsheet extensions the picker accepts.
pub const ACCEPTED_EXTENSIONS: [&str; 2] = [".xlsx", ".xls"];

/// Single-file picker for spreadsheet uploads.
///
/// Picking a file hands it straight back for upload; there is no confirm
/// step. The picker keeps nothing from a pick, so the same file can be
/// picked again right away.
#[derive(Debug, Clone, Default)]
pub struct UploadPicker {
    pending: bool,
}

impl UploadPicker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_pending(&self) -> bool {
        self.pending
    }

    /// Turn a picked file into an upload, rejecting non-spreadsheets.
    pub fn pick(&self, file_name: &str, bytes: Vec<u8>) -> Result<UploadFile, CoreError> {
        validate_file_name(file_name)?;
        Ok(UploadFile {
            file_name: file_name.to_string(),
            bytes,
        })
    }

    pub fn set_pending(&mut self, pending: bool) {
        self.pending = pending;
    }
}

pub fn validate_file_name(file_name: &str) -> Result<(), CoreError> {
    let lower = file_name.to_ascii_lowercase();
    if ACCEPTED_EXTENSIONS.iter().any(|ext| lower.ends_with(ext)) {
        Ok(())
    } else {
        Err(CoreError::InvalidFileFormat(format!(
            "{file_name}: please upload an Excel file (.xlsx or .xls)"
        )))
    }
}

