use std::path::PathBuf;
use thiserror::Error;

/// Result type for ctprep operations
pub type Result<T> = std::result::Result<T, PrepError>;

/// Fatal errors that abort a load, crop or write operation
///
/// No partial [`MetaData`](crate::types::MetaData) or
/// [`Volume`](crate::types::Volume) is ever returned alongside one of these.
#[derive(Error, Debug)]
pub enum PrepError {
    /// The given path does not hold a readable DICOM series
    #[error(
        "The specified path does not contain dcm-files. Please ensure that the path points to a folder containing a DICOM-series."
    )]
    InvalidDicomSeries,

    /// The file extension is not one of `.dcm`, `.mhd` or `.raw`
    #[error("The file extension is unknown.")]
    UnknownFileType,

    /// The extension is known but the content could not be decoded
    #[error("The image could not be loaded. Please check image integrity. ({0})")]
    InvalidImage(String),

    /// The input path is neither a file nor a directory
    #[error("Given path is not a valid path: {}", .0.display())]
    InvalidPath(PathBuf),

    /// The requested output format is not supported
    #[error("Unknown output file format: '{0}'")]
    UnsupportedFormat(String),

    /// A caller-supplied argument or transform broke its contract
    #[error("Contract violation: {0}")]
    ContractViolation(String),

    /// DICOM reading or writing error
    #[error("DICOM error: {0}")]
    Dicom(String),

    /// I/O error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<dicom_object::ReadError> for PrepError {
    fn from(e: dicom_object::ReadError) -> Self {
        PrepError::Dicom(format!("{}", e))
    }
}

impl From<dicom_object::WriteError> for PrepError {
    fn from(e: dicom_object::WriteError) -> Self {
        PrepError::Dicom(format!("{}", e))
    }
}

impl From<dicom_object::WithMetaError> for PrepError {
    fn from(e: dicom_object::WithMetaError) -> Self {
        PrepError::Dicom(format!("{}", e))
    }
}

/// Recoverable error scoped to a single metadata field
///
/// Raised by the field extractors in [`crate::normalize`] and downgraded
/// to a [`Warning`](crate::types::Warning) by the director.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum FieldError {
    /// A required raw key is absent
    #[error("missing key '{0}'")]
    MissingKey(String),

    /// A raw key is present but its value cannot be parsed
    #[error("malformed value '{value}' for key '{key}': {reason}")]
    Malformed {
        key: String,
        value: String,
        reason: String,
    },

    /// The DICOM source holds no per-slice tag mappings
    #[error("no slices available")]
    NoSlices,
}

impl FieldError {
    pub(crate) fn malformed(key: &str, value: &str, reason: impl ToString) -> Self {
        FieldError::Malformed {
            key: key.to_string(),
            value: value.to_string(),
            reason: reason.to_string(),
        }
    }
}
