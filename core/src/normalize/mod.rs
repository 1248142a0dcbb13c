//! Format-agnostic metadata normalization
//!
//! Raw metadata comes in one of two closed variants, a list of DICOM tag
//! mappings or a MetaImage header (see [`RawMetadata`]). Each variant has
//! the same four pure extractors, one per [`MetaData`](crate::types::MetaData)
//! field, in the [`dicom`] and [`mhd`] modules. [`construct`] runs them in
//! a fixed order and isolates their failures; [`load_metadata`] adds the
//! (fatal) retrieval step in front.
//!
//! # Example
//!
//! ```
//! use ctprep_core::normalize::construct;
//! use ctprep_core::{MetadataField, RawMetadata, TagMap};
//!
//! let header = TagMap::from([
//!     ("NDims".to_string(), "3".to_string()),
//!     ("DimSize".to_string(), "512 512 143".to_string()),
//!     ("ElementSpacing".to_string(), "0.859375 0.859375 2.5".to_string()),
//! ]);
//! let report = construct(&RawMetadata::Mhd(header));
//!
//! assert_eq!(report.metadata.shape, Some([512, 512, 143]));
//! assert_eq!(report.metadata.spacing, Some([0.859375, 0.859375, 2.5]));
//! assert_eq!(report.failed_fields(), vec![MetadataField::Uid]);
//! ```

pub mod dicom;
mod director;
pub mod mhd;

pub use director::construct;

use crate::error::{PrepError, Result};
use crate::io::{dicom_series, metaimage};
use crate::types::{MetadataReport, RawMetadata, Warning};
use std::path::Path;

/// Source formats with a metadata normalizer
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SourceFormat {
    Dicom,
    Mhd,
}

impl SourceFormat {
    /// Chooses the normalizer for a path
    ///
    /// Directories and `.dcm` files are DICOM; `.mhd` and `.raw` files are
    /// MetaImage.
    ///
    /// # Errors
    ///
    /// Returns [`PrepError::UnknownFileType`] for any other path
    pub fn for_path(path: &Path) -> Result<Self> {
        if path.is_dir() {
            return Ok(SourceFormat::Dicom);
        }
        match metaimage::extension(path).as_deref() {
            Some("dcm") => Ok(SourceFormat::Dicom),
            Some("mhd") | Some("raw") => Ok(SourceFormat::Mhd),
            _ => Err(PrepError::UnknownFileType),
        }
    }

    /// Retrieves the raw metadata of `path` without decoding voxels
    ///
    /// DICOM files that cannot be parsed are skipped and returned as warnings.
    ///
    /// # Errors
    ///
    /// Fails with [`PrepError::InvalidDicomSeries`] if no DICOM file can be
    /// read, and with I/O or [`PrepError::InvalidImage`] errors for an
    /// unreadable MetaImage header
    pub fn retrieve(&self, path: &Path) -> Result<(RawMetadata, Vec<Warning>)> {
        match self {
            SourceFormat::Dicom => {
                let (slices, warnings) = dicom_series::read_series_tags(path)?;
                Ok((RawMetadata::Dicom(slices), warnings))
            }
            SourceFormat::Mhd => Ok((RawMetadata::Mhd(metaimage::read_header(path)?), Vec::new())),
        }
    }
}

/// Normalizes the metadata of the image (series) at `path`
///
/// Retrieval failures are fatal; per-field failures are returned as
/// warnings next to the partially populated record.
pub fn load_metadata(path: &Path) -> Result<MetadataReport> {
    let format = SourceFormat::for_path(path)?;
    let (raw, mut warnings) = format.retrieve(path)?;
    let mut report = construct(&raw);
    warnings.append(&mut report.warnings);
    report.warnings = warnings;
    Ok(report)
}
