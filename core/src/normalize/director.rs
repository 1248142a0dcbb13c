use super::{dicom, mhd};
use crate::error::FieldError;
use crate::types::{MetaData, MetadataField, MetadataReport, RawMetadata, Warning};
use log::warn;

/// Runs the four field extractors over `raw` and assembles a [`MetadataReport`]
///
/// Fields are extracted in the fixed order uid, ndims, shape, spacing.
/// A failing extractor never blocks the others: its field is left `None`
/// and a [`Warning::Field`] naming it is recorded (and logged) in the same
/// order.
pub fn construct(raw: &RawMetadata) -> MetadataReport {
    let mut warnings = Vec::new();

    let metadata = match raw {
        RawMetadata::Dicom(slices) => MetaData {
            uid: settle(MetadataField::Uid, dicom::extract_uid(slices), &mut warnings),
            ndims: settle(MetadataField::Ndims, dicom::extract_ndims(slices), &mut warnings),
            shape: settle(MetadataField::Shape, dicom::extract_shape(slices), &mut warnings),
            spacing: settle(MetadataField::Spacing, dicom::extract_spacing(slices), &mut warnings),
        },
        RawMetadata::Mhd(header) => MetaData {
            uid: settle(MetadataField::Uid, mhd::extract_uid(header), &mut warnings),
            ndims: settle(MetadataField::Ndims, mhd::extract_ndims(header), &mut warnings),
            shape: settle(MetadataField::Shape, mhd::extract_shape(header), &mut warnings),
            spacing: settle(MetadataField::Spacing, mhd::extract_spacing(header), &mut warnings),
        },
    };

    MetadataReport { metadata, warnings }
}

/// Downgrades a field error to a warning
fn settle<T>(
    field: MetadataField,
    result: Result<T, FieldError>,
    warnings: &mut Vec<Warning>,
) -> Option<T> {
    match result {
        Ok(value) => Some(value),
        Err(error) => {
            let warning = Warning::field(field, &error);
            warn!("{}", warning);
            warnings.push(warning);
            None
        }
    }
}
