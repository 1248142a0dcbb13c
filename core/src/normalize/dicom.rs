//! Field extraction over the per-slice tag mappings of a DICOM series
//!
//! Every extractor is pure: it reads only the already-retrieved mappings
//! and uses the first slice for per-image attributes.

use crate::error::FieldError;
use crate::tags::{tag_key, COLUMNS, PIXEL_SPACING, ROWS, SERIES_INSTANCE_UID, SLICE_THICKNESS};
use crate::types::{PixelSpacing, TagMap};
use dicom_core::Tag;

fn first(slices: &[TagMap]) -> Result<&TagMap, FieldError> {
    slices.first().ok_or(FieldError::NoSlices)
}

fn lookup(slice: &TagMap, tag: Tag) -> Result<(String, &str), FieldError> {
    let key = tag_key(tag);
    match slice.get(&key) {
        Some(value) => Ok((key, value.as_str())),
        None => Err(FieldError::MissingKey(key)),
    }
}

fn parse_int(slice: &TagMap, tag: Tag) -> Result<usize, FieldError> {
    let (key, value) = lookup(slice, tag)?;
    value
        .trim()
        .parse::<usize>()
        .map_err(|e| FieldError::malformed(&key, value, e))
}

fn parse_float(slice: &TagMap, tag: Tag) -> Result<f64, FieldError> {
    let (key, value) = lookup(slice, tag)?;
    value
        .trim()
        .parse::<f64>()
        .map_err(|e| FieldError::malformed(&key, value, e))
}

/// Series Instance UID of the first slice
pub fn extract_uid(slices: &[TagMap]) -> Result<String, FieldError> {
    let (_, value) = lookup(first(slices)?, SERIES_INSTANCE_UID)?;
    Ok(value.trim().to_string())
}

/// Number of spatial dimensions actually present
///
/// One each for non-zero Rows, non-zero Columns, and more than one slice.
pub fn extract_ndims(slices: &[TagMap]) -> Result<usize, FieldError> {
    let slice = first(slices)?;
    let rows = parse_int(slice, ROWS)?;
    let columns = parse_int(slice, COLUMNS)?;
    Ok([rows > 0, columns > 0, slices.len() > 1]
        .into_iter()
        .filter(|present| *present)
        .count())
}

/// (Rows, Columns, number of slices)
///
/// The in-plane order is (rows, columns), the reverse of the (x, y) order
/// of [`Volume::size`](crate::types::Volume::size); the two agree only
/// for square slices.
pub fn extract_shape(slices: &[TagMap]) -> Result<[usize; 3], FieldError> {
    let slice = first(slices)?;
    Ok([parse_int(slice, ROWS)?, parse_int(slice, COLUMNS)?, slices.len()])
}

/// (Pixel Spacing[0], Pixel Spacing[1], Slice Thickness)
///
/// Pixel Spacing is (row spacing, column spacing), matching the order of
/// [`extract_shape`].
pub fn extract_spacing(slices: &[TagMap]) -> Result<[f64; 3], FieldError> {
    let slice = first(slices)?;
    let (key, value) = lookup(slice, PIXEL_SPACING)?;
    let pixel_spacing =
        PixelSpacing::parse(value).map_err(|reason| FieldError::malformed(&key, value, reason))?;
    let thickness = parse_float(slice, SLICE_THICKNESS)?;
    Ok([pixel_spacing.row, pixel_spacing.col, thickness])
}
