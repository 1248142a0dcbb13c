//! Field extraction over a MetaImage header

use crate::error::FieldError;
use crate::io::metaimage::{DIM_SIZE, ELEMENT_DATA_FILE, ELEMENT_SPACING, NDIMS};
use crate::types::TagMap;
use std::path::Path;
use std::str::FromStr;

fn lookup<'a>(header: &'a TagMap, key: &str) -> Result<&'a str, FieldError> {
    header
        .get(key)
        .map(String::as_str)
        .ok_or_else(|| FieldError::MissingKey(key.to_string()))
}

/// Parses a space-separated list of up to three values, padding with `fill`
fn parse_triplet<T>(header: &TagMap, key: &str, fill: T) -> Result<[T; 3], FieldError>
where
    T: FromStr + Copy,
    T::Err: ToString,
{
    let value = lookup(header, key)?;
    let values = value
        .split_whitespace()
        .map(|v| v.parse::<T>().map_err(|e| FieldError::malformed(key, value, e)))
        .collect::<Result<Vec<T>, FieldError>>()?;

    if values.is_empty() || values.len() > 3 {
        return Err(FieldError::malformed(
            key,
            value,
            format!("expected 1 to 3 values, found {}", values.len()),
        ));
    }

    let mut triplet = [fill; 3];
    triplet[..values.len()].copy_from_slice(&values);
    Ok(triplet)
}

/// Base name of the data file, without extension
pub fn extract_uid(header: &TagMap) -> Result<String, FieldError> {
    let value = lookup(header, ELEMENT_DATA_FILE)?;
    Path::new(value.trim())
        .file_stem()
        .and_then(|stem| stem.to_str())
        .map(str::to_string)
        .ok_or_else(|| FieldError::malformed(ELEMENT_DATA_FILE, value, "no file name"))
}

/// Integer value of `NDims`
pub fn extract_ndims(header: &TagMap) -> Result<usize, FieldError> {
    let value = lookup(header, NDIMS)?;
    value
        .trim()
        .parse::<usize>()
        .map_err(|e| FieldError::malformed(NDIMS, value, e))
}

/// Integers of `DimSize`
pub fn extract_shape(header: &TagMap) -> Result<[usize; 3], FieldError> {
    parse_triplet(header, DIM_SIZE, 1)
}

/// Floats of `ElementSpacing`
pub fn extract_spacing(header: &TagMap) -> Result<[f64; 3], FieldError> {
    parse_triplet(header, ELEMENT_SPACING, 1.0)
}
