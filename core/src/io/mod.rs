//! Reading volumes from, and writing volumes to, DICOM series and MetaImage files

pub mod dicom_series;
pub mod metaimage;

use crate::crop::SeriesReTagger;
use crate::error::{PrepError, Result};
use crate::normalize;
use crate::types::{MetadataReport, RawMetadata, Volume};
use log::debug;
use ndarray::{Array3, ArrayD, Ix3};
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};

/// Output formats accepted by [`write_volume`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OutputFormat {
    /// One file per slice, `<index>.dcm`
    Dicom,
    /// MetaImage header plus raw data, addressed by the header
    Mhd,
    /// MetaImage header plus raw data, addressed by the data file
    Raw,
}

impl OutputFormat {
    /// Parses a format name or extension
    ///
    /// Accepts `dicom`, `dcm`, an empty string (a directory input),
    /// `mhd` and `raw`, with or without a leading dot.
    ///
    /// # Errors
    ///
    /// Returns [`PrepError::UnsupportedFormat`] for anything else
    pub fn parse(s: &str) -> Result<Self> {
        let normalized = s.trim().trim_start_matches('.').to_lowercase();
        match normalized.as_str() {
            "" | "dicom" | "dcm" => Ok(OutputFormat::Dicom),
            "mhd" => Ok(OutputFormat::Mhd),
            "raw" => Ok(OutputFormat::Raw),
            _ => Err(PrepError::UnsupportedFormat(s.to_string())),
        }
    }

    /// Format matching an input path: directories map to DICOM, files to their extension
    pub fn from_input(path: &Path) -> Result<Self> {
        if path.is_dir() {
            return Ok(OutputFormat::Dicom);
        }
        let ext = path
            .extension()
            .and_then(|s| s.to_str())
            .unwrap_or_default();
        Self::parse(ext)
    }

    /// Returns simple name for display
    pub fn simple_name(&self) -> &'static str {
        match self {
            OutputFormat::Dicom => "dicom",
            OutputFormat::Mhd => "mhd",
            OutputFormat::Raw => "raw",
        }
    }
}

impl fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.simple_name())
    }
}

/// Decodes the volume at `path` together with its raw metadata
///
/// A directory is read as a DICOM series; a file is read according to
/// its extension (`.dcm`, `.mhd` or `.raw`).
///
/// # Errors
///
/// - [`PrepError::InvalidDicomSeries`] if a directory holds no readable series
/// - [`PrepError::UnknownFileType`] if a file has an unknown extension
/// - [`PrepError::InvalidImage`] if a known file type cannot be decoded
/// - [`PrepError::InvalidPath`] if the path is neither file nor directory
pub fn read_volume(path: &Path) -> Result<(Volume, RawMetadata)> {
    if path.is_dir() {
        let (volume, slices) = dicom_series::read_series(path)?;
        return Ok((volume, RawMetadata::Dicom(slices)));
    }

    if !path.is_file() {
        return Err(PrepError::InvalidPath(path.to_path_buf()));
    }

    match metaimage::extension(path).as_deref() {
        Some("dcm") => {
            let (volume, slices) = dicom_series::read_series(path).map_err(|e| match e {
                PrepError::InvalidDicomSeries => {
                    PrepError::InvalidImage(format!(
                        "{} is not a readable DICOM file",
                        path.display()
                    ))
                }
                other => other,
            })?;
            Ok((volume, RawMetadata::Dicom(slices)))
        }
        Some("mhd") | Some("raw") => {
            let (volume, header) = metaimage::read_metaimage(path)?;
            Ok((volume, RawMetadata::Mhd(header)))
        }
        _ => Err(PrepError::UnknownFileType),
    }
}

/// Decodes the volume at `path`, discarding its raw metadata
pub fn get_image(path: &Path) -> Result<Volume> {
    read_volume(path).map(|(volume, _)| volume)
}

/// Loads the voxel array at `path` and its normalized metadata
///
/// The array is laid out `(z, y, x)`.
pub fn load_image(path: &Path) -> Result<(Array3<i16>, MetadataReport)> {
    let (volume, raw) = read_volume(path)?;
    let report = normalize::construct(&raw);
    Ok((volume.data, report))
}

/// Like [`load_image`], running `preprocess` over the voxel array first
///
/// # Errors
///
/// Returns [`PrepError::ContractViolation`] if `preprocess` does not
/// return a three-dimensional array
pub fn load_image_with<F>(path: &Path, preprocess: F) -> Result<(Array3<i16>, MetadataReport)>
where
    F: FnOnce(&Volume, Array3<i16>) -> ArrayD<i16>,
{
    let (mut volume, raw) = read_volume(path)?;
    let data = std::mem::take(&mut volume.data);
    let processed = preprocess(&volume, data)
        .into_dimensionality::<Ix3>()
        .map_err(|e| {
            PrepError::ContractViolation(format!(
                "preprocess must return a three-dimensional array: {}",
                e
            ))
        })?;
    let report = normalize::construct(&raw);
    Ok((processed, report))
}

/// Writes `volume` into the directory `out_dir` in the requested format
///
/// The directory is created if absent. DICOM output is re-tagged against
/// `source_metadata` as a new derived series; MetaImage output is named
/// after `source_path` with a `_cropped` suffix.
pub fn write_volume(
    volume: &Volume,
    format: OutputFormat,
    out_dir: &Path,
    source_path: &Path,
    source_metadata: &RawMetadata,
) -> Result<Vec<PathBuf>> {
    fs::create_dir_all(out_dir)?;
    debug!("Writing {} output to {}", format, out_dir.display());

    match format {
        OutputFormat::Dicom => {
            let tag_sets = SeriesReTagger::now().retag(volume, source_metadata);
            dicom_series::write_series(volume, &tag_sets, out_dir)
        }
        OutputFormat::Mhd | OutputFormat::Raw => {
            let stem = source_path
                .file_stem()
                .and_then(|s| s.to_str())
                .ok_or_else(|| PrepError::InvalidPath(source_path.to_path_buf()))?;
            let filename = format!("{}_cropped.{}", stem, format.simple_name());
            let (header, data) = metaimage::write_metaimage(volume, &out_dir.join(filename))?;
            Ok(vec![header, data])
        }
    }
}
