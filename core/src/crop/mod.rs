//! Cropping volumes and exporting the result
//!
//! [`CropPlanner`] cuts index ranges out of a [`Volume`], keeping the
//! physical position of every retained voxel. [`SeriesReTagger`] turns a
//! cropped volume into a new derived DICOM series.

pub mod planner;
pub mod retag;

pub use planner::{CropPlanner, CropRegion, CropSpec};
pub use retag::{SeriesReTagger, SeriesTagSet};

use crate::error::Result;
use crate::io::{self, OutputFormat};
use crate::types::Volume;
use log::info;
use std::path::Path;

/// Crops the volume at `path` and optionally writes it to `output`
///
/// `output_format` defaults to the format of the input. It is resolved
/// before anything is read or written, so an unsupported format leaves
/// the filesystem untouched.
///
/// # Errors
///
/// - [`crate::PrepError::UnsupportedFormat`] for an unknown output format
/// - any error from reading the input or writing the output
pub fn crop_image(
    path: &Path,
    region: &CropRegion,
    output: Option<&Path>,
    output_format: Option<&str>,
) -> Result<Volume> {
    let format = match output_format {
        Some(name) => OutputFormat::parse(name)?,
        None => OutputFormat::from_input(path)?,
    };

    let (volume, raw) = io::read_volume(path)?;
    let spec = region.resolve(&volume)?;
    let cropped = CropPlanner::crop(&volume, &spec);
    info!(
        "Cropped {} from {:?} to {:?}",
        path.display(),
        volume.size(),
        cropped.size()
    );

    if let Some(out_dir) = output {
        io::write_volume(&cropped, format, out_dir, path, &raw)?;
    }
    Ok(cropped)
}
