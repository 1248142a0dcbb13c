//! DICOM series reading and per-slice writing
//!
//! A series is a directory of `.dcm` files, one slice each. Reading stacks
//! the decoded slices along the slice normal and derives the volume's
//! [`Geometry`]; writing emits one file per slice, tagged with a
//! [`SeriesTagSet`] produced by the re-tagger.

use crate::crop::SeriesTagSet;
use crate::error::{PrepError, Result};
use crate::tags::{
    self, get_float_value, get_multi_float_value, get_string_value, is_textual_vr, tag_key,
    IMAGE_ORIENTATION_PATIENT, IMAGE_POSITION_PATIENT, PIXEL_DATA, PIXEL_SPACING,
    SLICE_THICKNESS, SOP_INSTANCE_UID,
};
use crate::types::{dot, Direction, Geometry, PixelSpacing, TagMap, Volume, Warning};
use byteorder::{ByteOrder, LittleEndian};
use dicom::pixeldata::PixelDecoder;
use dicom_core::{DataElement, PrimitiveValue, VR};
use dicom_dictionary_std::uids;
use dicom_object::{
    open_file, DefaultDicomObject, FileMetaTableBuilder, InMemDicomObject, OpenFileOptions,
};
use log::{debug, info, warn};
use ndarray::{s, Array2, Array3};
use std::cmp::Ordering;
use std::fs;
use std::path::{Path, PathBuf};

/// Whether the path carries a `.dcm` extension (case-insensitive)
pub fn has_dcm_extension(path: &Path) -> bool {
    path.extension()
        .and_then(|s| s.to_str())
        .is_some_and(|ext| ext.eq_ignore_ascii_case("dcm"))
}

/// Collects the DICOM files making up a series
///
/// A directory yields every regular `.dcm` file inside it, sorted by file
/// name; a `.dcm` file yields itself.
///
/// # Errors
///
/// Returns [`PrepError::InvalidDicomSeries`] if no file is found
pub fn collect_dicom_files(path: &Path) -> Result<Vec<PathBuf>> {
    let mut files: Vec<PathBuf> = if path.is_dir() {
        fs::read_dir(path)?
            .filter_map(|entry| entry.ok())
            .map(|entry| entry.path())
            .filter(|p| p.is_file() && has_dcm_extension(p))
            .collect()
    } else if path.is_file() && has_dcm_extension(path) {
        vec![path.to_path_buf()]
    } else {
        Vec::new()
    };

    if files.is_empty() {
        return Err(PrepError::InvalidDicomSeries);
    }

    files.sort();
    debug!("Found {} DICOM files in {}", files.len(), path.display());
    Ok(files)
}

/// Converts the textual elements of a DICOM object into a raw tag mapping
///
/// Keys are `gggg|eeee`; sequences and bulk binary elements are skipped.
pub fn read_tag_map(dcm: &InMemDicomObject) -> TagMap {
    dcm.into_iter()
        .filter(|elem| is_textual_vr(elem.vr()))
        .filter_map(|elem| {
            let value = elem.to_str().ok()?;
            Some((tag_key(elem.header().tag), value.trim().to_string()))
        })
        .collect()
}

/// Reads the per-slice tag mappings of a DICOM series
///
/// Pixel data is not loaded. Files that fail to parse are skipped and
/// reported as [`Warning::SkippedFile`].
///
/// # Errors
///
/// Returns [`PrepError::InvalidDicomSeries`] if no file could be read
pub fn read_series_tags(path: &Path) -> Result<(Vec<TagMap>, Vec<Warning>)> {
    let files = collect_dicom_files(path)?;
    let mut slices = Vec::with_capacity(files.len());
    let mut warnings = Vec::new();

    for file in files {
        match OpenFileOptions::new().read_until(PIXEL_DATA).open_file(&file) {
            Ok(dcm) => slices.push(read_tag_map(&dcm)),
            Err(e) => {
                let warning = Warning::SkippedFile {
                    path: file,
                    reason: e.to_string(),
                };
                warn!("{}", warning);
                warnings.push(warning);
            }
        }
    }

    if slices.is_empty() {
        return Err(PrepError::InvalidDicomSeries);
    }

    Ok((slices, warnings))
}

/// A decoded slice waiting to be stacked
struct DecodedSlice {
    position: Option<[f64; 3]>,
    image: Array2<i16>,
    tags: TagMap,
}

/// Reads a DICOM series into a volume plus its per-slice tag mappings
///
/// Slices are ordered by their position along the slice normal; the tag
/// mappings are returned in the same order.
///
/// # Errors
///
/// Returns [`PrepError::InvalidDicomSeries`] if no readable series is
/// found, or [`PrepError::InvalidImage`] if pixel data cannot be decoded
/// or slice dimensions disagree
pub fn read_series(path: &Path) -> Result<(Volume, Vec<TagMap>)> {
    let files = collect_dicom_files(path)?;
    let objects = files
        .iter()
        .map(open_file)
        .collect::<std::result::Result<Vec<_>, _>>()
        .map_err(|e| {
            warn!("Could not read DICOM series in {}: {}", path.display(), e);
            PrepError::InvalidDicomSeries
        })?;

    let first = objects.first().ok_or(PrepError::InvalidDicomSeries)?;
    let direction = extract_direction(first);
    let pixel_spacing = get_string_value(first, PIXEL_SPACING)
        .and_then(|value| PixelSpacing::parse(&value).ok())
        .unwrap_or(PixelSpacing::new(1.0, 1.0));
    let slice_thickness = get_float_value(first, SLICE_THICKNESS);

    let mut slices = objects
        .iter()
        .map(|dcm| {
            Ok(DecodedSlice {
                position: extract_position(dcm),
                image: decode_image(dcm)?,
                tags: read_tag_map(dcm),
            })
        })
        .collect::<Result<Vec<_>>>()?;

    sort_slices(&mut slices, direction.axis(2));
    validate_dimensions(&slices)?;

    let origin = slices[0].position.unwrap_or([0.0; 3]);
    let slice_spacing = slice_spacing(&slices, direction.axis(2))
        .or(slice_thickness)
        .unwrap_or(1.0);
    let geometry = Geometry::new(
        origin,
        [pixel_spacing.col, pixel_spacing.row, slice_spacing],
        direction,
    );

    let data = build_volume_array(&slices);
    info!(
        "Loaded DICOM series from {} with {} slices",
        path.display(),
        slices.len()
    );

    let tags = slices.into_iter().map(|slice| slice.tags).collect();
    Ok((Volume::new(data, geometry), tags))
}

fn extract_direction(dcm: &InMemDicomObject) -> Direction {
    match get_multi_float_value(dcm, IMAGE_ORIENTATION_PATIENT) {
        Some(cosines) if cosines.len() >= 6 => Direction::from_orientation(
            [cosines[0], cosines[1], cosines[2]],
            [cosines[3], cosines[4], cosines[5]],
        ),
        _ => Direction::identity(),
    }
}

fn extract_position(dcm: &InMemDicomObject) -> Option<[f64; 3]> {
    let pos = get_multi_float_value(dcm, IMAGE_POSITION_PATIENT)?;
    (pos.len() >= 3).then(|| [pos[0], pos[1], pos[2]])
}

fn decode_image(dcm: &DefaultDicomObject) -> Result<Array2<i16>> {
    let pixel_data = dcm
        .decode_pixel_data()
        .map_err(|e| PrepError::InvalidImage(e.to_string()))?;
    let array = pixel_data
        .to_ndarray::<i16>()
        .map_err(|e| PrepError::InvalidImage(e.to_string()))?;
    Ok(array.slice_move(s![0, .., .., 0]))
}

fn sort_slices(slices: &mut [DecodedSlice], normal: [f64; 3]) {
    if slices.iter().all(|slice| slice.position.is_some()) {
        slices.sort_by(|a, b| {
            let da = a.position.map(|p| dot(p, normal));
            let db = b.position.map(|p| dot(p, normal));
            da.partial_cmp(&db).unwrap_or(Ordering::Equal)
        });
    }
}

fn slice_spacing(slices: &[DecodedSlice], normal: [f64; 3]) -> Option<f64> {
    let first = slices.first()?.position?;
    let second = slices.get(1)?.position?;
    let distance = (dot(second, normal) - dot(first, normal)).abs();
    (distance > f64::EPSILON).then_some(distance)
}

fn validate_dimensions(slices: &[DecodedSlice]) -> Result<()> {
    let first_dim = slices[0].image.dim();
    if slices.iter().any(|slice| slice.image.dim() != first_dim) {
        return Err(PrepError::InvalidImage(
            "inconsistent slice dimensions".to_string(),
        ));
    }
    Ok(())
}

fn build_volume_array(slices: &[DecodedSlice]) -> Array3<i16> {
    let (height, width) = slices[0].image.dim();
    let mut volume = Array3::<i16>::zeros((slices.len(), height, width));

    for (i, slice) in slices.iter().enumerate() {
        volume.slice_mut(s![i, .., ..]).assign(&slice.image);
    }

    volume
}

/// Writes a volume as a DICOM series, one `<index>.dcm` file per slice
///
/// Each slice carries the tags of the matching entry of `tag_sets` plus
/// the Image Pixel module of a 16-bit signed CT image.
///
/// # Errors
///
/// Returns [`PrepError::ContractViolation`] if the tag sets do not match
/// the slice count or lack a SOP Instance UID, or if a slice is wider or
/// taller than 65535 pixels; I/O or DICOM errors from writing
pub fn write_series(
    volume: &Volume,
    tag_sets: &[SeriesTagSet],
    out_dir: &Path,
) -> Result<Vec<PathBuf>> {
    if tag_sets.len() != volume.depth() {
        return Err(PrepError::ContractViolation(format!(
            "{} tag sets for {} slices",
            tag_sets.len(),
            volume.depth()
        )));
    }
    let extent = slice_extent(volume)?;

    let mut written = Vec::with_capacity(tag_sets.len());
    for (i, tag_set) in tag_sets.iter().enumerate() {
        let sop_instance_uid = tag_set.get(SOP_INSTANCE_UID).ok_or_else(|| {
            PrepError::ContractViolation(format!("tag set {} lacks a SOP Instance UID", i))
        })?;

        let dcm = build_slice_object(volume, i, extent, tag_set);
        let file = dcm.with_meta(
            FileMetaTableBuilder::new()
                .transfer_syntax(uids::EXPLICIT_VR_LITTLE_ENDIAN)
                .media_storage_sop_class_uid(uids::CT_IMAGE_STORAGE)
                .media_storage_sop_instance_uid(sop_instance_uid),
        )?;

        let path = out_dir.join(format!("{}.dcm", i));
        file.write_to_file(&path)?;
        written.push(path);
    }

    info!("Wrote {} DICOM slices to {}", written.len(), out_dir.display());
    Ok(written)
}

/// (Rows, Columns) of a slice, as stored in the US-typed DICOM attributes
fn slice_extent(volume: &Volume) -> Result<(u16, u16)> {
    let [width, height, _] = volume.size();
    match (u16::try_from(height), u16::try_from(width)) {
        (Ok(rows), Ok(columns)) => Ok((rows, columns)),
        _ => Err(PrepError::ContractViolation(format!(
            "slice of {} x {} pixels exceeds the DICOM limit of 65535",
            width, height
        ))),
    }
}

fn build_slice_object(
    volume: &Volume,
    index: usize,
    (rows, columns): (u16, u16),
    tag_set: &SeriesTagSet,
) -> InMemDicomObject {
    let [spacing_x, spacing_y, spacing_z] = volume.spacing();
    let mut dcm = InMemDicomObject::new_empty();

    dcm.put(DataElement::new(
        tags::SOP_CLASS_UID,
        VR::UI,
        PrimitiveValue::from(uids::CT_IMAGE_STORAGE),
    ));
    for (tag, value) in tag_set.iter() {
        dcm.put(DataElement::new(
            tag,
            tags::string_vr(tag),
            PrimitiveValue::from(value),
        ));
    }

    dcm.put(DataElement::new(
        PIXEL_SPACING,
        VR::DS,
        PrimitiveValue::from(format!(
            "{}\\{}",
            format_decimal(spacing_y),
            format_decimal(spacing_x)
        )),
    ));
    dcm.put(DataElement::new(
        SLICE_THICKNESS,
        VR::DS,
        PrimitiveValue::from(format_decimal(spacing_z)),
    ));

    dcm.put(DataElement::new(
        tags::SAMPLES_PER_PIXEL,
        VR::US,
        PrimitiveValue::from(1_u16),
    ));
    dcm.put(DataElement::new(
        tags::PHOTOMETRIC_INTERPRETATION,
        VR::CS,
        PrimitiveValue::from("MONOCHROME2"),
    ));
    dcm.put(DataElement::new(
        tags::ROWS,
        VR::US,
        PrimitiveValue::from(rows),
    ));
    dcm.put(DataElement::new(
        tags::COLUMNS,
        VR::US,
        PrimitiveValue::from(columns),
    ));
    dcm.put(DataElement::new(
        tags::BITS_ALLOCATED,
        VR::US,
        PrimitiveValue::from(16_u16),
    ));
    dcm.put(DataElement::new(
        tags::BITS_STORED,
        VR::US,
        PrimitiveValue::from(16_u16),
    ));
    dcm.put(DataElement::new(
        tags::HIGH_BIT,
        VR::US,
        PrimitiveValue::from(15_u16),
    ));
    dcm.put(DataElement::new(
        tags::PIXEL_REPRESENTATION,
        VR::US,
        PrimitiveValue::from(1_u16),
    ));

    let values: Vec<i16> = volume.data.slice(s![index, .., ..]).iter().copied().collect();
    let mut bytes = vec![0_u8; values.len() * 2];
    LittleEndian::write_i16_into(&values, &mut bytes);
    dcm.put(DataElement::new(PIXEL_DATA, VR::OW, PrimitiveValue::from(bytes)));

    dcm
}

/// Formats a number as a DICOM decimal string (at most 16 characters)
pub fn format_decimal(value: f64) -> String {
    // -0 is not a useful DS value
    let value = if value == 0.0 { 0.0 } else { value };
    let plain = format!("{}", value);
    if plain.len() <= 16 {
        return plain;
    }

    for precision in (0..=15).rev() {
        let formatted = format!("{:.*}", precision, value);
        let trimmed = if formatted.contains('.') {
            formatted.trim_end_matches('0').trim_end_matches('.').to_string()
        } else {
            formatted
        };
        if trimmed.len() <= 16 {
            return trimmed;
        }
    }
    format!("{:.6e}", value)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crop::SeriesReTagger;
    use crate::types::RawMetadata;
    use chrono::NaiveDate;
    use tempfile::TempDir;

    fn sample_volume() -> Volume {
        let data =
            Array3::from_shape_fn((3, 4, 5), |(z, y, x)| (z * 100 + y * 10 + x) as i16 - 50);
        let geometry = Geometry::new(
            [-100.0, -120.0, -340.0],
            [0.5, 0.75, 2.5],
            Direction::identity(),
        );
        Volume::new(data, geometry)
    }

    fn source_metadata() -> RawMetadata {
        RawMetadata::Dicom(vec![TagMap::from([
            ("0010|0010".to_string(), "Doe^Jane".to_string()),
            ("0020|000e".to_string(), "1.2.3.4".to_string()),
            ("0008|0060".to_string(), "CT".to_string()),
        ])])
    }

    fn retagger() -> SeriesReTagger {
        let now = NaiveDate::from_ymd_opt(2024, 3, 5)
            .and_then(|d| d.and_hms_opt(14, 7, 9))
            .unwrap();
        SeriesReTagger::at(now)
    }

    #[test]
    fn test_format_decimal() {
        assert_eq!(format_decimal(-10.0), "-10");
        assert_eq!(format_decimal(0.859375), "0.859375");
        assert_eq!(format_decimal(-0.0), "0");
        let long = format_decimal(0.1 + 0.2);
        assert!(long.len() <= 16);
        assert!(long.starts_with("0.3"));
        assert!(format_decimal(-123456.123456789).len() <= 16);
    }

    #[test]
    fn test_collect_dicom_files_empty_directory() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("notes.txt"), "not dicom").unwrap();
        assert!(matches!(
            collect_dicom_files(dir.path()),
            Err(PrepError::InvalidDicomSeries)
        ));
    }

    #[test]
    fn test_collect_dicom_files_sorted() {
        let dir = TempDir::new().unwrap();
        for name in ["b.dcm", "a.DCM", "c.txt"] {
            fs::write(dir.path().join(name), b"").unwrap();
        }
        let files = collect_dicom_files(dir.path()).unwrap();
        let names: Vec<_> = files
            .iter()
            .map(|f| f.file_name().unwrap().to_string_lossy().into_owned())
            .collect();
        assert_eq!(names, vec!["a.DCM", "b.dcm"]);
    }

    #[test]
    fn test_read_series_tags_skips_unreadable_files() {
        let dir = TempDir::new().unwrap();
        let volume = sample_volume();
        let tag_sets = retagger().retag(&volume, &source_metadata());
        write_series(&volume, &tag_sets, dir.path()).unwrap();
        fs::write(dir.path().join("zz_broken.dcm"), b"garbage").unwrap();

        let (slices, warnings) = read_series_tags(dir.path()).unwrap();
        assert_eq!(slices.len(), 3);
        assert_eq!(warnings.len(), 1);
        assert!(matches!(
            &warnings[0],
            Warning::SkippedFile { path, .. } if path.ends_with("zz_broken.dcm")
        ));
        assert_eq!(slices[0].get("0010|0010").map(String::as_str), Some("Doe^Jane"));
        assert_eq!(slices[0].get("0028|0010").map(String::as_str), Some("4"));
        assert!(!slices[0].contains_key("7fe0|0010"));
    }

    #[test]
    fn test_write_then_read_series() {
        let dir = TempDir::new().unwrap();
        let volume = sample_volume();
        let tag_sets = retagger().retag(&volume, &source_metadata());
        let written = write_series(&volume, &tag_sets, dir.path()).unwrap();
        assert_eq!(written.len(), 3);
        assert!(dir.path().join("0.dcm").exists());
        assert!(dir.path().join("2.dcm").exists());

        let (loaded, tags) = read_series(dir.path()).unwrap();
        assert_eq!(loaded.size(), [5, 4, 3]);
        assert_eq!(loaded.data, volume.data);
        assert_eq!(loaded.origin(), [-100.0, -120.0, -340.0]);
        assert_eq!(loaded.spacing(), [0.5, 0.75, 2.5]);
        assert_eq!(loaded.geometry.direction, Direction::identity());
        assert_eq!(tags.len(), 3);
        assert_eq!(tags[2].get("0020|0013").map(String::as_str), Some("2"));
    }

    #[test]
    fn test_write_series_rejects_mismatched_tag_sets() {
        let dir = TempDir::new().unwrap();
        let volume = sample_volume();
        let mut tag_sets = retagger().retag(&volume, &source_metadata());
        tag_sets.pop();
        assert!(matches!(
            write_series(&volume, &tag_sets, dir.path()),
            Err(PrepError::ContractViolation(_))
        ));
        assert!(!dir.path().join("0.dcm").exists());
    }

    #[test]
    fn test_write_series_rejects_oversized_slices() {
        let dir = TempDir::new().unwrap();
        let volume = Volume::new(Array3::zeros((1, 1, 65536)), Geometry::default());
        let tag_sets = retagger().retag(&volume, &source_metadata());
        assert!(matches!(
            write_series(&volume, &tag_sets, dir.path()),
            Err(PrepError::ContractViolation(_))
        ));
        assert!(!dir.path().join("0.dcm").exists());
    }
}
