//! MetaImage (`.mhd` header + `.raw` data) reading and writing
//!
//! Only uncompressed scalar images are handled. Voxels are widened to
//! `i16`, which covers the CT element types `MET_CHAR`, `MET_UCHAR`,
//! `MET_SHORT` and `MET_USHORT` values up to `i16::MAX`.

use crate::error::{PrepError, Result};
use crate::types::{Direction, Geometry, TagMap, Volume};
use byteorder::{BigEndian, ByteOrder, LittleEndian};
use log::{debug, info};
use ndarray::Array3;
use regex::Regex;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::OnceLock;

pub const ELEMENT_DATA_FILE: &str = "ElementDataFile";
pub const NDIMS: &str = "NDims";
pub const DIM_SIZE: &str = "DimSize";
pub const ELEMENT_SPACING: &str = "ElementSpacing";
pub const ELEMENT_TYPE: &str = "ElementType";
pub const OFFSET: &str = "Offset";
pub const TRANSFORM_MATRIX: &str = "TransformMatrix";
pub const BYTE_ORDER_MSB: &str = "BinaryDataByteOrderMSB";
pub const COMPRESSED_DATA: &str = "CompressedData";

/// Voxel storage types understood by the reader
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ElementType {
    Char,
    UChar,
    Short,
    UShort,
}

impl ElementType {
    /// Parses a MetaImage `ElementType` value
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim() {
            "MET_CHAR" => Some(ElementType::Char),
            "MET_UCHAR" => Some(ElementType::UChar),
            "MET_SHORT" => Some(ElementType::Short),
            "MET_USHORT" => Some(ElementType::UShort),
            _ => None,
        }
    }

    /// Bytes per voxel
    pub fn size(&self) -> usize {
        match self {
            ElementType::Char | ElementType::UChar => 1,
            ElementType::Short | ElementType::UShort => 2,
        }
    }
}

/// Resolves the header path for a `.mhd` or `.raw` path
///
/// # Errors
///
/// Returns [`PrepError::UnknownFileType`] for any other extension
pub fn header_path(path: &Path) -> Result<PathBuf> {
    match extension(path).as_deref() {
        Some("mhd") => Ok(path.to_path_buf()),
        Some("raw") => Ok(path.with_extension("mhd")),
        _ => Err(PrepError::UnknownFileType),
    }
}

pub(crate) fn extension(path: &Path) -> Option<String> {
    path.extension()
        .and_then(|s| s.to_str())
        .map(|s| s.to_ascii_lowercase())
}

/// Parses the `key = value` lines of a MetaImage header
///
/// Blank lines are ignored.
///
/// # Errors
///
/// Returns [`PrepError::InvalidImage`] if a line is not a `key = value` pair
pub fn parse_header(text: &str) -> Result<TagMap> {
    static REGEX: OnceLock<Regex> = OnceLock::new();
    let re = REGEX.get_or_init(|| {
        Regex::new(r"^\s*([A-Za-z][A-Za-z0-9_]*)\s*=\s*(.*?)\s*$").expect("Failed to compile regex")
    });

    let mut header = TagMap::new();
    for line in text.lines().filter(|line| !line.trim().is_empty()) {
        let caps = re.captures(line).ok_or_else(|| {
            PrepError::InvalidImage(format!("malformed header line '{}'", line.trim()))
        })?;
        header.insert(caps[1].to_string(), caps[2].to_string());
        if &caps[1] == ELEMENT_DATA_FILE {
            // Anything past this key is voxel data (or nothing)
            break;
        }
    }
    Ok(header)
}

/// Reads the header belonging to a `.mhd` or `.raw` path
///
/// # Errors
///
/// Returns [`PrepError::UnknownFileType`] for other extensions,
/// [`PrepError::Io`] if the header cannot be opened and
/// [`PrepError::InvalidImage`] if it cannot be parsed
pub fn read_header(path: &Path) -> Result<TagMap> {
    let header_path = header_path(path)?;
    let bytes = fs::read(&header_path)?;
    let text = String::from_utf8_lossy(&bytes);
    parse_header(&text)
}

/// Reads a MetaImage volume and its header
///
/// # Errors
///
/// Returns [`PrepError::UnknownFileType`] for extensions other than
/// `.mhd`/`.raw` and [`PrepError::InvalidImage`] for every read or
/// decode failure
pub fn read_metaimage(path: &Path) -> Result<(Volume, TagMap)> {
    let header_path = header_path(path)?;
    let bytes = fs::read(&header_path)
        .map_err(|e| PrepError::InvalidImage(format!("{}: {}", header_path.display(), e)))?;
    let header = parse_header(&String::from_utf8_lossy(&bytes))?;

    if header
        .get(COMPRESSED_DATA)
        .is_some_and(|v| v.eq_ignore_ascii_case("true"))
    {
        return Err(PrepError::InvalidImage(
            "compressed MetaImage data is not supported".to_string(),
        ));
    }

    let [nx, ny, nz] = pad_values(parse_list::<usize>(required(&header, DIM_SIZE)?)?, 1)?;
    let spacing = match header.get(ELEMENT_SPACING) {
        Some(value) => pad_values(parse_list::<f64>(value)?, 1.0)?,
        None => [1.0; 3],
    };
    let origin = match header.get(OFFSET) {
        Some(value) => pad_values(parse_list::<f64>(value)?, 0.0)?,
        None => [0.0; 3],
    };
    let direction = match header.get(TRANSFORM_MATRIX) {
        Some(value) => parse_direction(value)?,
        None => Direction::identity(),
    };
    let element_type = ElementType::parse(required(&header, ELEMENT_TYPE)?).ok_or_else(|| {
        PrepError::InvalidImage(format!(
            "unsupported element type '{}'",
            header[ELEMENT_TYPE]
        ))
    })?;
    let big_endian = header
        .get(BYTE_ORDER_MSB)
        .is_some_and(|v| v.eq_ignore_ascii_case("true"));

    let expected = nx
        .checked_mul(ny)
        .and_then(|n| n.checked_mul(nz))
        .and_then(|n| n.checked_mul(element_type.size()))
        .ok_or_else(|| {
            PrepError::InvalidImage(format!("DimSize {} {} {} overflows", nx, ny, nz))
        })?;

    let data_file = required(&header, ELEMENT_DATA_FILE)?;
    let raw = if data_file == "LOCAL" {
        local_data(&bytes)?.to_vec()
    } else {
        let data_path = header_path
            .parent()
            .map(|dir| dir.join(data_file))
            .unwrap_or_else(|| PathBuf::from(data_file));
        debug!("Reading voxel data from {}", data_path.display());
        fs::read(&data_path)
            .map_err(|e| PrepError::InvalidImage(format!("{}: {}", data_path.display(), e)))?
    };

    if raw.len() < expected {
        return Err(PrepError::InvalidImage(format!(
            "expected {} bytes of voxel data, found {}",
            expected,
            raw.len()
        )));
    }
    let values = decode_voxels(&raw[..expected], element_type, big_endian)?;

    let data = Array3::from_shape_vec((nz, ny, nx), values)
        .map_err(|e| PrepError::InvalidImage(e.to_string()))?;
    let volume = Volume::new(data, Geometry::new(origin, spacing, direction));
    info!(
        "Loaded MetaImage {} with size {:?}",
        header_path.display(),
        volume.size()
    );
    Ok((volume, header))
}

/// Writes a volume as a `MET_SHORT` MetaImage pair
///
/// `path` may name either the header (`.mhd`) or the data file (`.raw`);
/// both files are written next to each other.
///
/// # Errors
///
/// Returns [`PrepError::UnknownFileType`] for other extensions and I/O
/// errors from writing
pub fn write_metaimage(volume: &Volume, path: &Path) -> Result<(PathBuf, PathBuf)> {
    let header_path = header_path(path)?;
    let data_path = header_path.with_extension("raw");
    let data_name = data_path
        .file_name()
        .and_then(|name| name.to_str())
        .ok_or_else(|| PrepError::InvalidPath(data_path.clone()))?;

    let values: Vec<i16> = volume.data.iter().copied().collect();
    let mut bytes = vec![0_u8; values.len() * 2];
    LittleEndian::write_i16_into(&values, &mut bytes);
    fs::write(&data_path, bytes)?;

    fs::write(&header_path, format_header(volume, data_name))?;
    info!("Wrote MetaImage {}", header_path.display());
    Ok((header_path, data_path))
}

/// Renders the header text describing `volume`
pub fn format_header(volume: &Volume, data_file: &str) -> String {
    let geometry = &volume.geometry;
    let join = |values: &[f64]| {
        values
            .iter()
            .map(|v| v.to_string())
            .collect::<Vec<_>>()
            .join(" ")
    };
    let matrix: Vec<f64> = geometry.direction.0.iter().flatten().copied().collect();
    let [nx, ny, nz] = volume.size();

    let lines = [
        "ObjectType = Image".to_string(),
        "NDims = 3".to_string(),
        "BinaryData = True".to_string(),
        format!("{} = False", BYTE_ORDER_MSB),
        format!("{} = False", COMPRESSED_DATA),
        format!("{} = {}", TRANSFORM_MATRIX, join(&matrix)),
        format!("{} = {}", OFFSET, join(&geometry.origin)),
        "CenterOfRotation = 0 0 0".to_string(),
        format!("{} = {}", ELEMENT_SPACING, join(&geometry.spacing)),
        format!("{} = {} {} {}", DIM_SIZE, nx, ny, nz),
        format!("{} = MET_SHORT", ELEMENT_TYPE),
        format!("{} = {}", ELEMENT_DATA_FILE, data_file),
    ];
    let mut text = lines.join("\n");
    text.push('\n');
    text
}

fn required<'a>(header: &'a TagMap, key: &str) -> Result<&'a str> {
    header
        .get(key)
        .map(String::as_str)
        .ok_or_else(|| PrepError::InvalidImage(format!("missing header key '{}'", key)))
}

fn parse_list<T: std::str::FromStr>(value: &str) -> Result<Vec<T>> {
    value
        .split_whitespace()
        .map(|v| {
            v.parse::<T>()
                .map_err(|_| PrepError::InvalidImage(format!("invalid header value '{}'", value)))
        })
        .collect()
}

fn pad_values<T: Copy>(values: Vec<T>, fill: T) -> Result<[T; 3]> {
    if values.is_empty() || values.len() > 3 {
        return Err(PrepError::InvalidImage(format!(
            "expected 1 to 3 values, found {}",
            values.len()
        )));
    }
    let mut padded = [fill; 3];
    padded[..values.len()].copy_from_slice(&values);
    Ok(padded)
}

fn parse_direction(value: &str) -> Result<Direction> {
    let m = parse_list::<f64>(value)?;
    if m.len() != 9 {
        return Err(PrepError::InvalidImage(format!(
            "expected 9 transform matrix values, found {}",
            m.len()
        )));
    }
    Ok(Direction([
        [m[0], m[1], m[2]],
        [m[3], m[4], m[5]],
        [m[6], m[7], m[8]],
    ]))
}

fn local_data(bytes: &[u8]) -> Result<&[u8]> {
    let key = ELEMENT_DATA_FILE.as_bytes();
    let start = bytes
        .windows(key.len())
        .position(|w| w == key)
        .ok_or_else(|| PrepError::InvalidImage("missing local data".to_string()))?;
    let newline = bytes[start..]
        .iter()
        .position(|&b| b == b'\n')
        .ok_or_else(|| PrepError::InvalidImage("missing local data".to_string()))?;
    Ok(&bytes[start + newline + 1..])
}

fn decode_voxels(raw: &[u8], element_type: ElementType, big_endian: bool) -> Result<Vec<i16>> {
    match element_type {
        ElementType::Char => Ok(raw.iter().map(|&b| b as i8 as i16).collect()),
        ElementType::UChar => Ok(raw.iter().map(|&b| b as i16).collect()),
        ElementType::Short => {
            let mut values = vec![0_i16; raw.len() / 2];
            if big_endian {
                BigEndian::read_i16_into(raw, &mut values);
            } else {
                LittleEndian::read_i16_into(raw, &mut values);
            }
            Ok(values)
        }
        ElementType::UShort => {
            let mut values = vec![0_u16; raw.len() / 2];
            if big_endian {
                BigEndian::read_u16_into(raw, &mut values);
            } else {
                LittleEndian::read_u16_into(raw, &mut values);
            }
            values
                .into_iter()
                .map(|v| {
                    i16::try_from(v).map_err(|_| {
                        PrepError::InvalidImage(format!("voxel value {} exceeds i16 range", v))
                    })
                })
                .collect()
        }
    }
}
