use dicom_core::{Tag, VR};
use dicom_object::InMemDicomObject;

// Identification Tags
pub const SOP_CLASS_UID: Tag = Tag(0x0008, 0x0016);
pub const SOP_INSTANCE_UID: Tag = Tag(0x0008, 0x0018);
pub const STUDY_INSTANCE_UID: Tag = Tag(0x0020, 0x000D);
pub const SERIES_INSTANCE_UID: Tag = Tag(0x0020, 0x000E);
pub const STUDY_ID: Tag = Tag(0x0020, 0x0010);
pub const ACCESSION_NUMBER: Tag = Tag(0x0008, 0x0050);
pub const MODALITY: Tag = Tag(0x0008, 0x0060);
pub const INSTANCE_NUMBER: Tag = Tag(0x0020, 0x0013);

// Patient Tags
pub const PATIENT_NAME: Tag = Tag(0x0010, 0x0010);
pub const PATIENT_ID: Tag = Tag(0x0010, 0x0020);
pub const PATIENT_BIRTH_DATE: Tag = Tag(0x0010, 0x0030);

// Date/Time Tags
pub const STUDY_DATE: Tag = Tag(0x0008, 0x0020);
pub const STUDY_TIME: Tag = Tag(0x0008, 0x0030);
pub const SERIES_DATE: Tag = Tag(0x0008, 0x0021);
pub const SERIES_TIME: Tag = Tag(0x0008, 0x0031);
pub const INSTANCE_CREATION_DATE: Tag = Tag(0x0008, 0x0012);
pub const INSTANCE_CREATION_TIME: Tag = Tag(0x0008, 0x0013);

// Image Tags
pub const IMAGE_TYPE: Tag = Tag(0x0008, 0x0008);
pub const IMAGE_POSITION_PATIENT: Tag = Tag(0x0020, 0x0032);
pub const IMAGE_ORIENTATION_PATIENT: Tag = Tag(0x0020, 0x0037);

// Image Geometry Tags
pub const ROWS: Tag = Tag(0x0028, 0x0010);
pub const COLUMNS: Tag = Tag(0x0028, 0x0011);
pub const PIXEL_SPACING: Tag = Tag(0x0028, 0x0030);
pub const SLICE_THICKNESS: Tag = Tag(0x0018, 0x0050);

// Image Pixel Tags
pub const SAMPLES_PER_PIXEL: Tag = Tag(0x0028, 0x0002);
pub const PHOTOMETRIC_INTERPRETATION: Tag = Tag(0x0028, 0x0004);
pub const BITS_ALLOCATED: Tag = Tag(0x0028, 0x0100);
pub const BITS_STORED: Tag = Tag(0x0028, 0x0101);
pub const HIGH_BIT: Tag = Tag(0x0028, 0x0102);
pub const PIXEL_REPRESENTATION: Tag = Tag(0x0028, 0x0103);
pub const PIXEL_DATA: Tag = Tag(0x7FE0, 0x0010);

/// Identity tags copied verbatim from the source series on re-export
pub const IDENTITY_TAGS: [Tag; 9] = [
    PATIENT_NAME,
    PATIENT_ID,
    PATIENT_BIRTH_DATE,
    STUDY_INSTANCE_UID,
    STUDY_ID,
    STUDY_DATE,
    STUDY_TIME,
    ACCESSION_NUMBER,
    MODALITY,
];

/// Formats a tag as a raw-metadata key (`gggg|eeee`, lower-case hex)
pub fn tag_key(tag: Tag) -> String {
    format!("{:04x}|{:04x}", tag.0, tag.1)
}

/// Parses a raw-metadata key back into a tag
///
/// Accepts `|` or `,` as group separator and either hex case.
pub fn parse_tag_key(key: &str) -> Option<Tag> {
    let (group, element) = key.trim().split_once(['|', ','])?;
    if group.len() != 4 || element.len() != 4 {
        return None;
    }
    let group = u16::from_str_radix(group, 16).ok()?;
    let element = u16::from_str_radix(element, 16).ok()?;
    Some(Tag(group, element))
}

/// Value representation used when writing a tag from its string form
///
/// Covers every tag the re-tagger emits; unknown tags fall back to `LO`.
pub fn string_vr(tag: Tag) -> VR {
    match tag {
        PATIENT_NAME => VR::PN,
        PATIENT_ID | STUDY_ID => VR::LO,
        ACCESSION_NUMBER => VR::SH,
        PATIENT_BIRTH_DATE | STUDY_DATE | SERIES_DATE | INSTANCE_CREATION_DATE => VR::DA,
        STUDY_TIME | SERIES_TIME | INSTANCE_CREATION_TIME => VR::TM,
        STUDY_INSTANCE_UID | SERIES_INSTANCE_UID | SOP_INSTANCE_UID | SOP_CLASS_UID => VR::UI,
        MODALITY | IMAGE_TYPE | PHOTOMETRIC_INTERPRETATION => VR::CS,
        IMAGE_POSITION_PATIENT | IMAGE_ORIENTATION_PATIENT | PIXEL_SPACING | SLICE_THICKNESS => {
            VR::DS
        }
        INSTANCE_NUMBER => VR::IS,
        _ => VR::LO,
    }
}

/// Whether an element of this VR is kept in the raw tag mapping
///
/// Sequences and bulk binary values have no meaningful string form.
pub fn is_textual_vr(vr: VR) -> bool {
    !matches!(
        vr,
        VR::SQ | VR::OB | VR::OW | VR::OF | VR::OD | VR::OL | VR::OV | VR::UN
    )
}

/// Helper to get string value from DICOM tag
///
/// Returns `None` if the tag is not present or cannot be converted to string
pub fn get_string_value(dcm: &InMemDicomObject, tag: Tag) -> Option<String> {
    dcm.element(tag)
        .ok()
        .and_then(|elem| elem.to_str().ok())
        .map(|s| s.trim().to_string())
}

/// Helper to get multi-float value from DICOM tag
///
/// Returns `None` if the tag is not present or cannot be converted to Vec<f64>
pub fn get_multi_float_value(dcm: &InMemDicomObject, tag: Tag) -> Option<Vec<f64>> {
    dcm.element(tag)
        .ok()
        .and_then(|elem| elem.to_multi_float64().ok())
}

/// Helper to get float value from DICOM tag
///
/// Returns `None` if the tag is not present or cannot be converted to f64
pub fn get_float_value(dcm: &InMemDicomObject, tag: Tag) -> Option<f64> {
    dcm.element(tag).ok().and_then(|elem| elem.to_float64().ok())
}
