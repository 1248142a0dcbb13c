use crate::io::dicom_series::format_decimal;
use crate::tags::{
    parse_tag_key, tag_key, IDENTITY_TAGS, IMAGE_ORIENTATION_PATIENT, IMAGE_POSITION_PATIENT,
    IMAGE_TYPE, INSTANCE_CREATION_DATE, INSTANCE_CREATION_TIME, INSTANCE_NUMBER, SERIES_DATE,
    SERIES_INSTANCE_UID, SERIES_TIME, SOP_INSTANCE_UID,
};
use crate::types::{RawMetadata, Volume};
use chrono::{Local, NaiveDateTime};
use dicom_core::Tag;
use std::collections::BTreeMap;

/// Organizational root of synthesized Series Instance UIDs
pub const UID_ROOT: &str = "1.2.826.0.1.3680043.2.1125";

/// Image Type of every re-exported slice
pub const DERIVED_IMAGE_TYPE: &str = "DERIVED\\SECONDARY";

/// Tag values to stamp on one output slice
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SeriesTagSet {
    values: BTreeMap<Tag, String>,
}

impl SeriesTagSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, tag: Tag, value: impl Into<String>) {
        self.values.insert(tag, value.into());
    }

    pub fn get(&self, tag: Tag) -> Option<&str> {
        self.values.get(&tag).map(String::as_str)
    }

    /// Looks up a value by its `gggg|eeee` key
    pub fn get_key(&self, key: &str) -> Option<&str> {
        parse_tag_key(key).and_then(|tag| self.get(tag))
    }

    pub fn iter(&self) -> impl Iterator<Item = (Tag, &str)> {
        self.values.iter().map(|(tag, value)| (*tag, value.as_str()))
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// The tag set as a raw `gggg|eeee` mapping
    pub fn to_keyed(&self) -> BTreeMap<String, String> {
        self.values
            .iter()
            .map(|(tag, value)| (tag_key(*tag), value.clone()))
            .collect()
    }
}

/// Synthesizes the tags that make a cropped volume a standalone DICOM series
///
/// All slices of one re-tagger share its timestamp, and with it the
/// Series Date/Time, Instance Creation Date/Time and Series Instance UID.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SeriesReTagger {
    timestamp: NaiveDateTime,
}

impl SeriesReTagger {
    /// A re-tagger stamped with the current local time
    pub fn now() -> Self {
        Self::at(Local::now().naive_local())
    }

    /// A re-tagger stamped with `timestamp`
    pub fn at(timestamp: NaiveDateTime) -> Self {
        Self { timestamp }
    }

    /// Export date, `YYYYMMDD`
    pub fn date(&self) -> String {
        self.timestamp.format("%Y%m%d").to_string()
    }

    /// Export time, `HHMMSS`
    pub fn time(&self) -> String {
        self.timestamp.format("%H%M%S").to_string()
    }

    /// New Series Instance UID, distinct from `source_uid`
    ///
    /// `<root>.<date>.1<time>`, with a numeric suffix appended while it
    /// still equals the source series UID.
    pub fn series_uid(&self, source_uid: Option<&str>) -> String {
        let base = format!("{}.{}.1{}", UID_ROOT, self.date(), self.time());
        let mut uid = base.clone();
        let mut suffix = 2;
        while source_uid.is_some_and(|source| source.trim() == uid) {
            uid = format!("{}.{}", base, suffix);
            suffix += 1;
        }
        uid
    }

    /// Whitelisted identity tags present on the source's first slice
    pub fn identity_tags(source: &RawMetadata) -> SeriesTagSet {
        let mut tag_set = SeriesTagSet::new();
        if let Some(slice) = source.first_slice() {
            for (key, value) in slice {
                if let Some(tag) = parse_tag_key(key).filter(|tag| IDENTITY_TAGS.contains(tag)) {
                    tag_set.insert(tag, value.as_str());
                }
            }
        }
        tag_set
    }

    /// Builds one tag set per slice of `volume`
    ///
    /// Image Position (Patient) of slice `i` is the physical point of
    /// voxel `(0, 0, i)`, so it stays correct for oblique series.
    pub fn retag(&self, volume: &Volume, source: &RawMetadata) -> Vec<SeriesTagSet> {
        let source_uid = source.get(&tag_key(SERIES_INSTANCE_UID));
        let series_uid = self.series_uid(source_uid);
        let (date, time) = (self.date(), self.time());
        let orientation = join_decimals(&volume.geometry.direction.image_orientation());

        let mut shared = Self::identity_tags(source);
        shared.insert(SERIES_TIME, time.as_str());
        shared.insert(SERIES_DATE, date.as_str());
        shared.insert(IMAGE_TYPE, DERIVED_IMAGE_TYPE);
        shared.insert(SERIES_INSTANCE_UID, series_uid.as_str());
        shared.insert(IMAGE_ORIENTATION_PATIENT, orientation);

        (0..volume.depth())
            .map(|i| {
                let mut tag_set = shared.clone();
                tag_set.insert(INSTANCE_CREATION_DATE, date.as_str());
                tag_set.insert(INSTANCE_CREATION_TIME, time.as_str());
                let position = volume.geometry.voxel_to_physical([0, 0, i]);
                tag_set.insert(IMAGE_POSITION_PATIENT, join_decimals(&position));
                tag_set.insert(INSTANCE_NUMBER, i.to_string());
                tag_set.insert(SOP_INSTANCE_UID, format!("{}.{}", series_uid, i + 1));
                tag_set
            })
            .collect()
    }
}

fn join_decimals(values: &[f64]) -> String {
    values
        .iter()
        .map(|v| format_decimal(*v))
        .collect::<Vec<_>>()
        .join("\\")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tags::{MODALITY, PATIENT_NAME, STUDY_INSTANCE_UID};
    use crate::types::{Direction, Geometry, TagMap};
    use chrono::NaiveDate;
    use ndarray::Array3;

    fn timestamp() -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2024, 3, 5)
            .and_then(|d| d.and_hms_opt(14, 7, 9))
            .unwrap()
    }

    fn source() -> RawMetadata {
        RawMetadata::Dicom(vec![TagMap::from([
            ("0010|0010".to_string(), "Doe^Jane".to_string()),
            ("0020|000D".to_string(), "1.2.3".to_string()),
            ("0020|000e".to_string(), "1.2.3.4".to_string()),
            ("0008|0060".to_string(), "CT".to_string()),
            ("0008|0070".to_string(), "Vendor".to_string()),
        ])])
    }

    fn oblique_volume() -> Volume {
        let s = std::f64::consts::FRAC_1_SQRT_2;
        let direction = Direction::from_orientation([1.0, 0.0, 0.0], [0.0, s, -s]);
        Volume::new(
            Array3::zeros((4, 2, 2)),
            Geometry::new([10.0, 20.0, 30.0], [1.0, 1.0, 2.0], direction),
        )
    }

    #[test]
    fn test_series_uid_layout() {
        let retagger = SeriesReTagger::at(timestamp());
        assert_eq!(retagger.date(), "20240305");
        assert_eq!(retagger.time(), "140709");
        assert_eq!(
            retagger.series_uid(Some("1.2.3.4")),
            "1.2.826.0.1.3680043.2.1125.20240305.1140709"
        );
    }

    #[test]
    fn test_series_uid_avoids_source() {
        let retagger = SeriesReTagger::at(timestamp());
        let colliding = retagger.series_uid(None);
        let uid = retagger.series_uid(Some(&colliding));
        assert_ne!(uid, colliding);
        assert_eq!(uid, format!("{}.2", colliding));
    }

    #[test]
    fn test_identity_tags_whitelist() {
        let tags = SeriesReTagger::identity_tags(&source());
        assert_eq!(tags.len(), 3);
        assert_eq!(tags.get(PATIENT_NAME), Some("Doe^Jane"));
        assert_eq!(tags.get(STUDY_INSTANCE_UID), Some("1.2.3"));
        assert_eq!(tags.get(MODALITY), Some("CT"));
        assert!(tags.get_key("0008|0070").is_none());

        let mhd = RawMetadata::Mhd(TagMap::from([("NDims".to_string(), "3".to_string())]));
        assert!(SeriesReTagger::identity_tags(&mhd).is_empty());
    }

    #[test]
    fn test_retag_shares_series_identity() {
        let volume = oblique_volume();
        let tag_sets = SeriesReTagger::at(timestamp()).retag(&volume, &source());
        assert_eq!(tag_sets.len(), 4);

        let series_uid = tag_sets[0].get(SERIES_INSTANCE_UID).unwrap();
        assert_ne!(series_uid, "1.2.3.4");
        for (i, tag_set) in tag_sets.iter().enumerate() {
            assert_eq!(tag_set.get(SERIES_INSTANCE_UID), Some(series_uid));
            assert_eq!(tag_set.get(IMAGE_TYPE), Some("DERIVED\\SECONDARY"));
            assert_eq!(tag_set.get(SERIES_DATE), Some("20240305"));
            assert_eq!(tag_set.get(SERIES_TIME), Some("140709"));
            assert_eq!(tag_set.get(INSTANCE_CREATION_DATE), Some("20240305"));
            assert_eq!(tag_set.get(INSTANCE_NUMBER), Some(i.to_string().as_str()));
            assert_eq!(tag_set.get(PATIENT_NAME), Some("Doe^Jane"));
            assert_eq!(
                tag_set.get(IMAGE_ORIENTATION_PATIENT),
                tag_sets[0].get(IMAGE_ORIENTATION_PATIENT)
            );
            assert_eq!(
                tag_set.get(SOP_INSTANCE_UID),
                Some(format!("{}.{}", series_uid, i + 1).as_str())
            );
        }
    }

    #[test]
    fn test_positions_follow_slice_normal() {
        let volume = oblique_volume();
        let tag_sets = SeriesReTagger::at(timestamp()).retag(&volume, &source());

        // Normal is (0, s, s); slices are 2 mm apart
        let positions: Vec<Vec<f64>> = tag_sets
            .iter()
            .map(|t| {
                t.get(IMAGE_POSITION_PATIENT)
                    .unwrap()
                    .split('\\')
                    .map(|v| v.parse().unwrap())
                    .collect()
            })
            .collect();
        let s = std::f64::consts::FRAC_1_SQRT_2;
        for (i, position) in positions.iter().enumerate() {
            let step = 2.0 * i as f64;
            assert_eq!(position[0], 10.0);
            assert!((position[1] - (20.0 + step * s)).abs() < 1e-9);
            assert!((position[2] - (30.0 + step * s)).abs() < 1e-9);
        }

        let orientation: Vec<f64> = tag_sets[0]
            .get(IMAGE_ORIENTATION_PATIENT)
            .unwrap()
            .split('\\')
            .map(|v| v.parse().unwrap())
            .collect();
        assert_eq!(orientation.len(), 6);
        assert_eq!(&orientation[..3], &[1.0, 0.0, 0.0]);
        assert!((orientation[4] - s).abs() < 1e-12);
    }

    #[test]
    fn test_keyed_view() {
        let tag_sets = SeriesReTagger::at(timestamp()).retag(&oblique_volume(), &source());
        let keyed = tag_sets[1].to_keyed();
        assert_eq!(keyed.get("0020|0013").map(String::as_str), Some("1"));
        assert_eq!(keyed.get("0008|0008").map(String::as_str), Some("DERIVED\\SECONDARY"));
    }
}
