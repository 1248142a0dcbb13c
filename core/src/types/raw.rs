use std::collections::BTreeMap;

/// Raw key -> string mapping (one DICOM slice, or one MHD header)
pub type TagMap = BTreeMap<String, String>;

/// Format-specific metadata as retrieved from the source
#[derive(Debug, Clone, PartialEq)]
pub enum RawMetadata {
    /// One tag mapping per readable slice file, keyed `gggg|eeee`
    Dicom(Vec<TagMap>),

    /// Key/value pairs of a MetaImage header
    Mhd(TagMap),
}

impl RawMetadata {
    /// Tag mapping of the first DICOM slice
    pub fn first_slice(&self) -> Option<&TagMap> {
        match self {
            RawMetadata::Dicom(slices) => slices.first(),
            RawMetadata::Mhd(_) => None,
        }
    }

    /// Looks up a raw key, using the first slice for DICOM sources
    pub fn get(&self, key: &str) -> Option<&str> {
        let map = match self {
            RawMetadata::Dicom(slices) => slices.first()?,
            RawMetadata::Mhd(header) => header,
        };
        map.get(key).map(String::as_str)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_get_uses_first_slice() {
        let first = TagMap::from([("0010|0010".to_string(), "Doe^Jane".to_string())]);
        let second = TagMap::from([("0010|0010".to_string(), "Other".to_string())]);
        let raw = RawMetadata::Dicom(vec![first, second]);
        assert_eq!(raw.get("0010|0010"), Some("Doe^Jane"));
        assert_eq!(raw.get("0010|0020"), None);

        let header = TagMap::from([("NDims".to_string(), "3".to_string())]);
        let raw = RawMetadata::Mhd(header);
        assert_eq!(raw.get("NDims"), Some("3"));
        assert!(raw.first_slice().is_none());
    }

    #[test]
    fn test_empty_series_has_no_first_slice() {
        let raw = RawMetadata::Dicom(Vec::new());
        assert!(raw.first_slice().is_none());
        assert_eq!(raw.get("0020|000e"), None);
    }
}
