use crate::error::FieldError;
use std::fmt;
use std::path::PathBuf;

/// Canonical, format-independent description of a volume
///
/// Every field is independently optional: a field is `None` when its
/// source data was missing or malformed, and no field's presence
/// implies another's.
#[derive(Debug, Clone, Default, PartialEq)]
#[cfg_attr(feature = "json", derive(serde::Serialize))]
pub struct MetaData {
    /// Identifier of the image series
    pub uid: Option<String>,

    /// Number of spatial dimensions actually present (0-3)
    pub ndims: Option<usize>,

    /// Voxel counts (x, y, z)
    pub shape: Option<[usize; 3]>,

    /// Physical units per voxel (x, y, z)
    pub spacing: Option<[f64; 3]>,
}

impl MetaData {
    /// Whether every field could be extracted
    pub fn is_complete(&self) -> bool {
        self.uid.is_some() && self.ndims.is_some() && self.shape.is_some() && self.spacing.is_some()
    }
}

/// The four fields of [`MetaData`], in extraction order
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "json", derive(serde::Serialize))]
#[cfg_attr(feature = "json", serde(rename_all = "lowercase"))]
pub enum MetadataField {
    Uid,
    Ndims,
    Shape,
    Spacing,
}

impl MetadataField {
    /// Fixed extraction order used by the director
    pub const ORDER: [MetadataField; 4] = [
        MetadataField::Uid,
        MetadataField::Ndims,
        MetadataField::Shape,
        MetadataField::Spacing,
    ];

    /// Returns simple name for display
    pub fn simple_name(&self) -> &'static str {
        match self {
            MetadataField::Uid => "uid",
            MetadataField::Ndims => "ndims",
            MetadataField::Shape => "shape",
            MetadataField::Spacing => "spacing",
        }
    }

    /// Human-readable warning text for a failed extraction
    pub fn failure_message(&self) -> &'static str {
        match self {
            MetadataField::Uid => "Could not find the UID for the image.",
            MetadataField::Ndims => "Could not parse the number of dimensions of the image.",
            MetadataField::Shape => "Could not parse the shape of the image.",
            MetadataField::Spacing => "Could not parse the voxel spacing of the image.",
        }
    }
}

impl fmt::Display for MetadataField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.simple_name())
    }
}

/// Non-fatal problem encountered while building a [`MetaData`] record
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "json", derive(serde::Serialize))]
#[cfg_attr(feature = "json", serde(tag = "kind", rename_all = "snake_case"))]
pub enum Warning {
    /// A single field could not be extracted and was left empty
    Field {
        field: MetadataField,
        reason: String,
    },

    /// A file of a DICOM series could not be read and was skipped
    SkippedFile { path: PathBuf, reason: String },
}

impl Warning {
    pub(crate) fn field(field: MetadataField, error: &FieldError) -> Self {
        Warning::Field {
            field,
            reason: error.to_string(),
        }
    }

    /// The field this warning concerns, if any
    pub fn metadata_field(&self) -> Option<MetadataField> {
        match self {
            Warning::Field { field, .. } => Some(*field),
            Warning::SkippedFile { .. } => None,
        }
    }
}

impl fmt::Display for Warning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Warning::Field { field, reason } => {
                write!(f, "{} ({})", field.failure_message(), reason)
            }
            Warning::SkippedFile { path, reason } => write!(
                f,
                "Could not load metadata for {}. The DICOM-series might not be valid. ({})",
                path.display(),
                reason
            ),
        }
    }
}

/// A normalized [`MetaData`] record plus the warnings raised building it
#[derive(Debug, Clone, Default, PartialEq)]
#[cfg_attr(feature = "json", derive(serde::Serialize))]
pub struct MetadataReport {
    pub metadata: MetaData,
    pub warnings: Vec<Warning>,
}

impl MetadataReport {
    /// Fields that were downgraded to warnings, in emission order
    pub fn failed_fields(&self) -> Vec<MetadataField> {
        self.warnings
            .iter()
            .filter_map(Warning::metadata_field)
            .collect()
    }

    /// Serializes the report as pretty-printed JSON
    #[cfg(feature = "json")]
    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_metadata_is_empty() {
        let metadata = MetaData::default();
        assert!(metadata.uid.is_none());
        assert!(metadata.ndims.is_none());
        assert!(metadata.shape.is_none());
        assert!(metadata.spacing.is_none());
        assert!(!metadata.is_complete());
    }

    #[test]
    fn test_failed_fields_skip_file_warnings() {
        let report = MetadataReport {
            metadata: MetaData::default(),
            warnings: vec![
                Warning::SkippedFile {
                    path: PathBuf::from("broken.dcm"),
                    reason: "not a DICOM file".to_string(),
                },
                Warning::field(MetadataField::Spacing, &FieldError::MissingKey("0018|0050".into())),
            ],
        };
        assert_eq!(report.failed_fields(), vec![MetadataField::Spacing]);
    }

    #[test]
    fn test_warning_display() {
        let warning = Warning::field(MetadataField::Uid, &FieldError::NoSlices);
        assert_eq!(
            warning.to_string(),
            "Could not find the UID for the image. (no slices available)"
        );
    }

    #[cfg(feature = "json")]
    #[test]
    fn test_report_to_json() {
        let report = MetadataReport {
            metadata: MetaData {
                uid: Some("1.2.3".to_string()),
                ndims: Some(3),
                shape: Some([512, 512, 143]),
                spacing: None,
            },
            warnings: vec![Warning::field(MetadataField::Spacing, &FieldError::NoSlices)],
        };
        let json = report.to_json().unwrap();
        assert!(json.contains("\"uid\": \"1.2.3\""));
        assert!(json.contains("\"spacing\": null"));
        assert!(json.contains("\"kind\": \"field\""));
    }
}
