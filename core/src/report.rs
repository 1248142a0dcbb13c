use crate::types::MetadataReport;
use std::fmt;

/// Text report formatter for normalized volume metadata
pub struct TextReport<'a> {
    report: &'a MetadataReport,
}

impl<'a> TextReport<'a> {
    /// Creates a new text report
    pub fn new(report: &'a MetadataReport) -> Self {
        Self { report }
    }
}

fn triplet<T: fmt::Display>(values: &Option<[T; 3]>, sep: &str) -> String {
    match values {
        Some(v) => format!("{}{sep}{}{sep}{}", v[0], v[1], v[2]),
        None => "unknown".to_string(),
    }
}

impl<'a> fmt::Display for TextReport<'a> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let metadata = &self.report.metadata;
        writeln!(f, "Volume Metadata")?;
        writeln!(f, "===============")?;
        writeln!(f)?;
        writeln!(
            f,
            "UID:        {}",
            metadata.uid.as_deref().unwrap_or("unknown")
        )?;
        match metadata.ndims {
            Some(ndims) => writeln!(f, "Dimensions: {}", ndims)?,
            None => writeln!(f, "Dimensions: unknown")?,
        }
        writeln!(f, "Shape:      {}", triplet(&metadata.shape, " x "))?;
        writeln!(f, "Spacing:    {}", triplet(&metadata.spacing, " x "))?;
        writeln!(f, "Complete:   {}", metadata.is_complete())?;

        if !self.report.warnings.is_empty() {
            writeln!(f)?;
            writeln!(f, "Warnings")?;
            writeln!(f, "--------")?;
            for warning in &self.report.warnings {
                writeln!(f, "- {}", warning)?;
            }
        }

        Ok(())
    }
}
