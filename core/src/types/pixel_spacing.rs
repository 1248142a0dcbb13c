use std::fmt;

/// Pixel spacing in millimeters (row, column)
///
/// Represents the physical spacing between adjacent pixels,
/// as stored in the DICOM Pixel Spacing attribute.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PixelSpacing {
    pub row: f64,
    pub col: f64,
}

impl PixelSpacing {
    /// Creates a new PixelSpacing
    pub fn new(row: f64, col: f64) -> Self {
        Self { row, col }
    }

    /// Parses pixel spacing from a backslash-separated DICOM value
    ///
    /// Only the first two components are used, e.g. "0.703125\\0.703125".
    ///
    /// # Errors
    ///
    /// Returns an error if fewer than two components are present
    /// or a component is not a number
    pub fn parse(s: &str) -> Result<Self, String> {
        let mut parts = s.split('\\').map(str::trim);
        let row_str = parts
            .next()
            .filter(|p| !p.is_empty())
            .ok_or_else(|| format!("Failed to parse PixelSpacing from '{}'", s))?;
        let col_str = parts
            .next()
            .ok_or_else(|| format!("Failed to parse PixelSpacing from '{}'", s))?;

        let row: f64 = row_str
            .parse()
            .map_err(|e| format!("Failed to parse row value: {}", e))?;

        let col: f64 = col_str
            .parse()
            .map_err(|e| format!("Failed to parse col value: {}", e))?;

        Ok(PixelSpacing { row, col })
    }
}

impl fmt::Display for PixelSpacing {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} x {} mm", self.row, self.col)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_backslash_separator() {
        let ps = PixelSpacing::parse("0.703125\\0.703125").unwrap();
        assert_eq!(ps.row, 0.703125);
        assert_eq!(ps.col, 0.703125);
    }

    #[test]
    fn test_parse_different_values() {
        let ps = PixelSpacing::parse("0.5\\0.75").unwrap();
        assert_eq!(ps, PixelSpacing::new(0.5, 0.75));
    }

    #[test]
    fn test_parse_ignores_extra_components() {
        let ps = PixelSpacing::parse("0.5\\0.75\\9").unwrap();
        assert_eq!(ps, PixelSpacing::new(0.5, 0.75));
    }

    #[test]
    fn test_parse_exponential_notation() {
        let ps = PixelSpacing::parse("1.5e-1\\1.5e-1").unwrap();
        assert_eq!(ps.row, 0.15);
        assert_eq!(ps.col, 0.15);
    }

    #[test]
    fn test_parse_invalid() {
        assert!(PixelSpacing::parse("invalid\\0.1").is_err());
        assert!(PixelSpacing::parse("").is_err());
        assert!(PixelSpacing::parse("0.1").is_err());
        assert!(PixelSpacing::parse("0.1 0.1").is_err());
    }

    #[test]
    fn test_display() {
        assert_eq!(PixelSpacing::new(0.5, 0.5).to_string(), "0.5 x 0.5 mm");
    }
}
