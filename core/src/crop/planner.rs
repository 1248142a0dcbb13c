use crate::error::{PrepError, Result};
use crate::types::{Geometry, Volume};
use log::debug;
use ndarray::s;
use std::ops::Range;

/// Index bounds of a crop, per axis in (x, y, z) order
///
/// Bounds use sequence slice semantics: `end` is exclusive, negative
/// values count from the end of the axis, and out-of-range or inverted
/// bounds shrink the result (possibly to nothing) instead of failing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CropSpec {
    pub begin: [isize; 3],
    pub end: [isize; 3],
}

impl CropSpec {
    /// Creates a new CropSpec
    pub fn new(begin: [isize; 3], end: [isize; 3]) -> Self {
        Self { begin, end }
    }

    /// The identity crop of a volume
    pub fn full(volume: &Volume) -> Self {
        Self::new([0; 3], volume.size().map(|n| n as isize))
    }

    /// Builds a crop whose slice bounds are given as physical depths
    ///
    /// `begin_xy`/`end_xy` are index bounds as in [`CropSpec::new`];
    /// `depths` are positions in millimeters along world z, in either order.
    /// Both ends select their nearest slice and are included.
    ///
    /// # Errors
    ///
    /// Returns [`PrepError::ContractViolation`] if the slice axis has no
    /// component along world z
    pub fn with_depth_range(
        volume: &Volume,
        begin_xy: [isize; 2],
        end_xy: [isize; 2],
        depths: (f64, f64),
    ) -> Result<Self> {
        let (z_begin, z_end) = CropPlanner::depth_to_slices(volume, depths.0, depths.1)?;
        Ok(Self::new(
            [begin_xy[0], begin_xy[1], z_begin],
            [end_xy[0], end_xy[1], z_end],
        ))
    }

    /// Whether every bound lies inside `size` with `begin < end`
    pub fn is_within(&self, size: [usize; 3]) -> bool {
        (0..3).all(|axis| {
            let (begin, end) = (self.begin[axis], self.end[axis]);
            0 <= begin && begin < end && end as usize <= size[axis]
        })
    }
}

/// A crop request, by index bounds or with physical slice depths
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum CropRegion {
    Index(CropSpec),
    Depth {
        begin_xy: [isize; 2],
        end_xy: [isize; 2],
        depths: (f64, f64),
    },
}

impl CropRegion {
    /// Resolves the region to index bounds on `volume`
    pub fn resolve(&self, volume: &Volume) -> Result<CropSpec> {
        match *self {
            CropRegion::Index(spec) => Ok(spec),
            CropRegion::Depth {
                begin_xy,
                end_xy,
                depths,
            } => CropSpec::with_depth_range(volume, begin_xy, end_xy, depths),
        }
    }
}

impl From<CropSpec> for CropRegion {
    fn from(spec: CropSpec) -> Self {
        CropRegion::Index(spec)
    }
}

/// Index-range cropping of volumes
pub struct CropPlanner;

impl CropPlanner {
    /// Resolves a bound pair against an axis of length `len`
    ///
    /// Negatives wrap once, everything clamps into `0..=len`, and an
    /// inverted range is empty.
    pub fn resolve_axis(begin: isize, end: isize, len: usize) -> Range<usize> {
        let clamp = |bound: isize| -> usize {
            let len = len as isize;
            let bound = if bound < 0 { bound + len } else { bound };
            bound.clamp(0, len) as usize
        };
        let start = clamp(begin);
        let stop = clamp(end).max(start);
        start..stop
    }

    /// Resolves a crop against a volume size
    pub fn resolve(spec: &CropSpec, size: [usize; 3]) -> [Range<usize>; 3] {
        [0, 1, 2].map(|axis| Self::resolve_axis(spec.begin[axis], spec.end[axis], size[axis]))
    }

    /// Crops a volume, never failing
    ///
    /// The result's origin is the physical position of the first kept
    /// voxel; spacing and direction are unchanged.
    pub fn crop(volume: &Volume, spec: &CropSpec) -> Volume {
        let [x, y, z] = Self::resolve(spec, volume.size());
        debug!("Cropping to x {:?}, y {:?}, z {:?}", x, y, z);

        let origin = volume
            .geometry
            .voxel_to_physical([x.start, y.start, z.start]);
        let data = volume.data.slice(s![z, y, x]).to_owned();
        let geometry = Geometry::new(origin, volume.spacing(), volume.geometry.direction);

        Volume::new(data, geometry)
    }

    /// Crops a volume, rejecting bounds that are not fully inside it
    ///
    /// # Errors
    ///
    /// Returns [`PrepError::ContractViolation`] unless
    /// `0 <= begin[i] < end[i] <= size[i]` holds on every axis
    pub fn crop_strict(volume: &Volume, spec: &CropSpec) -> Result<Volume> {
        if !spec.is_within(volume.size()) {
            return Err(PrepError::ContractViolation(format!(
                "crop {:?}..{:?} is outside volume of size {:?}",
                spec.begin,
                spec.end,
                volume.size()
            )));
        }
        Ok(Self::crop(volume, spec))
    }

    /// Maps two physical depths to a half-open slice index range
    ///
    /// Each depth selects its nearest slice; the range spans both,
    /// inclusive, and is clipped to the volume. Depths entirely outside
    /// the volume give an empty range.
    ///
    /// # Errors
    ///
    /// Returns [`PrepError::ContractViolation`] if slices do not advance
    /// along world z
    pub fn depth_to_slices(volume: &Volume, from: f64, to: f64) -> Result<(isize, isize)> {
        let step = volume.geometry.slice_step_z();
        if step.abs() < 1e-9 {
            return Err(PrepError::ContractViolation(
                "slice axis is perpendicular to world z; depth bounds are undefined".to_string(),
            ));
        }

        let origin_z = volume.origin()[2];
        let index = |depth: f64| ((depth - origin_z) / step).round() as isize;
        let (a, b) = (index(from), index(to));
        let depth = volume.depth() as isize;

        let begin = a.min(b).max(0);
        let end = (a.max(b) + 1).min(depth);
        if begin >= end {
            return Ok((0, 0));
        }
        Ok((begin, end))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Direction;
    use ndarray::Array3;
    use rstest::rstest;

    fn volume(size: [usize; 3]) -> Volume {
        let [nx, ny, nz] = size;
        let data =
            Array3::from_shape_fn((nz, ny, nx), |(z, y, x)| (z * 10000 + y * 100 + x) as i16);
        Volume::new(
            data,
            Geometry::new([-50.0, -60.0, -340.0], [0.5, 0.5, 2.5], Direction::identity()),
        )
    }

    #[rstest]
    #[case(0, 10, 10, 0..10)]
    #[case(2, 5, 10, 2..5)]
    #[case(-3, 10, 10, 7..10)]
    #[case(0, -1, 10, 0..9)]
    #[case(5, 2, 10, 5..5)]
    #[case(8, 20, 10, 8..10)]
    #[case(-20, 3, 10, 0..3)]
    #[case(12, 15, 10, 10..10)]
    fn test_resolve_axis(
        #[case] begin: isize,
        #[case] end: isize,
        #[case] len: usize,
        #[case] expected: Range<usize>,
    ) {
        assert_eq!(CropPlanner::resolve_axis(begin, end, len), expected);
    }

    #[test]
    fn test_crop_inside_bounds() {
        let source = volume([20, 16, 12]);
        let spec = CropSpec::new([2, 3, 4], [10, 9, 7]);
        let cropped = CropPlanner::crop(&source, &spec);

        assert_eq!(cropped.size(), [8, 6, 3]);
        assert_eq!(cropped.data[[0, 0, 0]], source.data[[4, 3, 2]]);
        assert_eq!(cropped.data[[2, 5, 7]], source.data[[6, 8, 9]]);
        assert_eq!(cropped.origin(), [-49.0, -58.5, -330.0]);
        assert_eq!(cropped.spacing(), source.spacing());
        assert_eq!(cropped.geometry.direction, source.geometry.direction);
    }

    #[test]
    fn test_identity_crop() {
        let source = volume([7, 5, 3]);
        let cropped = CropPlanner::crop(&source, &CropSpec::full(&source));
        assert_eq!(cropped, source);
    }

    #[test]
    fn test_origin_follows_direction() {
        let mut source = volume([4, 4, 4]);
        source.geometry.direction = Direction([[0.0, 1.0, 0.0], [1.0, 0.0, 0.0], [0.0, 0.0, -1.0]]);
        let cropped = CropPlanner::crop(&source, &CropSpec::new([2, 0, 2], [4, 4, 4]));
        assert_eq!(cropped.origin(), [-50.0, -59.0, -345.0]);
    }

    #[test]
    fn test_out_of_range_crop_is_empty_not_error() {
        let source = volume([8, 8, 8]);
        let cropped = CropPlanner::crop(&source, &CropSpec::new([0, 0, 6], [8, 8, 2]));
        assert!(cropped.is_empty());
        assert_eq!(cropped.size(), [8, 8, 0]);

        let truncated = CropPlanner::crop(&source, &CropSpec::new([4, 0, 0], [100, 8, 8]));
        assert_eq!(truncated.size(), [4, 8, 8]);
    }

    #[test]
    fn test_crop_strict() {
        let source = volume([8, 8, 8]);
        assert!(CropPlanner::crop_strict(&source, &CropSpec::new([0, 0, 0], [8, 8, 8])).is_ok());
        for spec in [
            CropSpec::new([0, 0, 0], [9, 8, 8]),
            CropSpec::new([-1, 0, 0], [8, 8, 8]),
            CropSpec::new([0, 4, 0], [8, 4, 8]),
        ] {
            assert!(matches!(
                CropPlanner::crop_strict(&source, &spec),
                Err(PrepError::ContractViolation(_))
            ));
        }
    }

    #[test]
    fn test_depth_range_selects_full_series() {
        // 133 slices from -10 mm down to -340 mm
        let data = Array3::<i16>::zeros((133, 512, 512));
        let direction = Direction([[1.0, 0.0, 0.0], [0.0, 1.0, 0.0], [0.0, 0.0, -1.0]]);
        let source = Volume::new(
            data,
            Geometry::new([-180.0, -180.0, -10.0], [0.7, 0.7, 2.5], direction),
        );

        let spec =
            CropSpec::with_depth_range(&source, [0, 0], [512, 512], (-10.0, -340.0)).unwrap();
        assert_eq!(spec, CropSpec::new([0, 0, 0], [512, 512, 133]));
        let cropped = CropPlanner::crop(&source, &spec);
        assert_eq!(cropped.size(), [512, 512, 133]);
        assert_eq!(cropped.geometry, source.geometry);

        let spec =
            CropSpec::with_depth_range(&source, [100, 200], [120, 220], (-160.0, -170.0)).unwrap();
        let cropped = CropPlanner::crop(&source, &spec);
        assert_eq!(cropped.size(), [20, 20, 5]);
        assert_eq!(cropped.origin()[2], -160.0);
    }

    #[test]
    fn test_depth_range_ascending_series() {
        // Same extent, slices stored bottom-up
        let source = volume([4, 4, 133]);
        let (begin, end) = CropPlanner::depth_to_slices(&source, -160.0, -170.0).unwrap();
        assert_eq!((begin, end), (68, 73));
        assert_eq!(CropPlanner::depth_to_slices(&source, -10.0, -340.0).unwrap(), (0, 133));
        assert_eq!(CropPlanner::depth_to_slices(&source, 100.0, 200.0).unwrap(), (0, 0));
        assert_eq!(CropPlanner::depth_to_slices(&source, -400.0, -330.0).unwrap(), (0, 5));
    }

    #[test]
    fn test_depth_range_needs_axial_slices() {
        let mut source = volume([4, 4, 4]);
        source.geometry.direction = Direction::from_orientation([1.0, 0.0, 0.0], [0.0, 0.0, -1.0]);
        assert!(matches!(
            CropPlanner::depth_to_slices(&source, 0.0, 10.0),
            Err(PrepError::ContractViolation(_))
        ));
    }

    #[test]
    fn test_region_resolve() {
        let source = volume([4, 4, 133]);
        let index = CropRegion::from(CropSpec::new([0, 0, 0], [2, 2, 2]));
        assert_eq!(index.resolve(&source).unwrap(), CropSpec::new([0, 0, 0], [2, 2, 2]));

        let depth = CropRegion::Depth {
            begin_xy: [0, 0],
            end_xy: [4, 4],
            depths: (-340.0, -337.5),
        };
        assert_eq!(depth.resolve(&source).unwrap(), CropSpec::new([0, 0, 0], [4, 4, 2]));
    }
}
