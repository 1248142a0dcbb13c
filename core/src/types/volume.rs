use super::Geometry;
use ndarray::Array3;

/// A decoded volume: voxel intensities plus their physical geometry
///
/// `data` is laid out slice-major as `(z, y, x)`, matching the order in
/// which a DICOM series is stacked. Sizes reported through
/// [`Volume::size`] use `(x, y, z)`, the axis order of
/// [`MetaData::shape`](crate::types::MetaData::shape) and crop bounds.
#[derive(Debug, Clone, PartialEq)]
pub struct Volume {
    pub data: Array3<i16>,
    pub geometry: Geometry,
}

impl Volume {
    /// Creates a new Volume
    pub fn new(data: Array3<i16>, geometry: Geometry) -> Self {
        Self { data, geometry }
    }

    /// Voxel counts along (x, y, z)
    pub fn size(&self) -> [usize; 3] {
        let (depth, height, width) = self.data.dim();
        [width, height, depth]
    }

    /// Number of slices
    pub fn depth(&self) -> usize {
        self.data.dim().0
    }

    /// Whether the volume holds no voxels
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    pub fn origin(&self) -> [f64; 3] {
        self.geometry.origin
    }

    pub fn spacing(&self) -> [f64; 3] {
        self.geometry.spacing
    }
}
