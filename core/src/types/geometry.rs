use std::fmt;

/// Orientation of the three index axes in physical space
///
/// Row `i` is the unit vector along which index axis `i` advances:
/// row direction, column direction, then slice normal.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Direction(pub [[f64; 3]; 3]);

impl Default for Direction {
    fn default() -> Self {
        Self::identity()
    }
}

impl Direction {
    /// Axis-aligned orientation
    pub fn identity() -> Self {
        Direction([[1.0, 0.0, 0.0], [0.0, 1.0, 0.0], [0.0, 0.0, 1.0]])
    }

    /// Builds a direction from the DICOM row and column cosines
    ///
    /// The slice normal is their cross product.
    pub fn from_orientation(row: [f64; 3], col: [f64; 3]) -> Self {
        Direction([row, col, cross(row, col)])
    }

    /// Unit vector of index axis `axis`
    pub fn axis(&self, axis: usize) -> [f64; 3] {
        self.0[axis]
    }

    /// Image Orientation (Patient) values: row cosines then column cosines
    pub fn image_orientation(&self) -> [f64; 6] {
        let [row, col, _] = self.0;
        [row[0], row[1], row[2], col[0], col[1], col[2]]
    }
}

/// Physical placement of a voxel grid
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Geometry {
    /// Physical position of voxel (0, 0, 0)
    pub origin: [f64; 3],

    /// Physical units per voxel along (x, y, z)
    pub spacing: [f64; 3],

    pub direction: Direction,
}

impl Default for Geometry {
    fn default() -> Self {
        Self {
            origin: [0.0; 3],
            spacing: [1.0; 3],
            direction: Direction::identity(),
        }
    }
}

impl Geometry {
    /// Creates a new Geometry
    pub fn new(origin: [f64; 3], spacing: [f64; 3], direction: Direction) -> Self {
        Self {
            origin,
            spacing,
            direction,
        }
    }

    /// Maps a continuous (x, y, z) index to a physical point
    ///
    /// `origin + sum(index[i] * spacing[i] * direction[i])`
    pub fn index_to_physical(&self, index: [f64; 3]) -> [f64; 3] {
        let mut point = self.origin;
        for axis in 0..3 {
            let step = index[axis] * self.spacing[axis];
            let unit = self.direction.axis(axis);
            for (p, u) in point.iter_mut().zip(unit) {
                *p += step * u;
            }
        }
        point
    }

    /// Maps an integer (x, y, z) index to a physical point
    pub fn voxel_to_physical(&self, index: [usize; 3]) -> [f64; 3] {
        self.index_to_physical(index.map(|i| i as f64))
    }

    /// Physical extent covered by one step along the slice axis, projected on world z
    pub fn slice_step_z(&self) -> f64 {
        self.spacing[2] * self.direction.axis(2)[2]
    }
}

impl fmt::Display for Geometry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "origin {:?}, spacing {:?}, orientation {:?}",
            self.origin,
            self.spacing,
            self.direction.image_orientation()
        )
    }
}

pub(crate) fn cross(a: [f64; 3], b: [f64; 3]) -> [f64; 3] {
    [
        a[1] * b[2] - a[2] * b[1],
        a[2] * b[0] - a[0] * b[2],
        a[0] * b[1] - a[1] * b[0],
    ]
}

pub(crate) fn dot(a: [f64; 3], b: [f64; 3]) -> f64 {
    a.iter().zip(b).map(|(x, y)| x * y).sum()
}
