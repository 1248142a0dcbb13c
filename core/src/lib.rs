pub mod crop;
pub mod error;
pub mod io;
pub mod normalize;
pub mod report;
pub mod tags;
pub mod types;

pub use crop::{crop_image, CropPlanner, CropRegion, CropSpec, SeriesReTagger, SeriesTagSet};
pub use error::{FieldError, PrepError, Result};
pub use io::{get_image, load_image, load_image_with, read_volume, write_volume, OutputFormat};
pub use normalize::{construct, load_metadata};
pub use report::TextReport;
pub use types::*;
