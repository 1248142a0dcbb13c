//! Core type definitions for volume preprocessing
//!
//! This module provides the fundamental types used throughout the ctprep library:
//! - [`MetaData`]: Canonical, format-independent metadata record
//! - [`MetadataReport`]: A record plus the [`Warning`]s raised while building it
//! - [`RawMetadata`]: Format-specific metadata (DICOM tag mappings or an MHD header)
//! - [`Volume`]: Voxel array plus its physical [`Geometry`]
//! - [`PixelSpacing`]: Parsed DICOM Pixel Spacing attribute

mod geometry;
mod metadata;
mod pixel_spacing;
mod raw;
mod volume;

pub(crate) use geometry::dot;
pub use geometry::{Direction, Geometry};
pub use metadata::{MetaData, MetadataField, MetadataReport, Warning};
pub use pixel_spacing::PixelSpacing;
pub use raw::{RawMetadata, TagMap};
pub use volume::Volume;
