use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// Millimeters per inch
pub const MM_PER_INCH: f64 = 25.4;

/// Rejected scaler configuration
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ConfigError {
    #[error("printer DPI must be a positive number, got {0}")]
    NonPositiveDpi(f64),
    #[error("reference marker size must be at least one pixel")]
    ZeroMarkerPixels,
    #[error("reference image ({image}px) is smaller than the marker it contains ({marker}px)")]
    ImageSmallerThanMarker { marker: u32, image: u32 },
}

/// AprilTag family of the source images
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TagFamily {
    Tag36h11,
    Tag25h9,
    Tag16h5,
}

impl TagFamily {
    /// Returns (marker, image) edge length in pixels for a tag rendered at one pixel per bit.
    ///
    /// The marker is the data grid plus its black border; the image adds the
    /// one-bit white quiet zone around it.
    pub fn reference_pixels(&self) -> (u32, u32) {
        let data_bits = match self {
            TagFamily::Tag36h11 => 6,
            TagFamily::Tag25h9 => 5,
            TagFamily::Tag16h5 => 4,
        };
        (data_bits + 2, data_bits + 4)
    }
}

impl fmt::Display for TagFamily {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TagFamily::Tag36h11 => write!(f, "36h11"),
            TagFamily::Tag25h9 => write!(f, "25h9"),
            TagFamily::Tag16h5 => write!(f, "16h5"),
        }
    }
}

/// Printer resolution and the geometry of the unscaled reference image
///
/// Only constructed through [`ScalerConfig::new`] (or the family/default
/// constructors), so every instance satisfies `dpi > 0` and
/// `reference_image_pixels >= reference_marker_pixels >= 1`. It serializes
/// into reports only.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ScalerConfig {
    dpi: f64,
    reference_marker_pixels: u32,
    reference_image_pixels: u32,
}

impl ScalerConfig {
    /// # Arguments
    /// * `dpi` - Printer resolution in dots per inch
    /// * `reference_marker_pixels` - Tag content edge (data + black border) in the source image
    /// * `reference_image_pixels` - Full source image edge, including the white border
    pub fn new(
        dpi: f64,
        reference_marker_pixels: u32,
        reference_image_pixels: u32,
    ) -> Result<Self, ConfigError> {
        if !(dpi.is_finite() && dpi > 0.0) {
            return Err(ConfigError::NonPositiveDpi(dpi));
        }
        if reference_marker_pixels == 0 {
            return Err(ConfigError::ZeroMarkerPixels);
        }
        if reference_image_pixels < reference_marker_pixels {
            return Err(ConfigError::ImageSmallerThanMarker {
                marker: reference_marker_pixels,
                image: reference_image_pixels,
            });
        }

        Ok(Self {
            dpi,
            reference_marker_pixels,
            reference_image_pixels,
        })
    }

    /// Get the reference geometry of a tag family rendered at one pixel per bit
    pub fn for_family(family: TagFamily, dpi: f64) -> Result<Self, ConfigError> {
        let (marker, image) = family.reference_pixels();
        Self::new(dpi, marker, image)
    }

    /// Printer resolution in dots per inch
    pub fn dpi(&self) -> f64 {
        self.dpi
    }

    /// Tag content edge (data + black border) in source pixels
    pub fn reference_marker_pixels(&self) -> u32 {
        self.reference_marker_pixels
    }

    /// Full source image edge in pixels, white border included
    pub fn reference_image_pixels(&self) -> u32 {
        self.reference_image_pixels
    }
}

impl Default for ScalerConfig {
    fn default() -> Self {
        let (marker, image) = TagFamily::Tag36h11.reference_pixels();
        Self {
            dpi: 72.0,
            reference_marker_pixels: marker,
            reference_image_pixels: image,
        }
    }
}

/// How a fractional scale factor is forced onto an integer
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum RoundingPolicy {
    /// Round down; the printed marker never exceeds the requested size
    #[default]
    Floor,
    /// Round up; the printed marker is never smaller than requested
    Ceil,
    /// Round to the closest factor
    Nearest,
}

impl RoundingPolicy {
    /// Round `value` to a whole number according to the policy
    pub fn apply(&self, value: f64) -> f64 {
        match self {
            RoundingPolicy::Floor => value.floor(),
            RoundingPolicy::Ceil => value.ceil(),
            RoundingPolicy::Nearest => value.round(),
        }
    }
}

impl fmt::Display for RoundingPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RoundingPolicy::Floor => write!(f, "floor"),
            RoundingPolicy::Ceil => write!(f, "ceil"),
            RoundingPolicy::Nearest => write!(f, "nearest"),
        }
    }
}

/// Integer scale factor together with the marker size it prints at
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ScaleResult {
    /// Printed marker edge in millimeters
    pub marker_size_mm: f64,
    /// Multiplier applied to the reference image's pixels
    pub scale_factor: u32,
}

impl ScaleResult {
    /// Scale factor as the percentage handed to the image tool
    pub fn percent(&self) -> u64 {
        self.scale_factor as u64 * 100
    }
}
