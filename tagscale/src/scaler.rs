// Marker size arithmetic
// All conversions go through the printer DPI; scale factors stay integral so
// the image tool only ever replicates pixels.

use tagscale_common::{RoundingPolicy, ScaleResult, ScalerConfig, MM_PER_INCH};

use crate::commands::ImageTool;
use crate::error::ScaleError;

/// Converts between printed millimeters, printer pixels and integer scale factors
///
/// Also builds the image tool commands for a scale job (see `commands.rs`).
pub struct MarkerScaler {
    config: ScalerConfig,
    tool: ImageTool,
}

impl MarkerScaler {
    /// Create a scaler for `config` that drives the default `convert` tool
    pub fn new(config: ScalerConfig) -> Self {
        Self {
            config,
            tool: ImageTool::default(),
        }
    }

    /// Use a different image tool program or label size
    pub fn with_tool(mut self, tool: ImageTool) -> Self {
        self.tool = tool;
        self
    }

    /// Printer resolution and reference geometry this scaler converts with
    pub fn config(&self) -> &ScalerConfig {
        &self.config
    }

    /// The image tool commands are built for
    pub fn tool(&self) -> &ImageTool {
        &self.tool
    }

    /// Convert a printed length to printer dots: `dpi * mm / 25.4`
    pub fn mm_to_pixels(&self, mm: f64) -> f64 {
        self.config.dpi() * mm / MM_PER_INCH
    }

    /// Convert printer dots to a printed length: `pixels * 25.4 / dpi`
    pub fn pixels_to_mm(&self, pixels: f64) -> f64 {
        pixels * MM_PER_INCH / self.config.dpi()
    }

    /// Find the integer scale factor that prints the marker closest to `desired_marker_mm`
    ///
    /// The factor is derived from the marker pixels (not the whole image) and
    /// rounded with `policy`. The returned size is what the rounded factor
    /// actually prints at; with [`RoundingPolicy::Floor`] it never exceeds the
    /// request. Sizes that are not positive yield a factor of 0.
    ///
    /// # Errors
    /// [`ScaleError::ScaleFactorOverflow`] when the rounded factor does not fit in a `u32`.
    pub fn recommended_scale(
        &self,
        desired_marker_mm: f64,
        policy: RoundingPolicy,
    ) -> Result<ScaleResult, ScaleError> {
        let factor = if desired_marker_mm.is_finite() && desired_marker_mm > 0.0 {
            policy.apply(self.marker_size_to_scale_factor(desired_marker_mm)).max(0.0)
        } else {
            0.0
        };
        if !factor.is_finite() || factor > u32::MAX as f64 {
            return Err(ScaleError::ScaleFactorOverflow(desired_marker_mm));
        }
        let scale_factor = factor as u32;

        Ok(ScaleResult {
            marker_size_mm: self.scale_factor_to_marker_size(scale_factor),
            scale_factor,
        })
    }

    /// Printed marker edge in millimeters for an integer scale factor
    pub fn scale_factor_to_marker_size(&self, scale_factor: u32) -> f64 {
        self.pixels_to_mm(scale_factor as f64 * self.config.reference_marker_pixels() as f64)
    }

    /// Unrounded scale factor that prints the marker at `marker_mm`
    pub fn marker_size_to_scale_factor(&self, marker_mm: f64) -> f64 {
        self.mm_to_pixels(marker_mm) / self.config.reference_marker_pixels() as f64
    }

    /// Printed marker edge for a scaled image that is `image_pixels` wide
    pub fn image_pixels_to_marker_size(&self, image_pixels: f64) -> f64 {
        let factor = image_pixels / self.config.reference_image_pixels() as f64;
        self.pixels_to_mm(factor * self.config.reference_marker_pixels() as f64)
    }

    /// Scaled image width (before any added border) that prints the marker at `marker_mm`
    pub fn marker_size_to_image_pixels(&self, marker_mm: f64) -> f64 {
        self.marker_size_to_scale_factor(marker_mm) * self.config.reference_image_pixels() as f64
    }

    /// Edge of the whole reference image after scaling, before any added border
    pub fn scaled_image_pixels(&self, scale_factor: u32) -> u64 {
        scale_factor as u64 * self.config.reference_image_pixels() as u64
    }

    /// Printed edge of the whole reference image, quiet zone included
    pub fn image_size_mm(&self, scale_factor: u32) -> f64 {
        self.pixels_to_mm(self.scaled_image_pixels(scale_factor) as f64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const EPS: f64 = 1e-9;

    fn scaler() -> MarkerScaler {
        MarkerScaler::new(ScalerConfig::default())
    }

    #[test]
    fn test_mm_pixel_round_trip() {
        let scaler = MarkerScaler::new(ScalerConfig::new(300.0, 8, 10).unwrap());
        for mm in [0.1, 1.0, 25.4, 30.0, 123.456, 1000.0] {
            assert!((scaler.pixels_to_mm(scaler.mm_to_pixels(mm)) - mm).abs() < EPS);
        }
        assert!((scaler.mm_to_pixels(25.4) - 300.0).abs() < EPS);
    }

    #[test]
    fn test_recommended_scale_30mm() {
        let scaler = scaler();
        // 72 * 30 / 25.4 = 85.04px -> 85.04 / 8 = 10.63 -> 10
        let result = scaler.recommended_scale(30.0, RoundingPolicy::Floor).unwrap();
        assert_eq!(result.scale_factor, 10);
        assert!((result.marker_size_mm - 80.0 * 25.4 / 72.0).abs() < EPS);
        assert!((result.marker_size_mm - 28.22).abs() < 0.01);
        assert_eq!(result.percent(), 1000);
    }

    #[test]
    fn test_recommended_scale_policies() {
        let scaler = scaler();
        assert_eq!(scaler.recommended_scale(30.0, RoundingPolicy::Ceil).unwrap().scale_factor, 11);
        assert_eq!(scaler.recommended_scale(30.0, RoundingPolicy::Nearest).unwrap().scale_factor, 11);

        let ceil = scaler.recommended_scale(30.0, RoundingPolicy::Ceil).unwrap();
        assert!(ceil.marker_size_mm >= 30.0);
    }

    #[test]
    fn test_floor_never_exceeds_request() {
        let scaler = MarkerScaler::new(ScalerConfig::new(600.0, 8, 10).unwrap());
        let mut mm = 0.5;
        while mm < 200.0 {
            let result = scaler.recommended_scale(mm, RoundingPolicy::Floor).unwrap();
            assert!(result.marker_size_mm <= mm + EPS, "{mm}mm -> {result:?}");
            mm += 0.37;
        }
    }

    #[test]
    fn test_recommended_scale_degenerate_sizes() {
        let scaler = scaler();
        // smaller than a single 1x marker
        assert_eq!(scaler.recommended_scale(1.0, RoundingPolicy::Floor).unwrap().scale_factor, 0);
        assert_eq!(scaler.recommended_scale(-5.0, RoundingPolicy::Ceil).unwrap().scale_factor, 0);
        assert_eq!(scaler.recommended_scale(f64::NAN, RoundingPolicy::Floor).unwrap().scale_factor, 0);
        assert_eq!(scaler.recommended_scale(0.0, RoundingPolicy::Floor).unwrap().marker_size_mm, 0.0);
    }

    #[test]
    fn test_recommended_scale_too_large() {
        let scaler = scaler();
        let err = scaler.recommended_scale(1.0e12, RoundingPolicy::Floor).unwrap_err();
        assert!(matches!(err, ScaleError::ScaleFactorOverflow(mm) if mm == 1.0e12));

        // the largest representable factor still works and its percentage does not overflow
        let max_mm = scaler.scale_factor_to_marker_size(u32::MAX);
        let result = scaler.recommended_scale(max_mm, RoundingPolicy::Floor).unwrap();
        assert!(result.scale_factor >= u32::MAX - 1);
        assert_eq!(result.percent(), result.scale_factor as u64 * 100);
    }

    #[test]
    fn test_scale_factor_to_marker_size() {
        let scaler = scaler();
        let mm = scaler.scale_factor_to_marker_size(10);
        assert!((mm - scaler.pixels_to_mm(80.0)).abs() < EPS);
        assert!((mm - 28.22).abs() < 0.01);
    }

    #[test]
    fn test_scale_factor_marker_size_inverse() {
        let scaler = MarkerScaler::new(ScalerConfig::new(203.0, 7, 9).unwrap());
        for factor in [1u32, 3, 10, 64] {
            let mm = scaler.scale_factor_to_marker_size(factor);
            assert!((scaler.marker_size_to_scale_factor(mm) - factor as f64).abs() < EPS);
        }
        for mm in [5.0, 30.0, 77.7] {
            let factor = scaler.marker_size_to_scale_factor(mm);
            let back = scaler.pixels_to_mm(factor * 7.0);
            assert!((back - mm).abs() < EPS);
        }
    }

    #[test]
    fn test_image_pixels_marker_size_inverse() {
        let scaler = scaler();
        // a 60px wide png at 72dpi holds a 48px marker
        assert!((scaler.image_pixels_to_marker_size(60.0) - scaler.pixels_to_mm(48.0)).abs() < EPS);
        for mm in [10.0, 28.0, 55.5] {
            let pixels = scaler.marker_size_to_image_pixels(mm);
            assert!((scaler.image_pixels_to_marker_size(pixels) - mm).abs() < EPS);
        }
    }

    #[test]
    fn test_image_size() {
        let scaler = scaler();
        assert_eq!(scaler.scaled_image_pixels(10), 100);
        assert!((scaler.image_size_mm(10) - 100.0 * 25.4 / 72.0).abs() < EPS);
    }
}
