//! Desktop screenshots via the `screenshots` crate.
//!
//! The grab itself is only compiled with the `screen` feature. Without it,
//! [`DesktopCapturer`] returns `LoreError::Capture`. Encoding is always
//! available: frames are downscaled to `max_width` and written as JPEG or
//! PNG.

use std::io::Cursor;

use async_trait::async_trait;
use image::codecs::jpeg::JpegEncoder;
use image::imageops::FilterType;
use image::{DynamicImage, ImageFormat, RgbaImage};
#[cfg(feature = "screen")]
use tracing::{debug, warn};
#[cfg(not(feature = "screen"))]
use tracing::warn;

use loremaster_core::config::ScreenshotConfig;
use loremaster_core::error::{LoreError, Result};

use crate::ScreenCapturer;

/// Captures one monitor of the local desktop.
#[derive(Debug, Clone)]
pub struct DesktopCapturer {
    config: ScreenshotConfig,
}

impl DesktopCapturer {
    pub fn new(config: ScreenshotConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &ScreenshotConfig {
        &self.config
    }

    /// Whether this build can grab the desktop (the `screen` feature).
    pub const fn is_available() -> bool {
        cfg!(feature = "screen")
    }
}

// =============================================================================
// Capture
// =============================================================================

#[cfg(feature = "screen")]
#[async_trait]
impl ScreenCapturer for DesktopCapturer {
    async fn capture_screen(&self) -> Result<Vec<u8>> {
        let config = self.config.clone();
        tokio::task::spawn_blocking(move || {
            let frame = grab_monitor(config.monitor_index)?;
            let bytes = encode_frame(frame, &config)?;
            debug!(bytes = bytes.len(), format = %config.format, "Screenshot captured");
            Ok(bytes)
        })
        .await
        .map_err(|e| LoreError::Capture(format!("capture task failed: {}", e)))?
    }
}

#[cfg(not(feature = "screen"))]
#[async_trait]
impl ScreenCapturer for DesktopCapturer {
    async fn capture_screen(&self) -> Result<Vec<u8>> {
        warn!("Screen capture requested but the `screen` feature is not enabled");
        Err(LoreError::Capture(
            "screen capture is not available in this build (enable the `screen` feature)"
                .to_string(),
        ))
    }
}

/// Grab monitor `index`, falling back to the primary monitor when the index
/// is out of range.
#[cfg(feature = "screen")]
fn grab_monitor(index: usize) -> Result<RgbaImage> {
    let mut screens = screenshots::Screen::all()
        .map_err(|e| LoreError::Capture(format!("failed to enumerate monitors: {}", e)))?;

    if screens.is_empty() {
        return Err(LoreError::Capture("no monitors found".to_string()));
    }

    let screen = if index < screens.len() {
        screens.swap_remove(index)
    } else {
        warn!(
            monitor_index = index,
            available = screens.len(),
            "Monitor index out of range, using primary monitor"
        );
        let primary = screens
            .iter()
            .position(|s| s.display_info.is_primary)
            .unwrap_or(0);
        screens.swap_remove(primary)
    };

    let shot = screen
        .capture()
        .map_err(|e| LoreError::Capture(format!("screen capture failed: {}", e)))?;

    // Rebuild through the raw buffer so the capture backend's image version
    // does not have to match ours.
    let (width, height) = (shot.width(), shot.height());
    RgbaImage::from_raw(width, height, shot.into_raw())
        .ok_or_else(|| LoreError::Capture("capture buffer size mismatch".to_string()))
}

// =============================================================================
// Encoding
// =============================================================================

/// Downscale `frame` to the configured width and encode it.
///
/// `format` "png" writes PNG; anything else writes JPEG at `quality`.
pub fn encode_frame(frame: RgbaImage, config: &ScreenshotConfig) -> Result<Vec<u8>> {
    let mut img = DynamicImage::ImageRgba8(frame);

    if config.max_width > 0 && img.width() > config.max_width {
        let height = (u64::from(img.height()) * u64::from(config.max_width)
            / u64::from(img.width()))
        .max(1) as u32;
        img = img.resize_exact(config.max_width, height, FilterType::Triangle);
    }

    let mut buf = Cursor::new(Vec::new());
    let encoded = if config.format.eq_ignore_ascii_case("png") {
        img.write_to(&mut buf, ImageFormat::Png)
    } else {
        // JPEG has no alpha channel.
        let rgb = DynamicImage::ImageRgb8(img.to_rgb8());
        let quality = config.quality.clamp(1, 100);
        rgb.write_with_encoder(JpegEncoder::new_with_quality(&mut buf, quality))
    };
    encoded.map_err(|e| LoreError::Capture(format!("image encoding failed: {}", e)))?;

    Ok(buf.into_inner())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn gradient(width: u32, height: u32) -> RgbaImage {
        RgbaImage::from_fn(width, height, |x, y| {
            image::Rgba([(x % 256) as u8, (y % 256) as u8, 128, 255])
        })
    }

    fn config(format: &str, max_width: u32) -> ScreenshotConfig {
        ScreenshotConfig {
            format: format.to_string(),
            max_width,
            ..ScreenshotConfig::default()
        }
    }

    #[test]
    fn test_encode_jpeg_downscales_wide_frames() {
        let bytes = encode_frame(gradient(400, 200), &config("jpeg", 100)).unwrap();
        assert!(bytes.starts_with(&[0xFF, 0xD8]));

        let decoded = image::load_from_memory(&bytes).unwrap();
        assert_eq!(decoded.width(), 100);
        assert_eq!(decoded.height(), 50);
    }

    #[test]
    fn test_encode_png_keeps_narrow_frames() {
        let bytes = encode_frame(gradient(64, 48), &config("PNG", 1280)).unwrap();
        assert!(bytes.starts_with(&[0x89, b'P', b'N', b'G']));

        let decoded = image::load_from_memory(&bytes).unwrap();
        assert_eq!(decoded.width(), 64);
        assert_eq!(decoded.height(), 48);
    }

    #[test]
    fn test_encode_zero_max_width_keeps_native_size() {
        let bytes = encode_frame(gradient(300, 10), &config("jpeg", 0)).unwrap();
        let decoded = image::load_from_memory(&bytes).unwrap();
        assert_eq!(decoded.width(), 300);
    }

    #[test]
    fn test_unknown_format_falls_back_to_jpeg() {
        let bytes = encode_frame(gradient(16, 16), &config("bmp", 1280)).unwrap();
        assert!(bytes.starts_with(&[0xFF, 0xD8]));
    }

    #[test]
    fn test_availability_follows_screen_feature() {
        assert_eq!(DesktopCapturer::is_available(), cfg!(feature = "screen"));
    }

    #[cfg(not(feature = "screen"))]
    #[tokio::test]
    async fn test_capture_without_feature_is_an_error() {
        let capturer = DesktopCapturer::new(ScreenshotConfig::default());
        let err = capturer.capture_screen().await.unwrap_err();
        assert!(matches!(err, LoreError::Capture(_)));
    }
}
