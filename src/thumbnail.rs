use eframe::egui::ColorImage;

use crate::error::{Error, Result};

/// Download and decode the thumbnail advertised in the video info.
///
/// Blocking; run it on a blocking thread.
pub fn fetch_thumbnail(url: &str) -> Result<ColorImage> {
    // Perform a blocking HTTP GET request
    let resp = reqwest::blocking::get(url)
        .and_then(|r| r.error_for_status())
        .and_then(|r| r.bytes())
        .map_err(|e| Error::Thumbnail(e.to_string()))?;
    decode_thumbnail(&resp)
}

/// Decode raw image bytes (JPEG, PNG, WebP) into an egui image.
pub fn decode_thumbnail(bytes: &[u8]) -> Result<ColorImage> {
    // Load image data into an image::DynamicImage and convert to RGBA8
    let img = image::load_from_memory(bytes)
        .map_err(|e| Error::Thumbnail(e.to_string()))?
        .to_rgba8();
    let size = [img.width() as usize, img.height() as usize];
    // Create a ColorImage from the raw RGBA bytes without premultiplying alpha
    Ok(ColorImage::from_rgba_unmultiplied(size, &img))
}
