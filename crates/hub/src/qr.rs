//! QR code rendering for the join URL.
//!
//! The browser shell shows a QR code that phones scan to land on the hub,
//! optionally straight into a session. The code is rendered as a PNG and
//! delivered inline as a base64 data URL.

use std::io::Cursor;

use base64::{engine::general_purpose::STANDARD as BASE64, Engine as _};
use image::{ImageBuffer, Luma};
use qrcode::QrCode;

/// QR code module size in pixels.
const PNG_MODULE_SIZE: u32 = 8;

/// Quiet zone (border) size in modules.
const PNG_QUIET_ZONE: u32 = 4;

/// Render `contents` as a PNG QR code wrapped in a data URL.
pub fn data_url(contents: &str) -> anyhow::Result<String> {
    let bytes = png_bytes(contents)?;
    Ok(format!("data:image/png;base64,{}", BASE64.encode(&bytes)))
}

/// Render `contents` as PNG bytes.
fn png_bytes(contents: &str) -> anyhow::Result<Vec<u8>> {
    let code = QrCode::new(contents.as_bytes())?;
    let modules = code.to_colors();
    let qr_width = code.width();

    // Calculate image dimensions
    let quiet_zone_pixels = PNG_QUIET_ZONE * PNG_MODULE_SIZE;
    let qr_pixels = qr_width as u32 * PNG_MODULE_SIZE;
    let image_size = qr_pixels + 2 * quiet_zone_pixels;

    // Grayscale buffer, white background; only dark modules get painted.
    let mut img: ImageBuffer<Luma<u8>, Vec<u8>> =
        ImageBuffer::from_pixel(image_size, image_size, Luma([255u8]));

    for (idx, color) in modules.iter().enumerate() {
        if *color != qrcode::Color::Dark {
            continue;
        }

        let row = (idx / qr_width) as u32;
        let col = (idx % qr_width) as u32;
        let x_start = quiet_zone_pixels + col * PNG_MODULE_SIZE;
        let y_start = quiet_zone_pixels + row * PNG_MODULE_SIZE;

        for dy in 0..PNG_MODULE_SIZE {
            for dx in 0..PNG_MODULE_SIZE {
                img.put_pixel(x_start + dx, y_start + dy, Luma([0u8]));
            }
        }
    }

    // Encode to PNG bytes
    let mut bytes = Vec::new();
    let mut cursor = Cursor::new(&mut bytes);
    img.write_to(&mut cursor, image::ImageFormat::Png)?;

    Ok(bytes)
}
