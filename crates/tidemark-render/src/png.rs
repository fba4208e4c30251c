//! PNG encoding of the drawing buffer

use crate::error::{RenderError, RenderResult};
use bytes::Bytes;
use image::codecs::png::PngEncoder;
use image::{ExtendedColorType, ImageEncoder};
use tidemark_draw::DrawingContext;

/// Encode the RGBA buffer of a drawing context as PNG
pub fn encode(drawing: &DrawingContext) -> RenderResult<Bytes> {
    let mut out = Vec::new();
    let encoder = PngEncoder::new(&mut out);
    encoder
        .write_image(
            &drawing.rgba_bytes(),
            drawing.width() as u32,
            drawing.height() as u32,
            ExtendedColorType::Rgba8,
        )
        .map_err(|e| RenderError::Encode(e.to_string()))?;
    Ok(Bytes::from(out))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_encode_produces_png_magic() {
        let mut drawing = DrawingContext::new(16, 16);
        drawing.set_pix(1, 1, tidemark_draw::convert_color(255, 0, 0, 255));
        let png = encode(&drawing).unwrap();
        assert_eq!(&png[..8], &[0x89, b'P', b'N', b'G', 0x0d, 0x0a, 0x1a, 0x0a]);
    }
}
