//! Glyph rasterization
//!
//! Text draws through grayscale coverage masks blitted by the drawing
//! context. The [`FontManager`] caches rasterized glyphs per size; the
//! [`FontBook`] hands out managers per font role and size.
//!
//! The server runs without a font file too (headless tests, minimal
//! installs); text rules then skip silently.

use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;
use tidemark_core::bbox::PixelBox;

/// Font roles of the renderer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FontType {
    /// Feature text
    Text,
    /// Sounding digits
    Sounding,
}

/// One rasterized glyph
#[derive(Debug, Clone)]
pub struct Glyph {
    /// Mask width
    pub width: i32,
    /// Mask height
    pub height: i32,
    /// Horizontal offset from the pen position to the mask origin
    pub pivot_x: i32,
    /// Vertical offset from the baseline to the mask top
    pub pivot_y: i32,
    /// Pen advance after this glyph
    pub advance_x: i32,
    /// Grayscale coverage, row major
    pub mask: Arc<Vec<u8>>,
}

/// Rasterizes and caches glyphs of one font at one size
pub struct FontManager {
    font: fontdue::Font,
    size: f32,
    glyphs: Mutex<HashMap<char, Arc<Glyph>>>,
}

impl FontManager {
    /// Create from raw font data (ttf/otf)
    pub fn new(data: &[u8], size: i32) -> Result<Self, String> {
        let font = fontdue::Font::from_bytes(data, fontdue::FontSettings::default())?;
        Ok(FontManager {
            font,
            size: size as f32,
            glyphs: Mutex::new(HashMap::new()),
        })
    }

    /// Rasterize (or fetch) a glyph
    pub fn glyph(&self, c: char) -> Arc<Glyph> {
        if let Some(g) = self.glyphs.lock().get(&c) {
            return g.clone();
        }
        let (metrics, bitmap) = self.font.rasterize(c, self.size);
        let glyph = Arc::new(Glyph {
            width: metrics.width as i32,
            height: metrics.height as i32,
            pivot_x: metrics.xmin,
            pivot_y: -(metrics.ymin + metrics.height as i32),
            advance_x: metrics.advance_width.round() as i32,
            mask: Arc::new(bitmap),
        });
        self.glyphs.lock().insert(c, glyph.clone());
        glyph
    }

    /// Kerning between two glyphs in pixels
    pub fn kern_x(&self, a: char, b: char) -> i32 {
        self.font
            .horizontal_kern(a, b, self.size)
            .map(|k| k.round() as i32)
            .unwrap_or(0)
    }

    /// Advance width of a whole string
    pub fn text_width(&self, text: &str) -> i32 {
        let chars: Vec<char> = text.chars().collect();
        let mut width = 0;
        for (i, c) in chars.iter().enumerate() {
            width += self.glyph(*c).advance_x;
            if i + 1 < chars.len() {
                width += self.kern_x(*c, chars[i + 1]);
            }
        }
        width
    }

    /// Nominal line height
    pub fn line_height(&self) -> i32 {
        let metrics = self.font.horizontal_line_metrics(self.size);
        match metrics {
            Some(m) => (m.ascent - m.descent).round() as i32,
            None => self.size.round() as i32,
        }
    }

    /// The pixel box a string occupies relative to its pen origin
    pub fn measure(&self, text: &str) -> PixelBox {
        let width = self.text_width(text);
        let height = self.line_height();
        PixelBox::new(0, -height, width, 0)
    }
}

/// Shared font managers per role and size
pub struct FontBook {
    data: Vec<u8>,
    managers: Mutex<HashMap<(FontType, i32), Arc<FontManager>>>,
}

/// Default body size when a text rule carries none
pub const DEFAULT_FONT_SIZE: i32 = 16;
/// Size of the sounding digit font
pub const SOUNDING_FONT_SIZE: i32 = 12;

impl FontBook {
    /// Create from raw font data; fails when the data is no font
    pub fn new(data: Vec<u8>) -> Result<Self, String> {
        // validate once so later lookups cannot fail
        FontManager::new(&data, DEFAULT_FONT_SIZE)?;
        Ok(FontBook {
            data,
            managers: Mutex::new(HashMap::new()),
        })
    }

    /// The manager for a role and size
    pub fn manager(&self, font_type: FontType, size: i32) -> Arc<FontManager> {
        let size = if size > 3 { size } else { DEFAULT_FONT_SIZE };
        let mut managers = self.managers.lock();
        managers
            .entry((font_type, size))
            .or_insert_with(|| {
                Arc::new(FontManager::new(&self.data, size).expect("font validated at creation"))
            })
            .clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_invalid_font_data_rejected() {
        assert!(FontBook::new(vec![1, 2, 3]).is_err());
    }
}
