//! File-backed rendering: content tokens are image paths, frames are the
//! decoded images placed on a canvas of the document's size.

use std::fs::File;
use std::io::BufWriter;
use std::path::Path;

use sakuga_core::{FrameBuffer, PixelFormat, SakugaError, SakugaResult};
use sakuga_ir::{ContentRef, UnitSource};

use sakuga_export::FrameRenderer;

use crate::manifest::COMPOSITE_SEPARATOR;

/// Renders manifest content by decoding the referenced image files.
///
/// Composite tokens (flattened groups) decode every part and alpha-blend
/// them backmost first onto a transparent canvas.
pub struct ImageFileRenderer {
    width: u32,
    height: u32,
}

impl ImageFileRenderer {
    /// Canvas dimensions, normally the document's.
    pub fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    fn decode(&self, path: &str) -> SakugaResult<image::RgbaImage> {
        let decoded = image::open(path)
            .map_err(|e| SakugaError::Render(format!("failed to decode '{}': {}", path, e)))?;
        Ok(decoded.to_rgba8())
    }
}

impl FrameRenderer for ImageFileRenderer {
    fn render_frame(&self, _source: &UnitSource, content: &ContentRef) -> SakugaResult<FrameBuffer> {
        let mut frame = FrameBuffer::new(self.width, self.height, PixelFormat::Rgba8);
        for part in content.0.split(COMPOSITE_SEPARATOR) {
            let layer = self.decode(part)?;
            blend_over(&mut frame, &layer);
        }
        Ok(frame)
    }

    fn encode_image(&self, frame: &FrameBuffer, path: &Path) -> SakugaResult<()> {
        let file = File::create(path)
            .map_err(|e| SakugaError::encode(format!("failed to create file: {}", e), path))?;
        let writer = BufWriter::new(file);

        let mut encoder = png::Encoder::new(writer, frame.width, frame.height);
        encoder.set_color(match frame.format {
            PixelFormat::Rgba8 => png::ColorType::Rgba,
            PixelFormat::Rgb8 => png::ColorType::Rgb,
        });
        encoder.set_depth(png::BitDepth::Eight);

        let mut writer = encoder
            .write_header()
            .map_err(|e| SakugaError::encode(format!("failed to write PNG header: {}", e), path))?;
        writer
            .write_image_data(&frame.data)
            .map_err(|e| SakugaError::encode(format!("failed to write PNG data: {}", e), path))?;
        writer
            .finish()
            .map_err(|e| SakugaError::encode(format!("failed to finalize PNG: {}", e), path))?;
        Ok(())
    }
}

/// Source-over blend of `layer` onto `frame` at the origin, clipped to the
/// canvas.
fn blend_over(frame: &mut FrameBuffer, layer: &image::RgbaImage) {
    let width = layer.width().min(frame.width);
    let height = layer.height().min(frame.height);
    for y in 0..height {
        for x in 0..width {
            let src = layer.get_pixel(x, y).0;
            if src[3] == 0 {
                continue;
            }
            if src[3] == 255 {
                frame.set_pixel(x, y, src);
                continue;
            }
            let dst = match frame.get_pixel(x, y) {
                Some(p) => p,
                None => continue,
            };
            let sa = src[3] as u32;
            let da = dst[3] as u32;
            let out_a = sa + da * (255 - sa) / 255;
            let mut out = [0u8; 4];
            if out_a > 0 {
                for c in 0..3 {
                    let sc = src[c] as u32;
                    let dc = dst[c] as u32;
                    out[c] = ((sc * sa + dc * da * (255 - sa) / 255) / out_a) as u8;
                }
            }
            out[3] = out_a as u8;
            frame.set_pixel(x, y, out);
        }
    }
}
