use std::ops::ControlFlow;
use std::path::{Path, PathBuf};

use image::codecs::png::PngEncoder;
use image::{ExtendedColorType, ImageEncoder};
use pdfium_render::prelude::*;
use tracing::debug;

use super::{PageImage, Rasterizer};
use crate::config::IMAGE_RESOLUTION_SCALE;
use crate::error::DocumentOpenError;

/// Renders PDF pages through the pdfium library.
///
/// Pdfium handles are not `Send`, so the library is bound inside each
/// [`rasterize`](Rasterizer::rasterize) call on the calling thread.
#[derive(Debug, Clone)]
pub struct PdfiumRasterizer {
    /// Directory holding the pdfium shared library. `None` uses the system
    /// library search path.
    library_dir: Option<PathBuf>,
    scale: f32,
}

impl PdfiumRasterizer {
    pub fn new(library_dir: Option<PathBuf>) -> Self {
        Self {
            library_dir,
            scale: IMAGE_RESOLUTION_SCALE,
        }
    }

    /// Override the render scale. Values below 1.0 are clamped to 1.0.
    #[must_use]
    pub fn with_scale(mut self, scale: f32) -> Self {
        self.scale = scale.max(1.0);
        self
    }

    fn bind(&self) -> Result<Pdfium, PdfiumError> {
        let bindings = match &self.library_dir {
            Some(dir) => {
                Pdfium::bind_to_library(Pdfium::pdfium_platform_library_name_at_path(dir))?
            }
            None => Pdfium::bind_to_system_library()?,
        };
        Ok(Pdfium::new(bindings))
    }
}

impl Rasterizer for PdfiumRasterizer {
    fn rasterize(
        &self,
        path: &Path,
        sink: &mut dyn FnMut(PageImage) -> ControlFlow<()>,
    ) -> Result<usize, DocumentOpenError> {
        let pdfium = self
            .bind()
            .map_err(|e| DocumentOpenError::new(path, format!("pdfium unavailable: {e}")))?;
        let document = pdfium
            .load_pdf_from_file(path, None)
            .map_err(|e| DocumentOpenError::new(path, e.to_string()))?;

        let config = PdfRenderConfig::new().scale_page_by_factor(self.scale);
        let mut delivered = 0;
        for (page_index, page) in document.pages().iter().enumerate() {
            let bitmap = page.render_with_config(&config).map_err(|e| {
                DocumentOpenError::new(path, format!("failed to render page {page_index}: {e}"))
            })?;
            let width = u32::try_from(bitmap.width()).unwrap_or_default();
            let height = u32::try_from(bitmap.height()).unwrap_or_default();
            let png = encode_png(&bitmap.as_rgba_bytes(), width, height).map_err(|e| {
                DocumentOpenError::new(path, format!("failed to encode page {page_index}: {e}"))
            })?;
            debug!(page_index, width, height, bytes = png.len(), "Rendered page");

            delivered += 1;
            let image = PageImage {
                page_index,
                width,
                height,
                png,
            };
            if sink(image).is_break() {
                break;
            }
        }
        Ok(delivered)
    }
}

/// Encode raw RGBA pixels as PNG.
pub fn encode_png(rgba: &[u8], width: u32, height: u32) -> image::ImageResult<Vec<u8>> {
    let mut png = Vec::new();
    PngEncoder::new(&mut png).write_image(rgba, width, height, ExtendedColorType::Rgba8)?;
    Ok(png)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn encode_png_produces_png_signature() {
        let rgba = vec![255u8; 2 * 2 * 4];
        let png = encode_png(&rgba, 2, 2).unwrap();
        assert_eq!(&png[..8], b"\x89PNG\r\n\x1a\n");
    }

    #[test]
    fn encode_png_rejects_short_buffer() {
        assert!(encode_png(&[0u8; 3], 2, 2).is_err());
    }

    #[test]
    fn scale_is_clamped_to_base_resolution() {
        let rasterizer = PdfiumRasterizer::new(None).with_scale(0.5);
        assert!((rasterizer.scale - 1.0).abs() < f32::EPSILON);
        let rasterizer = PdfiumRasterizer::new(None);
        assert!((rasterizer.scale - IMAGE_RESOLUTION_SCALE).abs() < f32::EPSILON);
    }

    #[test]
    #[ignore = "requires the pdfium shared library"]
    fn unparsable_document_is_rejected() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("broken.pdf");
        std::fs::write(&path, b"%PDF-1.7\nnot really a pdf").unwrap();

        let result = PdfiumRasterizer::new(None).rasterize(&path, &mut |_| ControlFlow::Continue(()));
        assert!(result.is_err());
    }
}
