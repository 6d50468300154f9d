pub mod rasterizer;

use std::ops::ControlFlow;
use std::path::Path;

use base64::Engine;
use base64::engine::general_purpose::STANDARD;

use crate::error::DocumentOpenError;

pub use rasterizer::PdfiumRasterizer;

/// MIME type of every [`PageImage`] buffer.
pub const PAGE_IMAGE_MIME: &str = "image/png";

/// A rendered page held in memory as PNG bytes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageImage {
    /// Zero-based position of the page in the document.
    pub page_index: usize,
    pub width: u32,
    pub height: u32,
    pub png: Vec<u8>,
}

impl PageImage {
    /// Base64 encoding used for inline transport to the completion service.
    pub fn to_base64(&self) -> String {
        STANDARD.encode(&self.png)
    }
}

/// Renders document pages one at a time.
///
/// Each page is handed to `sink` as soon as it is rendered and released
/// afterwards. Returning [`ControlFlow::Break`] from the sink stops rendering.
/// A call reads the document from scratch; there is no way to resume.
pub trait Rasterizer: Send + Sync {
    /// Returns the number of pages delivered to `sink`.
    fn rasterize(
        &self,
        path: &Path,
        sink: &mut dyn FnMut(PageImage) -> ControlFlow<()>,
    ) -> Result<usize, DocumentOpenError>;
}

/// Reject sources that do not carry a PDF header within the first kilobyte.
pub fn check_pdf_header(path: &Path, bytes: &[u8]) -> Result<(), DocumentOpenError> {
    let head = &bytes[..bytes.len().min(1024)];
    if head.windows(5).any(|w| w == b"%PDF-") {
        Ok(())
    } else {
        Err(DocumentOpenError::new(path, "not a PDF document"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pdf_header_accepted() {
        assert!(check_pdf_header(Path::new("deck.pdf"), b"%PDF-1.7\n...").is_ok());
    }

    #[test]
    fn pdf_header_after_leading_bytes_accepted() {
        let mut bytes = vec![0u8; 16];
        bytes.extend_from_slice(b"%PDF-1.4");
        assert!(check_pdf_header(Path::new("deck.pdf"), &bytes).is_ok());
    }

    #[test]
    fn non_pdf_rejected() {
        let err = check_pdf_header(Path::new("notes.txt"), b"hello world").unwrap_err();
        assert_eq!(err.to_string(), "cannot open document notes.txt: not a PDF document");
    }

    #[test]
    fn empty_file_rejected() {
        assert!(check_pdf_header(Path::new("empty.pdf"), b"").is_err());
    }

    #[test]
    fn page_image_base64() {
        let image = PageImage {
            page_index: 0,
            width: 1,
            height: 1,
            png: b"png".to_vec(),
        };
        assert_eq!(image.to_base64(), "cG5n");
    }
}
