use super::types::DocumentKind;
use super::AcquisitionError;

/// Only the first 256KB of a PDF are scanned for text operators.
const PDF_SNIFF_BYTES: usize = 256 * 1024;

/// Only the first 4KB are checked when deciding whether bytes are text.
const TEXT_SNIFF_BYTES: usize = 4096;

/// Detect the document kind from magic bytes (NOT file extensions).
pub fn detect_kind(bytes: &[u8]) -> Result<DocumentKind, AcquisitionError> {
    if bytes.is_empty() {
        return Err(AcquisitionError::EmptyDocument);
    }

    let head = &bytes[..bytes.len().min(12)];
    let kind = match head {
        // PDF: starts with %PDF
        [0x25, 0x50, 0x44, 0x46, ..] => {
            if pdf_has_text_layer(bytes) {
                DocumentKind::NativePdf
            } else {
                DocumentKind::ScannedPdf
            }
        }
        // JPEG: starts with FF D8 FF
        [0xFF, 0xD8, 0xFF, ..] => DocumentKind::Image,
        // PNG: starts with 89 50 4E 47
        [0x89, 0x50, 0x4E, 0x47, ..] => DocumentKind::Image,
        // TIFF: little-endian (49 49 2A 00) or big-endian (4D 4D 00 2A)
        [0x49, 0x49, 0x2A, 0x00, ..] | [0x4D, 0x4D, 0x00, 0x2A, ..] => DocumentKind::Image,
        _ if is_likely_text(bytes) => DocumentKind::PlainText,
        _ => return Err(AcquisitionError::UnsupportedFormat),
    };

    tracing::debug!(kind = kind.as_str(), size = bytes.len(), "Detected document kind");
    Ok(kind)
}

/// Heuristic: >= 3 text operators (BT/ET/Tj/TJ/Tf) suggests a text layer.
fn pdf_has_text_layer(bytes: &[u8]) -> bool {
    let window = &bytes[..bytes.len().min(PDF_SNIFF_BYTES)];
    let content = String::from_utf8_lossy(window);

    let text_markers = ["BT", "ET", " Tj", " TJ", " Tf"];
    let marker_count: usize = text_markers
        .iter()
        .map(|m| content.matches(m).count())
        .sum();

    marker_count >= 3
}

/// Valid UTF-8 with at least 80% printable characters (or whitespace).
fn is_likely_text(bytes: &[u8]) -> bool {
    let window = &bytes[..bytes.len().min(TEXT_SNIFF_BYTES)];
    let text = match std::str::from_utf8(window) {
        Ok(t) => t,
        // A multi-byte char cut at the window edge is still text
        Err(e) if e.error_len().is_none() && e.valid_up_to() > 0 => {
            window_str_prefix(window, e.valid_up_to())
        }
        Err(_) => return false,
    };

    let total = text.chars().count();
    if total == 0 {
        return false;
    }
    let printable = text
        .chars()
        .filter(|c| !c.is_control() || c.is_whitespace())
        .count();
    printable as f64 / total as f64 > 0.80
}

fn window_str_prefix(window: &[u8], valid_up_to: usize) -> &str {
    // valid_up_to marks a UTF-8 boundary, so this cannot fail
    std::str::from_utf8(&window[..valid_up_to]).unwrap_or_default()
}

impl std::str::FromStr for DocumentKind {
    type Err = AcquisitionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().replace('-', "_").as_str() {
            "native_pdf" | "pdf" => Ok(Self::NativePdf),
            "scanned_pdf" => Ok(Self::ScannedPdf),
            "image" => Ok(Self::Image),
            "plain_text" | "text" => Ok(Self::PlainText),
            _ => Err(AcquisitionError::UnsupportedFormat),
        }
    }
}

#[cfg(test)]
pub(crate) mod fixtures {
    /// One-page PDF whose content stream is FlateDecode-compressed, so no
    /// text operators are visible in the raw bytes.
    pub const COMPRESSED_PDF: &[u8] = b"%PDF-1.7\n\
1 0 obj\n<< /Type /Catalog /Pages 2 0 R >>\nendobj\n\
4 0 obj\n<< /Length 22 /Filter /FlateDecode >>\nstream\n\
x\x9c\x0b\xf1\x52\x30\xd4\x33\x50\x08\x49\x2d\xae\xd1\x03\x00\x1d\x8b\x04\x5a\n\
endstream\nendobj\ntrailer\n<< /Root 1 0 R >>\n%%EOF\n";
}
