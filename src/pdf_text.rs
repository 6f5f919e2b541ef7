//! PDF text extraction wrapper
//!
//! Wraps the pdf-extract crate with error handling for encrypted,
//! scanned/image-only, and corrupted PDFs. Extraction is CPU-bound; callers
//! in async context run it under `spawn_blocking`.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum PdfError {
    #[error("failed to read uploaded file: {0}")]
    Io(#[from] std::io::Error),
    #[error("failed to extract text from PDF: {0}")]
    Extract(#[from] pdf_extract::OutputError),
}

/// Extract the full plain text from PDF bytes.
///
/// Scanned PDFs with no text layer come back as an empty (or
/// whitespace-only) string, not an error.
pub fn extract_text(bytes: &[u8]) -> Result<String, PdfError> {
    let text = pdf_extract::extract_text_from_mem(bytes)?;
    Ok(text)
}

/// Build a valid single-page PDF containing `text` as one text run.
/// `text` must not contain parentheses or backslashes (PDF string syntax).
#[cfg(test)]
pub(crate) fn minimal_pdf(text: &str) -> Vec<u8> {
    let content = format!("BT /F1 12 Tf 72 720 Td ({}) Tj ET", text);
    let objects = [
        "<< /Type /Catalog /Pages 2 0 R >>".to_string(),
        "<< /Type /Pages /Kids [3 0 R] /Count 1 >>".to_string(),
        "<< /Type /Page /Parent 2 0 R /MediaBox [0 0 612 792] \
         /Resources << /Font << /F1 5 0 R >> >> /Contents 4 0 R >>"
            .to_string(),
        format!(
            "<< /Length {} >>\nstream\n{}\nendstream",
            content.len(),
            content
        ),
        "<< /Type /Font /Subtype /Type1 /BaseFont /Helvetica >>".to_string(),
    ];

    let mut pdf = String::from("%PDF-1.4\n");
    let mut offsets = Vec::new();
    for (i, obj) in objects.iter().enumerate() {
        offsets.push(pdf.len());
        pdf.push_str(&format!("{} 0 obj\n{}\nendobj\n", i + 1, obj));
    }
    let xref_pos = pdf.len();
    pdf.push_str(&format!("xref\n0 {}\n0000000000 65535 f \n", objects.len() + 1));
    for offset in &offsets {
        pdf.push_str(&format!("{:010} 00000 n \n", offset));
    }
    pdf.push_str(&format!(
        "trailer\n<< /Size {} /Root 1 0 R >>\nstartxref\n{}\n%%EOF\n",
        objects.len() + 1,
        xref_pos
    ));
    pdf.into_bytes()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_extracts_text_from_simple_pdf() {
        let bytes = minimal_pdf("Hello paperchat");
        let text = extract_text(&bytes).unwrap();
        assert!(text.contains("Hello paperchat"), "got: {:?}", text);
    }

    #[test]
    fn test_garbage_bytes_fail_extraction() {
        assert!(extract_text(b"this is not a pdf at all").is_err());
    }
}
