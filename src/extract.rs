//! Text extraction for uploaded knowledge files.
//!
//! Uploads arrive as raw bytes plus a filename; this module returns
//! plain UTF-8 text ready for chunking, or a validation error the HTTP
//! layer maps to a client error. Supported extensions: `.txt`, `.md`
//! (UTF-8 text), `.pdf`, and `.docx`.

use std::io::Read;

/// Maximum decompressed bytes read from a DOCX ZIP entry.
const MAX_XML_ENTRY_BYTES: u64 = 50 * 1024 * 1024;

#[derive(Debug)]
pub enum ExtractError {
    UnsupportedExtension(String),
    EmptyFile,
    NotUtf8,
    NoText,
    Pdf(String),
    Docx(String),
}

impl std::fmt::Display for ExtractError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ExtractError::UnsupportedExtension(ext) => {
                write!(f, "unsupported file extension: .{}", ext)
            }
            ExtractError::EmptyFile => write!(f, "file is empty"),
            ExtractError::NotUtf8 => write!(f, "file must be valid UTF-8 text"),
            ExtractError::NoText => write!(f, "no text could be extracted from the file"),
            ExtractError::Pdf(e) => write!(f, "PDF extraction failed: {}", e),
            ExtractError::Docx(e) => write!(f, "DOCX extraction failed: {}", e),
        }
    }
}

impl std::error::Error for ExtractError {}

/// Extension of a filename, lowercased, without the dot.
fn extension(filename: &str) -> String {
    std::path::Path::new(filename)
        .extension()
        .map(|e| e.to_string_lossy().to_lowercase())
        .unwrap_or_default()
}

/// Parse uploaded bytes into plain text according to the filename's
/// extension. Rejects unsupported extensions, empty files, and content
/// that yields no text.
pub fn parse_upload(filename: &str, bytes: &[u8]) -> Result<String, ExtractError> {
    if bytes.is_empty() {
        return Err(ExtractError::EmptyFile);
    }

    let text = match extension(filename).as_str() {
        "txt" | "md" => String::from_utf8(bytes.to_vec()).map_err(|_| ExtractError::NotUtf8)?,
        "pdf" => pdf_extract::extract_text_from_mem(bytes)
            .map_err(|e| ExtractError::Pdf(e.to_string()))?,
        "docx" => extract_docx(bytes)?,
        other => return Err(ExtractError::UnsupportedExtension(other.to_string())),
    };

    if text.trim().is_empty() {
        return Err(ExtractError::NoText);
    }
    Ok(text)
}

fn extract_docx(bytes: &[u8]) -> Result<String, ExtractError> {
    let mut archive = zip::ZipArchive::new(std::io::Cursor::new(bytes))
        .map_err(|e| ExtractError::Docx(e.to_string()))?;

    let entry = archive
        .by_name("word/document.xml")
        .map_err(|_| ExtractError::Docx("word/document.xml not found".to_string()))?;

    let mut xml = Vec::new();
    entry
        .take(MAX_XML_ENTRY_BYTES)
        .read_to_end(&mut xml)
        .map_err(|e| ExtractError::Docx(e.to_string()))?;
    if xml.len() as u64 >= MAX_XML_ENTRY_BYTES {
        return Err(ExtractError::Docx(
            "word/document.xml exceeds size limit".to_string(),
        ));
    }

    text_runs(&xml)
}

/// Collect `w:t` text runs, separating paragraphs with newlines so the
/// chunker still sees paragraph boundaries.
fn text_runs(xml: &[u8]) -> Result<String, ExtractError> {
    let mut out = String::new();
    let mut reader = quick_xml::Reader::from_reader(xml);
    reader.config_mut().trim_text(true);
    let mut buf = Vec::new();
    let mut in_text = false;

    loop {
        match reader.read_event_into(&mut buf) {
            Ok(quick_xml::events::Event::Start(e)) => match e.local_name().as_ref() {
                b"t" => in_text = true,
                b"p" => {
                    if !out.is_empty() && !out.ends_with('\n') {
                        out.push('\n');
                    }
                }
                _ => {}
            },
            Ok(quick_xml::events::Event::Text(t)) if in_text => {
                out.push_str(t.unescape().unwrap_or_default().as_ref());
            }
            Ok(quick_xml::events::Event::End(e)) => {
                if e.local_name().as_ref() == b"t" {
                    in_text = false;
                }
            }
            Ok(quick_xml::events::Event::Eof) => break,
            Err(e) => return Err(ExtractError::Docx(e.to_string())),
            _ => {}
        }
        buf.clear();
    }

    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn plain_text_passes_through() {
        let text = parse_upload("yatra_schedule.txt", "Dates: 17th April".as_bytes()).unwrap();
        assert_eq!(text, "Dates: 17th April");
    }

    #[test]
    fn markdown_is_treated_as_text() {
        let text = parse_upload("faq.MD", "# Payments\n\nUPI accepted.".as_bytes()).unwrap();
        assert!(text.contains("UPI accepted."));
    }

    #[test]
    fn unsupported_extension_is_rejected() {
        let err = parse_upload("schedule.xlsx", b"data").unwrap_err();
        assert!(matches!(err, ExtractError::UnsupportedExtension(_)));
    }

    #[test]
    fn missing_extension_is_rejected() {
        let err = parse_upload("README", b"data").unwrap_err();
        assert!(matches!(err, ExtractError::UnsupportedExtension(_)));
    }

    #[test]
    fn empty_upload_is_rejected() {
        let err = parse_upload("notes.txt", b"").unwrap_err();
        assert!(matches!(err, ExtractError::EmptyFile));
    }

    #[test]
    fn invalid_utf8_is_rejected() {
        let err = parse_upload("notes.txt", &[0xff, 0xfe, 0x00]).unwrap_err();
        assert!(matches!(err, ExtractError::NotUtf8));
    }

    #[test]
    fn whitespace_only_text_is_rejected() {
        let err = parse_upload("notes.txt", b"   \n\n  ").unwrap_err();
        assert!(matches!(err, ExtractError::NoText));
    }

    #[test]
    fn invalid_pdf_is_rejected() {
        let err = parse_upload("brochure.pdf", b"not a pdf").unwrap_err();
        assert!(matches!(err, ExtractError::Pdf(_)));
    }

    #[test]
    fn invalid_docx_is_rejected() {
        let err = parse_upload("itinerary.docx", b"not a zip").unwrap_err();
        assert!(matches!(err, ExtractError::Docx(_)));
    }
}
