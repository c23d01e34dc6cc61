use lopdf::{Dictionary, Document, Object};

use super::{ContentExtractor, DocumentMetadata, ExtractionStrategy};
use crate::core::ExtractedContent;
use crate::error::{DocdiffError, Result};

pub const PDF_SENTINEL: &str = "Error extracting PDF document content";

pub struct PdfExtractor {
    strategies: Vec<Box<dyn ExtractionStrategy>>,
}

impl PdfExtractor {
    pub fn new() -> Self {
        Self {
            strategies: vec![Box::new(PageText)],
        }
    }
}

impl Default for PdfExtractor {
    fn default() -> Self {
        Self::new()
    }
}

impl ContentExtractor for PdfExtractor {
    fn format_name(&self) -> &str {
        "pdf"
    }

    fn strategies(&self) -> &[Box<dyn ExtractionStrategy>] {
        &self.strategies
    }

    fn sentinel(&self) -> ExtractedContent {
        ExtractedContent::Text(PDF_SENTINEL.to_string())
    }

    fn metadata(&self, bytes: &[u8]) -> Result<DocumentMetadata> {
        let document = load(bytes)?;
        let mut metadata = DocumentMetadata::new();

        if let Some(info) = info_dictionary(&document) {
            for (key, value) in info.iter() {
                if let Some(text) = object_text(value) {
                    metadata.insert(String::from_utf8_lossy(key).into_owned(), text);
                }
            }
        }

        metadata.insert("page_count".to_string(), document.get_pages().len().to_string());
        Ok(metadata)
    }
}

/// Text of every page in page order, each followed by a newline
struct PageText;

impl ExtractionStrategy for PageText {
    fn name(&self) -> &'static str {
        "lopdf-pages"
    }

    fn extract(&self, bytes: &[u8]) -> Result<ExtractedContent> {
        let document = load(bytes)?;
        let mut text = String::new();

        for page_number in document.get_pages().keys() {
            let page_text = document
                .extract_text(&[*page_number])
                .map_err(|e| DocdiffError::Extraction(format!("page {}: {}", page_number, e)))?;
            text.push_str(&page_text);
            text.push('\n');
        }

        Ok(ExtractedContent::Text(text))
    }
}

fn load(bytes: &[u8]) -> Result<Document> {
    Document::load_mem(bytes).map_err(|e| DocdiffError::Extraction(format!("PDF load error: {}", e)))
}

fn info_dictionary(document: &Document) -> Option<&Dictionary> {
    match document.trailer.get(b"Info").ok()? {
        Object::Reference(id) => document.get_dictionary(*id).ok(),
        Object::Dictionary(dict) => Some(dict),
        _ => None,
    }
}

fn object_text(object: &Object) -> Option<String> {
    match object {
        Object::String(bytes, _) => Some(decode_pdf_string(bytes)),
        Object::Name(name) => Some(String::from_utf8_lossy(name).into_owned()),
        Object::Integer(n) => Some(n.to_string()),
        Object::Real(n) => Some(n.to_string()),
        Object::Boolean(b) => Some(b.to_string()),
        _ => None,
    }
}

/// PDF text strings are either UTF-16BE with a BOM or PDFDocEncoding
/// (treated as Latin-1, which matches it for printable characters).
fn decode_pdf_string(bytes: &[u8]) -> String {
    if bytes.starts_with(&[0xFE, 0xFF]) {
        let units: Vec<u16> = bytes[2..]
            .chunks_exact(2)
            .map(|pair| u16::from_be_bytes([pair[0], pair[1]]))
            .collect();
        String::from_utf16_lossy(&units)
    } else {
        bytes.iter().map(|&b| b as char).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use lopdf::content::{Content, Operation};
    use lopdf::{dictionary, Stream, StringFormat};

    fn build_pdf(pages: &[&str]) -> Vec<u8> {
        let mut doc = Document::with_version("1.5");
        let pages_id = doc.new_object_id();
        let font_id = doc.add_object(dictionary! {
            "Type" => "Font",
            "Subtype" => "Type1",
            "BaseFont" => "Courier",
        });
        let resources_id = doc.add_object(dictionary! {
            "Font" => dictionary! { "F1" => font_id },
        });

        let mut kids: Vec<Object> = Vec::new();
        for text in pages {
            let content = Content {
                operations: vec![
                    Operation::new("BT", vec![]),
                    Operation::new("Tf", vec!["F1".into(), 24.into()]),
                    Operation::new("Td", vec![100.into(), 600.into()]),
                    Operation::new("Tj", vec![Object::string_literal(*text)]),
                    Operation::new("ET", vec![]),
                ],
            };
            let content_id = doc.add_object(Stream::new(dictionary! {}, content.encode().unwrap()));
            let page_id = doc.add_object(dictionary! {
                "Type" => "Page",
                "Parent" => pages_id,
                "Contents" => content_id,
                "Resources" => resources_id,
            });
            kids.push(page_id.into());
        }

        let count = kids.len() as i64;
        doc.objects.insert(
            pages_id,
            Object::Dictionary(dictionary! {
                "Type" => "Pages",
                "Kids" => kids,
                "Count" => count,
                "Resources" => resources_id,
                "MediaBox" => vec![0.into(), 0.into(), 595.into(), 842.into()],
            }),
        );
        let catalog_id = doc.add_object(dictionary! {
            "Type" => "Catalog",
            "Pages" => pages_id,
        });
        let info_id = doc.add_object(dictionary! {
            "Title" => Object::String(b"Functional Program".to_vec(), StringFormat::Literal),
        });
        doc.trailer.set("Root", catalog_id);
        doc.trailer.set("Info", info_id);

        let mut bytes = Vec::new();
        doc.save_to(&mut bytes).unwrap();
        bytes
    }

    #[test]
    fn test_pages_extracted_in_order_with_trailing_newlines() {
        let bytes = build_pdf(&["First page", "Second page"]);
        let content = PdfExtractor::new().extract(&bytes);

        let ExtractedContent::Text(text) = content else {
            panic!("expected text content");
        };
        let first = text.find("First page").expect("first page text");
        let second = text.find("Second page").expect("second page text");
        assert!(first < second);
        assert!(text.ends_with('\n'));
    }

    #[test]
    fn test_metadata_includes_info_and_page_count() {
        let bytes = build_pdf(&["Only page"]);
        let metadata = PdfExtractor::new().metadata(&bytes).unwrap();
        assert_eq!(metadata.get("Title").map(String::as_str), Some("Functional Program"));
        assert_eq!(metadata.get("page_count").map(String::as_str), Some("1"));
    }

    #[test]
    fn test_unreadable_pdf_yields_sentinel() {
        let content = PdfExtractor::new().extract(b"%PDF-1.4 truncated garbage");
        assert_eq!(content, ExtractedContent::Text(PDF_SENTINEL.to_string()));
    }

    #[test]
    fn test_decode_utf16_string() {
        let bytes = [0xFE, 0xFF, 0x00, b'H', 0x00, b'i'];
        assert_eq!(decode_pdf_string(&bytes), "Hi");
    }
}
