use super::{ContentExtractor, DocumentMetadata, ExtractionStrategy};
use crate::core::ExtractedContent;
use crate::error::Result;

/// Fallback for unrecognised extensions: treat the bytes as UTF-8 text
pub struct PlainTextExtractor {
    strategies: Vec<Box<dyn ExtractionStrategy>>,
}

impl PlainTextExtractor {
    pub fn new() -> Self {
        Self {
            strategies: vec![Box::new(LossyUtf8)],
        }
    }
}

impl Default for PlainTextExtractor {
    fn default() -> Self {
        Self::new()
    }
}

impl ContentExtractor for PlainTextExtractor {
    fn format_name(&self) -> &str {
        "text"
    }

    fn strategies(&self) -> &[Box<dyn ExtractionStrategy>] {
        &self.strategies
    }

    fn sentinel(&self) -> ExtractedContent {
        ExtractedContent::Text(String::new())
    }

    fn metadata(&self, bytes: &[u8]) -> Result<DocumentMetadata> {
        let text = decode_ignoring_invalid(bytes);
        let mut metadata = DocumentMetadata::new();
        metadata.insert("line_count".to_string(), text.lines().count().to_string());
        metadata.insert("byte_count".to_string(), bytes.len().to_string());
        Ok(metadata)
    }
}

struct LossyUtf8;

impl ExtractionStrategy for LossyUtf8 {
    fn name(&self) -> &'static str {
        "utf8"
    }

    fn extract(&self, bytes: &[u8]) -> Result<ExtractedContent> {
        Ok(ExtractedContent::Text(decode_ignoring_invalid(bytes)))
    }
}

/// Decode UTF-8, dropping invalid byte sequences rather than replacing them.
pub fn decode_ignoring_invalid(bytes: &[u8]) -> String {
    let mut text = String::with_capacity(bytes.len());
    for chunk in bytes.utf8_chunks() {
        text.push_str(chunk.valid());
    }
    text
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_invalid_bytes_are_dropped() {
        let bytes = b"caf\xC3\xA9 \xFF\xFEbar\n";
        assert_eq!(decode_ignoring_invalid(bytes), "café bar\n");
    }

    #[test]
    fn test_extract_text() {
        let extractor = PlainTextExtractor::new();
        assert_eq!(
            extractor.extract(b"line one\nline two"),
            ExtractedContent::Text("line one\nline two".to_string())
        );
        let metadata = extractor.metadata(b"a\nb\nc").unwrap();
        assert_eq!(metadata.get("line_count").map(String::as_str), Some("3"));
    }
}
