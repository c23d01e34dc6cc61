//! Word (.docx / .doc) text extraction
//!
//! The rich strategy reads headers, the body (including table cells) and
//! footers, ending each paragraph with a blank line. The paragraph strategy
//! only looks at paragraphs that sit directly in the document body and joins
//! them with single newlines. Legacy binary `.doc` files are not OOXML, so
//! both strategies fail on them and the sentinel is used.

use quick_xml::events::Event;
use quick_xml::Reader;
use regex::Regex;

use super::ooxml::{core_properties, xml_err, OoxmlPackage};
use super::{ContentExtractor, DocumentMetadata, ExtractionStrategy};
use crate::core::ExtractedContent;
use crate::error::Result;

pub const WORD_SENTINEL: &str = "Error extracting Word document content";

const DOCUMENT_PART: &str = "word/document.xml";

pub struct WordExtractor {
    strategies: Vec<Box<dyn ExtractionStrategy>>,
}

impl WordExtractor {
    pub fn new() -> Self {
        Self {
            strategies: vec![Box::new(RichText::new()), Box::new(BodyParagraphs)],
        }
    }
}

impl Default for WordExtractor {
    fn default() -> Self {
        Self::new()
    }
}

impl ContentExtractor for WordExtractor {
    fn format_name(&self) -> &str {
        "word"
    }

    fn strategies(&self) -> &[Box<dyn ExtractionStrategy>] {
        &self.strategies
    }

    fn sentinel(&self) -> ExtractedContent {
        ExtractedContent::Text(WORD_SENTINEL.to_string())
    }

    fn metadata(&self, bytes: &[u8]) -> Result<DocumentMetadata> {
        let mut package = OoxmlPackage::open(bytes)?;
        core_properties(&mut package)
    }
}

struct RichText {
    header_pattern: Regex,
    footer_pattern: Regex,
}

impl RichText {
    fn new() -> Self {
        Self {
            header_pattern: Regex::new(r"^word/header[0-9]*\.xml$").expect("Invalid header part regex"),
            footer_pattern: Regex::new(r"^word/footer[0-9]*\.xml$").expect("Invalid footer part regex"),
        }
    }

    fn matching_parts(&self, package: &OoxmlPackage<'_>, pattern: &Regex) -> Vec<String> {
        let mut names: Vec<String> = package
            .part_names()
            .into_iter()
            .filter(|name| pattern.is_match(name))
            .collect();
        names.sort();
        names
    }
}

impl ExtractionStrategy for RichText {
    fn name(&self) -> &'static str {
        "ooxml-rich"
    }

    fn extract(&self, bytes: &[u8]) -> Result<ExtractedContent> {
        let mut package = OoxmlPackage::open(bytes)?;
        let mut text = String::new();

        for header in self.matching_parts(&package, &self.header_pattern) {
            text.push_str(&rich_part_text(&package.read_part(&header)?)?);
        }
        text.push_str(&rich_part_text(&package.read_part(DOCUMENT_PART)?)?);
        for footer in self.matching_parts(&package, &self.footer_pattern) {
            text.push_str(&rich_part_text(&package.read_part(&footer)?)?);
        }

        Ok(ExtractedContent::Text(text.trim().to_string()))
    }
}

/// All run text of a part: tabs and breaks are kept, every paragraph end
/// produces a blank line.
fn rich_part_text(xml: &[u8]) -> Result<String> {
    let mut reader = Reader::from_reader(xml);
    reader.config_mut().trim_text(false);
    let mut buf = Vec::new();
    let mut text = String::new();
    let mut in_text = false;
    // w:tab also appears inside w:tabs as a tab-stop definition
    let mut in_tab_stops = false;

    loop {
        match reader.read_event_into(&mut buf) {
            Ok(Event::Start(e)) => match e.local_name().as_ref() {
                b"t" => in_text = true,
                b"tabs" => in_tab_stops = true,
                _ => {}
            },
            Ok(Event::End(e)) => match e.local_name().as_ref() {
                b"t" => in_text = false,
                b"tabs" => in_tab_stops = false,
                b"p" => text.push_str("\n\n"),
                _ => {}
            },
            Ok(Event::Empty(e)) => match e.local_name().as_ref() {
                b"tab" if !in_tab_stops => text.push('\t'),
                b"br" | b"cr" => text.push('\n'),
                b"p" => text.push_str("\n\n"),
                _ => {}
            },
            Ok(Event::Text(t)) if in_text => {
                text.push_str(&t.unescape().map_err(xml_err)?);
            }
            Ok(Event::Eof) => break,
            Err(e) => return Err(xml_err(e)),
            _ => {}
        }
        buf.clear();
    }

    Ok(text)
}

struct BodyParagraphs;

impl ExtractionStrategy for BodyParagraphs {
    fn name(&self) -> &'static str {
        "ooxml-paragraphs"
    }

    fn extract(&self, bytes: &[u8]) -> Result<ExtractedContent> {
        let mut package = OoxmlPackage::open(bytes)?;
        let xml = package.read_part(DOCUMENT_PART)?;
        Ok(ExtractedContent::Text(body_paragraphs(&xml)?.join("\n")))
    }
}

/// Text of each paragraph whose parent is `w:body`; table content is skipped.
fn body_paragraphs(xml: &[u8]) -> Result<Vec<String>> {
    let mut reader = Reader::from_reader(xml);
    reader.config_mut().trim_text(false);
    let mut buf = Vec::new();
    let mut stack: Vec<Vec<u8>> = Vec::new();
    let mut paragraphs = Vec::new();
    // (depth of the open paragraph, its text so far)
    let mut current: Option<(usize, String)> = None;

    loop {
        match reader.read_event_into(&mut buf) {
            Ok(Event::Start(e)) => {
                let local = e.local_name().as_ref().to_vec();
                if local == b"p" && current.is_none() && innermost_is(&stack, b"body") {
                    current = Some((stack.len(), String::new()));
                }
                stack.push(local);
            }
            Ok(Event::End(_)) => {
                let closed = stack.pop();
                if let Some((depth, _)) = &current {
                    if closed.as_deref() == Some(&b"p"[..]) && stack.len() == *depth {
                        if let Some((_, text)) = current.take() {
                            paragraphs.push(text);
                        }
                    }
                }
            }
            Ok(Event::Empty(e)) => {
                let local = e.local_name();
                match (&mut current, local.as_ref()) {
                    (None, b"p") if innermost_is(&stack, b"body") => {
                        paragraphs.push(String::new());
                    }
                    (Some((_, text)), b"tab") if !stack.iter().any(|n| n == b"tabs") => text.push('\t'),
                    (Some((_, text)), b"br" | b"cr") => text.push('\n'),
                    _ => {}
                }
            }
            Ok(Event::Text(t)) => {
                if let Some((_, text)) = &mut current {
                    if innermost_is(&stack, b"t") {
                        text.push_str(&t.unescape().map_err(xml_err)?);
                    }
                }
            }
            Ok(Event::Eof) => break,
            Err(e) => return Err(xml_err(e)),
            _ => {}
        }
        buf.clear();
    }

    Ok(paragraphs)
}

fn innermost_is(stack: &[Vec<u8>], name: &[u8]) -> bool {
    stack.last().is_some_and(|open| open.as_slice() == name)
}

#[cfg(test)]
mod tests {
    use super::super::ooxml::fixtures::make_zip;
    use super::*;

    const DOCUMENT_XML: &[u8] = br#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<w:document xmlns:w="http://schemas.openxmlformats.org/wordprocessingml/2006/main">
  <w:body>
    <w:p><w:pPr><w:tabs><w:tab w:val="left" w:pos="720"/></w:tabs></w:pPr><w:r><w:t>Scope</w:t></w:r></w:p>
    <w:p><w:r><w:t xml:space="preserve">Item</w:t><w:tab/><w:t>Owner &amp; Date</w:t></w:r></w:p>
    <w:tbl>
      <w:tr><w:tc><w:p><w:r><w:t>Cell text</w:t></w:r></w:p></w:tc></w:tr>
    </w:tbl>
    <w:p/>
    <w:p><w:r><w:t>Closing</w:t></w:r></w:p>
    <w:sectPr/>
  </w:body>
</w:document>"#;

    const HEADER_XML: &[u8] = br#"<w:hdr xmlns:w="http://schemas.openxmlformats.org/wordprocessingml/2006/main"><w:p><w:r><w:t>Header line</w:t></w:r></w:p></w:hdr>"#;

    fn docx() -> Vec<u8> {
        make_zip(&[
            ("[Content_Types].xml", b"<Types/>"),
            ("word/document.xml", DOCUMENT_XML),
            ("word/header1.xml", HEADER_XML),
        ])
    }

    #[test]
    fn test_rich_extraction_includes_tables_and_headers() {
        let content = WordExtractor::new().extract(&docx());
        let ExtractedContent::Text(text) = content else {
            panic!("expected text content");
        };

        assert!(text.starts_with("Header line\n\nScope\n\nItem\tOwner & Date"));
        assert!(text.contains("Cell text"));
        assert!(text.ends_with("Closing"));
    }

    #[test]
    fn test_body_paragraphs_skip_tables() {
        let paragraphs = body_paragraphs(DOCUMENT_XML).unwrap();
        assert_eq!(paragraphs, vec!["Scope", "Item\tOwner & Date", "", "Closing"]);
    }

    #[test]
    fn test_paragraph_fallback_when_header_is_broken() {
        let bytes = make_zip(&[
            ("word/document.xml", DOCUMENT_XML),
            ("word/header1.xml", b"<w:hdr><w:p></w:hdr>"),
        ]);
        let content = WordExtractor::new().extract(&bytes);
        assert_eq!(
            content,
            ExtractedContent::Text("Scope\nItem\tOwner & Date\n\nClosing".to_string())
        );
    }

    #[test]
    fn test_legacy_binary_doc_yields_sentinel() {
        let bytes = [0xD0, 0xCF, 0x11, 0xE0, 0xA1, 0xB1, 0x1A, 0xE1, 0x00, 0x00];
        assert_eq!(
            WordExtractor::new().extract(&bytes),
            ExtractedContent::Text(WORD_SENTINEL.to_string())
        );
    }
}
