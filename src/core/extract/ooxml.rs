//! ZIP-based Office Open XML package access shared by the Word and
//! spreadsheet extractors.

use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;
use std::io::{Cursor, Read};
use zip::result::ZipError;
use zip::ZipArchive;

use super::DocumentMetadata;
use crate::error::{DocdiffError, Result};

/// Largest single part we are willing to inflate
const MAX_PART_BYTES: u64 = 100 * 1024 * 1024;

pub struct OoxmlPackage<'a> {
    archive: ZipArchive<Cursor<&'a [u8]>>,
}

impl<'a> OoxmlPackage<'a> {
    pub fn open(bytes: &'a [u8]) -> Result<Self> {
        let archive = ZipArchive::new(Cursor::new(bytes)).map_err(|e| match e {
            ZipError::InvalidArchive(_) | ZipError::UnsupportedArchive(_) => {
                DocdiffError::Extraction("not a ZIP container".to_string())
            }
            other => DocdiffError::Extraction(other.to_string()),
        })?;
        Ok(Self { archive })
    }

    pub fn read_part(&mut self, name: &str) -> Result<Vec<u8>> {
        let mut file = self
            .archive
            .by_name(name)
            .map_err(|e| DocdiffError::Extraction(format!("part '{}': {}", name, e)))?;

        if file.size() > MAX_PART_BYTES {
            return Err(DocdiffError::Extraction(format!(
                "part '{}' is too large: {} bytes",
                name,
                file.size()
            )));
        }

        let mut buf = Vec::with_capacity(file.size() as usize);
        file.read_to_end(&mut buf)?;
        Ok(buf)
    }

    pub fn read_optional_part(&mut self, name: &str) -> Result<Option<Vec<u8>>> {
        if self.archive.index_for_name(name).is_none() {
            return Ok(None);
        }
        self.read_part(name).map(Some)
    }

    pub fn part_names(&self) -> Vec<String> {
        self.archive.file_names().map(str::to_string).collect()
    }
}

/// Read `docProps/core.xml` into python-docx style property names.
pub fn core_properties(package: &mut OoxmlPackage<'_>) -> Result<DocumentMetadata> {
    match package.read_optional_part("docProps/core.xml")? {
        Some(xml) => parse_core_properties(&xml),
        None => Ok(DocumentMetadata::new()),
    }
}

pub fn parse_core_properties(xml: &[u8]) -> Result<DocumentMetadata> {
    let mut reader = Reader::from_reader(xml);
    reader.config_mut().trim_text(true);
    let mut buf = Vec::new();
    let mut metadata = DocumentMetadata::new();
    let mut depth = 0usize;
    let mut current: Option<&'static str> = None;

    loop {
        match reader.read_event_into(&mut buf) {
            Ok(Event::Start(e)) => {
                depth += 1;
                // depth 1 is the coreProperties root
                if depth == 2 {
                    current = core_property_name(e.local_name().as_ref());
                }
            }
            Ok(Event::Text(t)) => {
                if let Some(name) = current {
                    let value = t.unescape().map_err(xml_err)?;
                    let value = value.trim();
                    if !value.is_empty() {
                        metadata.insert(name.to_string(), value.to_string());
                    }
                }
            }
            Ok(Event::End(_)) => {
                if depth == 2 {
                    current = None;
                }
                depth = depth.saturating_sub(1);
            }
            Ok(Event::Eof) => break,
            Err(e) => return Err(xml_err(e)),
            _ => {}
        }
        buf.clear();
    }

    Ok(metadata)
}

fn core_property_name(local: &[u8]) -> Option<&'static str> {
    Some(match local {
        b"creator" => "author",
        b"category" => "category",
        b"description" => "comments",
        b"contentStatus" => "content_status",
        b"created" => "created",
        b"identifier" => "identifier",
        b"keywords" => "keywords",
        b"language" => "language",
        b"lastModifiedBy" => "last_modified_by",
        b"lastPrinted" => "last_printed",
        b"modified" => "modified",
        b"revision" => "revision",
        b"subject" => "subject",
        b"title" => "title",
        b"version" => "version",
        _ => return None,
    })
}

pub fn attr_value(element: &BytesStart<'_>, key: &[u8]) -> Result<Option<String>> {
    for attr in element.attributes() {
        let attr = attr.map_err(|e| DocdiffError::Extraction(e.to_string()))?;
        if attr.key.as_ref() == key {
            return Ok(Some(attr.unescape_value().map_err(xml_err)?.into_owned()));
        }
    }
    Ok(None)
}

pub fn xml_err(err: quick_xml::Error) -> DocdiffError {
    DocdiffError::Extraction(format!("XML parse error: {}", err))
}

#[cfg(test)]
pub(crate) mod fixtures {
    use std::io::{Cursor, Write};
    use zip::write::SimpleFileOptions;
    use zip::{CompressionMethod, ZipWriter};

    pub fn make_zip(entries: &[(&str, &[u8])]) -> Vec<u8> {
        let mut buf = Vec::new();
        {
            let mut writer = ZipWriter::new(Cursor::new(&mut buf));
            let options = SimpleFileOptions::default().compression_method(CompressionMethod::Stored);
            for (name, contents) in entries {
                writer.start_file(*name, options).expect("start zip entry");
                writer.write_all(contents).expect("write zip entry contents");
            }
            writer.finish().expect("finish zip");
        }
        buf
    }
}

#[cfg(test)]
mod tests {
    use super::fixtures::make_zip;
    use super::*;

    const CORE_XML: &[u8] = br#"<?xml version="1.0" encoding="UTF-8"?>
<cp:coreProperties xmlns:cp="http://schemas.openxmlformats.org/package/2006/metadata/core-properties"
    xmlns:dc="http://purl.org/dc/elements/1.1/" xmlns:dcterms="http://purl.org/dc/terms/">
  <dc:title>Safety Risk Assessment</dc:title>
  <dc:creator>R&amp;D Team</dc:creator>
  <cp:revision>4</cp:revision>
  <dc:subject></dc:subject>
  <dcterms:created>2024-01-02T03:04:05Z</dcterms:created>
</cp:coreProperties>"#;

    #[test]
    fn test_parse_core_properties() {
        let metadata = parse_core_properties(CORE_XML).unwrap();
        assert_eq!(metadata.get("title").map(String::as_str), Some("Safety Risk Assessment"));
        assert_eq!(metadata.get("author").map(String::as_str), Some("R&D Team"));
        assert_eq!(metadata.get("revision").map(String::as_str), Some("4"));
        assert_eq!(metadata.get("created").map(String::as_str), Some("2024-01-02T03:04:05Z"));
        assert!(!metadata.contains_key("subject"));
    }

    #[test]
    fn test_optional_part_missing() {
        let bytes = make_zip(&[("word/document.xml", b"<w:document/>")]);
        let mut package = OoxmlPackage::open(&bytes).unwrap();
        assert!(package.read_optional_part("docProps/core.xml").unwrap().is_none());
        assert!(core_properties(&mut package).unwrap().is_empty());
        assert_eq!(package.part_names(), vec!["word/document.xml".to_string()]);
    }

    #[test]
    fn test_open_rejects_non_zip() {
        assert!(OoxmlPackage::open(b"plain text, not a package").is_err());
    }
}
