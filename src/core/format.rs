use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;

use super::extract::{
    ContentExtractor, PdfExtractor, PlainTextExtractor, SpreadsheetExtractor, WordExtractor,
};

/// Document families the engine knows how to compare
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DocumentFormat {
    Pdf,
    Word,
    Spreadsheet,
    PlainText,
}

/// How two extracted versions are compared
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DiffKind {
    Lines,
    Cells,
}

impl DocumentFormat {
    /// Choose a format from the extension of `filename`.
    /// Unknown or missing extensions are treated as plain text.
    pub fn from_filename(filename: &str) -> Self {
        Self::from_extension(&extension_of(filename))
    }

    pub fn from_extension(extension: &str) -> Self {
        match extension {
            "pdf" => DocumentFormat::Pdf,
            "docx" | "doc" => DocumentFormat::Word,
            "xlsx" | "xls" => DocumentFormat::Spreadsheet,
            _ => DocumentFormat::PlainText,
        }
    }

    pub fn diff_kind(&self) -> DiffKind {
        match self {
            DocumentFormat::Spreadsheet => DiffKind::Cells,
            _ => DiffKind::Lines,
        }
    }
}

impl fmt::Display for DocumentFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            DocumentFormat::Pdf => "pdf",
            DocumentFormat::Word => "word",
            DocumentFormat::Spreadsheet => "spreadsheet",
            DocumentFormat::PlainText => "text",
        };
        f.write_str(name)
    }
}

/// Lowercase text after the last `.`, or empty when there is none
pub fn extension_of(filename: &str) -> String {
    match filename.rsplit_once('.') {
        Some((_, ext)) => ext.to_ascii_lowercase(),
        None => String::new(),
    }
}

/// Maps a file name to the extractor and diff algorithm for its format.
///
/// Extractors are stateless and shared; cloning the dispatcher is cheap.
#[derive(Clone)]
pub struct FormatDispatcher {
    pdf: Arc<dyn ContentExtractor>,
    word: Arc<dyn ContentExtractor>,
    spreadsheet: Arc<dyn ContentExtractor>,
    text: Arc<dyn ContentExtractor>,
}

impl FormatDispatcher {
    pub fn new() -> Self {
        Self {
            pdf: Arc::new(PdfExtractor::new()),
            word: Arc::new(WordExtractor::new()),
            spreadsheet: Arc::new(SpreadsheetExtractor::new()),
            text: Arc::new(PlainTextExtractor::new()),
        }
    }

    pub fn extractor(&self, format: DocumentFormat) -> Arc<dyn ContentExtractor> {
        match format {
            DocumentFormat::Pdf => Arc::clone(&self.pdf),
            DocumentFormat::Word => Arc::clone(&self.word),
            DocumentFormat::Spreadsheet => Arc::clone(&self.spreadsheet),
            DocumentFormat::PlainText => Arc::clone(&self.text),
        }
    }

    /// Extractor and diff algorithm for `filename`
    pub fn select(&self, filename: &str) -> (DocumentFormat, Arc<dyn ContentExtractor>, DiffKind) {
        let format = DocumentFormat::from_filename(filename);
        (format, self.extractor(format), format.diff_kind())
    }
}

impl Default for FormatDispatcher {
    fn default() -> Self {
        Self::new()
    }
}
