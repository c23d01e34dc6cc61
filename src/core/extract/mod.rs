//! Content extractors for the supported document formats
//!
//! Each extractor owns an ordered list of strategies. Strategies are tried in
//! sequence and the first success wins; when every strategy fails the
//! extractor's sentinel content is returned instead of an error, so the
//! differencer always receives something comparable.

mod ooxml;
mod pdf;
mod spreadsheet;
mod text;
mod word;

pub use pdf::PdfExtractor;
pub use spreadsheet::SpreadsheetExtractor;
pub use text::PlainTextExtractor;
pub use word::WordExtractor;

use std::collections::BTreeMap;
use tracing::{debug, warn};

use super::ExtractedContent;
use crate::error::{DocdiffError, Result};

/// Secondary document properties (author, title, counts, ...)
pub type DocumentMetadata = BTreeMap<String, String>;

/// One way of turning raw file bytes into comparable content
pub trait ExtractionStrategy: Send + Sync {
    /// Short name used in logs
    fn name(&self) -> &'static str;

    fn extract(&self, bytes: &[u8]) -> Result<ExtractedContent>;
}

/// Trait that all format extractors implement
pub trait ContentExtractor: Send + Sync {
    /// Get the format name
    fn format_name(&self) -> &str;

    /// Strategies in the order they should be attempted
    fn strategies(&self) -> &[Box<dyn ExtractionStrategy>];

    /// Content returned once every strategy has failed
    fn sentinel(&self) -> ExtractedContent;

    /// Extract secondary metadata. Independent of `extract`.
    fn metadata(&self, bytes: &[u8]) -> Result<DocumentMetadata>;

    /// Run the strategy chain. Never fails.
    fn extract(&self, bytes: &[u8]) -> ExtractedContent {
        for strategy in self.strategies() {
            match strategy.extract(bytes) {
                Ok(content) => {
                    debug!("{} extracted with strategy '{}'", self.format_name(), strategy.name());
                    return content;
                }
                Err(e @ DocdiffError::LimitExceeded(_)) => {
                    warn!(
                        "{} strategy '{}' refused the document, using sentinel content: {}",
                        self.format_name(),
                        strategy.name(),
                        e
                    );
                    return self.sentinel();
                }
                Err(e) => {
                    warn!(
                        "{} strategy '{}' failed: {}",
                        self.format_name(),
                        strategy.name(),
                        e
                    );
                }
            }
        }

        warn!("All {} strategies failed, using sentinel content", self.format_name());
        self.sentinel()
    }
}
