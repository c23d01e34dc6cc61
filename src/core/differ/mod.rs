mod sheet;
mod text;

pub use sheet::diff_workbooks;
pub use text::diff_lines;

use tracing::debug;

use super::format::DiffKind;
use super::{Changes, ExtractedContent};

/// Computes the structured difference between two extracted versions
#[derive(Debug, Clone, Copy, Default)]
pub struct ContentDiffer;

impl ContentDiffer {
    pub fn new() -> Self {
        Self
    }

    /// Cell comparison needs a workbook on both sides. Any other pairing is
    /// compared as text, flattening a workbook if one is involved.
    pub fn diff(&self, kind: DiffKind, original: &ExtractedContent, new: &ExtractedContent) -> Changes {
        match (kind, original, new) {
            (DiffKind::Cells, ExtractedContent::Workbook(before), ExtractedContent::Workbook(after)) => {
                Changes::Workbook(diff_workbooks(before, after))
            }
            (_, ExtractedContent::Text(before), ExtractedContent::Text(after)) => Changes::Text {
                entries: diff_lines(before, after),
            },
            _ => {
                debug!("Comparing mismatched content as text");
                Changes::Text {
                    entries: diff_lines(&original.as_text(), &new.as_text()),
                }
            }
        }
    }
}
