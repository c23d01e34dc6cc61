use chrono::{DateTime, Local, NaiveDateTime};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

use super::addressing::CellRef;

/// A stored document version, as handed over by the document store
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DocumentRef {
    pub id: String,

    /// Name of the file inside the file store
    pub stored_filename: String,

    /// Name the user uploaded the file under
    pub display_filename: String,

    /// Version number, starting at 1
    pub version: u32,

    /// Document this version was derived from
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent_id: Option<String>,
}

impl DocumentRef {
    pub fn new(
        id: impl Into<String>,
        stored_filename: impl Into<String>,
        display_filename: impl Into<String>,
        version: u32,
    ) -> Self {
        Self {
            id: id.into(),
            stored_filename: stored_filename.into(),
            display_filename: display_filename.into(),
            version,
            parent_id: None,
        }
    }

    pub fn with_parent(mut self, parent_id: impl Into<String>) -> Self {
        self.parent_id = Some(parent_id.into());
        self
    }
}

/// A review comment that was resolved between two versions
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResolvedComment {
    pub id: String,
    pub text: String,
    pub resolution: String,
    pub resolved_by: String,
    pub resolved_at: DateTime<Local>,
}

/// A single spreadsheet cell value.
///
/// Equality is type-sensitive: the number `5` and the text `"5"` differ.
/// Integers and floats compare numerically with each other.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", content = "value", rename_all = "snake_case")]
pub enum CellValue {
    Int(i64),
    Float(f64),
    Text(String),
    Bool(bool),
    DateTime(NaiveDateTime),
    Error(String),
}

impl PartialEq for CellValue {
    fn eq(&self, other: &Self) -> bool {
        use CellValue::*;
        match (self, other) {
            (Int(a), Int(b)) => a == b,
            (Float(a), Float(b)) => a == b,
            (Int(a), Float(b)) | (Float(b), Int(a)) => (*a as f64) == *b,
            (Text(a), Text(b)) => a == b,
            (Bool(a), Bool(b)) => a == b,
            (DateTime(a), DateTime(b)) => a == b,
            (Error(a), Error(b)) => a == b,
            _ => false,
        }
    }
}

impl fmt::Display for CellValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CellValue::Int(n) => write!(f, "{}", n),
            // Whole floats keep a trailing ".0" so they stay distinguishable from integers
            CellValue::Float(n) if n.is_finite() && n.fract() == 0.0 && n.abs() < 1e16 => {
                write!(f, "{:.1}", n)
            }
            CellValue::Float(n) => write!(f, "{}", n),
            CellValue::Text(s) | CellValue::Error(s) => f.write_str(s),
            CellValue::Bool(true) => f.write_str("True"),
            CellValue::Bool(false) => f.write_str("False"),
            CellValue::DateTime(dt) => write!(f, "{}", dt.format("%Y-%m-%d %H:%M:%S")),
        }
    }
}

pub type Row = Vec<Option<CellValue>>;

/// Stringify an optional cell; empty cells become the empty string.
pub fn cell_to_string(cell: &Option<CellValue>) -> String {
    cell.as_ref().map(|v| v.to_string()).unwrap_or_default()
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Sheet {
    pub name: String,
    pub rows: Vec<Row>,
}

/// Sheets in the order the file declares them
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Workbook {
    pub sheets: Vec<Sheet>,
}

impl Workbook {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push_sheet(&mut self, name: impl Into<String>, rows: Vec<Row>) {
        self.sheets.push(Sheet { name: name.into(), rows });
    }

    pub fn sheet(&self, name: &str) -> Option<&Sheet> {
        self.sheets.iter().find(|s| s.name == name)
    }

    pub fn sheet_names(&self) -> Vec<&str> {
        self.sheets.iter().map(|s| s.name.as_str()).collect()
    }

    /// Flatten into a readable text form: a `Sheet: <name>` header, one
    /// `a | b | c` line per row, and a blank line after each sheet.
    pub fn to_text(&self) -> String {
        let mut text = String::new();
        for sheet in &self.sheets {
            text.push_str(&format!("Sheet: {}\n", sheet.name));
            for row in &sheet.rows {
                let cells: Vec<String> = row.iter().map(cell_to_string).collect();
                text.push_str(&cells.join(" | "));
                text.push('\n');
            }
            text.push('\n');
        }
        text
    }
}

/// Comparable form of a document, produced fresh per extraction
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "data", rename_all = "snake_case")]
pub enum ExtractedContent {
    Text(String),
    Workbook(Workbook),
}

impl ExtractedContent {
    /// Text view of the content; workbooks are flattened
    pub fn as_text(&self) -> std::borrow::Cow<'_, str> {
        match self {
            ExtractedContent::Text(text) => std::borrow::Cow::Borrowed(text),
            ExtractedContent::Workbook(workbook) => std::borrow::Cow::Owned(workbook.to_text()),
        }
    }
}

/// One line-level change in a text document
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ChangeEntry {
    Addition { content: String },
    Deletion { content: String },
    Modification { old: String, new: String },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CellChange {
    /// 1-based row index
    pub row: u32,
    /// 1-based column index
    pub column: u32,
    pub old_value: String,
    pub new_value: String,
}

impl CellChange {
    /// A1-style address of the changed cell
    pub fn address(&self) -> String {
        CellRef::new(self.row - 1, self.column - 1).to_string()
    }
}

/// Differences between two workbooks
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct SheetChangeSet {
    pub added_sheets: BTreeSet<String>,
    pub removed_sheets: BTreeSet<String>,
    /// Cell changes per common sheet; sheets without changes are absent
    pub details: BTreeMap<String, Vec<CellChange>>,
}

impl SheetChangeSet {
    pub const SUMMARY: &'static str = "Changes detected in Excel document";

    pub fn is_empty(&self) -> bool {
        self.added_sheets.is_empty() && self.removed_sheets.is_empty() && self.details.is_empty()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Changes {
    Text { entries: Vec<ChangeEntry> },
    Workbook(SheetChangeSet),
}

impl Changes {
    pub fn is_empty(&self) -> bool {
        match self {
            Changes::Text { entries } => entries.is_empty(),
            Changes::Workbook(set) => set.is_empty(),
        }
    }
}

/// Result of comparing two versions of a document
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Changelog {
    pub original: DocumentRef,
    pub new: DocumentRef,
    pub changes: Changes,
    pub generated_at: DateTime<Local>,
    pub resolved_comments: Vec<ResolvedComment>,
    pub original_fingerprint: String,
    pub new_fingerprint: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cell_equality_is_type_sensitive() {
        assert_ne!(CellValue::Int(5), CellValue::Text("5".to_string()));
        assert_eq!(CellValue::Int(5), CellValue::Float(5.0));
        assert_ne!(CellValue::Bool(true), CellValue::Int(1));
    }

    #[test]
    fn test_cell_display() {
        assert_eq!(CellValue::Int(4).to_string(), "4");
        assert_eq!(CellValue::Float(4.0).to_string(), "4.0");
        assert_eq!(CellValue::Float(2.5).to_string(), "2.5");
        assert_eq!(CellValue::Bool(false).to_string(), "False");
        let dt = NaiveDateTime::parse_from_str("2024-03-01 08:30:00", "%Y-%m-%d %H:%M:%S").unwrap();
        assert_eq!(CellValue::DateTime(dt).to_string(), "2024-03-01 08:30:00");
        assert_eq!(cell_to_string(&None), "");
    }

    #[test]
    fn test_workbook_to_text() {
        let mut workbook = Workbook::new();
        workbook.push_sheet(
            "Budget",
            vec![
                vec![Some(CellValue::Text("Item".into())), Some(CellValue::Text("Cost".into()))],
                vec![Some(CellValue::Text("Desk".into())), None],
            ],
        );

        assert_eq!(workbook.to_text(), "Sheet: Budget\nItem | Cost\nDesk | \n\n");
    }

    #[test]
    fn test_cell_change_address() {
        let change = CellChange {
            row: 2,
            column: 28,
            old_value: String::new(),
            new_value: "x".into(),
        };
        assert_eq!(change.address(), "AB2");
    }
}
