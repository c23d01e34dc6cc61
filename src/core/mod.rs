mod addressing;
mod differ;
mod engine;
mod model;
mod renderer;
mod sections;

pub mod extract;
pub mod format;
pub mod store;

pub use addressing::{column_label, CellRef, MAX_COLUMNS, MAX_ROWS};
pub use differ::{diff_lines, diff_workbooks, ContentDiffer};
pub use engine::{content_fingerprint, ChangelogGenerator, DocumentReport};
pub use extract::{ContentExtractor, DocumentMetadata, ExtractionStrategy};
pub use format::{DiffKind, DocumentFormat, FormatDispatcher};
pub use model::{
    cell_to_string, CellChange, CellValue, ChangeEntry, Changelog, Changes, DocumentRef,
    ExtractedContent, ResolvedComment, Row, Sheet, SheetChangeSet, Workbook,
};
pub use renderer::{render_changes, ChangelogRenderer};
pub use sections::{Section, SectionSplitter};
pub use store::{
    CommentRepository, CommentStatus, DocumentRepository, FileStore, InMemoryCommentRepository,
    InMemoryDocumentRepository, InMemoryFileStore, LocalFileStore, ReviewComment,
};
