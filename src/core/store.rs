//! Storage seams the changelog engine depends on
//!
//! The engine only ever reads: document records, resolved comments and file
//! bytes. The in-memory implementations back the CLI and the tests.

use chrono::{DateTime, Local};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap, HashSet};
use std::io::{self, Cursor, Read};
use std::path::PathBuf;
use std::sync::{PoisonError, RwLock};

use super::{DocumentRef, ResolvedComment};
use crate::error::{DocdiffError, Result};

pub trait DocumentRepository: Send + Sync {
    fn get(&self, id: &str) -> Result<DocumentRef>;

    fn put(&self, document: DocumentRef);

    fn list(&self) -> Vec<DocumentRef>;

    /// The document, its ancestors and the direct children of each of
    /// them, sorted by version.
    fn version_history(&self, id: &str) -> Result<Vec<DocumentRef>> {
        let all = self.list();
        let mut seen = HashSet::new();
        let mut history = Vec::new();
        let mut next = Some(self.get(id)?);

        while let Some(document) = next.take() {
            if !seen.insert(document.id.clone()) {
                break;
            }
            for child in all.iter().filter(|d| d.parent_id.as_deref() == Some(document.id.as_str())) {
                if seen.insert(child.id.clone()) {
                    history.push(child.clone());
                }
            }
            if let Some(parent_id) = &document.parent_id {
                next = Some(self.get(parent_id)?);
            }
            history.push(document);
        }

        history.sort_by_key(|d| d.version);
        Ok(history)
    }
}

pub trait CommentRepository: Send + Sync {
    /// Resolved comments of a document, in the order they were added
    fn resolved_for_document(&self, document_id: &str) -> Vec<ResolvedComment>;
}

/// Read access to stored document files
pub trait FileStore: Send + Sync {
    fn open(&self, stored_filename: &str) -> io::Result<Box<dyn Read + Send>>;
}

#[derive(Debug, Default)]
pub struct InMemoryDocumentRepository {
    documents: RwLock<BTreeMap<String, DocumentRef>>,
}

impl InMemoryDocumentRepository {
    pub fn new() -> Self {
        Self::default()
    }
}

impl DocumentRepository for InMemoryDocumentRepository {
    fn get(&self, id: &str) -> Result<DocumentRef> {
        self.documents
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(id)
            .cloned()
            .ok_or_else(|| DocdiffError::document_not_found(id))
    }

    fn put(&self, document: DocumentRef) {
        self.documents
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(document.id.clone(), document);
    }

    fn list(&self) -> Vec<DocumentRef> {
        self.documents
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .values()
            .cloned()
            .collect()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CommentStatus {
    Open,
    #[serde(rename = "In Progress")]
    InProgress,
    Resolved,
    Approved,
}

/// A review comment as kept by the comment store
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReviewComment {
    pub id: String,
    pub document_id: String,
    pub text: String,
    pub page_number: Option<u32>,
    pub section: Option<String>,
    pub created_at: DateTime<Local>,
    pub status: CommentStatus,
    pub resolution_text: Option<String>,
    pub resolved_at: Option<DateTime<Local>>,
    pub resolved_by: Option<String>,
    #[serde(default)]
    pub related_comment_ids: Vec<String>,
}

impl ReviewComment {
    pub fn new(id: impl Into<String>, document_id: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            document_id: document_id.into(),
            text: text.into(),
            page_number: None,
            section: None,
            created_at: Local::now(),
            status: CommentStatus::Open,
            resolution_text: None,
            resolved_at: None,
            resolved_by: None,
            related_comment_ids: Vec::new(),
        }
    }

    /// Only resolved comments with complete resolution data convert
    pub fn as_resolved(&self) -> Option<ResolvedComment> {
        if self.status != CommentStatus::Resolved {
            return None;
        }
        Some(ResolvedComment {
            id: self.id.clone(),
            text: self.text.clone(),
            resolution: self.resolution_text.clone()?,
            resolved_by: self.resolved_by.clone()?,
            resolved_at: self.resolved_at?,
        })
    }
}

#[derive(Debug, Default)]
pub struct InMemoryCommentRepository {
    comments: RwLock<Vec<ReviewComment>>,
}

impl InMemoryCommentRepository {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or replace a comment
    pub fn add(&self, comment: ReviewComment) {
        let mut comments = self.comments.write().unwrap_or_else(PoisonError::into_inner);
        match comments.iter_mut().find(|c| c.id == comment.id) {
            Some(existing) => *existing = comment,
            None => comments.push(comment),
        }
    }

    pub fn get(&self, id: &str) -> Result<ReviewComment> {
        self.comments
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .find(|c| c.id == id)
            .cloned()
            .ok_or_else(|| DocdiffError::comment_not_found(id))
    }

    pub fn resolve(&self, id: &str, resolution: &str, resolved_by: &str) -> Result<ReviewComment> {
        let mut comments = self.comments.write().unwrap_or_else(PoisonError::into_inner);
        let comment = comments
            .iter_mut()
            .find(|c| c.id == id)
            .ok_or_else(|| DocdiffError::comment_not_found(id))?;

        comment.status = CommentStatus::Resolved;
        comment.resolution_text = Some(resolution.to_string());
        comment.resolved_by = Some(resolved_by.to_string());
        comment.resolved_at = Some(Local::now());
        Ok(comment.clone())
    }
}

impl CommentRepository for InMemoryCommentRepository {
    fn resolved_for_document(&self, document_id: &str) -> Vec<ResolvedComment> {
        self.comments
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .filter(|c| c.document_id == document_id)
            .filter_map(ReviewComment::as_resolved)
            .collect()
    }
}

/// Read-only file store rooted at a directory. Absolute names are opened as-is.
#[derive(Debug, Clone)]
pub struct LocalFileStore {
    root: PathBuf,
}

impl LocalFileStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    fn path_for(&self, stored_filename: &str) -> PathBuf {
        self.root.join(stored_filename)
    }
}

impl FileStore for LocalFileStore {
    fn open(&self, stored_filename: &str) -> io::Result<Box<dyn Read + Send>> {
        Ok(Box::new(std::fs::File::open(self.path_for(stored_filename))?))
    }
}

#[derive(Debug, Default)]
pub struct InMemoryFileStore {
    files: RwLock<HashMap<String, Vec<u8>>>,
}

impl InMemoryFileStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, stored_filename: impl Into<String>, bytes: impl Into<Vec<u8>>) {
        self.files
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(stored_filename.into(), bytes.into());
    }
}

impl FileStore for InMemoryFileStore {
    fn open(&self, stored_filename: &str) -> io::Result<Box<dyn Read + Send>> {
        let files = self.files.read().unwrap_or_else(PoisonError::into_inner);
        match files.get(stored_filename) {
            Some(bytes) => Ok(Box::new(Cursor::new(bytes.clone()))),
            None => Err(io::Error::new(
                io::ErrorKind::NotFound,
                format!("{} is not in the store", stored_filename),
            )),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn versions() -> InMemoryDocumentRepository {
        let repo = InMemoryDocumentRepository::new();
        repo.put(DocumentRef::new("v1", "a.docx", "Plan.docx", 1));
        repo.put(DocumentRef::new("v2", "b.docx", "Plan.docx", 2).with_parent("v1"));
        repo.put(DocumentRef::new("v3", "c.docx", "Plan.docx", 3).with_parent("v2"));
        repo.put(DocumentRef::new("other", "d.pdf", "Other.pdf", 1));
        repo
    }

    #[test]
    fn test_get_missing_document_is_not_found() {
        let err = versions().get("nope").unwrap_err();
        assert!(err.is_not_found());
        assert_eq!(err.to_string(), "Document nope not found");
    }

    #[test]
    fn test_version_history_sorted_without_duplicates() {
        let repo = versions();
        let ids = |history: Vec<DocumentRef>| history.into_iter().map(|d| d.id).collect::<Vec<_>>();

        assert_eq!(ids(repo.version_history("v2").unwrap()), vec!["v1", "v2", "v3"]);
        assert_eq!(ids(repo.version_history("v1").unwrap()), vec!["v1", "v2"]);
        assert_eq!(ids(repo.version_history("other").unwrap()), vec!["other"]);
    }

    #[test]
    fn test_only_resolved_comments_are_returned() {
        let comments = InMemoryCommentRepository::new();
        comments.add(ReviewComment::new("c1", "v1", "Fix the title"));
        comments.add(ReviewComment::new("c2", "v1", "Still open"));
        comments.add(ReviewComment::new("c3", "v2", "Other document"));
        comments.resolve("c1", "Title fixed", "alex").unwrap();
        comments.resolve("c3", "Done", "sam").unwrap();

        let resolved = comments.resolved_for_document("v1");
        assert_eq!(resolved.len(), 1);
        assert_eq!(resolved[0].id, "c1");
        assert_eq!(resolved[0].resolution, "Title fixed");
        assert_eq!(resolved[0].resolved_by, "alex");
        assert!(comments.resolve("missing", "x", "y").unwrap_err().is_not_found());
    }

    #[test]
    fn test_get_comment_reflects_latest_state() {
        let comments = InMemoryCommentRepository::new();
        comments.add(ReviewComment::new("c1", "v1", "First draft"));
        assert_eq!(comments.get("c1").unwrap().status, CommentStatus::Open);

        comments.add(ReviewComment::new("c1", "v1", "Reworded"));
        comments.resolve("c1", "Done", "alex").unwrap();

        let stored = comments.get("c1").unwrap();
        assert_eq!(stored.text, "Reworded");
        assert_eq!(stored.status, CommentStatus::Resolved);
        assert_eq!(stored.resolved_by.as_deref(), Some("alex"));

        let err = comments.get("c2").unwrap_err();
        assert!(err.is_not_found());
        assert_eq!(err.to_string(), "Comment c2 not found");
    }

    #[test]
    fn test_resolved_status_without_data_does_not_convert() {
        let mut comment = ReviewComment::new("c1", "v1", "text");
        comment.status = CommentStatus::Resolved;
        assert!(comment.as_resolved().is_none());
    }

    #[test]
    fn test_local_file_store_reads_relative_to_root() {
        let dir = TempDir::new().unwrap();
        std::fs::write(dir.path().join("stored.txt"), b"hello").unwrap();
        let store = LocalFileStore::new(dir.path());

        let mut text = String::new();
        store.open("stored.txt").unwrap().read_to_string(&mut text).unwrap();
        assert_eq!(text, "hello");
        assert_eq!(store.open("missing.txt").err().map(|e| e.kind()), Some(io::ErrorKind::NotFound));
    }
}
