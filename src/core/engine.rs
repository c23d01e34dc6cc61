use sha2::{Digest, Sha256};
use std::io::Read;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

use super::extract::{ContentExtractor, DocumentMetadata};
use super::format::{DiffKind, DocumentFormat, FormatDispatcher};
use super::store::{CommentRepository, DocumentRepository, FileStore, LocalFileStore};
use super::{
    ChangelogRenderer, Changelog, ContentDiffer, DocumentRef, ExtractedContent, ResolvedComment,
};
use crate::config::Config;
use crate::error::{DocdiffError, Result};

/// Builds changelogs between two stored document versions
pub struct ChangelogGenerator {
    files: Arc<dyn FileStore>,
    dispatcher: FormatDispatcher,
    differ: ContentDiffer,
    renderer: ChangelogRenderer,
    timeout: Duration,
    max_file_size: usize,
}

/// What `inspect` reports about a single file
#[derive(Debug)]
pub struct DocumentReport {
    pub format: DocumentFormat,
    pub content: ExtractedContent,
    pub fingerprint: String,
    pub metadata: Result<DocumentMetadata>,
}

impl ChangelogGenerator {
    pub fn new(files: Arc<dyn FileStore>) -> Self {
        let defaults = Config::default();
        Self {
            files,
            dispatcher: FormatDispatcher::new(),
            differ: ContentDiffer::new(),
            renderer: ChangelogRenderer::default(),
            timeout: defaults.extraction.timeout(),
            max_file_size: defaults.extraction.max_file_size,
        }
    }

    /// Generator over the local file store with the configured limits and
    /// output settings
    pub fn from_config(config: &Config) -> Self {
        let files = Arc::new(LocalFileStore::new(config.storage.uploads_dir.clone()));
        Self::new(files)
            .with_limits(config.extraction.timeout(), config.extraction.max_file_size)
            .with_renderer(ChangelogRenderer::from_config(&config.output))
    }

    pub fn with_limits(mut self, timeout: Duration, max_file_size: usize) -> Self {
        self.timeout = timeout;
        self.max_file_size = max_file_size;
        self
    }

    pub fn with_renderer(mut self, renderer: ChangelogRenderer) -> Self {
        self.renderer = renderer;
        self
    }

    pub fn renderer(&self) -> &ChangelogRenderer {
        &self.renderer
    }

    /// Compare two versions. Never fails: unreadable or oversized files and
    /// slow extractions are compared as the format's sentinel content.
    pub async fn generate_changelog(
        &self,
        original: &DocumentRef,
        new: &DocumentRef,
        resolved_comments: &[ResolvedComment],
    ) -> Changelog {
        let (format, extractor, kind) = self.dispatcher.select(&original.stored_filename);
        info!(
            "Generating {} changelog for {} (v{} -> v{})",
            format, original.display_filename, original.version, new.version
        );

        let (original_content, new_content) = tokio::join!(
            self.extract(&original.stored_filename, Arc::clone(&extractor)),
            self.extract(&new.stored_filename, Arc::clone(&extractor)),
        );

        let changes = self.diff(kind, &original_content, &new_content);
        debug!("Change set empty: {}", changes.is_empty());

        Changelog {
            original: original.clone(),
            new: new.clone(),
            changes,
            generated_at: chrono::Local::now(),
            resolved_comments: resolved_comments.to_vec(),
            original_fingerprint: content_fingerprint(&original_content),
            new_fingerprint: content_fingerprint(&new_content),
        }
    }

    pub async fn generate_formatted_changelog(
        &self,
        original: &DocumentRef,
        new: &DocumentRef,
        resolved_comments: &[ResolvedComment],
    ) -> String {
        let changelog = self.generate_changelog(original, new, resolved_comments).await;
        self.renderer.render(&changelog)
    }

    /// Look both versions up and compare them, annotated with the original
    /// document's resolved comments. Only a missing document is an error.
    pub async fn changelog_for_ids(
        &self,
        documents: &dyn DocumentRepository,
        comments: &dyn CommentRepository,
        original_id: &str,
        new_id: &str,
    ) -> Result<Changelog> {
        let original = documents.get(original_id)?;
        let new = documents.get(new_id)?;
        let resolved = comments.resolved_for_document(&original.id);
        Ok(self.generate_changelog(&original, &new, &resolved).await)
    }

    pub async fn formatted_changelog_for_ids(
        &self,
        documents: &dyn DocumentRepository,
        comments: &dyn CommentRepository,
        original_id: &str,
        new_id: &str,
    ) -> Result<String> {
        let changelog = self
            .changelog_for_ids(documents, comments, original_id, new_id)
            .await?;
        Ok(self.renderer.render(&changelog))
    }

    /// Extract a single file and collect its metadata. Unlike changelog
    /// generation, an unreadable file is reported as an error.
    pub async fn inspect(&self, stored_filename: &str) -> Result<DocumentReport> {
        let (format, extractor, _) = self.dispatcher.select(stored_filename);
        let files = Arc::clone(&self.files);
        let name = stored_filename.to_string();
        let max_file_size = self.max_file_size;

        let work = tokio::task::spawn_blocking(move || -> Result<DocumentReport> {
            let bytes = read_limited(files.as_ref(), &name, max_file_size)?;
            let content = extractor.extract(&bytes);
            Ok(DocumentReport {
                format,
                fingerprint: content_fingerprint(&content),
                metadata: extractor.metadata(&bytes),
                content,
            })
        });

        match tokio::time::timeout(self.timeout, work).await {
            Ok(Ok(report)) => report,
            Ok(Err(e)) => Err(DocdiffError::Extraction(format!("extraction task failed: {}", e))),
            Err(_) => Err(DocdiffError::Extraction(format!(
                "extraction of {} timed out after {:?}",
                stored_filename, self.timeout
            ))),
        }
    }

    fn diff(&self, kind: DiffKind, original: &ExtractedContent, new: &ExtractedContent) -> super::Changes {
        self.differ.diff(kind, original, new)
    }

    /// Read and extract one file on the blocking pool
    async fn extract(&self, stored_filename: &str, extractor: Arc<dyn ContentExtractor>) -> ExtractedContent {
        let files = Arc::clone(&self.files);
        let name = stored_filename.to_string();
        let worker = Arc::clone(&extractor);
        let max_file_size = self.max_file_size;

        let work = tokio::task::spawn_blocking(move || match read_limited(files.as_ref(), &name, max_file_size) {
            Ok(bytes) => worker.extract(&bytes),
            Err(e) => {
                warn!("Could not read {}: {}", name, e);
                worker.sentinel()
            }
        });

        match tokio::time::timeout(self.timeout, work).await {
            Ok(Ok(content)) => content,
            Ok(Err(e)) => {
                warn!("Extraction of {} failed: {}", stored_filename, e);
                extractor.sentinel()
            }
            Err(_) => {
                warn!("Extraction of {} timed out after {:?}", stored_filename, self.timeout);
                extractor.sentinel()
            }
        }
    }
}

/// Read a whole stored file, refusing anything over `max_file_size` bytes.
/// The reader is dropped before returning on every path.
fn read_limited(files: &dyn FileStore, stored_filename: &str, max_file_size: usize) -> Result<Vec<u8>> {
    let reader = files.open(stored_filename)?;
    let mut bytes = Vec::new();
    reader.take(max_file_size as u64 + 1).read_to_end(&mut bytes)?;

    if bytes.len() > max_file_size {
        return Err(DocdiffError::Extraction(format!(
            "{} exceeds the {} byte limit",
            stored_filename, max_file_size
        )));
    }
    Ok(bytes)
}

/// SHA-256 of the content's text view, hex encoded
pub fn content_fingerprint(content: &ExtractedContent) -> String {
    let mut hasher = Sha256::new();
    hasher.update(content.as_text().as_bytes());
    format!("{:x}", hasher.finalize())
}
