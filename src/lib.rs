//! Version-to-version changelogs for PDF, Word, spreadsheet and text documents.
//!
//! [`ChangelogGenerator`] is the entry point: it extracts comparable content
//! from two stored versions, diffs them and renders the report.

pub mod config;
pub mod core;
pub mod error;

pub use crate::config::Config;
pub use crate::core::{ChangelogGenerator, ChangelogRenderer, Changelog, DocumentRef, ResolvedComment};
pub use crate::error::{DocdiffError, Result};
