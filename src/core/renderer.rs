use chrono::{DateTime, Local};
use std::fmt::Write as _;
use std::path::Path;
use tera::{Context, Tera};
use tracing::warn;

use super::{ChangeEntry, Changelog, Changes, SheetChangeSet};
use crate::config::OutputConfig;
use crate::error::Result;

const DEFAULT_TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";
const TEMPLATE_NAME: &str = "changelog";

/// Turns a [`Changelog`] into the text report.
///
/// Without a template the fixed built-in layout is produced. A custom tera
/// template receives `changelog`, `generated` and `changes_text`; if it fails
/// to render, the built-in layout is used instead.
#[derive(Clone)]
pub struct ChangelogRenderer {
    timestamp_format: String,
    templates: Option<Tera>,
}

impl ChangelogRenderer {
    pub fn new(timestamp_format: impl Into<String>) -> Self {
        Self {
            timestamp_format: timestamp_format.into(),
            templates: None,
        }
    }

    pub fn with_template(mut self, source: &str) -> Result<Self> {
        let mut tera = Tera::default();
        tera.add_raw_template(TEMPLATE_NAME, source)?;
        self.templates = Some(tera);
        Ok(self)
    }

    pub fn with_template_file(self, path: &Path) -> Result<Self> {
        let source = std::fs::read_to_string(path)?;
        self.with_template(&source)
    }

    /// Renderer for the `[output]` config section. A template that cannot be
    /// loaded is reported and skipped.
    pub fn from_config(config: &OutputConfig) -> Self {
        let renderer = Self::new(config.timestamp_format.clone());
        match &config.template {
            Some(path) => match renderer.clone().with_template_file(path) {
                Ok(with_template) => with_template,
                Err(e) => {
                    warn!("Ignoring changelog template {}: {}", path.display(), e);
                    renderer
                }
            },
            None => renderer,
        }
    }

    pub fn render(&self, changelog: &Changelog) -> String {
        if let Some(tera) = &self.templates {
            match self.render_template(tera, changelog) {
                Ok(text) => return text,
                Err(e) => warn!("Template rendering failed, using built-in layout: {}", e),
            }
        }
        self.render_builtin(changelog)
    }

    fn render_template(&self, tera: &Tera, changelog: &Changelog) -> Result<String> {
        let mut context = Context::new();
        context.insert("changelog", changelog);
        context.insert("generated", &self.timestamp(&changelog.generated_at));
        context.insert("changes_text", &render_changes(&changelog.changes));
        Ok(tera.render(TEMPLATE_NAME, &context)?)
    }

    fn render_builtin(&self, changelog: &Changelog) -> String {
        let original = &changelog.original;
        let new = &changelog.new;
        let mut out = String::new();

        out.push_str(&format!(
            "# Changelog: {} (v{} → v{})\n\n",
            original.display_filename, original.version, new.version
        ));
        out.push_str(&format!("Generated: {}\n\n", self.timestamp(&changelog.generated_at)));

        out.push_str("## Document Information\n");
        out.push_str(&format!("- Original: {} (v{})\n", original.display_filename, original.version));
        out.push_str(&format!("- New: {} (v{})\n\n", new.display_filename, new.version));

        out.push_str("## Changes\n");
        out.push_str(&render_changes(&changelog.changes));

        if !changelog.resolved_comments.is_empty() {
            out.push_str("\n## Resolved Comments\n");
            for comment in &changelog.resolved_comments {
                out.push_str(&format!("- Comment: {}\n", comment.text));
                out.push_str(&format!("  Resolution: {}\n", comment.resolution));
                out.push_str(&format!("  Resolved by: {}\n\n", comment.resolved_by));
            }
        }

        out
    }

    /// Format with the configured pattern; an invalid pattern falls back to
    /// the default one.
    fn timestamp(&self, at: &DateTime<Local>) -> String {
        let mut text = String::new();
        if write!(text, "{}", at.format(&self.timestamp_format)).is_ok() {
            return text;
        }
        at.format(DEFAULT_TIMESTAMP_FORMAT).to_string()
    }
}

impl Default for ChangelogRenderer {
    fn default() -> Self {
        Self::new(DEFAULT_TIMESTAMP_FORMAT)
    }
}

/// Body of the "## Changes" section
pub fn render_changes(changes: &Changes) -> String {
    match changes {
        Changes::Text { entries } => entries.iter().map(|entry| render_entry(entry) + "\n").collect(),
        Changes::Workbook(set) => render_sheet_changes(set),
    }
}

fn render_entry(entry: &ChangeEntry) -> String {
    match entry {
        ChangeEntry::Addition { content } => format!("+ Added: {}", content),
        ChangeEntry::Deletion { content } => format!("- Removed: {}", content),
        ChangeEntry::Modification { old, new } => format!("* Modified: {} → {}", old, new),
    }
}

fn render_sheet_changes(set: &SheetChangeSet) -> String {
    let mut out = format!("{}\n", SheetChangeSet::SUMMARY);
    for name in &set.added_sheets {
        out.push_str(&format!("+ Added sheet: {}\n", name));
    }
    for name in &set.removed_sheets {
        out.push_str(&format!("- Removed sheet: {}\n", name));
    }
    for (sheet, cells) in &set.details {
        for cell in cells {
            out.push_str(&format!(
                "* Modified: {}!{} {} → {}\n",
                sheet,
                cell.address(),
                cell.old_value,
                cell.new_value
            ));
        }
    }
    out.push('\n');
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::{CellChange, DocumentRef, ResolvedComment};
    use chrono::TimeZone;

    fn changelog(changes: Changes, resolved_comments: Vec<ResolvedComment>) -> Changelog {
        Changelog {
            original: DocumentRef::new("d1", "a1.docx", "Plan.docx", 1),
            new: DocumentRef::new("d2", "b2.docx", "Plan.docx", 2).with_parent("d1"),
            changes,
            generated_at: Local.with_ymd_and_hms(2024, 5, 6, 7, 8, 9).unwrap(),
            resolved_comments,
            original_fingerprint: String::new(),
            new_fingerprint: String::new(),
        }
    }

    fn text_changes() -> Changes {
        Changes::Text {
            entries: vec![
                ChangeEntry::Addition { content: "new".into() },
                ChangeEntry::Deletion { content: "gone".into() },
                ChangeEntry::Modification { old: "B".into(), new: "X".into() },
            ],
        }
    }

    fn comment(id: &str, text: &str) -> ResolvedComment {
        ResolvedComment {
            id: id.into(),
            text: text.into(),
            resolution: format!("fixed {}", id),
            resolved_by: "reviewer".into(),
            resolved_at: Local.with_ymd_and_hms(2024, 5, 5, 0, 0, 0).unwrap(),
        }
    }

    #[test]
    fn test_builtin_layout() {
        let text = ChangelogRenderer::default().render(&changelog(text_changes(), vec![]));
        assert_eq!(
            text,
            "# Changelog: Plan.docx (v1 → v2)\n\n\
             Generated: 2024-05-06 07:08:09\n\n\
             ## Document Information\n\
             - Original: Plan.docx (v1)\n\
             - New: Plan.docx (v2)\n\n\
             ## Changes\n\
             + Added: new\n\
             - Removed: gone\n\
             * Modified: B → X\n"
        );
    }

    #[test]
    fn test_resolved_comments_in_input_order() {
        let comments = vec![comment("c2", "Second"), comment("c1", "First")];
        let text = ChangelogRenderer::default().render(&changelog(text_changes(), comments));

        assert!(text.contains(
            "\n## Resolved Comments\n\
             - Comment: Second\n  Resolution: fixed c2\n  Resolved by: reviewer\n\n\
             - Comment: First\n  Resolution: fixed c1\n  Resolved by: reviewer\n\n"
        ));
        assert!(!ChangelogRenderer::default()
            .render(&changelog(text_changes(), vec![]))
            .contains("## Resolved Comments"));
    }

    #[test]
    fn test_renders_differ_only_in_generated_line() {
        let renderer = ChangelogRenderer::default();
        let first = changelog(text_changes(), vec![comment("c1", "x")]);
        let mut second = first.clone();
        second.generated_at = Local.with_ymd_and_hms(2025, 1, 1, 0, 0, 0).unwrap();

        let a = renderer.render(&first);
        let b = renderer.render(&second);
        let differing: Vec<_> = a.lines().zip(b.lines()).filter(|(x, y)| x != y).collect();
        assert_eq!(a.lines().count(), b.lines().count());
        assert_eq!(differing.len(), 1);
        assert!(differing[0].0.starts_with("Generated: "));
    }

    #[test]
    fn test_workbook_changes_section() {
        let mut set = SheetChangeSet::default();
        set.added_sheets.insert("Summary".into());
        set.removed_sheets.insert("Draft".into());
        set.details.insert(
            "Sheet1".into(),
            vec![CellChange { row: 2, column: 2, old_value: "4".into(), new_value: "9".into() }],
        );

        assert_eq!(
            render_changes(&Changes::Workbook(set)),
            "Changes detected in Excel document\n\
             + Added sheet: Summary\n\
             - Removed sheet: Draft\n\
             * Modified: Sheet1!B2 4 → 9\n\n"
        );
        assert_eq!(
            render_changes(&Changes::Workbook(SheetChangeSet::default())),
            "Changes detected in Excel document\n\n"
        );
    }

    #[test]
    fn test_custom_template() {
        let renderer = ChangelogRenderer::default()
            .with_template("{{ changelog.original.display_filename }} @ {{ generated }}\n{{ changes_text }}")
            .unwrap();
        let text = renderer.render(&changelog(text_changes(), vec![]));
        assert!(text.starts_with("Plan.docx @ 2024-05-06 07:08:09\n+ Added: new\n"));
    }

    #[test]
    fn test_failing_template_falls_back_to_builtin() {
        let renderer = ChangelogRenderer::default().with_template("{{ missing_variable }}").unwrap();
        let text = renderer.render(&changelog(text_changes(), vec![]));
        assert!(text.starts_with("# Changelog: Plan.docx (v1 → v2)"));
    }

    #[test]
    fn test_invalid_timestamp_format_uses_default() {
        let text = ChangelogRenderer::new("%Q%").render(&changelog(text_changes(), vec![]));
        assert!(text.contains("Generated: 2024-05-06 07:08:09\n"));
    }
}
