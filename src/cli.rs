use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use std::io::Write;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

use docdiff::config::{Config, OutputFormat};
use docdiff::core::{ChangelogGenerator, DocumentRef, ResolvedComment, SectionSplitter};

#[derive(Parser)]
#[command(name = "docdiff")]
#[command(about = "Changelogs between versions of PDF, Word and spreadsheet documents")]
#[command(version)]
pub struct Cli {
    /// Path to configuration file
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Generate a changelog between two versions of a document
    Diff {
        /// Original version, relative to the uploads directory
        original: PathBuf,

        /// New version, relative to the uploads directory
        new: PathBuf,

        /// Version number of the original
        #[arg(long, default_value_t = 1, value_parser = clap::value_parser!(u32).range(1..))]
        from_version: u32,

        /// Version number of the new file (defaults to the original's + 1)
        #[arg(long, value_parser = clap::value_parser!(u32).range(1..))]
        to_version: Option<u32>,

        /// Display name used in the report (defaults to the original's file name)
        #[arg(long)]
        name: Option<String>,

        /// JSON file with the resolved comments to include
        #[arg(long)]
        comments: Option<PathBuf>,

        /// Output format (text, json)
        #[arg(long)]
        format: Option<OutputFormat>,

        /// Write the report here instead of stdout
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Show what docdiff extracts from a single file
    Inspect {
        /// File to inspect, relative to the uploads directory
        file: PathBuf,

        /// Split the extracted text into uppercase-headed sections
        #[arg(long)]
        sections: bool,
    },

    /// Write a default configuration file
    Init {
        /// Target directory (defaults to current directory)
        #[arg(short, long)]
        path: Option<PathBuf>,

        /// Overwrite an existing configuration file
        #[arg(long)]
        force: bool,
    },
}

impl Cli {
    pub async fn execute(self, config: Config) -> Result<()> {
        match self.command {
            Commands::Diff {
                original,
                new,
                from_version,
                to_version,
                name,
                comments,
                format,
                output,
            } => {
                let to_version = match to_version {
                    Some(version) => version,
                    None => from_version.checked_add(1).with_context(|| {
                        format!("--from-version {} has no next version; pass --to-version", from_version)
                    })?,
                };
                let request = DiffRequest {
                    original,
                    new,
                    from_version,
                    to_version,
                    name,
                    comments,
                    format: format.unwrap_or(config.output.format),
                    output,
                };
                run_diff(&config, request).await
            }
            Commands::Inspect { file, sections } => run_inspect(&config, &file, sections).await,
            Commands::Init { path, force } => run_init(path, force),
        }
    }
}

struct DiffRequest {
    original: PathBuf,
    new: PathBuf,
    from_version: u32,
    to_version: u32,
    name: Option<String>,
    comments: Option<PathBuf>,
    format: OutputFormat,
    output: Option<PathBuf>,
}

async fn run_diff(config: &Config, request: DiffRequest) -> Result<()> {
    let generator = ChangelogGenerator::from_config(config);

    let original_name = path_str(&request.original);
    let new_name = path_str(&request.new);
    let display_name = request.name.clone().unwrap_or_else(|| file_name(&request.original));

    let original = DocumentRef::new(&original_name, &original_name, &display_name, request.from_version);
    let new = DocumentRef::new(&new_name, &new_name, &display_name, request.to_version)
        .with_parent(&original_name);

    let comments = match &request.comments {
        Some(path) => load_comments(path)?,
        None => Vec::new(),
    };

    let changelog = generator.generate_changelog(&original, &new, &comments).await;
    info!(
        "{} -> {}: {}",
        original_name,
        new_name,
        if changelog.changes.is_empty() { "no changes" } else { "changes found" }
    );

    let report = match request.format {
        OutputFormat::Text => generator.renderer().render(&changelog),
        OutputFormat::Json => serde_json::to_string_pretty(&changelog)? + "\n",
    };

    match &request.output {
        Some(path) => {
            std::fs::write(path, &report)
                .with_context(|| format!("Failed to write {}", path.display()))?;
            info!("Changelog written to {}", path.display());
        }
        None => {
            let mut stdout = std::io::stdout().lock();
            stdout.write_all(report.as_bytes())?;
            stdout.flush()?;
        }
    }

    Ok(())
}

async fn run_inspect(config: &Config, file: &Path, sections: bool) -> Result<()> {
    let generator = ChangelogGenerator::from_config(config);
    let name = path_str(file);
    let report = generator
        .inspect(&name)
        .await
        .with_context(|| format!("Failed to inspect {}", name))?;

    let mut out = String::new();
    out.push_str(&format!("File: {}\n", name));
    out.push_str(&format!("Format: {}\n", report.format));
    out.push_str(&format!("Fingerprint: {}\n", report.fingerprint));

    match &report.metadata {
        Ok(metadata) => {
            out.push_str("\nMetadata:\n");
            for (key, value) in metadata {
                out.push_str(&format!("  {}: {}\n", key, value));
            }
        }
        Err(e) => {
            warn!("Metadata unavailable for {}: {}", name, e);
            out.push_str(&format!("\nMetadata: unavailable ({})\n", e));
        }
    }

    let text = report.content.as_text();
    if sections {
        for section in SectionSplitter::new().split(&text) {
            out.push_str(&format!("\n## {}\n{}\n", section.title, section.body));
        }
    } else {
        out.push_str("\nContent:\n");
        out.push_str(&text);
        if !text.ends_with('\n') {
            out.push('\n');
        }
    }

    let mut stdout = std::io::stdout().lock();
    stdout.write_all(out.as_bytes())?;
    Ok(())
}

fn run_init(path: Option<PathBuf>, force: bool) -> Result<()> {
    let target_dir = match path {
        Some(dir) => dir,
        None => std::env::current_dir()?,
    };
    info!("Initializing docdiff in: {}", target_dir.display());

    let config_path = target_dir.join("docdiff.toml");
    if config_path.exists() && !force {
        bail!("{} already exists (use --force to overwrite)", config_path.display());
    }

    std::fs::create_dir_all(&target_dir)?;
    Config::default().save(&config_path)?;
    info!("Wrote {}", config_path.display());
    Ok(())
}

fn load_comments(path: &Path) -> Result<Vec<ResolvedComment>> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read comments file {}", path.display()))?;
    let comments: Vec<ResolvedComment> = serde_json::from_str(&content)
        .with_context(|| format!("Invalid comments file {}", path.display()))?;
    Ok(comments)
}

fn path_str(path: &Path) -> String {
    path.to_string_lossy().into_owned()
}

fn file_name(path: &Path) -> String {
    path.file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_else(|| path_str(path))
}
