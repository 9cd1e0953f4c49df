use std::path::PathBuf;

use anyhow::{anyhow, Context, Result};
use clap::Subcommand;
use kieflow::Workspace;

#[derive(Subcommand)]
pub enum FilesAction {
    /// List uploaded files with their OCR and usage status.
    List,

    /// Upload local files. Names that already exist are skipped.
    Upload {
        #[arg(required = true)]
        paths: Vec<PathBuf>,
    },

    /// Delete files, their stored bytes and their results.
    Delete {
        #[arg(required = true)]
        paths: Vec<String>,
    },

    /// Download files as a ZIP archive.
    Download {
        #[arg(required = true)]
        paths: Vec<String>,

        #[arg(short, long, default_value = "files.zip")]
        output: PathBuf,
    },
}

pub fn run(workspace: &Workspace, action: FilesAction) -> Result<()> {
    match action {
        FilesAction::List => {
            for file in workspace.snapshot()?.files {
                println!(
                    "{}\t{}\t{}\t{}",
                    file.name,
                    file.status,
                    if file.has_ocr() { "ocr" } else { "-" },
                    file.created_at.format("%Y-%m-%d %H:%M:%S")
                );
            }
        }
        FilesAction::Upload { paths } => {
            let mut uploads = Vec::with_capacity(paths.len());
            for path in &paths {
                let filename = path
                    .file_name()
                    .and_then(|n| n.to_str())
                    .ok_or_else(|| anyhow!("not a file path: {}", path.display()))?;
                let content = std::fs::read(path)
                    .with_context(|| format!("failed to read {}", path.display()))?;
                uploads.push((filename.to_string(), content));
            }

            let report = workspace.upload_files(
                uploads
                    .iter()
                    .map(|(name, content)| (name.as_str(), content.as_slice())),
            )?;
            for file in &report.uploaded {
                println!("uploaded {}", file.name);
            }
            for name in &report.skipped {
                println!("skipped {} (already exists)", name);
            }
        }
        FilesAction::Delete { paths } => {
            let deleted = workspace.delete_files(&paths)?;
            println!("deleted {} file(s)", deleted);
        }
        FilesAction::Download { paths, output } => {
            let archive = workspace.download_zip(&paths)?;
            std::fs::write(&output, archive)
                .with_context(|| format!("failed to write {}", output.display()))?;
            println!("wrote {}", output.display());
        }
    }
    Ok(())
}
