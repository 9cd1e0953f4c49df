use std::path::PathBuf;

use anyhow::{bail, Context, Result};
use clap::Subcommand;
use kieflow::{PipelineRecord, Workspace};

use super::parse_pair;

#[derive(Subcommand)]
pub enum PipelinesAction {
    /// List pipelines and their fields.
    List,

    /// Create a pipeline.
    Create {
        name: String,

        /// Field and description, `name=description`. Repeat in field order.
        #[arg(long = "field", required = true)]
        fields: Vec<String>,
    },

    /// Rename a pipeline.
    Rename { name: String, new_name: String },

    /// Replace a pipeline's fields with a JSON object of field to description.
    SetConfig {
        name: String,

        #[arg(long, conflicts_with = "file", required_unless_present = "file")]
        json: Option<String>,

        #[arg(long)]
        file: Option<PathBuf>,
    },

    /// Delete a pipeline and its results.
    Delete { name: String },

    /// Find pipelines whose name contains the query.
    Search { query: String },
}

fn print_pipeline(pipeline: &PipelineRecord) {
    println!("{}", pipeline.name);
    for (field, description) in pipeline.config.iter() {
        println!("  {}: {}", field, description);
    }
}

pub fn run(workspace: &Workspace, action: PipelinesAction) -> Result<()> {
    match action {
        PipelinesAction::List => {
            for pipeline in workspace.snapshot()?.pipelines {
                print_pipeline(&pipeline);
            }
        }
        PipelinesAction::Create { name, fields } => {
            let rows = fields
                .iter()
                .map(|f| parse_pair(f))
                .collect::<Result<Vec<_>>>()?;

            let sessions = workspace.sessions();
            let session_id = sessions.create();
            sessions.with_session(&session_id, |session| {
                let draft = session.new_pipeline();
                draft.name = name;
                for (field, description) in &rows {
                    let index = draft.add_field();
                    draft.set_field(index, field, description);
                }
            });
            let saved = workspace.save_session_pipeline(&session_id);
            sessions.discard(&session_id);

            let pipeline = saved?;
            println!("created pipeline '{}'", pipeline.name);
        }
        PipelinesAction::Rename { name, new_name } => {
            let pipeline = workspace.rename_pipeline(&name, &new_name)?;
            println!("renamed '{}' to '{}'", name, pipeline.name);
        }
        PipelinesAction::SetConfig { name, json, file } => {
            let json = match (json, file) {
                (Some(json), _) => json,
                (None, Some(path)) => std::fs::read_to_string(&path)
                    .with_context(|| format!("failed to read {}", path.display()))?,
                (None, None) => bail!("either --json or --file is required"),
            };
            let pipeline = workspace.set_pipeline_config(&name, &json)?;
            print_pipeline(&pipeline);
        }
        PipelinesAction::Delete { name } => {
            workspace.delete_pipeline(&name)?;
            println!("deleted pipeline '{}'", name);
        }
        PipelinesAction::Search { query } => {
            for pipeline in workspace.search_pipelines(&query)? {
                print_pipeline(&pipeline);
            }
        }
    }
    Ok(())
}
