use std::path::Path;

use anyhow::{Context, Result};
use kieflow::{ExtractedFields, Workspace};

use super::parse_pair;

pub fn metrics(workspace: &Workspace) -> Result<()> {
    let metrics = workspace.metrics()?;
    println!("{}", serde_json::to_string_pretty(&metrics)?);
    Ok(())
}

pub fn attribution(workspace: &Workspace, pipeline: &str, file: &str, json: bool) -> Result<()> {
    let view = workspace.attribution(pipeline, file)?;
    if json {
        println!("{}", serde_json::to_string_pretty(&view)?);
        return Ok(());
    }

    println!("{} / {}", view.file, view.pipeline);
    for (name, value) in &view.fields {
        let boxes: Vec<&str> = view
            .matches
            .attribution
            .iter()
            .filter(|(_, field)| *field == name)
            .map(|(text, _)| text.as_str())
            .collect();
        if boxes.is_empty() {
            println!("  {}: {}", name, value);
        } else {
            println!("  {}: {}  <- {}", name, value, boxes.join(" | "));
        }
    }
    for h in &view.highlights {
        let (x0, y0, x1, y1) = h.bounds;
        println!(
            "  page {} [{:.0},{:.0} {:.0},{:.0}] {}: {}",
            h.page, x0, y0, x1, y1, h.field, h.text
        );
    }
    println!("{} matched box(es)", view.matches.matched_box_count());
    Ok(())
}

pub fn validate(
    workspace: &Workspace,
    pipeline: &str,
    file: &str,
    fields: &[String],
    score: Option<f64>,
) -> Result<()> {
    let mut corrected = ExtractedFields::new();
    for field in fields {
        let (name, value) = parse_pair(field)?;
        corrected.insert(name, value);
    }
    workspace.record_validation(pipeline, file, &corrected, score)?;
    println!("recorded validation for {} / {}", file, pipeline);
    Ok(())
}

pub fn export(workspace: &Workspace, output: Option<&Path>) -> Result<()> {
    let json = workspace.export_results()?;
    match output {
        Some(path) => {
            std::fs::write(path, json)
                .with_context(|| format!("failed to write {}", path.display()))?;
            println!("wrote {}", path.display());
        }
        None => println!("{}", json),
    }
    Ok(())
}
