use anyhow::{bail, Result};
use kieflow::{BatchReport, FileSelection, Workspace};

use crate::group::parse_group;

fn print_report(report: &BatchReport) {
    for item in &report.skipped {
        println!("skipped {}: {}", item.item, item.reason);
    }
    for item in &report.failed {
        println!("failed  {}: {}", item.item, item.reason);
    }
    println!("{}", report.summary());
}

pub async fn ocr(workspace: &Workspace, all: bool, paths: Vec<String>) -> Result<()> {
    let report = if all {
        workspace.run_ocr_unprocessed().await?
    } else if paths.is_empty() {
        bail!("pass storage paths or --all");
    } else {
        workspace.run_ocr(&paths).await?
    };
    print_report(&report);
    Ok(())
}

pub async fn kie(
    workspace: &Workspace,
    selection: FileSelection,
    pipelines: Vec<String>,
    groups: &[String],
    dry_run: bool,
) -> Result<()> {
    let mut requests = Vec::with_capacity(groups.len() + 1);
    let explicit_empty = matches!(&selection, FileSelection::Paths(paths) if paths.is_empty());
    match (explicit_empty, pipelines.is_empty()) {
        (false, false) => {
            let request = workspace.select_for_kie(&selection, &pipelines)?;
            if request.filepaths.is_empty() {
                println!("no files match the selection");
                if groups.is_empty() {
                    return Ok(());
                }
            } else {
                requests.push(request);
            }
        }
        (true, true) => {}
        _ => bail!("--file and --pipeline must be given together"),
    }
    for group in groups {
        requests.push(parse_group(group)?);
    }
    if requests.is_empty() {
        bail!("select files and pipelines with --file/--pipeline or --group");
    }

    if dry_run {
        let job = workspace.plan_kie(&requests)?;
        for item in &job.work_items {
            println!("run     {} / {}", item.filepath, item.pipeline_name);
        }
        for skipped in &job.skipped {
            println!("skip    {}", skipped);
        }
        return Ok(());
    }

    let report = workspace.run_kie(&requests).await?;
    print_report(&report);
    Ok(())
}
