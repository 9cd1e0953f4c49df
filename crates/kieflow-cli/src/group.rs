//! Parsing of `--group` selections.

use anyhow::{anyhow, bail, Result};
use kieflow::JobRequest;

/// Parses `files=a.png,b.png;pipelines=passport,invoice` into a request.
///
/// Both keys are required. Whitespace around names is ignored and empty names
/// are dropped.
pub fn parse_group(input: &str) -> Result<JobRequest> {
    let mut files = None;
    let mut pipelines = None;

    for part in input.split(';').map(str::trim).filter(|p| !p.is_empty()) {
        let (key, values) = part
            .split_once('=')
            .ok_or_else(|| anyhow!("expected key=value in group '{}', got '{}'", input, part))?;
        let names: Vec<String> = values
            .split(',')
            .map(str::trim)
            .filter(|v| !v.is_empty())
            .map(str::to_string)
            .collect();
        match key.trim() {
            "files" => files = Some(names),
            "pipelines" => pipelines = Some(names),
            other => bail!("unknown key '{}' in group '{}'", other, input),
        }
    }

    match (files, pipelines) {
        (Some(files), Some(pipelines)) => Ok(JobRequest::new(files, pipelines)),
        _ => bail!("group '{}' needs both files= and pipelines=", input),
    }
}
