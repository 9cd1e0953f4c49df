pub mod batch;
pub mod events;
pub mod files;
pub mod pipelines;
pub mod results;

use std::sync::Arc;

use anyhow::{anyhow, Result};
use kieflow::kie::TracingProgress;
use kieflow::{Config, Workspace};
use tokio::task::JoinHandle;

/// Opens the workspace. With `events`, progress goes to a JSON line printer
/// whose task is returned so the caller can wait for it to drain.
pub fn open_workspace(
    config: &Config,
    events: bool,
) -> Result<(Workspace, Option<JoinHandle<()>>)> {
    let workspace = Workspace::from_config(config)?;
    if events {
        let (reporter, printer) = events::spawn_printer();
        return Ok((workspace.with_reporter(Arc::new(reporter)), Some(printer)));
    }
    Ok((workspace.with_reporter(Arc::new(TracingProgress)), None))
}

/// Splits `name=value`.
pub fn parse_pair(pair: &str) -> Result<(String, String)> {
    let (name, value) = pair
        .split_once('=')
        .ok_or_else(|| anyhow!("expected name=value, got '{}'", pair))?;
    Ok((name.trim().to_string(), value.trim().to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_pair() {
        assert_eq!(
            parse_pair("dob = Date of birth").unwrap(),
            ("dob".to_string(), "Date of birth".to_string())
        );
        assert_eq!(
            parse_pair("url=a=b").unwrap(),
            ("url".to_string(), "a=b".to_string())
        );
        assert!(parse_pair("no separator").is_err());
    }
}
