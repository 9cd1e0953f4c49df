//! Per-user working state that lives between requests.
//!
//! Sessions expire after a period without access.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use moka::sync::Cache;
use uuid::Uuid;

use crate::config::SessionConfig;
use crate::model::PipelineRecord;
use crate::pipeline::PipelineDraft;

/// Drafts and uploader state of one user.
#[derive(Debug, Clone, Default)]
pub struct Session {
    new_pipeline: PipelineDraft,
    edits: HashMap<String, PipelineDraft>,
    uploader_generation: u64,
}

impl Session {
    pub fn new() -> Self {
        Self::default()
    }

    /// The form for a pipeline that does not exist yet.
    pub fn new_pipeline(&mut self) -> &mut PipelineDraft {
        &mut self.new_pipeline
    }

    /// The edit form of `pipeline`, loaded from the record on first access.
    pub fn edit_draft(&mut self, pipeline: &PipelineRecord) -> &mut PipelineDraft {
        self.edits
            .entry(pipeline.id.clone())
            .or_insert_with(|| PipelineDraft::from_pipeline(pipeline))
    }

    pub fn has_edit(&self, pipeline_id: &str) -> bool {
        self.edits.contains_key(pipeline_id)
    }

    pub fn discard_edit(&mut self, pipeline_id: &str) -> Option<PipelineDraft> {
        self.edits.remove(pipeline_id)
    }

    pub fn uploader_generation(&self) -> u64 {
        self.uploader_generation
    }

    /// Clears the uploader after a completed upload.
    pub fn reset_uploader(&mut self) -> u64 {
        self.uploader_generation += 1;
        self.uploader_generation
    }
}

/// Sessions by id, dropped after `idle_timeout` without access.
#[derive(Clone)]
pub struct SessionStore {
    sessions: Cache<String, Arc<Mutex<Session>>>,
}

impl SessionStore {
    pub fn new(idle_timeout: Duration) -> Self {
        Self {
            sessions: Cache::builder().time_to_idle(idle_timeout).build(),
        }
    }

    pub fn from_config(config: &SessionConfig) -> Self {
        Self::new(Duration::from_secs(config.idle_timeout_secs))
    }

    /// Starts a session and returns its id.
    pub fn create(&self) -> String {
        let id = Uuid::new_v4().to_string();
        self.sessions
            .insert(id.clone(), Arc::new(Mutex::new(Session::new())));
        log::debug!("Created session {}", id);
        id
    }

    pub fn contains(&self, id: &str) -> bool {
        self.sessions.contains_key(id)
    }

    /// Runs `f` on the session, or returns `None` if it is unknown or expired.
    pub fn with_session<R>(&self, id: &str, f: impl FnOnce(&mut Session) -> R) -> Option<R> {
        let session = self.sessions.get(id)?;
        let mut guard = session.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        Some(f(&mut guard))
    }

    pub fn discard(&self, id: &str) {
        self.sessions.invalidate(id);
    }
}
