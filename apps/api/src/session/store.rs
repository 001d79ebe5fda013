//! In-memory session registry.
//!
//! Each session owns its résumé records, processing configuration and output
//! accumulator. Writers that outlive a session (a stream still running after
//! the session was deleted) silently drop their updates.

use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::RwLock;
use uuid::Uuid;

use crate::errors::AppError;
use crate::session::models::{
    OutputAccumulator, OutputStatus, ProcessingConfig, ResumeRecord, ResumeSummary,
};

#[derive(Debug)]
struct Session {
    resumes: Vec<ResumeRecord>,
    config: ProcessingConfig,
    output: OutputAccumulator,
}

impl Session {
    fn new() -> Self {
        Self {
            resumes: Vec::new(),
            config: ProcessingConfig::default(),
            output: OutputAccumulator::default(),
        }
    }
}

/// Snapshot handed to the submission pipeline once a submission is accepted.
#[derive(Debug, Clone)]
pub struct SubmissionInput {
    /// In upload order.
    pub resumes: Vec<ResumeRecord>,
    pub config: ProcessingConfig,
}

#[derive(Clone, Default)]
pub struct SessionStore {
    inner: Arc<RwLock<HashMap<Uuid, Session>>>,
}

fn not_found(session_id: Uuid) -> AppError {
    AppError::NotFound(format!("Session {session_id} not found"))
}

impl SessionStore {
    pub async fn create(&self) -> Uuid {
        let id = Uuid::new_v4();
        self.inner.write().await.insert(id, Session::new());
        id
    }

    pub async fn remove(&self, session_id: Uuid) -> Result<(), AppError> {
        self.inner
            .write()
            .await
            .remove(&session_id)
            .map(|_| ())
            .ok_or_else(|| not_found(session_id))
    }

    /// Appends records in the given order and returns the full list afterwards.
    pub async fn add_resumes(
        &self,
        session_id: Uuid,
        records: Vec<ResumeRecord>,
    ) -> Result<Vec<ResumeSummary>, AppError> {
        let mut sessions = self.inner.write().await;
        let session = sessions
            .get_mut(&session_id)
            .ok_or_else(|| not_found(session_id))?;
        session.resumes.extend(records);
        Ok(session.resumes.iter().map(ResumeRecord::summary).collect())
    }

    pub async fn list_resumes(&self, session_id: Uuid) -> Result<Vec<ResumeSummary>, AppError> {
        let sessions = self.inner.read().await;
        let session = sessions.get(&session_id).ok_or_else(|| not_found(session_id))?;
        Ok(session.resumes.iter().map(ResumeRecord::summary).collect())
    }

    /// Removes exactly one record; the relative order of the rest is kept.
    pub async fn remove_resume(&self, session_id: Uuid, resume_id: Uuid) -> Result<(), AppError> {
        let mut sessions = self.inner.write().await;
        let session = sessions
            .get_mut(&session_id)
            .ok_or_else(|| not_found(session_id))?;
        let index = session
            .resumes
            .iter()
            .position(|r| r.id == resume_id)
            .ok_or_else(|| AppError::NotFound(format!("Resume {resume_id} not found")))?;
        session.resumes.remove(index);
        Ok(())
    }

    pub async fn config(&self, session_id: Uuid) -> Result<ProcessingConfig, AppError> {
        let sessions = self.inner.read().await;
        let session = sessions.get(&session_id).ok_or_else(|| not_found(session_id))?;
        Ok(session.config.clone())
    }

    pub async fn set_config(
        &self,
        session_id: Uuid,
        config: ProcessingConfig,
    ) -> Result<(), AppError> {
        let mut sessions = self.inner.write().await;
        let session = sessions
            .get_mut(&session_id)
            .ok_or_else(|| not_found(session_id))?;
        session.config = config;
        Ok(())
    }

    pub async fn output(&self, session_id: Uuid) -> Result<OutputAccumulator, AppError> {
        let sessions = self.inner.read().await;
        let session = sessions.get(&session_id).ok_or_else(|| not_found(session_id))?;
        Ok(session.output.clone())
    }

    /// Accepts a submission: clears the accumulator and snapshots inputs.
    pub async fn begin_submission(&self, session_id: Uuid) -> Result<SubmissionInput, AppError> {
        let mut sessions = self.inner.write().await;
        let session = sessions
            .get_mut(&session_id)
            .ok_or_else(|| not_found(session_id))?;

        if session.resumes.is_empty() {
            return Err(AppError::Validation(
                "Upload at least one resume before submitting".to_string(),
            ));
        }
        if session.output.status.is_in_flight() {
            return Err(AppError::Conflict(
                "A submission is already in progress for this session".to_string(),
            ));
        }

        session.output.reset();
        Ok(SubmissionInput {
            resumes: session.resumes.clone(),
            config: session.config.clone(),
        })
    }

    /// Caches extracted text on records that still exist.
    pub async fn store_texts(&self, session_id: Uuid, texts: &[(Uuid, String)]) {
        let mut sessions = self.inner.write().await;
        let Some(session) = sessions.get_mut(&session_id) else {
            return;
        };
        for (resume_id, text) in texts {
            if let Some(record) = session.resumes.iter_mut().find(|r| r.id == *resume_id) {
                record.text = Some(text.clone());
            }
        }
    }

    pub async fn mark_streaming(&self, session_id: Uuid) {
        self.update_output(session_id, |o| o.status = OutputStatus::Streaming)
            .await;
    }

    pub async fn append_content(&self, session_id: Uuid, chunk: &str) {
        self.update_output(session_id, |o| o.push_content(chunk)).await;
    }

    pub async fn append_reasoning(&self, session_id: Uuid, chunk: &str) {
        self.update_output(session_id, |o| o.push_reasoning(chunk)).await;
    }

    pub async fn complete(&self, session_id: Uuid) {
        self.update_output(session_id, OutputAccumulator::complete)
            .await;
    }

    pub async fn fail(&self, session_id: Uuid) {
        self.update_output(session_id, OutputAccumulator::fail).await;
    }

    async fn update_output<F>(&self, session_id: Uuid, f: F)
    where
        F: FnOnce(&mut OutputAccumulator),
    {
        if let Some(session) = self.inner.write().await.get_mut(&session_id) {
            f(&mut session.output);
        }
    }
}
