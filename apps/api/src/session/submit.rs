//! Submission pipeline.
//!
//! Flow: begin_submission → extract every résumé (concurrently, upload order
//! kept) → compose prompt → stream completion. All of it runs on one background
//! task, so a client that disconnects mid-way never leaves the session stuck
//! in flight. The task writes into the session accumulator and mirrors every
//! callback onto a channel that the HTTP layer turns into server-sent events.

use async_trait::async_trait;
use axum::response::sse::Event;
use futures_util::future::try_join_all;
use serde_json::json;
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::errors::AppError;
use crate::extraction::{ExtractionError, PdfExtractor};
use crate::llm_client::{CompletionRequest, StreamHandler};
use crate::session::models::{ResumeRecord, GENERIC_FAILURE_MESSAGE};
use crate::session::prompts::{combine_resume_texts, compose_prompt};
use crate::session::store::SessionStore;
use crate::state::AppState;

/// One notification for the client watching a submission.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SubmissionEvent {
    Reasoning(String),
    Content(String),
    Error(String),
    Done,
}

impl SubmissionEvent {
    pub fn into_sse(self) -> Result<Event, axum::Error> {
        match self {
            SubmissionEvent::Reasoning(text) => {
                Event::default().event("reasoning").json_data(json!({ "text": text }))
            }
            SubmissionEvent::Content(text) => {
                Event::default().event("content").json_data(json!({ "text": text }))
            }
            SubmissionEvent::Error(message) => {
                Event::default().event("error").json_data(json!({ "error": message }))
            }
            SubmissionEvent::Done => Ok(Event::default().event("done").data("{}")),
        }
    }
}

/// Routes completion callbacks into the session accumulator and the event channel.
/// A closed channel (client went away) does not stop accumulation.
pub struct SessionStreamHandler {
    store: SessionStore,
    session_id: Uuid,
    events: mpsc::UnboundedSender<SubmissionEvent>,
}

impl SessionStreamHandler {
    fn emit(&self, event: SubmissionEvent) {
        if self.events.send(event).is_err() {
            debug!(
                "Event receiver for session {} is gone; output still accumulates",
                self.session_id
            );
        }
    }
}

#[async_trait]
impl StreamHandler for SessionStreamHandler {
    async fn on_content(&mut self, chunk: &str) {
        self.store.append_content(self.session_id, chunk).await;
        self.emit(SubmissionEvent::Content(chunk.to_string()));
    }

    async fn on_reasoning(&mut self, chunk: &str) {
        self.store.append_reasoning(self.session_id, chunk).await;
        self.emit(SubmissionEvent::Reasoning(chunk.to_string()));
    }

    async fn on_error(&mut self, message: String) {
        warn!("Submission for session {} failed: {message}", self.session_id);
        self.store.fail(self.session_id).await;
        self.emit(SubmissionEvent::Error(GENERIC_FAILURE_MESSAGE.to_string()));
    }

    async fn on_complete(&mut self) {
        info!("Submission for session {} completed", self.session_id);
        self.store.complete(self.session_id).await;
        self.emit(SubmissionEvent::Done);
    }
}

/// Extracts every résumé that has no cached text. Returns `(id, text)` in the
/// order of `resumes`. The first failure fails the whole batch.
pub async fn extract_all(
    extractor: &PdfExtractor,
    resumes: &[ResumeRecord],
) -> Result<Vec<(Uuid, String)>, ExtractionError> {
    try_join_all(resumes.iter().map(|record| async move {
        let text = match &record.text {
            Some(text) => text.clone(),
            None => extractor.extract_text(record.content.clone()).await.map_err(|e| {
                warn!("Extraction failed for resume '{}': {e}", record.name);
                e
            })?,
        };
        Ok::<_, ExtractionError>((record.id, text))
    }))
    .await
}

/// Accepts a submission for `session_id` and prepares the upstream request.
///
/// On extraction failure the session is marked failed and no request is made.
async fn prepare_submission(
    state: &AppState,
    session_id: Uuid,
) -> Result<CompletionRequest, AppError> {
    let input = state.sessions.begin_submission(session_id).await?;
    info!(
        "Submission for session {session_id}: {} resume(s), level={:?}",
        input.resumes.len(),
        input.config.level
    );

    let texts = match extract_all(&state.extractor, &input.resumes).await {
        Ok(texts) => texts,
        Err(e) => {
            state.sessions.fail(session_id).await;
            return Err(e.into());
        }
    };
    state.sessions.store_texts(session_id, &texts).await;

    let texts: Vec<String> = texts.into_iter().map(|(_, text)| text).collect();
    let prompt = compose_prompt(&input.config, &combine_resume_texts(&texts));

    let model = input
        .config
        .model
        .filter(|m| !m.trim().is_empty())
        .unwrap_or_else(|| state.config.default_model.clone());

    state.sessions.mark_streaming(session_id).await;
    Ok(CompletionRequest { model, prompt })
}

/// Accepts a submission and runs it to completion on a background task.
///
/// Returns once the upstream request is about to be made, so validation and
/// extraction failures still reach the caller as errors. Dropping the returned
/// future (or the receiver) does not cancel the work.
pub async fn start_submission(
    state: &AppState,
    session_id: Uuid,
) -> Result<mpsc::UnboundedReceiver<SubmissionEvent>, AppError> {
    let (ready_tx, ready_rx) = oneshot::channel();
    let (events_tx, events_rx) = mpsc::unbounded_channel();
    let state = state.clone();

    tokio::spawn(async move {
        let request = match prepare_submission(&state, session_id).await {
            Ok(request) => request,
            Err(e) => {
                let _ = ready_tx.send(Err(e));
                return;
            }
        };
        let _ = ready_tx.send(Ok(()));

        let mut handler = SessionStreamHandler {
            store: state.sessions.clone(),
            session_id,
            events: events_tx,
        };
        state.llm.stream_completion(&request, &mut handler).await;
    });

    ready_rx
        .await
        .map_err(|e| AppError::Internal(anyhow::anyhow!("Submission task ended early: {e}")))??;
    Ok(events_rx)
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use axum::http::StatusCode;
    use bytes::Bytes;
    use tempfile::TempDir;

    use super::*;
    use crate::config::Config;
    use crate::export::render_pdf;
    use crate::session::models::{OutputStatus, ProcessingConfig};
    use crate::test_support::{spawn_upstream, STREAM_FIXTURE};

    async fn drain(mut rx: mpsc::UnboundedReceiver<SubmissionEvent>) -> Vec<SubmissionEvent> {
        let mut events = Vec::new();
        while let Some(event) = rx.recv().await {
            events.push(event);
        }
        events
    }

    /// A session holding records whose text is already cached, so no real PDF is needed.
    async fn session_with_texts(state: &AppState, texts: &[&str]) -> Uuid {
        let id = state.sessions.create().await;
        let records: Vec<ResumeRecord> = texts
            .iter()
            .enumerate()
            .map(|(i, _)| ResumeRecord::new(format!("{i}.pdf"), Bytes::from_static(b"%PDF")))
            .collect();
        let added = state.sessions.add_resumes(id, records).await.unwrap();
        let cached: Vec<(Uuid, String)> = added
            .iter()
            .zip(texts)
            .map(|(summary, text)| (summary.id, text.to_string()))
            .collect();
        state.sessions.store_texts(id, &cached).await;
        id
    }

    async fn wait_until_settled(state: &AppState, id: Uuid) -> OutputStatus {
        for _ in 0..200 {
            let status = state.sessions.output(id).await.unwrap().status;
            if !status.is_in_flight() {
                return status;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        panic!("submission for {id} never settled");
    }

    #[tokio::test]
    async fn test_submission_streams_and_accumulates() {
        let dir = TempDir::new().unwrap();
        let (url, captured) = spawn_upstream(StatusCode::OK, STREAM_FIXTURE).await;
        let state = AppState::new(Config::for_tests(&url, dir.path().to_path_buf()));
        let id = session_with_texts(&state, &["Alpha resume", "Beta resume"]).await;

        let events = drain(start_submission(&state, id).await.unwrap()).await;
        assert_eq!(
            events,
            vec![
                SubmissionEvent::Reasoning("Let me ".to_string()),
                SubmissionEvent::Reasoning("think.".to_string()),
                SubmissionEvent::Content("# Jane Doe\n".to_string()),
                SubmissionEvent::Content("Rust engineer".to_string()),
                SubmissionEvent::Done,
            ]
        );

        let output = state.sessions.output(id).await.unwrap();
        assert_eq!(output.content, "# Jane Doe\nRust engineer");
        assert_eq!(output.reasoning, "Let me think.");
        assert_eq!(output.status, OutputStatus::Completed);

        let sent = captured.lock().unwrap();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].1["model"], "deepseek-ai/DeepSeek-R1");
        let prompt = sent[0].1["messages"][0]["content"].as_str().unwrap();
        assert!(prompt.contains("Alpha resume\n\nBeta resume"));
    }

    #[tokio::test]
    async fn test_selected_model_is_sent() {
        let dir = TempDir::new().unwrap();
        let (url, captured) = spawn_upstream(StatusCode::OK, "data: [DONE]\n\n").await;
        let state = AppState::new(Config::for_tests(&url, dir.path().to_path_buf()));
        let id = session_with_texts(&state, &["text"]).await;
        state
            .sessions
            .set_config(
                id,
                ProcessingConfig {
                    model: Some("Qwen/QwQ-32B".to_string()),
                    ..ProcessingConfig::default()
                },
            )
            .await
            .unwrap();

        drain(start_submission(&state, id).await.unwrap()).await;

        let sent = captured.lock().unwrap();
        assert_eq!(sent[0].1["model"], "Qwen/QwQ-32B");
    }

    #[tokio::test]
    async fn test_upstream_error_fails_session_without_done() {
        let dir = TempDir::new().unwrap();
        let (url, _) = spawn_upstream(StatusCode::INTERNAL_SERVER_ERROR, "boom").await;
        let state = AppState::new(Config::for_tests(&url, dir.path().to_path_buf()));
        let id = session_with_texts(&state, &["text"]).await;

        let events = drain(start_submission(&state, id).await.unwrap()).await;

        assert_eq!(
            events,
            vec![SubmissionEvent::Error(GENERIC_FAILURE_MESSAGE.to_string())]
        );
        let output = state.sessions.output(id).await.unwrap();
        assert_eq!(output.status, OutputStatus::Failed);
        assert_eq!(output.content, GENERIC_FAILURE_MESSAGE);
    }

    #[tokio::test]
    async fn test_extraction_failure_aborts_before_upstream() {
        let dir = TempDir::new().unwrap();
        let (url, captured) = spawn_upstream(StatusCode::OK, STREAM_FIXTURE).await;
        let state = AppState::new(Config::for_tests(&url, dir.path().to_path_buf()));
        let id = state.sessions.create().await;
        state
            .sessions
            .add_resumes(
                id,
                vec![ResumeRecord::new(
                    "broken.pdf".to_string(),
                    Bytes::from_static(b"definitely not a pdf"),
                )],
            )
            .await
            .unwrap();

        let err = start_submission(&state, id).await.unwrap_err();

        assert!(matches!(err, AppError::Extraction(_)));
        assert_eq!(
            state.sessions.output(id).await.unwrap().status,
            OutputStatus::Failed
        );
        assert!(captured.lock().unwrap().is_empty());
        assert!(std::fs::read_dir(dir.path()).unwrap().next().is_none());
    }

    #[tokio::test]
    async fn test_dropped_request_does_not_block_resubmission() {
        let dir = TempDir::new().unwrap();
        let (url, captured) = spawn_upstream(StatusCode::OK, STREAM_FIXTURE).await;
        let state = AppState::new(Config::for_tests(&url, dir.path().to_path_buf()));
        let id = state.sessions.create().await;
        let pdf = render_pdf("Alpha", "Resume").unwrap();
        state
            .sessions
            .add_resumes(id, vec![ResumeRecord::new("a.pdf".to_string(), Bytes::from(pdf))])
            .await
            .unwrap();

        // Poll once, then drop it, as axum does when the client hangs up.
        let mut submit = Box::pin(start_submission(&state, id));
        assert!(futures_util::poll!(&mut submit).is_pending());
        drop(submit);

        assert_eq!(wait_until_settled(&state, id).await, OutputStatus::Completed);
        let events = drain(start_submission(&state, id).await.unwrap()).await;
        assert_eq!(events.last(), Some(&SubmissionEvent::Done));
        assert_eq!(captured.lock().unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_extract_all_reads_uncached_pdfs_in_order() {
        let dir = TempDir::new().unwrap();
        let extractor = PdfExtractor::new(dir.path().to_path_buf());
        let first = ResumeRecord::new(
            "alpha.pdf".to_string(),
            Bytes::from(render_pdf("Alpha", "Resume").unwrap()),
        );
        let second = ResumeRecord::new(
            "beta.pdf".to_string(),
            Bytes::from(render_pdf("Beta", "Resume").unwrap()),
        );

        let texts = extract_all(&extractor, &[first.clone(), second.clone()])
            .await
            .unwrap();

        assert_eq!(texts.len(), 2);
        assert_eq!(texts[0].0, first.id);
        assert!(texts[0].1.contains("Alpha"), "got {:?}", texts[0].1);
        assert_eq!(texts[1].0, second.id);
        assert!(texts[1].1.contains("Beta"), "got {:?}", texts[1].1);
        assert!(std::fs::read_dir(dir.path()).unwrap().next().is_none());
    }

    #[tokio::test]
    async fn test_extract_all_uses_cached_text_in_order() {
        let dir = TempDir::new().unwrap();
        let extractor = PdfExtractor::new(dir.path().to_path_buf());
        let mut first = ResumeRecord::new("a.pdf".to_string(), Bytes::from_static(b"x"));
        first.text = Some("A".to_string());
        let mut second = ResumeRecord::new("b.pdf".to_string(), Bytes::from_static(b"y"));
        second.text = Some("B".to_string());

        let texts = extract_all(&extractor, &[first.clone(), second.clone()])
            .await
            .unwrap();

        assert_eq!(
            texts,
            vec![(first.id, "A".to_string()), (second.id, "B".to_string())]
        );
    }

    #[test]
    fn test_done_event_converts() {
        assert!(SubmissionEvent::Done.into_sse().is_ok());
        assert!(SubmissionEvent::Content("line\r\nbreak".to_string())
            .into_sse()
            .is_ok());
    }
}
