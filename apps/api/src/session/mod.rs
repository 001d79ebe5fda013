// Résumé session: uploads, processing configuration, submission, output.
// All LLM calls go through llm_client; all PDF parsing through extraction.

pub mod handlers;
pub mod models;
pub mod prompts;
pub mod store;
pub mod submit;
