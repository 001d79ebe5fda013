// Prompt text for the résumé rewrite call.

use crate::session::models::{EmbellishmentLevel, ProcessingConfig};

/// Placed between the texts of consecutive résumés.
pub const RESUME_SEPARATOR: &str = "\n\n";

const LEVEL_NONE: &str =
    "Stay strictly with the content of the resumes. Do not add any experience that is not there.";
const LEVEL_MODERATE: &str = "Polish the resume content where appropriate: improve the wording \
    and bring out the most important achievements, but keep every underlying fact unchanged.";
const LEVEL_CREATIVE: &str = "Rewrite the resume content creatively: you may expand and enrich \
    it where appropriate to make the resume more competitive.";

pub fn level_instruction(level: EmbellishmentLevel) -> &'static str {
    match level {
        EmbellishmentLevel::None => LEVEL_NONE,
        EmbellishmentLevel::Moderate => LEVEL_MODERATE,
        EmbellishmentLevel::Creative => LEVEL_CREATIVE,
    }
}

/// Joins extracted texts in upload order.
pub fn combine_resume_texts(texts: &[String]) -> String {
    texts.join(RESUME_SEPARATOR)
}

/// Builds the single user message sent upstream.
pub fn compose_prompt(config: &ProcessingConfig, resume_contents: &str) -> String {
    format!(
        "I will give you one or more resumes. Based on their content and the job requirements \
below, select the relevant experience and produce one new, optimised resume that fits the job.\n\
\n\
Requirements for the new resume: {instruction}\n\
\n\
Job requirements: {requirements}\n\
\n\
Output the resume directly as Markdown. Do not include anything else and do not wrap it in a \
Markdown code block.\n\
\n\
Resume content:\n\
{resume_contents}\n",
        instruction = level_instruction(config.level),
        requirements = config.job_requirements.trim(),
    )
}
