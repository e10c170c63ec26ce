use anyhow::Result;
use async_trait::async_trait;
use tracing::info;

use crate::exam::{WritingReview, WritingReviewRequest};
use crate::llm::LlmClient;

/// Sentence-level feedback on a candidate's written answer.
#[async_trait]
pub trait WritingReviewer: Send + Sync {
    async fn review(&self, request: &WritingReviewRequest) -> Result<WritingReview>;
}

pub(crate) fn review_prompt(request: &WritingReviewRequest) -> String {
    let points = if request.key_points.is_empty() {
        "(none given)".to_string()
    } else {
        request
            .key_points
            .iter()
            .map(|p| format!("- {p}"))
            .collect::<Vec<_>>()
            .join("\n")
    };
    format!(
        r#"A candidate answered this B1 writing task.
Task: "{question}"
Points to cover:
{points}
Answer: "{response}"
Check every sentence of the answer for grammar, spelling and register mistakes.
Return {{"corrections": [...]}} with one item per sentence that needs a change:
{{"original_sentence", "corrected_sentence", "explanation" (English)}}.
Leave out sentences that are already correct."#,
        question = request.question,
        response = request.response,
    )
}

#[async_trait]
impl WritingReviewer for LlmClient {
    async fn review(&self, request: &WritingReviewRequest) -> Result<WritingReview> {
        let system = "You are a strict German teacher. Reply with a single JSON object only.";
        let llm = self.clone().with_temperature(0.2);
        let review: WritingReview = llm.complete_json(system, &review_prompt(request)).await?;
        info!(corrections = review.corrections.len(), "reviewed writing answer");
        Ok(review)
    }
}
