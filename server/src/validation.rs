use exam_core::exam::WritingReviewRequest;

use crate::error::ApiError;

/// Maximum text length for translation requests, in characters
const MAX_TEXT_LENGTH: usize = 2000;

/// Maximum length of a written answer sent for review, in characters
const MAX_RESPONSE_LENGTH: usize = 5000;

/// Validate the sentence sent for translation
pub fn validate_translation_text(text: &str) -> Result<(), ApiError> {
    if text.trim().is_empty() {
        return Err(ApiError::InvalidInput("Text cannot be empty".to_string()));
    }
    if text.chars().count() > MAX_TEXT_LENGTH {
        return Err(ApiError::InvalidInput(format!(
            "Text too long (max {} characters)",
            MAX_TEXT_LENGTH
        )));
    }
    Ok(())
}

/// Validate a written answer sent for review
pub fn validate_writing_review(request: &WritingReviewRequest) -> Result<(), ApiError> {
    if request.question.trim().is_empty() {
        return Err(ApiError::InvalidInput("Question cannot be empty".to_string()));
    }
    if request.response.trim().is_empty() {
        return Err(ApiError::InvalidInput("Response cannot be empty".to_string()));
    }
    if request.response.chars().count() > MAX_RESPONSE_LENGTH {
        return Err(ApiError::InvalidInput(format!(
            "Response too long (max {} characters)",
            MAX_RESPONSE_LENGTH
        )));
    }
    Ok(())
}
