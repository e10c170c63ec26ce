use anyhow::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::llm::LlmClient;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Direction {
    EnToDe,
    DeToEn,
}

impl Direction {
    fn languages(self) -> (&'static str, &'static str) {
        match self {
            Direction::EnToDe => ("English", "German"),
            Direction::DeToEn => ("German", "English"),
        }
    }
}

/// Sentence translation between English and German.
#[async_trait]
pub trait Translator: Send + Sync {
    async fn translate(&self, text: &str, direction: Direction) -> Result<String>;
}

pub(crate) fn translation_prompt(text: &str, direction: Direction) -> String {
    let (from, to) = direction.languages();
    format!(
        "Translate the following {from} sentence accurately into {to}.\n\
         {from} sentence: \"{text}\"\n\
         {to} translation:"
    )
}

#[async_trait]
impl Translator for LlmClient {
    async fn translate(&self, text: &str, direction: Direction) -> Result<String> {
        let system = "You are a precise translator. Reply with the translation only.";
        let reply = self
            .complete_text(system, &translation_prompt(text, direction))
            .await?;
        Ok(reply.trim_matches('"').to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn prompt_names_both_languages() {
        let prompt = translation_prompt("Good morning", Direction::EnToDe);
        assert!(prompt.starts_with("Translate the following English sentence accurately into German."));
        assert!(prompt.contains("\"Good morning\""));
        assert!(prompt.ends_with("German translation:"));

        let prompt = translation_prompt("Guten Morgen", Direction::DeToEn);
        assert!(prompt.contains("German sentence: \"Guten Morgen\""));
    }

    #[test]
    fn direction_uses_kebab_case() {
        assert_eq!(serde_json::to_string(&Direction::EnToDe).unwrap(), "\"en-to-de\"");
        let parsed: Direction = serde_json::from_str("\"de-to-en\"").unwrap();
        assert_eq!(parsed, Direction::DeToEn);
    }
}
