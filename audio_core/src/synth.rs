use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::Client;
use serde::Serialize;
use std::env;
use tracing::debug;

use crate::segment::VoiceGender;

pub const OPENAI_BASE_URL: &str = "https://api.openai.com/v1";
pub const DEFAULT_TTS_MODEL: &str = "tts-1";

/// Text-to-speech provider. Implementations return a complete 16-bit PCM WAV
/// file for one line of text.
#[async_trait]
pub trait Synthesizer: Send + Sync {
    async fn synthesize(&self, text: &str, voice: VoiceGender) -> Result<Vec<u8>>;
}

#[derive(Serialize)]
struct SpeechRequest<'a> {
    model: &'a str,
    voice: &'a str,
    input: &'a str,
    response_format: &'a str,
}

/// OpenAI `/audio/speech` client with one fixed voice per gender.
#[derive(Debug, Clone)]
pub struct OpenAiSpeech {
    api_key: String,
    client: Client,
    model: String,
    base_url: String,
}

impl OpenAiSpeech {
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            client: Client::new(),
            model: DEFAULT_TTS_MODEL.to_string(),
            base_url: OPENAI_BASE_URL.to_string(),
        }
    }

    /// Reads `OPENAI_API_KEY` and, optionally, `TTS_MODEL`.
    pub fn from_env() -> Result<Self> {
        let api_key = env::var("OPENAI_API_KEY")
            .context("OPENAI_API_KEY must be set in the environment")?;
        let mut speech = Self::new(api_key);
        if let Ok(model) = env::var("TTS_MODEL") {
            if !model.trim().is_empty() {
                speech = speech.with_model(model);
            }
        }
        Ok(speech)
    }

    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }

    pub fn voice_for(gender: VoiceGender) -> &'static str {
        match gender {
            VoiceGender::Male => "onyx",
            VoiceGender::Female => "nova",
        }
    }
}

#[async_trait]
impl Synthesizer for OpenAiSpeech {
    async fn synthesize(&self, text: &str, voice: VoiceGender) -> Result<Vec<u8>> {
        let url = format!("{}/audio/speech", self.base_url);
        let body = SpeechRequest {
            model: &self.model,
            voice: Self::voice_for(voice),
            input: text,
            response_format: "wav",
        };

        debug!(voice = body.voice, chars = text.chars().count(), "requesting speech");
        let audio = self
            .client
            .post(&url)
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .await
            .with_context(|| format!("request to {url} failed"))?
            .error_for_status()?
            .bytes()
            .await
            .context("speech response body could not be read")?;

        Ok(audio.to_vec())
    }
}
