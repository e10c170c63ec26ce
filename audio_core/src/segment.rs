use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VoiceGender {
    #[default]
    Male,
    Female,
}

impl VoiceGender {
    /// Lenient parse of a gender label as produced by a model. Anything that
    /// is not recognisably female falls back to male.
    pub fn from_label(label: &str) -> Self {
        match label.trim().to_ascii_lowercase().as_str() {
            "female" | "f" | "woman" | "weiblich" | "frau" => VoiceGender::Female,
            _ => VoiceGender::Male,
        }
    }
}

/// One line of text to synthesize with one voice.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AudioSegment {
    pub text: String,
    pub voice_gender: VoiceGender,
    pub order_index: usize,
}

impl AudioSegment {
    pub fn new(text: impl Into<String>, voice_gender: VoiceGender, order_index: usize) -> Self {
        Self {
            text: text.into(),
            voice_gender,
            order_index,
        }
    }

    /// Build a dense, 0-based sequence of segments. Blank lines are skipped
    /// before indices are assigned.
    pub fn sequence<I, S>(lines: I) -> Vec<AudioSegment>
    where
        I: IntoIterator<Item = (S, VoiceGender)>,
        S: Into<String>,
    {
        lines
            .into_iter()
            .map(|(text, gender)| (text.into(), gender))
            .filter(|(text, _)| !text.trim().is_empty())
            .enumerate()
            .map(|(order_index, (text, voice_gender))| AudioSegment {
                text,
                voice_gender,
                order_index,
            })
            .collect()
    }
}
