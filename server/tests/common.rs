//! Common utilities for integration tests

#![allow(dead_code)]

use std::sync::Arc;

use anyhow::bail;
use async_trait::async_trait;
use audio_core::wav::{encode_wav, ClipFormat};
use audio_core::{AssemblerConfig, AudioAssembler, Synthesizer, VoiceGender};
use axum::Router;
use exam_core::exam::{
    shape_adverts, shape_match_titles, Announcer, ConversationSegment, Correction, ExamQuestion,
    Interview, Interviewee, Interviewer, Letter, ListeningAnnouncements, ListeningExam,
    RawAdvertQuestion, ReadingAdvertExam, ReadingComprehension, ReadingMatchTitle, Speaker,
    WritingExam, WritingReview, WritingReviewRequest, WritingTask,
};
use exam_core::{CachedGenerator, Direction, Translator, WritingReviewer};
use exam_server::{build_router, AppState, ExamCaches, ServerConfig};
use rand::rngs::StdRng;
use rand::SeedableRng;

pub const MONO_8K: ClipFormat = ClipFormat {
    sample_rate: 8000,
    channels: 1,
};

/// Speaks every line as 80 samples: 1000 for a female voice, 2000 for male.
pub struct ToneSynth;

#[async_trait]
impl Synthesizer for ToneSynth {
    async fn synthesize(&self, _text: &str, voice: VoiceGender) -> anyhow::Result<Vec<u8>> {
        let value = match voice {
            VoiceGender::Female => 1000,
            VoiceGender::Male => 2000,
        };
        encode_wav(&[value; 80], MONO_8K)
    }
}

pub struct BrokenSynth;

#[async_trait]
impl Synthesizer for BrokenSynth {
    async fn synthesize(&self, _text: &str, _voice: VoiceGender) -> anyhow::Result<Vec<u8>> {
        bail!("speech provider unavailable")
    }
}

/// Tags the text with the direction; fails on "boom".
pub struct TagTranslator;

#[async_trait]
impl Translator for TagTranslator {
    async fn translate(&self, text: &str, direction: Direction) -> anyhow::Result<String> {
        if text == "boom" {
            bail!("model refused");
        }
        let tag = match direction {
            Direction::EnToDe => "de",
            Direction::DeToEn => "en",
        };
        Ok(format!("[{tag}] {text}"))
    }
}

/// Corrects every sentence that lacks a capitalised first letter; fails on
/// "boom".
pub struct CapitalReviewer;

#[async_trait]
impl WritingReviewer for CapitalReviewer {
    async fn review(&self, request: &WritingReviewRequest) -> anyhow::Result<WritingReview> {
        if request.response == "boom" {
            bail!("model refused");
        }
        let corrections = request
            .response
            .split_inclusive('.')
            .map(str::trim)
            .filter(|sentence| sentence.starts_with(|c: char| c.is_lowercase()))
            .map(|sentence| {
                let mut chars = sentence.chars();
                let corrected: String = chars
                    .next()
                    .map(|first| first.to_uppercase().chain(chars).collect())
                    .unwrap_or_default();
                Correction {
                    original_sentence: sentence.to_string(),
                    corrected_sentence: corrected,
                    explanation: "Sentences start with a capital letter.".to_string(),
                }
            })
            .collect();
        Ok(WritingReview { corrections })
    }
}

pub fn sample_listening_exam() -> ListeningExam {
    let speaker = |name: &str, gender: &str, opinion: &str| Speaker {
        name: name.into(),
        gender: gender.into(),
        opinion: opinion.into(),
        question: format!("{name} ist dafür."),
        correct_answer: true,
    };
    ListeningExam {
        topic: "Ist Freundschaft wichtig für Sie?".into(),
        speakers: vec![
            speaker("Lena", "female", "Freunde sind mir sehr wichtig."),
            speaker("Tom", "male", "Ich bin lieber allein."),
        ],
    }
}

pub fn sample_interview() -> Interview {
    let line = |speaker: &str, gender: &str, text: &str| ConversationSegment {
        speaker: speaker.into(),
        text: text.into(),
        speaker_gender: gender.into(),
    };
    Interview {
        interviewer: Interviewer {
            name: "Anna".into(),
            gender: "female".into(),
        },
        interviewee: Interviewee {
            name: "Jonas".into(),
            profession: "Koch".into(),
            gender: "male".into(),
        },
        conversation_segments: vec![
            line("interviewer", "female", "Herzlich willkommen!"),
            line("interviewee", "male", "Vielen Dank für die Einladung."),
            line("interviewer", "female", "Wie sind Sie Koch geworden?"),
        ],
        exam_questions: vec![ExamQuestion {
            question_text: "Jonas ist Koch.".into(),
            correct_answer: true,
            explanation: "He says so.".into(),
        }],
        english_translation_conversation: String::new(),
    }
}

pub fn sample_match_title() -> ReadingMatchTitle {
    ReadingMatchTitle {
        text: "Die Stadt baut einen neuen Park.".into(),
        correct_title: "Neuer Park in der Stadt".into(),
        wrong_title: "Schwimmbad geschlossen".into(),
        explanation: "The text is about a park.".into(),
    }
}

pub fn sample_writing_exam() -> WritingExam {
    WritingExam {
        letter: Letter {
            text: "Liebe Sarah, ich feiere am Samstag meinen Geburtstag.".into(),
        },
        tasks: ["Dank", "Zusage", "Geschenk", "Anreise"]
            .into_iter()
            .map(|point| WritingTask { point: point.into() })
            .collect(),
    }
}

pub fn sample_announcements() -> ListeningAnnouncements {
    let announcer = |name: &str, gender: &str, text: &str| Announcer {
        name: name.into(),
        gender: gender.into(),
        announcement: text.into(),
        question: "Es gibt eine Verspätung.".into(),
        correct_answer: true,
        explanation: "A delay is announced.".into(),
        english_translation: String::new(),
    };
    ListeningAnnouncements {
        speakers: vec![
            announcer("Bahnhof", "male", "Der ICE hat zehn Minuten Verspätung."),
            announcer("Flughafen", "female", "Flug LH 123 startet später."),
            announcer("Supermarkt", "female", "Heute sind Äpfel im Angebot."),
        ],
    }
}

pub fn sample_advert_exam() -> ReadingAdvertExam {
    let question = |topic: &str| RawAdvertQuestion {
        question: format!("Jemand sucht etwas zum Thema {topic}."),
        correct_advert: format!("Passende Anzeige: {topic}"),
        wrong_advert: format!("Unpassende Anzeige: {topic}"),
        explanation: format!("Only this advert is about {topic}."),
    };
    ReadingAdvertExam {
        questions: ["Auto", "Haus", "Job", "Sport"].into_iter().map(question).collect(),
    }
}

pub fn test_config() -> ServerConfig {
    ServerConfig {
        rate_limit_per_minute: 6000,
        silence_min_ms: 10,
        silence_max_ms: 10,
        audio_workers: 2,
        prewarm_caches: false,
        ..ServerConfig::default()
    }
}

/// Caches backed by fixtures. Reading comprehension always fails.
pub fn test_caches() -> ExamCaches {
    ExamCaches {
        listening: CachedGenerator::new("listening_exam", || async { Ok(sample_listening_exam()) }),
        interview: CachedGenerator::new("interview", || async { Ok(sample_interview()) }),
        comprehension: CachedGenerator::new("reading_comprehension", || async {
            Err::<ReadingComprehension, _>(anyhow::anyhow!("model returned invalid JSON"))
        }),
        match_titles: CachedGenerator::new("reading_match_titles", || async {
            Ok(shape_match_titles(sample_match_title(), &mut StdRng::seed_from_u64(1)))
        }),
        adverts: CachedGenerator::new("reading_adverts", || async {
            Ok(shape_adverts(sample_advert_exam(), &mut StdRng::seed_from_u64(2)))
        }),
        announcements: CachedGenerator::new("listening_announcements", || async {
            Ok(sample_announcements())
        }),
        writing: CachedGenerator::new("writing_exam", || async { Ok(sample_writing_exam()) }),
    }
}

pub fn test_state(synth: Arc<dyn Synthesizer>) -> AppState {
    let config = test_config();
    let assembler = AudioAssembler::new(
        synth,
        AssemblerConfig {
            workers: config.audio_workers,
            silence: config.silence_range(),
            ..AssemblerConfig::default()
        },
    )
    .with_seed(7);
    AppState::new(
        config,
        test_caches(),
        Arc::new(TagTranslator),
        Arc::new(CapitalReviewer),
        assembler,
    )
}

/// Create a test app instance
pub fn create_test_app() -> Router {
    create_test_app_with(Arc::new(ToneSynth))
}

pub fn create_test_app_with(synth: Arc<dyn Synthesizer>) -> Router {
    build_router(test_state(synth)).expect("router should build")
}
