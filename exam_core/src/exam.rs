//! Exam content types and the shaping applied before they are served.
//!
//! Raw types mirror what the model is asked to return; shaped types are what
//! clients receive. Option IDs are content hashes so a client can check an
//! answer without the server keeping any state.

use rand::seq::SliceRandom;
use rand::Rng;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

/// Topics for the opinion-based listening exam.
pub const LISTENING_TOPICS: &[&str] = &[
    "Ist Freundschaft wichtig für Sie?",
    "Sollte man im Urlaub ins Ausland reisen?",
    "Ist das Leben in der Stadt besser als auf dem Land?",
    "Sollten Kinder ein eigenes Smartphone haben?",
    "Ist Homeoffice die Zukunft der Arbeit?",
    "Sollte man jeden Tag Sport treiben?",
    "Ist es wichtig, eine Fremdsprache zu lernen?",
    "Sollte Fleisch teurer werden?",
];

/// Choose a listening topic.
pub fn pick_topic<R: Rng + ?Sized>(rng: &mut R) -> &'static str {
    LISTENING_TOPICS
        .choose(rng)
        .copied()
        .unwrap_or(LISTENING_TOPICS[0])
}

/// Lowercase hex SHA-256 of `text`.
pub fn to_hash_id(text: &str) -> String {
    hex::encode(Sha256::digest(text.as_bytes()))
}

// Listening: opinions

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Speaker {
    pub name: String,
    pub gender: String,
    /// The speaker's opinion in German, 5 to 10 sentences.
    pub opinion: String,
    /// True/false question about the opinion, in German.
    pub question: String,
    pub correct_answer: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ListeningExam {
    #[serde(default)]
    pub topic: String,
    pub speakers: Vec<Speaker>,
}

// Listening: interview

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Interviewer {
    pub name: String,
    pub gender: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Interviewee {
    pub name: String,
    pub profession: String,
    pub gender: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConversationSegment {
    /// Either `interviewer` or `interviewee`.
    pub speaker: String,
    pub text: String,
    pub speaker_gender: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExamQuestion {
    pub question_text: String,
    pub correct_answer: bool,
    pub explanation: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Interview {
    pub interviewer: Interviewer,
    pub interviewee: Interviewee,
    pub conversation_segments: Vec<ConversationSegment>,
    pub exam_questions: Vec<ExamQuestion>,
    #[serde(default)]
    pub english_translation_conversation: String,
}

// Reading: comprehension

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawComprehensionQuestion {
    /// 0-based paragraph the question refers to.
    pub paragraph_index: usize,
    pub question_text: String,
    pub correct_answer: String,
    pub wrong_answers: Vec<String>,
    pub explanation: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReadingComprehensionExam {
    pub topic: String,
    pub full_text: String,
    pub questions: Vec<RawComprehensionQuestion>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ComprehensionOption {
    pub id: String,
    pub text: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ComprehensionQuestion {
    pub id: String,
    pub paragraph_index: usize,
    pub question_text: String,
    pub options: Vec<ComprehensionOption>,
    pub correct_option_id: String,
    pub explanation: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReadingComprehension {
    pub topic: String,
    pub full_text: String,
    pub paragraphs: Vec<String>,
    pub questions: Vec<ComprehensionQuestion>,
}

/// Hash option IDs, shuffle the options and order questions by paragraph.
pub fn shape_comprehension<R: Rng + ?Sized>(
    exam: ReadingComprehensionExam,
    rng: &mut R,
) -> ReadingComprehension {
    let paragraphs = split_paragraphs(&exam.full_text);

    let mut questions: Vec<ComprehensionQuestion> = exam
        .questions
        .into_iter()
        .map(|raw| {
            let mut options: Vec<ComprehensionOption> = std::iter::once(&raw.correct_answer)
                .chain(raw.wrong_answers.iter())
                .map(|text| ComprehensionOption {
                    id: to_hash_id(text),
                    text: text.clone(),
                })
                .collect();
            options.shuffle(rng);

            ComprehensionQuestion {
                id: to_hash_id(&raw.question_text),
                paragraph_index: raw.paragraph_index,
                correct_option_id: to_hash_id(&raw.correct_answer),
                question_text: raw.question_text,
                options,
                explanation: raw.explanation,
            }
        })
        .collect();
    // Stable, so questions on the same paragraph keep their generated order.
    questions.sort_by_key(|q| q.paragraph_index);

    ReadingComprehension {
        topic: exam.topic,
        full_text: exam.full_text,
        paragraphs,
        questions,
    }
}

fn split_paragraphs(text: &str) -> Vec<String> {
    text.replace("\r\n", "\n")
        .split("\n\n")
        .map(str::trim)
        .filter(|p| !p.is_empty())
        .map(str::to_string)
        .collect()
}

// Reading: match titles

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReadingMatchTitle {
    pub text: String,
    pub correct_title: String,
    pub wrong_title: String,
    pub explanation: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TitleOption {
    pub id: String,
    pub title: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MatchTitleQuestion {
    pub text: String,
    pub correct_title: String,
    pub explanation: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReadingMatchTitles {
    pub questions: Vec<MatchTitleQuestion>,
    pub titles: Vec<TitleOption>,
}

pub fn shape_match_titles<R: Rng + ?Sized>(raw: ReadingMatchTitle, rng: &mut R) -> ReadingMatchTitles {
    let mut titles: Vec<TitleOption> = [&raw.correct_title, &raw.wrong_title]
        .into_iter()
        .map(|title| TitleOption {
            id: to_hash_id(title),
            title: title.clone(),
        })
        .collect();
    titles.shuffle(rng);

    ReadingMatchTitles {
        questions: vec![MatchTitleQuestion {
            text: raw.text,
            correct_title: raw.correct_title,
            explanation: raw.explanation,
        }],
        titles,
    }
}

// Writing: letter

/// Register of the letter the candidate answers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LetterKind {
    Formal,
    Informal,
}

impl LetterKind {
    pub fn label(self) -> &'static str {
        match self {
            LetterKind::Formal => "formal",
            LetterKind::Informal => "informal",
        }
    }

    pub fn topics(self) -> &'static [&'static str] {
        match self {
            LetterKind::Formal => FORMAL_LETTER_TOPICS,
            LetterKind::Informal => INFORMAL_LETTER_TOPICS,
        }
    }
}

pub const FORMAL_LETTER_TOPICS: &[&str] = &[
    "Beschwerde über eine mangelhafte Dienstleistung",
    "Anfrage bezüglich Ihrer Produktpalette",
    "Bewerbung um eine Stelle als Auszubildender",
    "Kündigung eines Vertrags gemäß Frist",
    "Beschwerde über Lärmbelästigung in der Nachbarschaft",
    "Einladung zu einer geschäftlichen Veranstaltung",
    "Mitteilung über Änderung Ihrer Bankverbindung",
    "Anfrage nach einem Termin beim Bürgeramt",
    "Reklamation einer falschen Lieferung",
];

pub const INFORMAL_LETTER_TOPICS: &[&str] = &[
    "Einladung zum Geburtstag eines Freundes",
    "Entschuldigung für das Versäumen eines Treffens",
    "Erzählung von deinem letzten Urlaub",
    "Dankeschön für ein schönes Geschenk",
    "Bitte um Hilfe beim Umzug",
    "Einladung zum Grillabend im Garten",
    "Fragen nach Empfehlungen für Filme",
    "Glückwünsche zur bestandenen Prüfung",
];

/// Choose a register at random, then a topic for it.
pub fn pick_letter<R: Rng + ?Sized>(rng: &mut R) -> (LetterKind, &'static str) {
    let kind = if rng.gen_bool(0.5) {
        LetterKind::Formal
    } else {
        LetterKind::Informal
    };
    let topics = kind.topics();
    (kind, topics.choose(rng).copied().unwrap_or(topics[0]))
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Letter {
    pub text: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WritingTask {
    pub point: String,
}

/// A letter to answer plus the points the answer has to cover.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WritingExam {
    pub letter: Letter,
    pub tasks: Vec<WritingTask>,
}

// Writing: review

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WritingReviewRequest {
    pub question: String,
    #[serde(default)]
    pub key_points: Vec<String>,
    pub response: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Correction {
    pub original_sentence: String,
    pub corrected_sentence: String,
    /// In English.
    pub explanation: String,
}

/// Only sentences that needed a change are listed.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct WritingReview {
    #[serde(default)]
    pub corrections: Vec<Correction>,
}

// Listening: public announcements

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Announcer {
    pub name: String,
    pub gender: String,
    /// The announcement in German, 5 to 10 sentences.
    #[serde(alias = "opinion")]
    pub announcement: String,
    pub question: String,
    pub correct_answer: bool,
    pub explanation: String,
    #[serde(default)]
    pub english_translation: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ListeningAnnouncements {
    pub speakers: Vec<Announcer>,
}

// Reading: adverts

pub const ADVERT_TOPICS: &[&str] = &[
    "Auto",
    "Haus",
    "Job",
    "Geld",
    "Gesundheit",
    "Reisen",
    "Mode",
    "Kunst",
    "Musik",
    "Sport",
    "Technik",
    "Natur",
    "Essen",
    "Bildung",
    "Freizeit",
    "Haustiere",
];

/// `n` distinct advert topics; fewer when the list is shorter.
pub fn pick_advert_topics<R: Rng + ?Sized>(rng: &mut R, n: usize) -> Vec<&'static str> {
    ADVERT_TOPICS.choose_multiple(rng, n).copied().collect()
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawAdvertQuestion {
    /// The situation of someone looking for something, in German.
    pub question: String,
    pub correct_advert: String,
    pub wrong_advert: String,
    pub explanation: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReadingAdvertExam {
    pub questions: Vec<RawAdvertQuestion>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AdvertOption {
    pub id: String,
    pub text: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AdvertQuestion {
    pub id: String,
    pub question: String,
    pub correct_advert_id: String,
    pub explanation: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReadingAdverts {
    pub questions: Vec<AdvertQuestion>,
    pub adverts: Vec<AdvertOption>,
}

/// Wrong adverts mixed in beside the correct ones.
pub const EXTRA_WRONG_ADVERTS: usize = 2;

/// Offer every correct advert plus [`EXTRA_WRONG_ADVERTS`] sampled wrong
/// ones, shuffled, each under its content hash.
pub fn shape_adverts<R: Rng + ?Sized>(exam: ReadingAdvertExam, rng: &mut R) -> ReadingAdverts {
    let mut adverts: Vec<AdvertOption> = Vec::new();
    for raw in &exam.questions {
        push_unique(&mut adverts, &raw.correct_advert);
    }
    let wrong: Vec<&str> = exam
        .questions
        .iter()
        .map(|q| q.wrong_advert.as_str())
        .filter(|text| !adverts.iter().any(|a| a.text == *text))
        .collect();
    for text in wrong.choose_multiple(rng, EXTRA_WRONG_ADVERTS) {
        push_unique(&mut adverts, text);
    }
    adverts.shuffle(rng);

    let questions = exam
        .questions
        .into_iter()
        .map(|raw| AdvertQuestion {
            id: to_hash_id(&raw.question),
            correct_advert_id: to_hash_id(&raw.correct_advert),
            question: raw.question,
            explanation: raw.explanation,
        })
        .collect();

    ReadingAdverts { questions, adverts }
}

fn push_unique(adverts: &mut Vec<AdvertOption>, text: &str) {
    let id = to_hash_id(text);
    if !adverts.iter().any(|a| a.id == id) {
        adverts.push(AdvertOption {
            id,
            text: text.to_string(),
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn raw_question(paragraph_index: usize, question: &str) -> RawComprehensionQuestion {
        RawComprehensionQuestion {
            paragraph_index,
            question_text: question.to_string(),
            correct_answer: format!("{question} richtig"),
            wrong_answers: vec![format!("{question} falsch 1"), format!("{question} falsch 2")],
            explanation: "weil".to_string(),
        }
    }

    fn comprehension_exam() -> ReadingComprehensionExam {
        ReadingComprehensionExam {
            topic: "Wohnen".to_string(),
            full_text: "Erster Absatz.\n\n  Zweiter Absatz.  \n\n\n\nDritter Absatz.".to_string(),
            questions: vec![
                raw_question(2, "Frage C"),
                raw_question(0, "Frage A"),
                raw_question(1, "Frage B"),
            ],
        }
    }

    #[test]
    fn hash_id_is_hex_sha256() {
        assert_eq!(
            to_hash_id("abc"),
            "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad"
        );
        assert_eq!(to_hash_id("Haus"), to_hash_id("Haus"));
        assert_ne!(to_hash_id("Haus"), to_hash_id("haus"));
    }

    #[test]
    fn comprehension_is_sorted_and_keeps_correct_option() {
        let mut rng = StdRng::seed_from_u64(7);
        let shaped = shape_comprehension(comprehension_exam(), &mut rng);

        assert_eq!(
            shaped.paragraphs,
            vec!["Erster Absatz.", "Zweiter Absatz.", "Dritter Absatz."]
        );
        let order: Vec<usize> = shaped.questions.iter().map(|q| q.paragraph_index).collect();
        assert_eq!(order, vec![0, 1, 2]);

        for question in &shaped.questions {
            assert_eq!(question.options.len(), 3);
            assert_eq!(question.id, to_hash_id(&question.question_text));
            let correct = question
                .options
                .iter()
                .find(|o| o.id == question.correct_option_id)
                .expect("correct option must be among the options");
            assert!(correct.text.ends_with("richtig"));
        }
    }

    #[test]
    fn shuffling_is_reproducible_with_a_seed() {
        let a = shape_comprehension(comprehension_exam(), &mut StdRng::seed_from_u64(42));
        let b = shape_comprehension(comprehension_exam(), &mut StdRng::seed_from_u64(42));
        assert_eq!(a, b);
    }

    #[test]
    fn match_titles_offer_both_titles() {
        let raw = ReadingMatchTitle {
            text: "Ein Text über Fahrräder.".to_string(),
            correct_title: "Radfahren in der Stadt".to_string(),
            wrong_title: "Urlaub am Meer".to_string(),
            explanation: "Es geht um Fahrräder.".to_string(),
        };
        let shaped = shape_match_titles(raw, &mut StdRng::seed_from_u64(1));

        assert_eq!(shaped.questions.len(), 1);
        assert_eq!(shaped.titles.len(), 2);
        let ids: Vec<&str> = shaped.titles.iter().map(|t| t.id.as_str()).collect();
        assert!(ids.contains(&to_hash_id("Radfahren in der Stadt").as_str()));
        assert!(ids.contains(&to_hash_id("Urlaub am Meer").as_str()));
    }

    #[test]
    fn picked_topic_comes_from_the_list() {
        let mut rng = StdRng::seed_from_u64(3);
        for _ in 0..20 {
            assert!(LISTENING_TOPICS.contains(&pick_topic(&mut rng)));
        }
    }

    #[test]
    fn interview_decodes_without_translation() {
        let json = r#"{
            "interviewer": {"name": "Anna Weber", "gender": "female"},
            "interviewee": {"name": "Jonas Berg", "profession": "Koch", "gender": "male"},
            "conversation_segments": [
                {"speaker": "interviewer", "text": "Guten Tag!", "speaker_gender": "female"}
            ],
            "exam_questions": []
        }"#;
        let interview: Interview = serde_json::from_str(json).unwrap();
        assert_eq!(interview.conversation_segments.len(), 1);
        assert!(interview.english_translation_conversation.is_empty());
    }

    fn advert_question(n: usize) -> RawAdvertQuestion {
        RawAdvertQuestion {
            question: format!("Person {n} sucht etwas."),
            correct_advert: format!("Anzeige {n}"),
            wrong_advert: format!("Falsche Anzeige {n}"),
            explanation: format!("Advert {n} fits."),
        }
    }

    #[test]
    fn adverts_offer_every_correct_one_and_two_wrong_ones() {
        let exam = ReadingAdvertExam {
            questions: (0..10).map(advert_question).collect(),
        };
        let shaped = shape_adverts(exam, &mut StdRng::seed_from_u64(9));

        assert_eq!(shaped.questions.len(), 10);
        assert_eq!(shaped.adverts.len(), 10 + EXTRA_WRONG_ADVERTS);
        let wrong = shaped
            .adverts
            .iter()
            .filter(|a| a.text.starts_with("Falsche"))
            .count();
        assert_eq!(wrong, EXTRA_WRONG_ADVERTS);

        for question in &shaped.questions {
            assert_eq!(question.id, to_hash_id(&question.question));
            assert!(shaped.adverts.iter().any(|a| a.id == question.correct_advert_id));
        }
        for advert in &shaped.adverts {
            assert_eq!(advert.id, to_hash_id(&advert.text));
        }
    }

    #[test]
    fn adverts_never_repeat_an_id() {
        let mut shared = advert_question(1);
        shared.wrong_advert = "Anzeige 2".to_string();
        let exam = ReadingAdvertExam {
            questions: vec![shared, advert_question(2), advert_question(2)],
        };
        let shaped = shape_adverts(exam, &mut StdRng::seed_from_u64(4));

        let mut ids: Vec<&str> = shaped.adverts.iter().map(|a| a.id.as_str()).collect();
        let before = ids.len();
        ids.sort_unstable();
        ids.dedup();
        assert_eq!(ids.len(), before);
        // "Anzeige 1", "Anzeige 2" and the only distinct wrong advert
        assert_eq!(before, 3);
    }

    #[test]
    fn advert_topics_are_distinct() {
        let topics = pick_advert_topics(&mut StdRng::seed_from_u64(2), 10);
        assert_eq!(topics.len(), 10);
        let mut sorted = topics.clone();
        sorted.sort_unstable();
        sorted.dedup();
        assert_eq!(sorted.len(), 10);
        assert!(topics.iter().all(|t| ADVERT_TOPICS.contains(t)));

        assert_eq!(pick_advert_topics(&mut StdRng::seed_from_u64(2), 100).len(), ADVERT_TOPICS.len());
    }

    #[test]
    fn picked_letter_topic_matches_its_register() {
        let mut rng = StdRng::seed_from_u64(11);
        let mut seen = (false, false);
        for _ in 0..50 {
            let (kind, topic) = pick_letter(&mut rng);
            assert!(kind.topics().contains(&topic));
            match kind {
                LetterKind::Formal => seen.0 = true,
                LetterKind::Informal => seen.1 = true,
            }
        }
        assert_eq!(seen, (true, true));
    }

    #[test]
    fn writing_exam_decodes() {
        let json = r#"{
            "letter": {"text": "Liebe Maria, ..."},
            "tasks": [{"point": "Dank"}, {"point": "Termin"}, {"point": "Essen"}, {"point": "Anreise"}]
        }"#;
        let exam: WritingExam = serde_json::from_str(json).unwrap();
        assert_eq!(exam.tasks.len(), 4);
        assert_eq!(exam.tasks[3].point, "Anreise");
    }

    #[test]
    fn announcement_accepts_opinion_field() {
        let json = r#"{"speakers": [{
            "name": "Bahnhofsdurchsage", "gender": "female",
            "opinion": "Der ICE nach Berlin hat zehn Minuten Verspätung.",
            "question": "Der Zug kommt pünktlich.", "correct_answer": false,
            "explanation": "The train is ten minutes late."
        }]}"#;
        let parsed: ListeningAnnouncements = serde_json::from_str(json).unwrap();
        let speaker = &parsed.speakers[0];
        assert!(speaker.announcement.starts_with("Der ICE"));
        assert!(speaker.english_translation.is_empty());

        let out = serde_json::to_value(&parsed).unwrap();
        assert!(out["speakers"][0]["announcement"].is_string());
    }

    #[test]
    fn review_without_corrections_decodes_empty() {
        let review: WritingReview = serde_json::from_str("{}").unwrap();
        assert!(review.corrections.is_empty());
    }
}
