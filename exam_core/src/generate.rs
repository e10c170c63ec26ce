//! Prompt glue for each exam section. The model is asked for JSON in the
//! shape of the raw types in [`crate::exam`]; anything structurally unusable
//! is rejected here so a cache never stores it.

use anyhow::{ensure, Result};
use tracing::info;

use crate::exam::{
    Interview, LetterKind, ListeningAnnouncements, ListeningExam, ReadingAdvertExam,
    ReadingComprehensionExam, ReadingMatchTitle, WritingExam,
};
use crate::llm::LlmClient;

const SYSTEM_PROMPT: &str = "You write material for the telc B1 German exam. \
Reply with a single JSON object only: no markdown, no code fences, no commentary.";

pub async fn listening_exam(llm: &LlmClient, topic: &str) -> Result<ListeningExam> {
    let prompt = format!(
        r#"The topic of the exam is "{topic}".
Generate a conversation with exactly 5 speakers giving their opinions on this topic.
Each speaker has a different perspective. For each speaker provide:
- "name": a realistic German name
- "gender": "male" or "female"
- "opinion": their opinion in German, 5 to 10 sentences
- "question": a true/false question in German about their opinion
- "correct_answer": true or false (mix true and false across speakers)
Return {{"speakers": [...]}}."#
    );

    let mut exam: ListeningExam = llm.complete_json(SYSTEM_PROMPT, &prompt).await?;
    ensure!(!exam.speakers.is_empty(), "listening exam has no speakers");
    exam.topic = topic.to_string();
    info!(topic, speakers = exam.speakers.len(), "generated listening exam");
    Ok(exam)
}

pub async fn interview(llm: &LlmClient) -> Result<Interview> {
    let prompt = r#"Generate a B1 listening exam interview as JSON with:
- "interviewer": {"name", "gender"} with a realistic German name
- "interviewee": {"name", "profession", "gender"}; not the same gender as the interviewer
- "conversation_segments": at least 50 segments alternating between the two, each
  {"speaker": "interviewer" | "interviewee", "text": 1-3 German sentences, "speaker_gender": "male" | "female"}
- "exam_questions": 10 items {"question_text" (German), "correct_answer" (bool), "explanation" (English)}
- "english_translation_conversation": an English translation of the full conversation
The interviewer asks detailed questions about the interviewee's life, career and experiences."#;

    let interview: Interview = llm.complete_json(SYSTEM_PROMPT, prompt).await?;
    ensure!(
        !interview.conversation_segments.is_empty(),
        "interview has no conversation segments"
    );
    info!(
        segments = interview.conversation_segments.len(),
        questions = interview.exam_questions.len(),
        "generated interview"
    );
    Ok(interview)
}

pub async fn reading_comprehension(llm: &LlmClient) -> Result<ReadingComprehensionExam> {
    let prompt = r#"Write a B1 reading comprehension exercise as JSON with:
- "topic": a short German topic
- "full_text": a German text of 5 paragraphs separated by blank lines
- "questions": one per paragraph, each
  {"paragraph_index" (0-based), "question_text" (German), "correct_answer",
   "wrong_answers" (exactly 2 plausible German distractors), "explanation" (English)}"#;

    let exam: ReadingComprehensionExam = llm.complete_json(SYSTEM_PROMPT, prompt).await?;
    ensure!(!exam.full_text.trim().is_empty(), "reading text is empty");
    ensure!(!exam.questions.is_empty(), "reading comprehension has no questions");
    info!(topic = %exam.topic, questions = exam.questions.len(), "generated reading comprehension");
    Ok(exam)
}

pub async fn match_title(llm: &LlmClient) -> Result<ReadingMatchTitle> {
    let prompt = r#"Write a B1 "match the title" exercise as JSON with:
- "text": a German newspaper-style text of 4-6 sentences
- "correct_title": the German headline that fits the text
- "wrong_title": a plausible German headline that does not fit
- "explanation": why the correct title fits, in English"#;

    let exercise: ReadingMatchTitle = llm.complete_json(SYSTEM_PROMPT, prompt).await?;
    ensure!(
        exercise.correct_title != exercise.wrong_title,
        "match-title exercise offers the same title twice"
    );
    info!("generated match-title exercise");
    Ok(exercise)
}

/// Bullet points a writing task has to cover.
pub const WRITING_TASK_POINTS: usize = 4;

pub async fn writing_exam(llm: &LlmClient, kind: LetterKind, topic: &str) -> Result<WritingExam> {
    let prompt = format!(
        r#"Write a B1 writing task as JSON with:
- "letter": {{"text": a {label} German letter of 6-10 sentences about "{topic}", addressed to the candidate}}
- "tasks": exactly {WRITING_TASK_POINTS} items {{"point": a short German instruction for the reply}}
The reply must answer the letter in the same register."#,
        label = kind.label(),
    );

    let llm = llm.clone().with_temperature(0.6);
    let exam: WritingExam = llm.complete_json(SYSTEM_PROMPT, &prompt).await?;
    ensure!(!exam.letter.text.trim().is_empty(), "writing exam letter is empty");
    ensure!(
        exam.tasks.len() == WRITING_TASK_POINTS,
        "writing exam has {} task points, expected {WRITING_TASK_POINTS}",
        exam.tasks.len()
    );
    info!(kind = kind.label(), topic, "generated writing exam");
    Ok(exam)
}

pub async fn announcements(llm: &LlmClient) -> Result<ListeningAnnouncements> {
    let prompt = r#"Generate a B1 listening exercise with exactly 5 public announcements, one
each at a train station, an airport, a supermarket, a radio traffic report and a
telephone answering machine. Return {"speakers": [...]} where each item has:
- "name": who makes the announcement
- "gender": "male" or "female"
- "announcement": the announcement in German, 5 to 10 sentences
- "question": a true/false statement in German about the announcement
- "correct_answer": true or false (mix both across items)
- "explanation": why, in English
- "english_translation": the announcement in English"#;

    let exam: ListeningAnnouncements = llm.complete_json(SYSTEM_PROMPT, prompt).await?;
    ensure!(!exam.speakers.is_empty(), "announcement exercise has no speakers");
    info!(speakers = exam.speakers.len(), "generated listening announcements");
    Ok(exam)
}

pub async fn reading_adverts(llm: &LlmClient, topics: &[&str]) -> Result<ReadingAdvertExam> {
    let prompt = format!(
        r#"Write a B1 "match the advert" exercise as JSON with "questions": one item per
topic in [{topics}], each
{{"question": a German sentence describing a person looking for something on that topic,
 "correct_advert": a short German classified advert that meets their need,
 "wrong_advert": a similar German advert on the same topic that does not,
 "explanation": why the correct advert fits, in English}}"#,
        topics = topics.join(", "),
    );

    let exam: ReadingAdvertExam = llm.complete_json(SYSTEM_PROMPT, &prompt).await?;
    ensure!(!exam.questions.is_empty(), "advert exercise has no questions");
    info!(questions = exam.questions.len(), "generated reading adverts");
    Ok(exam)
}
