//! Turning exam content into the ordered lines the assembler speaks.

use audio_core::{AudioSegment, VoiceGender};
use exam_core::exam::{Interview, ListeningAnnouncements, ListeningExam};

/// One segment per conversation line, voiced by the line's speaker gender.
pub fn interview_segments(interview: &Interview) -> Vec<AudioSegment> {
    AudioSegment::sequence(interview.conversation_segments.iter().map(|line| {
        (
            line.text.clone(),
            VoiceGender::from_label(&line.speaker_gender),
        )
    }))
}

/// Each speaker's opinion, in speaker order.
pub fn listening_segments(exam: &ListeningExam) -> Vec<AudioSegment> {
    AudioSegment::sequence(exam.speakers.iter().map(|speaker| {
        (
            speaker.opinion.clone(),
            VoiceGender::from_label(&speaker.gender),
        )
    }))
}

/// Each announcement, in order, in the announcer's voice.
pub fn announcement_segments(exam: &ListeningAnnouncements) -> Vec<AudioSegment> {
    AudioSegment::sequence(exam.speakers.iter().map(|speaker| {
        (
            speaker.announcement.clone(),
            VoiceGender::from_label(&speaker.gender),
        )
    }))
}
