use std::future::Future;
use std::sync::atomic::AtomicU64;
use std::sync::Arc;
use std::time::{Duration, Instant};

use anyhow::anyhow;
use audio_core::AudioAssembler;
use exam_core::exam::{
    pick_advert_topics, pick_letter, pick_topic, shape_adverts, shape_comprehension,
    shape_match_titles, Interview, ListeningAnnouncements, ListeningExam, ReadingAdverts,
    ReadingComprehension, ReadingMatchTitles, WritingExam,
};
use exam_core::{generate, CachedGenerator, LlmClient, Translator, WritingReviewer};
use serde::{Deserialize, Serialize};

use crate::config::ServerConfig;

/// One background-refreshing cache per exam type.
#[derive(Clone)]
pub struct ExamCaches {
    pub listening: CachedGenerator<ListeningExam>,
    pub interview: CachedGenerator<Interview>,
    pub comprehension: CachedGenerator<ReadingComprehension>,
    pub match_titles: CachedGenerator<ReadingMatchTitles>,
    pub adverts: CachedGenerator<ReadingAdverts>,
    pub announcements: CachedGenerator<ListeningAnnouncements>,
    pub writing: CachedGenerator<WritingExam>,
}

/// Topics per advert exercise.
const ADVERT_QUESTIONS: usize = 10;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CacheStatus {
    pub name: String,
    pub ready: bool,
}

impl ExamCaches {
    /// Caches whose producers call `llm`, each call bounded by `timeout`.
    pub fn from_llm(llm: Arc<LlmClient>, timeout: Duration) -> Self {
        let listening = {
            let llm = Arc::clone(&llm);
            CachedGenerator::new("listening_exam", move || {
                let llm = Arc::clone(&llm);
                async move {
                    let topic = pick_topic(&mut rand::thread_rng());
                    bounded(timeout, "listening exam", generate::listening_exam(&llm, topic)).await
                }
            })
        };

        let interview = {
            let llm = Arc::clone(&llm);
            CachedGenerator::new("interview", move || {
                let llm = Arc::clone(&llm);
                async move { bounded(timeout, "interview", generate::interview(&llm)).await }
            })
        };

        let comprehension = {
            let llm = Arc::clone(&llm);
            CachedGenerator::new("reading_comprehension", move || {
                let llm = Arc::clone(&llm);
                async move {
                    let exam = bounded(
                        timeout,
                        "reading comprehension",
                        generate::reading_comprehension(&llm),
                    )
                    .await?;
                    Ok(shape_comprehension(exam, &mut rand::thread_rng()))
                }
            })
        };

        let match_titles = {
            let llm = Arc::clone(&llm);
            CachedGenerator::new("reading_match_titles", move || {
                let llm = Arc::clone(&llm);
                async move {
                    let raw = bounded(timeout, "match titles", generate::match_title(&llm)).await?;
                    Ok(shape_match_titles(raw, &mut rand::thread_rng()))
                }
            })
        };

        let adverts = {
            let llm = Arc::clone(&llm);
            CachedGenerator::new("reading_adverts", move || {
                let llm = Arc::clone(&llm);
                async move {
                    let topics = pick_advert_topics(&mut rand::thread_rng(), ADVERT_QUESTIONS);
                    let raw =
                        bounded(timeout, "reading adverts", generate::reading_adverts(&llm, &topics))
                            .await?;
                    Ok(shape_adverts(raw, &mut rand::thread_rng()))
                }
            })
        };

        let announcements = {
            let llm = Arc::clone(&llm);
            CachedGenerator::new("listening_announcements", move || {
                let llm = Arc::clone(&llm);
                async move {
                    bounded(timeout, "listening announcements", generate::announcements(&llm)).await
                }
            })
        };

        let writing = CachedGenerator::new("writing_exam", move || {
            let llm = Arc::clone(&llm);
            async move {
                let (kind, topic) = pick_letter(&mut rand::thread_rng());
                bounded(timeout, "writing exam", generate::writing_exam(&llm, kind, topic)).await
            }
        });

        Self {
            listening,
            interview,
            comprehension,
            match_titles,
            adverts,
            announcements,
            writing,
        }
    }

    /// Start the first generation of every cache without waiting for it.
    pub fn prewarm(&self) {
        self.listening.prewarm();
        self.interview.prewarm();
        self.comprehension.prewarm();
        self.match_titles.prewarm();
        self.adverts.prewarm();
        self.announcements.prewarm();
        self.writing.prewarm();
    }

    pub fn statuses(&self) -> Vec<CacheStatus> {
        let status = |name: &str, ready: bool| CacheStatus {
            name: name.to_string(),
            ready,
        };
        vec![
            status(self.listening.name(), self.listening.is_ready()),
            status(self.interview.name(), self.interview.is_ready()),
            status(self.comprehension.name(), self.comprehension.is_ready()),
            status(self.match_titles.name(), self.match_titles.is_ready()),
            status(self.adverts.name(), self.adverts.is_ready()),
            status(self.announcements.name(), self.announcements.is_ready()),
            status(self.writing.name(), self.writing.is_ready()),
        ]
    }
}

async fn bounded<T>(
    timeout: Duration,
    what: &'static str,
    fut: impl Future<Output = anyhow::Result<T>>,
) -> anyhow::Result<T> {
    tokio::time::timeout(timeout, fut)
        .await
        .map_err(|_| anyhow!("{what} generation timed out after {}s", timeout.as_secs()))?
}

#[derive(Clone)]
pub struct AppState {
    pub caches: ExamCaches,
    pub translator: Arc<dyn Translator>,
    pub reviewer: Arc<dyn WritingReviewer>,
    pub assembler: AudioAssembler,
    pub request_count: Arc<AtomicU64>,
    pub started_at: Instant,
    pub config: ServerConfig,
}

impl AppState {
    pub fn new(
        config: ServerConfig,
        caches: ExamCaches,
        translator: Arc<dyn Translator>,
        reviewer: Arc<dyn WritingReviewer>,
        assembler: AudioAssembler,
    ) -> Self {
        Self {
            caches,
            translator,
            reviewer,
            assembler,
            request_count: Arc::new(AtomicU64::new(0)),
            started_at: Instant::now(),
            config,
        }
    }
}
