//! Concurrent synthesis of many segments into one WAV file.
//!
//! Every segment is synthesized on its own task. A semaphore shared by all
//! clones of an [`AudioAssembler`] bounds how many provider calls are in
//! flight at once, across every assembly running against it. Segments that
//! fail are logged and left out; the remaining clips are joined in
//! `order_index` order with a random pause between neighbours.

use anyhow::{ensure, Context, Result};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::collections::btree_map::Entry;
use std::collections::BTreeMap;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Instant;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tracing::{debug, info, warn};

use crate::segment::AudioSegment;
use crate::stream::{AssembledAudio, DEFAULT_CHUNK_SIZE};
use crate::synth::Synthesizer;
use crate::wav::{self, Clip};

/// Inclusive range for the pause inserted between two clips.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SilenceRange {
    min_ms: u32,
    max_ms: u32,
}

impl SilenceRange {
    pub fn new(min_ms: u32, max_ms: u32) -> Result<Self> {
        ensure!(
            min_ms <= max_ms,
            "silence range minimum {min_ms} ms exceeds maximum {max_ms} ms"
        );
        Ok(Self { min_ms, max_ms })
    }

    pub fn min_ms(&self) -> u32 {
        self.min_ms
    }

    pub fn max_ms(&self) -> u32 {
        self.max_ms
    }

    pub fn sample<R: Rng + ?Sized>(&self, rng: &mut R) -> u32 {
        rng.gen_range(self.min_ms..=self.max_ms)
    }
}

impl Default for SilenceRange {
    fn default() -> Self {
        Self {
            min_ms: 300,
            max_ms: 700,
        }
    }
}

#[derive(Debug, Clone)]
pub struct AssemblerConfig {
    /// Maximum number of segments synthesized at once.
    pub workers: usize,
    pub silence: SilenceRange,
    pub chunk_size: usize,
}

impl Default for AssemblerConfig {
    fn default() -> Self {
        Self {
            workers: std::thread::available_parallelism()
                .map(|n| n.get())
                .unwrap_or(4),
            silence: SilenceRange::default(),
            chunk_size: DEFAULT_CHUNK_SIZE,
        }
    }
}

#[derive(Clone)]
pub struct AudioAssembler {
    synth: Arc<dyn Synthesizer>,
    pool: Arc<Semaphore>,
    rng: Arc<Mutex<StdRng>>,
    config: AssemblerConfig,
}

impl AudioAssembler {
    pub fn new(synth: Arc<dyn Synthesizer>, config: AssemblerConfig) -> Self {
        let workers = config.workers.max(1);
        Self {
            synth,
            pool: Arc::new(Semaphore::new(workers)),
            rng: Arc::new(Mutex::new(StdRng::from_entropy())),
            config: AssemblerConfig { workers, ..config },
        }
    }

    pub fn with_seed(self, seed: u64) -> Self {
        self.with_rng(StdRng::seed_from_u64(seed))
    }

    pub fn with_rng(mut self, rng: StdRng) -> Self {
        self.rng = Arc::new(Mutex::new(rng));
        self
    }

    pub fn config(&self) -> &AssemblerConfig {
        &self.config
    }

    /// Synthesize `segments` and join them into one WAV file. `silence`
    /// overrides the configured pause range for this call.
    ///
    /// Returns an empty [`AssembledAudio`] when no segment succeeds. Errors
    /// only come from the final encode step.
    pub async fn assemble(
        &self,
        segments: Vec<AudioSegment>,
        silence: Option<SilenceRange>,
    ) -> Result<AssembledAudio> {
        let silence = silence.unwrap_or(self.config.silence);
        let total = segments.len();
        let started = Instant::now();

        let mut tasks = JoinSet::new();
        for segment in segments {
            let synth = Arc::clone(&self.synth);
            let pool = Arc::clone(&self.pool);
            tasks.spawn(async move {
                let index = segment.order_index;
                (index, render_segment(synth, pool, segment).await)
            });
        }

        let mut clips = BTreeMap::new();
        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok((index, Ok(clip))) => match clips.entry(index) {
                    Entry::Vacant(slot) => {
                        slot.insert(clip);
                    }
                    Entry::Occupied(_) => {
                        warn!(order_index = index, "duplicate order_index; keeping the clip that finished first");
                    }
                },
                Ok((index, Err(e))) => {
                    warn!(order_index = index, error = %e, "segment synthesis failed; skipping");
                }
                Err(e) => {
                    warn!(error = %e, "segment task did not complete; skipping");
                }
            }
        }

        let mut ordered = clips.into_iter();
        let Some((first_index, first)) = ordered.next() else {
            warn!(segments = total, "no segment could be synthesized; returning empty audio");
            return Ok(AssembledAudio::empty(self.config.chunk_size));
        };

        let format = first.format;
        let mut kept = vec![first];
        for (index, clip) in ordered {
            if clip.format != format {
                warn!(
                    order_index = index,
                    expected = ?format,
                    found = ?clip.format,
                    first = first_index,
                    "clip format differs from first clip; skipping"
                );
                continue;
            }
            kept.push(clip);
        }

        let gaps: Vec<u32> = {
            let mut rng = self.rng.lock().unwrap_or_else(PoisonError::into_inner);
            (1..kept.len()).map(|_| silence.sample(&mut *rng)).collect()
        };

        let clip_count = kept.len();
        let bytes = tokio::task::spawn_blocking(move || wav::concatenate(&kept, &gaps))
            .await
            .context("audio concatenation task failed")??;

        info!(
            segments = total,
            clips = clip_count,
            bytes = bytes.len(),
            elapsed_ms = started.elapsed().as_millis() as u64,
            "assembled audio"
        );
        Ok(AssembledAudio::new(bytes, self.config.chunk_size))
    }
}

async fn render_segment(
    synth: Arc<dyn Synthesizer>,
    pool: Arc<Semaphore>,
    segment: AudioSegment,
) -> Result<Clip> {
    let _permit = pool
        .acquire_owned()
        .await
        .context("audio worker pool closed")?;

    debug!(order_index = segment.order_index, voice = ?segment.voice_gender, "synthesizing segment");
    let bytes = synth
        .synthesize(&segment.text, segment.voice_gender)
        .await?;

    tokio::task::spawn_blocking(move || wav::decode_clip(&bytes))
        .await
        .context("clip decode task failed")?
}
