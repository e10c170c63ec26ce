use anyhow::{ensure, Context};
use std::borrow::Cow;
use std::io::Cursor;

/// Sample layout shared by every clip in one assembled file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ClipFormat {
    pub sample_rate: u32,
    pub channels: u16,
}

impl ClipFormat {
    fn spec(self) -> hound::WavSpec {
        hound::WavSpec {
            channels: self.channels,
            sample_rate: self.sample_rate,
            bits_per_sample: 16,
            sample_format: hound::SampleFormat::Int,
        }
    }

    /// Number of interleaved samples covering `ms` milliseconds.
    pub fn samples_for_ms(self, ms: u32) -> usize {
        let frames = u64::from(ms) * u64::from(self.sample_rate) / 1000;
        frames as usize * usize::from(self.channels)
    }
}

/// A decoded 16-bit PCM clip.
#[derive(Debug, Clone, PartialEq)]
pub struct Clip {
    pub format: ClipFormat,
    pub samples: Vec<i16>,
}

impl Clip {
    pub fn duration_ms(&self) -> u64 {
        let frames = self.samples.len() as u64 / u64::from(self.format.channels.max(1));
        frames * 1000 / u64::from(self.format.sample_rate.max(1))
    }
}

/// Decode a 16-bit PCM WAV file.
pub fn decode_clip(bytes: &[u8]) -> anyhow::Result<Clip> {
    let bytes = repair_streamed_header(bytes);
    let reader = hound::WavReader::new(Cursor::new(bytes.as_ref())).context("clip is not a WAV file")?;
    let spec = reader.spec();
    ensure!(
        spec.sample_format == hound::SampleFormat::Int && spec.bits_per_sample == 16,
        "unsupported WAV encoding: {:?} {}-bit",
        spec.sample_format,
        spec.bits_per_sample
    );

    let samples = reader
        .into_samples::<i16>()
        .collect::<Result<Vec<_>, _>>()
        .context("clip samples could not be read")?;

    Ok(Clip {
        format: ClipFormat {
            sample_rate: spec.sample_rate,
            channels: spec.channels,
        },
        samples,
    })
}

/// Streaming TTS endpoints write placeholder sizes (usually `0xFFFFFFFF`)
/// because the length is unknown when the header goes out. Clamp the RIFF and
/// data chunk sizes to what was actually received.
fn repair_streamed_header(bytes: &[u8]) -> Cow<'_, [u8]> {
    if bytes.len() < 12 || &bytes[0..4] != b"RIFF" || &bytes[8..12] != b"WAVE" {
        return Cow::Borrowed(bytes);
    }

    let mut pos = 12usize;
    while pos.saturating_add(8) <= bytes.len() {
        let id = &bytes[pos..pos + 4];
        let size = u32::from_le_bytes([bytes[pos + 4], bytes[pos + 5], bytes[pos + 6], bytes[pos + 7]]) as usize;
        let body = pos + 8;

        if id == b"data" {
            let available = bytes.len() - body;
            if size <= available {
                return Cow::Borrowed(bytes);
            }
            let mut fixed = bytes.to_vec();
            let data_len = (available & !1) as u32;
            fixed[pos + 4..pos + 8].copy_from_slice(&data_len.to_le_bytes());
            let riff_len = (bytes.len() - 8) as u32;
            fixed[4..8].copy_from_slice(&riff_len.to_le_bytes());
            return Cow::Owned(fixed);
        }

        // Chunks are padded to an even length.
        pos = body.saturating_add(size).saturating_add(size & 1);
    }
    Cow::Borrowed(bytes)
}

/// Encode interleaved samples as a 16-bit PCM WAV file.
pub fn encode_wav(samples: &[i16], format: ClipFormat) -> anyhow::Result<Vec<u8>> {
    // WAV header (44 bytes) + 2 bytes per sample
    let mut cursor = Cursor::new(Vec::<u8>::with_capacity(44 + samples.len() * 2));
    {
        let mut writer = hound::WavWriter::new(&mut cursor, format.spec())
            .map_err(|e| anyhow::anyhow!("wav write err: {e}"))?;
        for &s in samples {
            writer
                .write_sample(s)
                .map_err(|e| anyhow::anyhow!("wav sample err: {e}"))?;
        }
        writer
            .finalize()
            .map_err(|e| anyhow::anyhow!("wav finalize err: {e}"))?;
    }
    Ok(cursor.into_inner())
}

/// Join clips in order with `gaps_ms[i]` of silence between clip `i` and
/// clip `i + 1`. All clips must share the first clip's format.
pub fn concatenate(clips: &[Clip], gaps_ms: &[u32]) -> anyhow::Result<Vec<u8>> {
    let Some(first) = clips.first() else {
        return Ok(Vec::new());
    };
    ensure!(
        gaps_ms.len() + 1 == clips.len(),
        "expected {} gaps for {} clips, got {}",
        clips.len() - 1,
        clips.len(),
        gaps_ms.len()
    );
    let format = first.format;

    let total = clips.iter().map(|c| c.samples.len()).sum::<usize>()
        + gaps_ms.iter().map(|&ms| format.samples_for_ms(ms)).sum::<usize>();
    let mut samples = Vec::with_capacity(total);

    for (i, clip) in clips.iter().enumerate() {
        ensure!(
            clip.format == format,
            "clip {i} has format {:?}, expected {:?}",
            clip.format,
            format
        );
        if i > 0 {
            samples.resize(samples.len() + format.samples_for_ms(gaps_ms[i - 1]), 0);
        }
        samples.extend_from_slice(&clip.samples);
    }

    encode_wav(&samples, format)
}
