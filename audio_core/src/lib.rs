pub mod assembler;
pub mod segment;
pub mod stream;
pub mod synth;
pub mod wav;

pub use assembler::{AssemblerConfig, AudioAssembler, SilenceRange};
pub use segment::{AudioSegment, VoiceGender};
pub use stream::{AssembledAudio, AudioChunk, SpooledAudio, DEFAULT_CHUNK_SIZE};
pub use synth::{OpenAiSpeech, Synthesizer};
