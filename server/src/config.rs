// Configuration for the exam server, read from the environment

use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use audio_core::SilenceRange;
use tracing::warn;

#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub port: u16,
    pub rate_limit_per_minute: u32,
    pub llm_timeout_secs: u64,
    pub request_timeout_secs: u64,
    pub cors_allowed_origins: Option<Vec<String>>,
    pub audio_workers: usize,
    pub silence_min_ms: u32,
    pub silence_max_ms: u32,
    pub audio_spool_dir: PathBuf,
    pub prewarm_caches: bool,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            port: 8085,
            rate_limit_per_minute: 60,
            llm_timeout_secs: 120,
            request_timeout_secs: 120,
            cors_allowed_origins: None,
            audio_workers: default_workers(),
            silence_min_ms: 300,
            silence_max_ms: 700,
            audio_spool_dir: std::env::temp_dir(),
            prewarm_caches: true,
        }
    }
}

fn default_workers() -> usize {
    std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(4)
}

fn env_or<T: FromStr>(key: &str, default: T) -> T {
    std::env::var(key)
        .ok()
        .and_then(|v| v.trim().parse().ok())
        .unwrap_or(default)
}

impl ServerConfig {
    pub fn from_env() -> Self {
        let defaults = Self::default();

        let cors_allowed_origins = std::env::var("CORS_ALLOWED_ORIGINS")
            .ok()
            .map(|origins| {
                origins
                    .split(',')
                    .map(|s| s.trim().to_string())
                    .filter(|s| !s.is_empty())
                    .collect()
            });

        let audio_spool_dir = std::env::var("AUDIO_SPOOL_DIR")
            .ok()
            .filter(|v| !v.trim().is_empty())
            .map(PathBuf::from)
            .unwrap_or(defaults.audio_spool_dir);

        Self {
            port: env_or("PORT", defaults.port),
            rate_limit_per_minute: env_or("RATE_LIMIT_PER_MINUTE", defaults.rate_limit_per_minute),
            llm_timeout_secs: env_or("LLM_TIMEOUT_SECS", defaults.llm_timeout_secs),
            request_timeout_secs: env_or("REQUEST_TIMEOUT_SECS", defaults.request_timeout_secs),
            cors_allowed_origins,
            audio_workers: env_or("AUDIO_WORKERS", defaults.audio_workers).max(1),
            silence_min_ms: env_or("SILENCE_MIN_MS", defaults.silence_min_ms),
            silence_max_ms: env_or("SILENCE_MAX_MS", defaults.silence_max_ms),
            audio_spool_dir,
            prewarm_caches: env_or("PREWARM_CACHES", defaults.prewarm_caches),
        }
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    pub fn llm_timeout(&self) -> Duration {
        Duration::from_secs(self.llm_timeout_secs)
    }

    /// Pause range between synthesized lines. An inverted range from the
    /// environment falls back to the default.
    pub fn silence_range(&self) -> SilenceRange {
        SilenceRange::new(self.silence_min_ms, self.silence_max_ms).unwrap_or_else(|e| {
            warn!("{e}; using default silence range");
            SilenceRange::default()
        })
    }
}
