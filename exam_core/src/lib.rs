pub mod cache;
pub mod exam;
pub mod generate;
pub mod llm;
pub mod review;
pub mod translate;

pub use cache::{CacheError, CachedGenerator};
pub use llm::LlmClient;
pub use review::WritingReviewer;
pub use translate::{Direction, Translator};
