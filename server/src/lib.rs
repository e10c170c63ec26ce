pub mod audio;
pub mod config;
pub mod error;
pub mod routes;
pub mod state;
pub mod validation;

pub use config::ServerConfig;
pub use routes::build_router;
pub use state::{AppState, ExamCaches};
