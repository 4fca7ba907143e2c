pub mod config;
pub mod error;
pub mod store;
pub mod types;

pub use config::{load_config, ClientConfig, FileConfig, PipelineConfig, SessionConfig};
pub use error::DraftpubError;
pub use store::{JsonFileStore, MemoryStore, StateStore};
pub use types::*;
