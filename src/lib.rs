pub mod app;
pub mod config;
pub mod constants;
pub mod error;
pub mod loader;
pub mod logging;
pub mod parser;
pub mod query;
pub mod report;
pub mod storage;
pub mod transform;
pub mod types;

pub use config::Config;
pub use error::{PipelineError, Result};
pub use storage::{InMemoryStore, MongoStore, QuestionStore};
pub use types::{Question, QuestionDocument, RawRow};
