//! Service layer: the AI gateway client, the dashboard flows and the
//! persistence and cache adapters they use.

pub mod ai_client;
pub mod cache;
pub mod chat;
pub mod enrichment;
pub mod prompts;
pub mod session;
pub mod storage;
pub mod store;
pub mod task_update;

pub use ai_client::{AiGateway, GeminiClient};
pub use cache::RedisCache;
pub use session::{EditingSession, SessionRegistry};
pub use storage::{MemoryStore, PgStore, ProjectStore};
