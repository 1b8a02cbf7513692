pub mod in_memory;
pub mod keyword_scorer;
pub mod report;
pub mod rest;
pub mod storage;

pub use in_memory::InMemoryPipeline;
pub use keyword_scorer::KeywordScorer;
pub use rest::RestPipelineClient;
pub use storage::{LocalDiskStorage, MemoryStorage};
