pub mod db;
pub mod error;
pub mod store;
pub mod types;

pub use error::{MemoryError, Result};
pub use store::{MemoryStore, Summarizer};
pub use types::{ContextBundle, LongTermEntry, MemoryType};
