pub mod db;
pub mod error;
pub mod store;
pub mod types;

pub use error::{EntitiesError, Result};
pub use store::EntityStore;
pub use types::{Assistant, Tenant, Thread, ThreadAwakeningRecord, OperatorRole};
