pub mod awakening;
pub mod callback;
pub mod error;
pub mod preservation;

pub use awakening::AwakeningScanner;
pub use callback::{send_callback, CallbackOutcome};
pub use error::{Result, TasksError};
pub use preservation::PreservationJob;
