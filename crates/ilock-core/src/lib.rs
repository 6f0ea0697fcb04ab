pub mod config;
pub mod envelope;
pub mod error;

pub use envelope::{Envelope, Status};
pub use error::{IlockError, IlockResult};
