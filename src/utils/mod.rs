//! Shared utilities

pub mod clock;
pub mod error;
pub mod validation;

pub use clock::{Clock, ManualClock, SystemClock};
pub use error::{AppError, AppJson, AppResult, ErrorResponse};
