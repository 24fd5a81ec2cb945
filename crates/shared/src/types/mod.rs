//! Common types used across the application.

pub mod id;
pub mod response;

pub use id::*;
pub use response::{ApiResponse, ResponseStatus};
