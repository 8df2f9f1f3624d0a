//! Domain models for the clinic core.

mod general;
mod patient;
mod section;

pub use general::*;
pub use patient::*;
pub use section::*;
