//! Domain models for the rx-guard system.

mod catalog;
mod check;
mod finding;
mod patient;

pub use catalog::*;
pub use check::*;
pub use finding::*;
pub use patient::*;
