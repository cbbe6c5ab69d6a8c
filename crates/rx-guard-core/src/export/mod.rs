//! Reporting over recorded allergy data.

mod patterns;

pub use patterns::*;
