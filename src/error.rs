//! Programmer-error types for the solver's public API.
//!
//! Per the error-handling design, only *setup-time* failures — bad
//! parameters, a problem missing a capability a solver needs — are
//! represented as `Err`. Normal terminations (`max-iter`, `not-finite`,
//! `interrupted`, …) are [`crate::result::Status`] variants on the
//! returned result, not errors.

use derive_more::{Display, Error};
use problemo::Problem;

/// The error type that crosses every fallible public API boundary.
pub type SolveError = Problem;

/// A parameter failed validation.
///
/// `field` names the offending option so the caller can locate it
/// without parsing the display string.
#[derive(Debug, Display, Error, PartialEq)]
#[display("invalid argument `{field}`: {reason}")]
pub struct InvalidArgument {
    pub field: &'static str,
    pub reason: String,
}

impl InvalidArgument {
    pub fn new(field: &'static str, reason: impl Into<String>) -> Self {
        Self {
            field,
            reason: reason.into(),
        }
    }
}

/// A problem value was asked to perform an evaluation it does not
/// support (discovered once, at solver construction, via the
/// [`crate::problem::Capability`] set it advertises).
#[derive(Debug, Display, Error, PartialEq)]
#[display("problem is missing required capability: {capability}")]
pub struct MissingCapability {
    pub capability: &'static str,
}

impl MissingCapability {
    pub fn new(capability: &'static str) -> Self {
        Self { capability }
    }
}
