use thiserror::Error;

/// Errors surfaced by the simulation engines.
///
/// Enrolling into a collapsed scheme, or into a referral tree with no active
/// recruiter, is not an error: those calls are no-ops.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum SchemeError {
    /// Investment or fee is zero, negative, NaN or infinite
    #[error("invalid amount: {0} (must be a positive, finite number)")]
    InvalidAmount(f64),

    /// Enrollment batch size is zero
    #[error("invalid count: {0} (must be at least 1)")]
    InvalidCount(usize),

    /// Model parameters rejected at initialization
    #[error("invalid parameters: {0}")]
    InvalidParams(String),
}
