//! Round-based simulation of two fraud schemes for teaching purposes.
//!
//!  - `flat`: a Ponzi model where new money pays earlier investors in join order
//!  - `referral`: a pyramid/MLM model where commissions climb a recruiter tree
//!  - `collapse`: the shared stochastic rule that ends either scheme
//!
//! State is plain data owned by the caller; every operation takes the current
//! snapshot and produces the next one.

extern crate self as scheme_sim_engine;

pub mod batch;
pub mod collapse;
pub mod dice;
pub mod driver;
pub mod error;
pub mod flat;
pub mod referral;
pub mod scheme;
pub mod stats;
pub mod types;

#[cfg(test)]
#[path = "tests.rs"]
mod tests;
