//! Gonzalez-Schlegel IRC steps in redundant internal coordinates. A step is
//! taken in two halves: [predictor::hessian_half_step] moves half the step
//! size to the pivot point and extrapolates a guess point, and
//! [corrector::dq_irc] uses the gradient and Hessian at the guess point to
//! land on the hypersphere about the pivot

pub mod config;
pub mod corrector;
pub mod error;
pub mod input;
pub mod lagrangian;
pub mod molsys;
pub mod path;
pub mod predictor;

pub use error::IrcError;

#[cfg(test)]
mod tests;
