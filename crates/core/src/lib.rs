//! Core primitives for differentially private relational synthesis.
//!
//! This crate provides the building blocks shared by the optimizer and the
//! synthesis loop: noise mechanisms, random sampling, sparse query matrices,
//! the global relationship vector and unbiased rounding.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod error;
pub mod noise;
pub mod relationship;
pub mod rounding;
pub mod sampling;
pub mod sparse;

pub use error::{DpError, Result};
pub use noise::{add_gaussian_noise, ExponentialMechanism, GaussianMechanism};
pub use relationship::RelationshipVector;
pub use rounding::{one_to_many_sample, unbiased_sample};
pub use sampling::{
    categorical_sample, inverse_cdf_sample, permutation, sample_from, sample_without_replacement,
    softmax,
};
pub use sparse::SparseMatrix;

/// Common imports for downstream users.
pub mod prelude {
    pub use crate::{
        add_gaussian_noise, categorical_sample, inverse_cdf_sample, one_to_many_sample,
        permutation, sample_from, sample_without_replacement, softmax, unbiased_sample, DpError,
        ExponentialMechanism, GaussianMechanism, RelationshipVector, Result, SparseMatrix,
    };
}
