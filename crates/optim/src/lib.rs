//! Constrained optimization over relationship assignments.
//!
//! Power iteration for the step size, projections onto the standard and
//! one-to-many constraint sets, and fixed-budget projected gradient descent.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod pgd;
pub mod power;
pub mod projection;
pub mod test_utils;

pub use pgd::{
    gradient, learning_rate, loss, pgd_optimize, random_one_to_many_start, random_start,
    CallbackArgs, PgdResult, ONE_TO_MANY_STEPS, STANDARD_STEPS,
};
pub use power::{
    largest_singular_value, SingularValueEstimate, POWER_MAX_ITERATIONS, POWER_TOLERANCE,
};
pub use projection::{
    is_one_to_many_feasible, is_simplex_cap_feasible, project_one_to_many, project_simplex,
    project_simplex_cap, Projection,
};

/// Common imports for the optimizer.
pub mod prelude {
    pub use crate::{
        gradient, is_one_to_many_feasible, is_simplex_cap_feasible, largest_singular_value,
        learning_rate, loss, pgd_optimize, project_one_to_many, project_simplex,
        project_simplex_cap, random_one_to_many_start, random_start, CallbackArgs, PgdResult,
        Projection, SingularValueEstimate, ONE_TO_MANY_STEPS, POWER_MAX_ITERATIONS,
        POWER_TOLERANCE, STANDARD_STEPS,
    };
}
