//! Privacy accounting for relational synthesis.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod budget;
pub mod cdp;

pub use budget::{PrivacyParams, RelationalBudget, UNBOUNDED_EPSILON0};
pub use cdp::{cdp_delta, cdp_eps, cdp_rho};

/// Common imports for privacy accounting.
pub mod prelude {
    pub use crate::{
        cdp_delta, cdp_eps, cdp_rho, PrivacyParams, RelationalBudget, UNBOUNDED_EPSILON0,
    };
}
