//! Differentially private synthesis of relationship tables.
//!
//! Given two synthetic entity tables and a set of histogram workloads over
//! related row pairs, [`learn_relationship_vector`] privately learns which
//! rows to relate so that the synthetic relationships reproduce the workload
//! answers of the original data.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod config;
pub mod learner;
pub mod query;
pub mod selection;
pub mod slicing;

/// Crate version string.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

pub use dp_relational_accounting as accounting;
pub use dp_relational_core as core;
pub use dp_relational_optim as optim;

pub use dp_relational_accounting::{cdp_delta, cdp_eps, cdp_rho, PrivacyParams, RelationalBudget};
pub use config::{
    AnswerScope, AssignmentMode, Device, RelationalSynthConfig, DEFAULT_EXPANSION_RATIO,
};
pub use dp_relational_core::{DpError, RelationshipVector, Result, SparseMatrix};
pub use learner::{learn_relationship_vector, RelationalSynthesizer, SliceReport};
pub use query::{
    dataset_answer, evaluate_relationships, l1_error, validate_query_manager, Evaluation,
    InMemoryQueryManager, QueryManager, RelationalShape, TableSide, Workload, WorkloadOffsets,
};
pub use selection::{exponential_selection, rerank, AnswerCache, WorkloadSelector};
pub use slicing::{Slice, SliceSampler, SliceSizes};

/// Convenience prelude covering the synthesis API.
pub mod prelude {
    pub use crate::config::{AnswerScope, AssignmentMode, Device, RelationalSynthConfig};
    pub use crate::learner::{learn_relationship_vector, RelationalSynthesizer, SliceReport};
    pub use crate::query::{
        evaluate_relationships, Evaluation, InMemoryQueryManager, QueryManager, RelationalShape,
        TableSide, Workload, WorkloadOffsets,
    };
    pub use dp_relational_accounting::prelude::*;
    pub use dp_relational_core::prelude::*;
    pub use dp_relational_optim::prelude::*;
}
