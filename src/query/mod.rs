//! Single-field document queries
//!
//! A query names one field, a value and an operator. Supported operators:
//! - `equals` (default): typed equality
//! - `startsWith`: string prefix
//! - `contains`: substring of a string, or member of an array
//!
//! No compound predicates, no ordering, no projection.

mod filters;
mod types;

pub use filters::{values_equal, QueryFilter};
pub use types::{Operator, Query};
