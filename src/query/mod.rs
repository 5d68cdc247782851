//! Predicate compiler subsystem.
//!
//! # Data Flow
//! ```text
//! FilterExpr tree (built by handlers or decoded from a request body)
//!     → filter.rs (check against a FilterPolicy when caller supplied)
//!     → filter.rs (compile: fragment + positional args, `$n` placeholders)
//!     → build_where (" WHERE <fragment>" or nothing)
//!     → store (binds args in placeholder order)
//! ```
//!
//! # Design Decisions
//! - Field names and operators are emitted verbatim; values never are
//! - Caller filters are type-checked per field before they reach the store
//! - Placeholders are numbered consecutively across the whole tree
//! - An empty logical node means "no filter"

pub mod filter;
pub mod value;

pub use filter::{
    build_where, Compiled, Filter, FilterError, FilterExpr, FilterPolicy, LogicalFilter,
};
pub use value::{Value, ValueKind};
