//! Query compiler subsystem for aeroquery
//!
//! Compiles structured specifications into canonical, escaped plan text
//! over a single table named `dataset`.
//!
//! # Design Principles
//!
//! - Deterministic: equivalent specifications give identical text
//! - Explicit: unknown columns, operators and aggregates are rejected
//! - Escaped: user values only reach plan text through `escape`

pub mod ast;
mod compiler;
mod errors;
pub mod escape;
mod spec;

pub use ast::{AggregateFunc, Comparison, Literal, SelectPlan};
pub use compiler::{
    CompiledPlan, Fingerprint, PlanMode, QueryCompiler, TABLE_NAME, TABLE_PLACEHOLDER,
};
pub use errors::{CompileError, CompileErrorCode, CompileResult, Severity};
pub use spec::{
    AggregateSpec, Filter, OrderBy, QueryRequest, QuerySource, RunQueryBody, SortDirection,
    Specification,
};
