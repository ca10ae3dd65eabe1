//! # Semantic Analysis
//!
//! Function signatures, diagnostics and the validator that turns a parsed
//! symbol tree into a sorted, de-duplicated diagnostic list.

pub mod diagnostics;
mod signatures;
mod validate;

pub use diagnostics::{Diagnostic, DiagnosticCollector};
pub use signatures::{FunctionCategory, FunctionSignature, SignatureError, SignatureTable};
pub use validate::{
    DEFAULT_MAX_NESTING_DEPTH, ValidationOptions, Validator, analyze, validate,
};
