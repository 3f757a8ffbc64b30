//! Shared per-query evaluation state: variable bindings, the reference
//! table, and the recursion-depth counter (spec.md §4.2, §5).
//!
//! A single [`EvalContext`] is constructed per top-level call
//! (`evaluate`/`partial`/`contains`/`hull`/`project`) and threaded through
//! the whole recursive descent. The depth counter is the only mutable state;
//! everything else is read-only for the duration of the call, matching
//! spec.md §5's "the only mutable per-call state ... must be held
//! thread-locally".

use std::cell::Cell;
use std::collections::HashMap;

use thiserror::Error;

use super::resolve::ReferenceTable;

/// Errors shared by the evaluator, differentiator, and membership tester
/// (spec.md §7).
#[derive(Debug, Error, Clone, PartialEq)]
pub enum EvalError {
    #[error("unknown variable: {0}")]
    UnknownVariable(String),
    #[error("unknown reference: {0}")]
    UnknownReference(String),
    #[error("unhandled case in CaseDistinction")]
    UnhandledCase,
    #[error("max nesting depth reached")]
    MaxNestingDepthReached,
}

/// Default maximum recursion depth (spec.md §4.2).
pub const DEFAULT_MAX_NESTING_DEPTH: u32 = 10_000;

/// Read-only query context: variable bindings plus the reference table of
/// the advertisement being evaluated, plus a depth counter that every
/// recursive descent increments on entry and decrements on return.
pub struct EvalContext<'a> {
    pub(crate) table: &'a ReferenceTable<'a>,
    pub(crate) bindings: &'a HashMap<String, f64>,
    depth: Cell<u32>,
    max_depth: u32,
}

impl<'a> EvalContext<'a> {
    pub fn new(
        table: &'a ReferenceTable<'a>,
        bindings: &'a HashMap<String, f64>,
        max_depth: u32,
    ) -> Self {
        EvalContext {
            table,
            bindings,
            depth: Cell::new(0),
            max_depth,
        }
    }

    /// Enter one level of recursion. The returned guard decrements the
    /// counter again when dropped (typically at the end of the enclosing
    /// match arm).
    pub(crate) fn enter(&self) -> Result<DepthGuard<'_>, EvalError> {
        let next = self.depth.get() + 1;
        if next > self.max_depth {
            return Err(EvalError::MaxNestingDepthReached);
        }
        self.depth.set(next);
        Ok(DepthGuard { depth: &self.depth })
    }
}

/// RAII guard decrementing [`EvalContext`]'s depth counter on drop.
pub(crate) struct DepthGuard<'a> {
    depth: &'a Cell<u32>,
}

impl Drop for DepthGuard<'_> {
    fn drop(&mut self) {
        self.depth.set(self.depth.get() - 1);
    }
}
