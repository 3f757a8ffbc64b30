//! Pre-scan of an advertisement, mapping each named sub-expression to its
//! node (spec.md §4.2).
//!
//! [`ReferenceTable::build`] walks the three expression trees of an
//! advertisement exactly once, registering every `Name`d node under its
//! name. Duplicate names are rejected at this stage; reference *cycles* are
//! not checked here — they surface at evaluation time as
//! [`crate::expr::eval::EvalError::MaxNestingDepthReached`] once the
//! recursive descent's depth counter trips (spec.md §4.2, §9).

use std::collections::HashMap;

use thiserror::Error;

use super::{RealExpr, SetExpr};
use crate::wire::Advertisement;

/// Errors raised while building a [`ReferenceTable`].
#[derive(Debug, Error, PartialEq)]
pub enum ResolveError {
    #[error("duplicate RealExpr name: {0}")]
    DuplicateRealName(String),
    #[error("duplicate SetExpr name: {0}")]
    DuplicateSetName(String),
}

/// Name -> node lookup tables for one advertisement, built once when an
/// [`crate::Interpreter`] attaches it.
#[derive(Debug, Default)]
pub struct ReferenceTable<'a> {
    reals: HashMap<String, &'a RealExpr>,
    sets: HashMap<String, &'a SetExpr>,
}

impl<'a> ReferenceTable<'a> {
    /// Walk `adv`'s three expression trees, registering every `Name` node.
    pub fn build(adv: &'a Advertisement) -> Result<Self, ResolveError> {
        let mut table = ReferenceTable::default();
        table.walk_set(&adv.pq_profile)?;
        table.walk_set(&adv.belief_function)?;
        table.walk_real(&adv.cost_function)?;
        Ok(table)
    }

    pub fn real(&self, name: &str) -> Option<&'a RealExpr> {
        self.reals.get(name).copied()
    }

    pub fn set(&self, name: &str) -> Option<&'a SetExpr> {
        self.sets.get(name).copied()
    }

    fn walk_real(&mut self, expr: &'a RealExpr) -> Result<(), ResolveError> {
        if let RealExpr::Name(name, child) = expr {
            if self.reals.insert(name.clone(), expr).is_some() {
                return Err(ResolveError::DuplicateRealName(name.clone()));
            }
            return self.walk_real(child);
        }
        match expr {
            RealExpr::UnaryOp { arg, .. } => self.walk_real(arg),
            RealExpr::BinaryOp { a, b, .. } => {
                self.walk_real(a)?;
                self.walk_real(b)
            }
            RealExpr::ListOp { args, .. } => {
                for arg in args {
                    self.walk_real(arg)?;
                }
                Ok(())
            }
            RealExpr::CaseDistinction { cases, .. } => {
                for case in cases {
                    self.walk_set(&case.set)?;
                    self.walk_real(&case.expression)?;
                }
                Ok(())
            }
            RealExpr::Real(_) | RealExpr::Variable(_) | RealExpr::Reference(_) => Ok(()),
            RealExpr::Name(_, _) => unreachable!("handled above"),
            RealExpr::Polynomial(_) => Ok(()),
        }
    }

    fn walk_set(&mut self, set: &'a SetExpr) -> Result<(), ResolveError> {
        if let SetExpr::Name(name, child) = set {
            if self.sets.insert(name.clone(), set).is_some() {
                return Err(ResolveError::DuplicateSetName(name.clone()));
            }
            return self.walk_set(child);
        }
        match set {
            SetExpr::Singleton(coords) => {
                for c in coords {
                    self.walk_real(c)?;
                }
                Ok(())
            }
            SetExpr::Ball { center, radius } => {
                for c in center {
                    self.walk_real(c)?;
                }
                self.walk_real(radius)
            }
            SetExpr::Rectangle(bounds) => {
                for pair in bounds {
                    self.walk_real(&pair.a)?;
                    self.walk_real(&pair.b)?;
                }
                Ok(())
            }
            SetExpr::ConvexPolytope { a, b } => {
                for row in a {
                    for cell in row {
                        self.walk_real(cell)?;
                    }
                }
                for cell in b {
                    self.walk_real(cell)?;
                }
                Ok(())
            }
            SetExpr::Intersection(children) => {
                for child in children {
                    self.walk_set(child)?;
                }
                Ok(())
            }
            SetExpr::CaseDistinction { cases, .. } => {
                for case in cases {
                    self.walk_set(&case.guard)?;
                    self.walk_set(&case.body)?;
                }
                Ok(())
            }
            SetExpr::Reference(_) => Ok(()),
            SetExpr::Name(_, _) => unreachable!("handled above"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::wire::Advertisement;
    use crate::expr::{BoundaryPair, RealExpr};

    fn adv_with(pq: SetExpr, belief: SetExpr, cost: RealExpr) -> Advertisement {
        Advertisement {
            pq_profile: pq,
            belief_function: belief,
            cost_function: cost,
            implemented_setpoint: [0.0, 0.0],
        }
    }

    #[test]
    fn registers_named_nodes() {
        let named = RealExpr::Name("half".to_string(), Box::new(RealExpr::Real(0.5)));
        let adv = adv_with(
            SetExpr::Rectangle(vec![BoundaryPair {
                a: RealExpr::Real(0.0),
                b: RealExpr::Real(1.0),
            }]),
            SetExpr::Singleton(vec![RealExpr::Real(0.0)]),
            named,
        );
        let table = ReferenceTable::build(&adv).unwrap();
        assert_eq!(table.real("half"), Some(&adv.cost_function));
    }

    #[test]
    fn duplicate_names_rejected() {
        let inner = RealExpr::Name(
            "x".to_string(),
            Box::new(RealExpr::Name("x".to_string(), Box::new(RealExpr::Real(1.0)))),
        );
        let adv = adv_with(
            SetExpr::Singleton(vec![]),
            SetExpr::Singleton(vec![]),
            inner,
        );
        assert!(matches!(
            ReferenceTable::build(&adv),
            Err(ResolveError::DuplicateRealName(_))
        ));
    }
}
