//! Advertisement model and interpreter for a real-time grid-resource control
//! protocol.
//!
//! This crate is the runtime counterpart of the protocol's advertisement
//! schema: a symbolic expression-tree representation of a resource's
//! PQ profile, belief function, and cost function (see [`expr`]), a
//! Cap'n-Proto-style binary wire codec for exchanging them (see [`wire`]),
//! and the computational-geometry kernel (see [`geom`]) that turns those
//! symbolic trees into the hulls, projections, and membership tests a grid
//! agent actually needs.
//!
//! [`Interpreter`] is the single entry point downstream code is expected to
//! use: it attaches one [`wire::Advertisement`], builds its reference table
//! once, and exposes `evaluate`/`contains`/`hull`/`project` over that
//! attached advertisement under a configurable [`Limits`].
//!
//! ```
//! use std::collections::HashMap;
//! use commelec_advfunc::{Interpreter, Limits};
//! use commelec_advfunc::expr::{RealExpr, SetExpr};
//! use commelec_advfunc::wire::Advertisement;
//!
//! let adv = Advertisement {
//!     pq_profile: SetExpr::Rectangle(vec![
//!         commelec_advfunc::expr::BoundaryPair { a: RealExpr::Real(0.0), b: RealExpr::Real(10.0) },
//!         commelec_advfunc::expr::BoundaryPair { a: RealExpr::Real(0.0), b: RealExpr::Real(10.0) },
//!     ]),
//!     belief_function: SetExpr::Singleton(vec![RealExpr::Real(0.0), RealExpr::Real(0.0)]),
//!     cost_function: RealExpr::Variable("P".to_string()),
//!     implemented_setpoint: [0.0, 0.0],
//! };
//! let interp = Interpreter::new(&adv, Limits::default()).unwrap();
//! let mut bindings = HashMap::new();
//! bindings.insert("P".to_string(), 4.0);
//! assert_eq!(interp.evaluate(&adv.cost_function, &bindings).unwrap(), 4.0);
//! ```

#![forbid(unsafe_code)]
#![deny(missing_docs, rust_2018_idioms)]

use std::collections::HashMap;

use thiserror::Error;

/// Runtime builder DSL for `RealExpr`/`SetExpr` trees, plus the battery/PV
/// example advertisement constructors.
pub mod builder;
/// Typed expression trees and the evaluator/differentiator/membership tester
/// that walk them.
pub mod expr;
/// Computational-geometry kernel: hulls, projection, and the 2-D LP solver.
pub mod geom;
/// Advertisement validator.
pub mod validate;
/// Wire message envelope and binary codec.
pub mod wire;

use expr::context::{EvalContext, EvalError, DEFAULT_MAX_NESTING_DEPTH};
use expr::eval::evaluate as eval_real;
use expr::membership::contains as set_contains;
use expr::resolve::{ReferenceTable, ResolveError};
use expr::{RealExpr, SetExpr};
use geom::hull::hull as geom_hull;
use geom::project::{project_with as geom_project_with, DEFAULT_MAX_ITER, DEFAULT_TAU};
use geom::{AxisAlignedBox, GeomError};
use wire::{Advertisement, WireError};

/// Tuning knobs threaded through every [`Interpreter`] query (spec.md's
/// stated defaults: 10 000 nesting depth, 64 MiB traversal budget, τ=1e-3,
/// K=1000 Dykstra iterations).
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Limits {
    /// Byte budget the wire decoder may spend reading one message.
    pub traversal_bytes: usize,
    /// Maximum expression-tree recursion depth.
    pub max_nesting_depth: u32,
    /// Dykstra projection convergence tolerance.
    pub dykstra_tau: f64,
    /// Dykstra projection iteration cap.
    pub dykstra_max_iter: usize,
}

impl Default for Limits {
    fn default() -> Self {
        Limits {
            traversal_bytes: wire::TraversalLimit::default().0,
            max_nesting_depth: DEFAULT_MAX_NESTING_DEPTH,
            dykstra_tau: DEFAULT_TAU,
            dykstra_max_iter: DEFAULT_MAX_ITER,
        }
    }
}

/// Crate-wide error, unifying every module's error type behind the one
/// surface [`Interpreter`]'s methods return.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum AdvFuncError {
    /// Failure decoding or re-encoding a wire message.
    #[error(transparent)]
    Wire(#[from] WireError),
    /// Failure building an advertisement's reference table.
    #[error(transparent)]
    Resolve(#[from] ResolveError),
    /// Failure evaluating, differentiating, or testing membership.
    #[error(transparent)]
    Eval(#[from] EvalError),
    /// Failure in the geometry kernel (hull, projection, LP solver).
    #[error(transparent)]
    Geom(#[from] GeomError),
    /// Failure validating an advertisement.
    #[error(transparent)]
    Validate(#[from] validate::ValidateError),
}

/// Interprets one attached [`Advertisement`]: builds its reference table
/// once at construction, then exposes evaluation, membership, hull, and
/// projection queries over it under a configurable [`Limits`].
pub struct Interpreter<'a> {
    advertisement: &'a Advertisement,
    table: ReferenceTable<'a>,
    limits: Limits,
}

impl<'a> Interpreter<'a> {
    /// Attach `advertisement`, validating its presence invariants and
    /// building its reference table under `limits`.
    pub fn new(advertisement: &'a Advertisement, limits: Limits) -> Result<Self, AdvFuncError> {
        advertisement.check_well_formed()?;
        let table = ReferenceTable::build(advertisement)?;
        Ok(Interpreter {
            advertisement,
            table,
            limits,
        })
    }

    /// Attach `advertisement` under [`Limits::default`] except for a custom
    /// maximum nesting depth, mirroring the original's constructor overload
    /// that only lets callers tune the recursion guard.
    pub fn new_with_depth_limit(
        advertisement: &'a Advertisement,
        max_nesting_depth: u32,
    ) -> Result<Self, AdvFuncError> {
        let limits = Limits {
            max_nesting_depth,
            ..Limits::default()
        };
        Interpreter::new(advertisement, limits)
    }

    /// The attached advertisement.
    pub fn advertisement(&self) -> &'a Advertisement {
        self.advertisement
    }

    fn ctx(&self, bindings: &HashMap<String, f64>) -> EvalContext<'_> {
        EvalContext::new(&self.table, bindings, self.limits.max_nesting_depth)
    }

    /// Evaluate `expr` under `bindings`, resolving `Reference`s against the
    /// attached advertisement.
    pub fn evaluate(
        &self,
        expr: &RealExpr,
        bindings: &HashMap<String, f64>,
    ) -> Result<f64, AdvFuncError> {
        let ctx = self.ctx(bindings);
        Ok(eval_real(expr, &ctx)?)
    }

    /// Differentiate `expr` with respect to `wrt`, under `bindings`.
    pub fn partial(
        &self,
        expr: &RealExpr,
        wrt: &str,
        bindings: &HashMap<String, f64>,
    ) -> Result<f64, AdvFuncError> {
        let ctx = self.ctx(bindings);
        Ok(expr::diff::partial(expr, wrt, &ctx)?)
    }

    /// Test whether `point` lies in `set`, under `bindings`.
    pub fn contains(
        &self,
        set: &SetExpr,
        point: &[f64],
        bindings: &HashMap<String, f64>,
    ) -> Result<bool, AdvFuncError> {
        let ctx = self.ctx(bindings);
        Ok(set_contains(set, point, &ctx)?)
    }

    /// The smallest axis-aligned box containing `set`, under `bindings`.
    pub fn hull(
        &self,
        set: &SetExpr,
        bindings: &HashMap<String, f64>,
    ) -> Result<AxisAlignedBox, AdvFuncError> {
        let ctx = self.ctx(bindings);
        Ok(geom_hull(set, &ctx)?)
    }

    /// The Euclidean projection of `point` onto `set`, under `bindings`.
    pub fn project(
        &self,
        set: &SetExpr,
        point: [f64; 2],
        bindings: &HashMap<String, f64>,
    ) -> Result<[f64; 2], AdvFuncError> {
        let ctx = self.ctx(bindings);
        Ok(geom_project_with(
            set,
            point,
            &ctx,
            self.limits.dykstra_tau,
            self.limits.dykstra_max_iter,
        )?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::builder::battery::{battery_advertisement, battery_cost_quadratic_form};

    #[test]
    fn interpreter_evaluates_cost_over_attached_advertisement() {
        let adv = battery_advertisement(10.0, -5.0, 5.0, battery_cost_quadratic_form(1.0, 0.1));
        let interp = Interpreter::new(&adv, Limits::default()).unwrap();
        let mut bindings = HashMap::new();
        bindings.insert("P".to_string(), 2.0);
        // 1*4 + 0.1*2 = 4.2
        let cost = interp.evaluate(&adv.cost_function, &bindings).unwrap();
        assert!((cost - 4.2).abs() < 1e-9);
    }

    #[test]
    fn interpreter_reports_hull_and_containment() {
        let adv = battery_advertisement(10.0, -5.0, 5.0, battery_cost_quadratic_form(1.0, 0.1));
        let interp = Interpreter::new(&adv, Limits::default()).unwrap();
        let bindings = HashMap::new();
        assert!(interp.contains(&adv.pq_profile, &[0.0, 0.0], &bindings).unwrap());
        let bb = interp.hull(&adv.pq_profile, &bindings).unwrap();
        assert!(bb.min[0] <= -5.0 && bb.max[0] >= 5.0);
    }

    #[test]
    fn rejects_nan_setpoint_at_construction() {
        let mut adv = battery_advertisement(10.0, -5.0, 5.0, battery_cost_quadratic_form(1.0, 0.1));
        adv.implemented_setpoint = [f64::NAN, 0.0];
        assert!(matches!(
            Interpreter::new(&adv, Limits::default()),
            Err(AdvFuncError::Wire(WireError::UninitializedImplementedSetpoint))
        ));
    }
}
