//! Set membership testing (spec.md §4.5).
//!
//! `contains` is the dual of [`crate::expr::eval::evaluate`]: it is called
//! both directly (e.g. by the validator) and indirectly, from
//! `evaluate`'s handling of `RealExpr::CaseDistinction`, whose guards are
//! sets.

use super::context::{EvalContext, EvalError};
use super::SetExpr;

const ISAPPROX_REL_EPS: f64 = 1e-12;

fn is_approx(a: f64, b: f64) -> bool {
    (a - b).abs() <= ISAPPROX_REL_EPS * a.abs().max(b.abs()).max(1.0)
}

/// Does `set` contain `point`, under `ctx`'s variable bindings?
pub fn contains(set: &SetExpr, point: &[f64], ctx: &EvalContext) -> Result<bool, EvalError> {
    let _guard = ctx.enter()?;
    match set {
        SetExpr::Singleton(coords) => {
            if coords.len() != point.len() {
                return Ok(false);
            }
            for (c, p) in coords.iter().zip(point) {
                let v = super::eval::evaluate(c, ctx)?;
                if !is_approx(v, *p) {
                    return Ok(false);
                }
            }
            Ok(true)
        }
        SetExpr::Ball { center, radius } => {
            let r = super::eval::evaluate(radius, ctx)?;
            let mut sum_sq = 0.0;
            for (c, p) in center.iter().zip(point) {
                let cv = super::eval::evaluate(c, ctx)?;
                sum_sq += (cv - p).powi(2);
            }
            Ok(sum_sq <= r * r)
        }
        SetExpr::Rectangle(bounds) => {
            for (pair, p) in bounds.iter().zip(point) {
                let a = super::eval::evaluate(&pair.a, ctx)?;
                let b = super::eval::evaluate(&pair.b, ctx)?;
                let (lo, hi) = if a <= b { (a, b) } else { (b, a) };
                if *p < lo || *p > hi {
                    return Ok(false);
                }
            }
            Ok(true)
        }
        SetExpr::ConvexPolytope { a, b } => {
            for (row, rhs_expr) in a.iter().zip(b) {
                let rhs = super::eval::evaluate(rhs_expr, ctx)?;
                let mut lhs = 0.0;
                for (coeff_expr, p) in row.iter().zip(point) {
                    lhs += super::eval::evaluate(coeff_expr, ctx)? * p;
                }
                if lhs > rhs {
                    return Ok(false);
                }
            }
            Ok(true)
        }
        SetExpr::Intersection(children) => {
            for child in children {
                if !contains(child, point, ctx)? {
                    return Ok(false);
                }
            }
            Ok(true)
        }
        SetExpr::Name(_, inner) => contains(inner, point, ctx),
        SetExpr::Reference(name) => {
            let target = ctx
                .table
                .set(name)
                .ok_or_else(|| EvalError::UnknownReference(name.clone()))?;
            contains(target, point, ctx)
        }
        SetExpr::CaseDistinction { vars, cases } => {
            let guard_point: Result<Vec<f64>, EvalError> = vars
                .iter()
                .map(|v| {
                    ctx.bindings
                        .get(v)
                        .copied()
                        .ok_or_else(|| EvalError::UnknownVariable(v.clone()))
                })
                .collect();
            let guard_point = guard_point?;
            for case in cases {
                if contains(&case.guard, &guard_point, ctx)? {
                    return contains(&case.body, point, ctx);
                }
            }
            Err(EvalError::UnhandledCase)
        }
    }
}
