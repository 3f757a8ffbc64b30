//! Euclidean projection onto a set, via Dykstra's alternating projection
//! algorithm for intersections (spec.md §4.7, §4.7.1).

use super::{resolve_set, GeomError};
use crate::expr::context::EvalContext;
use crate::expr::eval::evaluate;
use crate::expr::{membership, SetExpr};

/// Default convergence tolerance for [`dykstra`] (spec.md §4.7.1).
pub const DEFAULT_TAU: f64 = 1e-3;
/// Default iteration cap for [`dykstra`] (spec.md §4.7.1).
pub const DEFAULT_MAX_ITER: usize = 1000;

/// Something a point can be projected onto. Implemented for half-spaces and
/// for set expressions (the latter via [`SetProjectable`]), giving
/// [`dykstra`] the same polymorphism the original's templated
/// `dykstraProjectionAlgorithm` got from C++ duck typing.
pub trait Projectable {
    fn project_onto(&self, p: [f64; 2]) -> Result<[f64; 2], GeomError>;
}

/// A half-space `{x : a . x <= b}` with `a` unit length.
pub struct HalfSpace {
    pub a: [f64; 2],
    pub b: f64,
}

impl Projectable for HalfSpace {
    fn project_onto(&self, p: [f64; 2]) -> Result<[f64; 2], GeomError> {
        let slack = self.a[0] * p[0] + self.a[1] * p[1] - self.b;
        if slack <= 0.0 {
            return Ok(p);
        }
        Ok([p[0] - slack * self.a[0], p[1] - slack * self.a[1]])
    }
}

/// Adapts a [`SetExpr`] (plus its evaluation context) into a [`Projectable`],
/// so [`dykstra`] can run directly over intersection children.
pub struct SetProjectable<'a, 'ctx> {
    pub set: &'a SetExpr,
    pub ctx: &'ctx EvalContext<'a>,
    pub tau: f64,
    pub max_iter: usize,
}

impl Projectable for SetProjectable<'_, '_> {
    fn project_onto(&self, p: [f64; 2]) -> Result<[f64; 2], GeomError> {
        project_with(self.set, p, self.ctx, self.tau, self.max_iter)
    }
}

/// Dykstra's alternating projection algorithm over `sets` (spec.md §4.7.1).
pub fn dykstra(
    sets: &[&dyn Projectable],
    point: [f64; 2],
    tau: f64,
    max_iter: usize,
) -> Result<[f64; 2], GeomError> {
    let m = sets.len();
    let mut y = vec![[0.0, 0.0]; m];
    let mut x = point;
    for _ in 0..max_iter {
        let prev = x;
        for (i, set) in sets.iter().enumerate() {
            let z = [x[0] + y[i][0], x[1] + y[i][1]];
            let xi = set.project_onto(z)?;
            y[i] = [z[0] - xi[0], z[1] - xi[1]];
            x = xi;
        }
        let dist = ((x[0] - prev[0]).powi(2) + (x[1] - prev[1]).powi(2)).sqrt();
        if dist < tau {
            return Ok(x);
        }
    }
    Err(GeomError::NoConvergence)
}

fn polytope_half_spaces(
    a: &[Vec<crate::expr::RealExpr>],
    b: &[crate::expr::RealExpr],
    ctx: &EvalContext,
) -> Result<Vec<HalfSpace>, GeomError> {
    let mut rows = Vec::with_capacity(a.len());
    for (row, rhs) in a.iter().zip(b) {
        if row.len() != 2 {
            return Err(GeomError::DimensionMismatch(row.len()));
        }
        let a0 = evaluate(&row[0], ctx)?;
        let a1 = evaluate(&row[1], ctx)?;
        let rhs_v = evaluate(rhs, ctx)?;
        let norm = (a0 * a0 + a1 * a1).sqrt();
        if norm < 1e-15 {
            return Err(GeomError::LpSolverInternal);
        }
        rows.push(HalfSpace {
            a: [a0 / norm, a1 / norm],
            b: rhs_v / norm,
        });
    }
    Ok(rows)
}

/// The Euclidean projection of `point` onto `set`, under `ctx`'s bindings,
/// using the default convergence tolerance and iteration cap.
pub fn project<'a>(
    set: &'a SetExpr,
    point: [f64; 2],
    ctx: &EvalContext<'a>,
) -> Result<[f64; 2], GeomError> {
    project_with(set, point, ctx, DEFAULT_TAU, DEFAULT_MAX_ITER)
}

/// As [`project`], but with an explicit Dykstra tolerance and iteration cap.
pub fn project_with<'a>(
    set: &'a SetExpr,
    point: [f64; 2],
    ctx: &EvalContext<'a>,
    tau: f64,
    max_iter: usize,
) -> Result<[f64; 2], GeomError> {
    if membership::contains(set, &point, ctx)? {
        return Ok(point);
    }
    let resolved = resolve_set(set, ctx)?;
    match resolved {
        SetExpr::Singleton(coords) => {
            if coords.len() != 2 {
                return Err(GeomError::DimensionMismatch(coords.len()));
            }
            Ok([evaluate(&coords[0], ctx)?, evaluate(&coords[1], ctx)?])
        }
        SetExpr::Ball { center, radius } => {
            if center.len() != 2 {
                return Err(GeomError::DimensionMismatch(center.len()));
            }
            let c = [evaluate(&center[0], ctx)?, evaluate(&center[1], ctx)?];
            let r = evaluate(radius, ctx)?;
            let d = [point[0] - c[0], point[1] - c[1]];
            let norm = (d[0] * d[0] + d[1] * d[1]).sqrt();
            if norm < 1e-15 {
                return Ok([c[0] + r, c[1]]);
            }
            Ok([c[0] + r * d[0] / norm, c[1] + r * d[1] / norm])
        }
        SetExpr::Rectangle(bounds) => {
            if bounds.len() != 2 {
                return Err(GeomError::DimensionMismatch(bounds.len()));
            }
            let mut out = [0.0; 2];
            for (i, pair) in bounds.iter().enumerate() {
                let a = evaluate(&pair.a, ctx)?;
                let b = evaluate(&pair.b, ctx)?;
                let (lo, hi) = if a <= b { (a, b) } else { (b, a) };
                out[i] = point[i].clamp(lo, hi);
            }
            Ok(out)
        }
        SetExpr::ConvexPolytope { a, b } => {
            let half_spaces = polytope_half_spaces(a, b, ctx)?;
            let refs: Vec<&dyn Projectable> = half_spaces
                .iter()
                .map(|h| h as &dyn Projectable)
                .collect();
            dykstra(&refs, point, tau, max_iter)
        }
        SetExpr::Intersection(children) => {
            let projectables: Vec<SetProjectable> = children
                .iter()
                .map(|child| SetProjectable { set: child, ctx, tau, max_iter })
                .collect();
            let refs: Vec<&dyn Projectable> = projectables
                .iter()
                .map(|p| p as &dyn Projectable)
                .collect();
            dykstra(&refs, point, tau, max_iter)
        }
        SetExpr::Name(_, _) | SetExpr::Reference(_) => unreachable!("resolved above"),
        SetExpr::CaseDistinction { .. } => Err(GeomError::UnsupportedVariant("CaseDistinction")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::expr::resolve::ReferenceTable;
    use crate::expr::{BoundaryPair, RealExpr};
    use crate::wire::Advertisement;
    use std::collections::HashMap;

    fn adv_with(pq: SetExpr) -> Advertisement {
        Advertisement {
            pq_profile: pq,
            belief_function: SetExpr::Singleton(vec![RealExpr::Real(0.0), RealExpr::Real(0.0)]),
            cost_function: RealExpr::Real(0.0),
            implemented_setpoint: [0.0, 0.0],
        }
    }

    #[test]
    fn projection_inside_set_is_identity() {
        let rect = SetExpr::Rectangle(vec![
            BoundaryPair { a: RealExpr::Real(0.0), b: RealExpr::Real(10.0) },
            BoundaryPair { a: RealExpr::Real(0.0), b: RealExpr::Real(10.0) },
        ]);
        let adv = adv_with(rect);
        let table = ReferenceTable::build(&adv).unwrap();
        let bindings = HashMap::new();
        let ctx = EvalContext::new(&table, &bindings, 10_000);
        let p = project(&adv.pq_profile, [5.0, 5.0], &ctx).unwrap();
        assert_eq!(p, [5.0, 5.0]);
    }

    #[test]
    fn projection_clamps_onto_rectangle() {
        let rect = SetExpr::Rectangle(vec![
            BoundaryPair { a: RealExpr::Real(0.0), b: RealExpr::Real(10.0) },
            BoundaryPair { a: RealExpr::Real(0.0), b: RealExpr::Real(10.0) },
        ]);
        let adv = adv_with(rect);
        let table = ReferenceTable::build(&adv).unwrap();
        let bindings = HashMap::new();
        let ctx = EvalContext::new(&table, &bindings, 10_000);
        let p = project(&adv.pq_profile, [15.0, -3.0], &ctx).unwrap();
        assert_eq!(p, [10.0, 0.0]);
    }

    #[test]
    fn projection_onto_ball_surface() {
        let ball = SetExpr::Ball {
            center: vec![RealExpr::Real(0.0), RealExpr::Real(0.0)],
            radius: RealExpr::Real(1.0),
        };
        let adv = adv_with(ball);
        let table = ReferenceTable::build(&adv).unwrap();
        let bindings = HashMap::new();
        let ctx = EvalContext::new(&table, &bindings, 10_000);
        let p = project(&adv.pq_profile, [2.0, 0.0], &ctx).unwrap();
        assert!((p[0] - 1.0).abs() < 1e-9);
        assert!(p[1].abs() < 1e-9);
    }
}
