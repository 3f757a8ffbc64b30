//! Smallest axis-aligned bounding box of a set (spec.md §4.6), ported from
//! `adv-interpreter-recthull.cpp`'s `rectHull`.

use super::lp::{solve_lp2, LpOutcome};
use super::{resolve_set, AxisAlignedBox, GeomError};
use crate::expr::context::EvalContext;
use crate::expr::eval::evaluate;
use crate::expr::SetExpr;

fn normalized_rows(
    a: &[Vec<crate::expr::RealExpr>],
    b: &[crate::expr::RealExpr],
    ctx: &EvalContext,
) -> Result<Vec<([f64; 2], f64)>, GeomError> {
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
        rows.push(([a0 / norm, a1 / norm], rhs_v / norm));
    }
    Ok(rows)
}

fn solve_box(rows: &[([f64; 2], f64)]) -> Result<AxisAlignedBox, GeomError> {
    // Minimizing c = [1,0] yields x_min; minimizing [-1,0] yields the point
    // whose x-coordinate is x_max (since minimizing -x maximizes x), and
    // symmetrically for y. No extra negation needed on the result.
    let directions: [[f64; 2]; 4] = [[1.0, 0.0], [-1.0, 0.0], [0.0, 1.0], [0.0, -1.0]];
    let mut bounds = [0.0; 4];
    for (i, c) in directions.iter().enumerate() {
        match solve_lp2(rows, *c)? {
            LpOutcome::Minimum(p) | LpOutcome::Ambiguous(p) => {
                bounds[i] = p[i / 2];
            }
            LpOutcome::Infeasible => return Err(GeomError::Infeasible),
            LpOutcome::Unbounded => return Err(GeomError::Unbounded),
        }
    }
    Ok(AxisAlignedBox {
        min: [bounds[0], bounds[2]],
        max: [bounds[1], bounds[3]],
    })
}

/// The smallest axis-aligned box containing `set`, under `ctx`'s bindings.
pub fn hull<'a>(set: &'a SetExpr, ctx: &EvalContext<'a>) -> Result<AxisAlignedBox, GeomError> {
    let set = resolve_set(set, ctx)?;
    match set {
        SetExpr::Singleton(coords) => {
            if coords.len() != 2 {
                return Err(GeomError::DimensionMismatch(coords.len()));
            }
            let x = evaluate(&coords[0], ctx)?;
            let y = evaluate(&coords[1], ctx)?;
            Ok(AxisAlignedBox::degenerate([x, y]))
        }
        SetExpr::Ball { center, radius } => {
            if center.len() != 2 {
                return Err(GeomError::DimensionMismatch(center.len()));
            }
            let cx = evaluate(&center[0], ctx)?;
            let cy = evaluate(&center[1], ctx)?;
            let r = evaluate(radius, ctx)?;
            Ok(AxisAlignedBox {
                min: [cx - r, cy - r],
                max: [cx + r, cy + r],
            })
        }
        SetExpr::Rectangle(bounds) => {
            if bounds.len() != 2 {
                return Err(GeomError::DimensionMismatch(bounds.len()));
            }
            let mut min = [0.0; 2];
            let mut max = [0.0; 2];
            for (i, pair) in bounds.iter().enumerate() {
                let a = evaluate(&pair.a, ctx)?;
                let b = evaluate(&pair.b, ctx)?;
                min[i] = a.min(b);
                max[i] = a.max(b);
            }
            Ok(AxisAlignedBox { min, max })
        }
        SetExpr::ConvexPolytope { a, b } => {
            let rows = normalized_rows(a, b, ctx)?;
            solve_box(&rows)
        }
        SetExpr::Intersection(children) => hull_intersection(children, ctx),
        SetExpr::Name(_, _) | SetExpr::Reference(_) => unreachable!("resolved above"),
        SetExpr::CaseDistinction { .. } => Err(GeomError::UnsupportedVariant("CaseDistinction")),
    }
}

fn hull_intersection<'a>(
    children: &'a [SetExpr],
    ctx: &EvalContext<'a>,
) -> Result<AxisAlignedBox, GeomError> {
    let mut poly_rows: Vec<([f64; 2], f64)> = Vec::new();
    let mut non_poly_box: Option<AxisAlignedBox> = None;

    for child in children {
        let resolved = resolve_set(child, ctx)?;
        if let SetExpr::ConvexPolytope { a, b } = resolved {
            poly_rows.extend(normalized_rows(a, b, ctx)?);
        } else {
            let child_box = hull(child, ctx)?;
            non_poly_box = Some(match non_poly_box {
                Some(acc) => acc.intersect(&child_box)?,
                None => child_box,
            });
        }
    }

    match (poly_rows.is_empty(), non_poly_box) {
        (true, Some(bb)) => Ok(bb),
        (true, None) => Err(GeomError::UnsupportedVariant("empty Intersection")),
        (false, None) => solve_box(&poly_rows),
        (false, Some(bb)) => {
            for (a, b) in bb.face_constraints() {
                poly_rows.push((a, b));
            }
            solve_box(&poly_rows)
        }
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
    fn hull_of_rectangle_is_itself() {
        let rect = SetExpr::Rectangle(vec![
            BoundaryPair {
                a: RealExpr::Real(0.0),
                b: RealExpr::Real(4.0),
            },
            BoundaryPair {
                a: RealExpr::Real(-2.0),
                b: RealExpr::Real(2.0),
            },
        ]);
        let adv = adv_with(rect);
        let table = ReferenceTable::build(&adv).unwrap();
        let bindings = HashMap::new();
        let ctx = EvalContext::new(&table, &bindings, 10_000);
        let bb = hull(&adv.pq_profile, &ctx).unwrap();
        assert_eq!(bb, AxisAlignedBox { min: [0.0, -2.0], max: [4.0, 2.0] });
    }

    #[test]
    fn hull_of_ball() {
        let ball = SetExpr::Ball {
            center: vec![RealExpr::Real(1.0), RealExpr::Real(1.0)],
            radius: RealExpr::Real(2.0),
        };
        let adv = adv_with(ball);
        let table = ReferenceTable::build(&adv).unwrap();
        let bindings = HashMap::new();
        let ctx = EvalContext::new(&table, &bindings, 10_000);
        let bb = hull(&adv.pq_profile, &ctx).unwrap();
        assert_eq!(bb, AxisAlignedBox { min: [-1.0, -1.0], max: [3.0, 3.0] });
    }

    #[test]
    fn hull_of_convex_polytope_unit_square() {
        let polytope = SetExpr::ConvexPolytope {
            a: vec![
                vec![RealExpr::Real(1.0), RealExpr::Real(0.0)],
                vec![RealExpr::Real(-1.0), RealExpr::Real(0.0)],
                vec![RealExpr::Real(0.0), RealExpr::Real(1.0)],
                vec![RealExpr::Real(0.0), RealExpr::Real(-1.0)],
            ],
            b: vec![
                RealExpr::Real(1.0),
                RealExpr::Real(0.0),
                RealExpr::Real(1.0),
                RealExpr::Real(0.0),
            ],
        };
        let adv = adv_with(polytope);
        let table = ReferenceTable::build(&adv).unwrap();
        let bindings = HashMap::new();
        let ctx = EvalContext::new(&table, &bindings, 10_000);
        let bb = hull(&adv.pq_profile, &ctx).unwrap();
        assert!((bb.min[0] - 0.0).abs() < 1e-6);
        assert!((bb.max[0] - 1.0).abs() < 1e-6);
        assert!((bb.min[1] - 0.0).abs() < 1e-6);
        assert!((bb.max[1] - 1.0).abs() < 1e-6);
    }
}
