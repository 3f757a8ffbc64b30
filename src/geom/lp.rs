//! Randomized-incremental 2-D linear programming (Seidel's method),
//! ported from the structure of `do_lp.c` / `solve_lp2` (spec.md §4.8).
//!
//! `solve_lp2` minimizes `c . x` subject to half-space constraints
//! `a_i . x <= b_i` with every `a_i` unit-normalized. Constraints are
//! shuffled and inserted one at a time; each time the running optimum
//! violates the newly inserted constraint, the optimum is recomputed as a
//! 1-D LP restricted to that constraint's boundary line.

use rand::seq::SliceRandom;
use rand::thread_rng;

use super::GeomError;

/// A small inflation applied to the right-hand side of every constraint so
/// that nearly-parallel normals do not misclassify a feasible point as
/// infeasible (spec.md §4.8, "slightly inflated").
pub const LP_EPS: f64 = 1e-9;

/// Half of the side length of the implicit bounding box the solver starts
/// from, large enough that any realistic PQ-plane polytope is well inside
/// it. A final optimum touching this box is reported as `Unbounded`.
const BIG: f64 = 1.0e7;

/// Outcome of [`solve_lp2`] (spec.md §4.8).
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum LpOutcome {
    Infeasible,
    Minimum([f64; 2]),
    Ambiguous([f64; 2]),
    Unbounded,
}

#[derive(Clone, Copy, Debug)]
struct HalfPlane {
    a: [f64; 2],
    b: f64,
}

fn dot(a: [f64; 2], b: [f64; 2]) -> f64 {
    a[0] * b[0] + a[1] * b[1]
}

/// Minimize `c . x` subject to `rows[i].0 . x <= rows[i].1` for every row,
/// where each `rows[i].0` is already unit length.
pub fn solve_lp2(rows: &[([f64; 2], f64)], c: [f64; 2]) -> Result<LpOutcome, GeomError> {
    let mut constraints: Vec<HalfPlane> = rows
        .iter()
        .map(|(a, b)| HalfPlane { a: *a, b: *b + LP_EPS })
        .collect();

    // Bound the search region with a large axis-aligned box so the 1-D
    // sub-problems always have a finite feasible interval to start from.
    let box_constraints = [
        HalfPlane { a: [1.0, 0.0], b: BIG },
        HalfPlane { a: [-1.0, 0.0], b: BIG },
        HalfPlane { a: [0.0, 1.0], b: BIG },
        HalfPlane { a: [0.0, -1.0], b: BIG },
    ];

    let mut rng = thread_rng();
    constraints.shuffle(&mut rng);

    let mut processed: Vec<HalfPlane> = box_constraints.to_vec();
    // Start at the corner of the bounding box minimizing c.
    let mut x = [
        if c[0] >= 0.0 { -BIG } else { BIG },
        if c[1] >= 0.0 { -BIG } else { BIG },
    ];
    let mut ambiguous = false;

    for h in constraints {
        if dot(h.a, x) <= h.b {
            processed.push(h);
            continue;
        }
        // x violates h: the new optimum lies on h's boundary line.
        let dir = [-h.a[1], h.a[0]];
        let point0 = [h.a[0] * h.b, h.a[1] * h.b];

        let mut lo = f64::NEG_INFINITY;
        let mut hi = f64::INFINITY;
        for p in &processed {
            let a_dir = dot(p.a, dir);
            let slack = p.b - dot(p.a, point0);
            if a_dir.abs() < 1e-15 {
                if slack < 0.0 {
                    return Ok(LpOutcome::Infeasible);
                }
                continue;
            }
            let t = slack / a_dir;
            if a_dir > 0.0 {
                hi = hi.min(t);
            } else {
                lo = lo.max(t);
            }
        }
        if lo > hi {
            return Ok(LpOutcome::Infeasible);
        }

        let c_dir = dot(c, dir);
        let t = if c_dir > 1e-15 {
            if lo == f64::NEG_INFINITY {
                return Ok(LpOutcome::Unbounded);
            }
            lo
        } else if c_dir < -1e-15 {
            if hi == f64::INFINITY {
                return Ok(LpOutcome::Unbounded);
            }
            hi
        } else {
            ambiguous = true;
            if lo.is_finite() {
                lo
            } else if hi.is_finite() {
                hi
            } else {
                0.0
            }
        };

        x = [point0[0] + t * dir[0], point0[1] + t * dir[1]];
        processed.push(h);
    }

    if x[0].abs() >= BIG * 0.999 || x[1].abs() >= BIG * 0.999 {
        return Ok(LpOutcome::Unbounded);
    }

    Ok(if ambiguous {
        LpOutcome::Ambiguous(x)
    } else {
        LpOutcome::Minimum(x)
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn unit(a: [f64; 2]) -> [f64; 2] {
        let n = (a[0] * a[0] + a[1] * a[1]).sqrt();
        [a[0] / n, a[1] / n]
    }

    #[test]
    fn minimizes_over_unit_square() {
        let rows = vec![
            (unit([1.0, 0.0]), 1.0),
            (unit([-1.0, 0.0]), 0.0),
            (unit([0.0, 1.0]), 1.0),
            (unit([0.0, -1.0]), 0.0),
        ];
        let outcome = solve_lp2(&rows, [1.0, 0.0]).unwrap();
        match outcome {
            LpOutcome::Minimum(p) => assert!((p[0] - 0.0).abs() < 1e-6, "{:?}", p),
            other => panic!("expected Minimum, got {other:?}"),
        }
    }

    #[test]
    fn detects_infeasible_region() {
        let rows = vec![(unit([1.0, 0.0]), -1.0), (unit([-1.0, 0.0]), -1.0)];
        let outcome = solve_lp2(&rows, [1.0, 0.0]).unwrap();
        assert_eq!(outcome, LpOutcome::Infeasible);
    }

    #[test]
    fn detects_unbounded_region() {
        // Only a lower bound on x, minimizing x with no upper constraint.
        let rows = vec![(unit([-1.0, 0.0]), 0.0)];
        let outcome = solve_lp2(&rows, [-1.0, 0.0]).unwrap();
        assert_eq!(outcome, LpOutcome::Unbounded);
    }
}
