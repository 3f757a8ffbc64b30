//! Example PV advertisement builder, grounded in `hlapi.cpp`'s
//! `makePVAdvertisement`/`_PVAdvertisement`. Used only from tests and
//! doctests.

use super::{abs, convex_polytope, intersection, max, min, named, poly_var, polynomial, reference, sign, var, real};
use crate::expr::{BoundaryPair, RealExpr, SetExpr};
use crate::wire::Advertisement;

/// Builds the `-a_pv*P + b_pv*Q^2` cost form used by `_PVAdvertisement`.
pub fn pv_cost_form(a_pv: f64, b_pv: f64) -> RealExpr {
    let p = poly_var("P");
    let q = poly_var("Q");
    polynomial((-a_pv) * p + b_pv * (q ^ 2))
}

/// Builds a PV advertisement: PQ profile is a triangular active/reactive
/// power cone intersected with an apparent-power ball, and the belief
/// function is a rectangle whose reactive-power bound is clamped by the
/// remaining apparent-power headroom once active power is curtailed.
pub fn pv_advertisement(
    s_rated: f64,
    p_max: f64,
    tan_phi: f64,
    p_delta: f64,
    cost_function: RealExpr,
) -> Advertisement {
    let pq_profile = intersection(vec![
        convex_polytope(
            vec![vec![1.0, 0.0], vec![-tan_phi, 1.0], vec![-tan_phi, -1.0]],
            vec![p_max, 0.0, 0.0],
        ),
        super::ball(vec![real(0.0), real(0.0)], real(s_rated)),
    ]);

    // p2 = max(0, P - p_delta): remaining active-power headroom past the
    // curtailment threshold, reused by the Q bound below.
    let p2 = named("p2", max(real(0.0), var("P") + (-real(p_delta))));
    let q_bound_b = sign(var("Q")) * min(abs(var("Q")), reference("p2") * real(tan_phi));

    let belief_function = SetExpr::Rectangle(vec![
        BoundaryPair {
            a: var("P").build(),
            b: p2.build(),
        },
        BoundaryPair {
            a: var("Q").build(),
            b: q_bound_b.build(),
        },
    ]);

    Advertisement {
        pq_profile,
        belief_function,
        cost_function,
        implemented_setpoint: [0.0, 0.0],
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::expr::context::EvalContext;
    use crate::expr::eval::evaluate;
    use crate::expr::membership::contains;
    use crate::expr::resolve::ReferenceTable;
    use std::collections::HashMap;

    #[test]
    fn pv_pq_profile_accepts_origin_and_rejects_far_point() {
        let adv = pv_advertisement(10.0, 8.0, 0.6, 1.0, pv_cost_form(0.01, 0.001));
        let table = ReferenceTable::build(&adv).unwrap();
        let bindings = HashMap::new();
        let ctx = EvalContext::new(&table, &bindings, 10_000);
        assert!(contains(&adv.pq_profile, &[0.0, 0.0], &ctx).unwrap());
        assert!(!contains(&adv.pq_profile, &[100.0, 100.0], &ctx).unwrap());
    }

    #[test]
    fn pv_belief_function_q_bound_uses_named_reference() {
        let adv = pv_advertisement(10.0, 8.0, 0.6, 1.0, pv_cost_form(0.01, 0.001));
        let table = ReferenceTable::build(&adv).unwrap();
        let mut bindings = HashMap::new();
        bindings.insert("P".to_string(), 3.0);
        bindings.insert("Q".to_string(), -5.0);
        let ctx = EvalContext::new(&table, &bindings, 10_000);
        // p2 = max(0, 3 - 1) = 2; bound = sign(-5) * min(5, 2*0.6) = -1 * 1.2 = -1.2
        let pair = match &adv.belief_function {
            SetExpr::Rectangle(bounds) => &bounds[1],
            _ => unreachable!(),
        };
        let b = evaluate(&pair.b, &ctx).unwrap();
        assert!((b - (-1.2)).abs() < 1e-9, "{b}");
    }
}
