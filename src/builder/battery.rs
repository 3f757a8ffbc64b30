//! Example battery advertisement builder, grounded in `hlapi.cpp`'s
//! `_BatteryAdvertisement`. Used only from tests and doctests: production
//! advertisements arrive over the wire, they are not constructed in-process.

use super::{ball, convex_polytope, intersection, poly_var, polynomial, var};
use crate::expr::{RealExpr, SetExpr};
use crate::wire::Advertisement;

/// Cubic cost form: `coeff_cubed * P^3 + coeff_squared * P^2 + coeff_lin * P`.
pub fn battery_cost_cubic_form(coeff_cubed: f64, coeff_squared: f64, coeff_lin: f64) -> RealExpr {
    let p = poly_var("P");
    polynomial(
        coeff_cubed * (p.clone() ^ 3) + coeff_squared * (p.clone() ^ 2) + coeff_lin * p,
    )
}

/// Quadratic cost form: `0.5 * P^2 + (coeff_p / (2 * coeff_p_squared)) * P`.
pub fn battery_cost_quadratic_form(coeff_p_squared: f64, coeff_p: f64) -> RealExpr {
    let p = poly_var("P");
    let lin = coeff_p / (2.0 * coeff_p_squared);
    polynomial(0.5 * (p.clone() ^ 2) + lin * p)
}

/// Builds a battery advertisement: PQ profile is the intersection of an
/// apparent-power ball and an active-power band, belief function is the
/// identity singleton `(P, Q)`, and cost is one of the two polynomial forms
/// above.
pub fn battery_advertisement(
    s_rated: f64,
    p_min: f64,
    p_max: f64,
    cost_function: RealExpr,
) -> Advertisement {
    let pq_profile = intersection(vec![
        ball(
            vec![super::real(0.0), super::real(0.0)],
            super::real(s_rated),
        ),
        convex_polytope(vec![vec![1.0, 0.0], vec![-1.0, 0.0]], vec![p_max, -p_min]),
    ]);
    let belief_function = SetExpr::Singleton(vec![var("P").build(), var("Q").build()]);
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
    fn battery_advertisement_pq_profile_accepts_origin() {
        let adv = battery_advertisement(10.0, -5.0, 5.0, battery_cost_quadratic_form(1.0, 0.1));
        let table = ReferenceTable::build(&adv).unwrap();
        let bindings = HashMap::new();
        let ctx = EvalContext::new(&table, &bindings, 10_000);
        assert!(contains(&adv.pq_profile, &[0.0, 0.0], &ctx).unwrap());
        assert!(!contains(&adv.pq_profile, &[100.0, 100.0], &ctx).unwrap());
    }

    #[test]
    fn battery_cubic_cost_matches_hand_evaluation() {
        let cost = battery_cost_cubic_form(2.0, 3.0, 4.0);
        let adv = battery_advertisement(10.0, -5.0, 5.0, cost);
        let table = ReferenceTable::build(&adv).unwrap();
        let mut bindings = HashMap::new();
        bindings.insert("P".to_string(), 2.0);
        let ctx = EvalContext::new(&table, &bindings, 10_000);
        // 2*8 + 3*4 + 4*2 = 16 + 12 + 8 = 36
        assert_eq!(evaluate(&adv.cost_function, &ctx).unwrap(), 36.0);
    }
}
