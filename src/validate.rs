//! Advertisement validator: deep-copies an incoming message, checks its
//! presence/shape invariants, and sanity-checks the cost and belief
//! functions over a rejection-sampled subset of the PQ profile
//! (spec.md §4.9), grounded in `adv-validation.hpp`'s `AdvValidator`.

use std::collections::HashMap;

use rand::Rng;
use thiserror::Error;
use tracing::info;

use crate::expr::context::{EvalContext, DEFAULT_MAX_NESTING_DEPTH};
use crate::expr::eval::evaluate;
use crate::expr::membership::contains;
use crate::expr::resolve::{ReferenceTable, ResolveError};
use crate::geom::hull::hull;
use crate::geom::{AxisAlignedBox, GeomError};
use crate::wire::{Advertisement, Message, WireError};

/// Number of rejection-sampled points drawn from the PQ profile's hull,
/// matching the original's fixed `N = 100`.
pub const SAMPLE_COUNT: usize = 100;

/// Errors raised while validating an advertisement (spec.md §7).
///
/// The `Uninitialized*` variants are named after `adv-validation.hpp`'s
/// struct fields. Rust's type system already forbids constructing an
/// `Advertisement` with a missing `pq_profile`/`belief_function`/
/// `cost_function` (unlike the original's nullable Cap'n Proto pointers), so
/// these variants are unreachable once a `Message` has round-tripped through
/// the decoder; they are kept so the ledger of invariants the original
/// checked has a one-to-one home here.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum ValidateError {
    #[error(transparent)]
    Wire(#[from] WireError),
    #[error(transparent)]
    Resolve(#[from] ResolveError),
    #[error(transparent)]
    Geom(#[from] GeomError),
    #[error("advertisement is missing its PQ profile")]
    UninitializedPQProfile,
    #[error("advertisement is missing its belief function")]
    UninitializedBeliefFunction,
    #[error("advertisement is missing its cost function")]
    UninitializedCostFunction,
    #[error("advertisement's implemented setpoint is uninitialized")]
    UninitializedImplementedSetpoint,
}

/// Summary of a successful validation pass.
#[derive(Debug, Clone, PartialEq)]
pub struct ValidationReport {
    /// Bounding box of the PQ profile.
    pub pq_hull: AxisAlignedBox,
    /// Union of the belief function's hull over every sampled point.
    pub belief_hull: AxisAlignedBox,
    /// Number of the `SAMPLE_COUNT` draws that landed inside the PQ profile
    /// and were actually evaluated.
    pub samples_checked: usize,
}

/// Deep-copy `message` (forcing it through the wire codec once more, as the
/// original's `AdvValidator` constructor does via `MallocMessageBuilder`),
/// then validate its `Advertisement` body.
pub fn validate(message: &Message) -> Result<ValidationReport, ValidateError> {
    let message = message.deep_copy()?;
    let adv = message.as_advertisement()?;
    validate_advertisement(adv)
}

/// Run the presence checks, hull computation, and sampling pass over `adv`
/// directly, without a wire round-trip.
pub fn validate_advertisement(adv: &Advertisement) -> Result<ValidationReport, ValidateError> {
    adv.check_well_formed()
        .map_err(|_| ValidateError::UninitializedImplementedSetpoint)?;
    info!("advertisement passed presence checks");

    let table = ReferenceTable::build(adv)?;
    let empty_bindings = HashMap::new();
    let ctx = EvalContext::new(&table, &empty_bindings, DEFAULT_MAX_NESTING_DEPTH);

    let pq_hull = hull(&adv.pq_profile, &ctx)?;
    info!(min = ?pq_hull.min, max = ?pq_hull.max, "computed PQ profile hull");

    let mut rng = rand::thread_rng();
    let mut belief_hull: Option<AxisAlignedBox> = None;
    let mut samples_checked = 0usize;

    for _ in 0..SAMPLE_COUNT {
        let p = rng.gen_range(pq_hull.min[0]..=pq_hull.max[0]);
        let q = rng.gen_range(pq_hull.min[1]..=pq_hull.max[1]);
        if !contains(&adv.pq_profile, &[p, q], &ctx)? {
            continue;
        }

        let mut point_bindings = HashMap::new();
        point_bindings.insert("P".to_string(), p);
        point_bindings.insert("Q".to_string(), q);
        let point_ctx = EvalContext::new(&table, &point_bindings, DEFAULT_MAX_NESTING_DEPTH);

        let _cost = evaluate(&adv.cost_function, &point_ctx)?;
        let belief_box = hull(&adv.belief_function, &point_ctx)?;
        belief_hull = Some(match belief_hull {
            Some(acc) => merge_boxes(acc, belief_box),
            None => belief_box,
        });
        samples_checked += 1;
    }

    let belief_hull = belief_hull.ok_or(ValidateError::UninitializedBeliefFunction)?;
    info!(samples_checked, "finished belief-function sampling pass");

    Ok(ValidationReport {
        pq_hull,
        belief_hull,
        samples_checked,
    })
}

fn merge_boxes(a: AxisAlignedBox, b: AxisAlignedBox) -> AxisAlignedBox {
    AxisAlignedBox {
        min: [a.min[0].min(b.min[0]), a.min[1].min(b.min[1])],
        max: [a.max[0].max(b.max[0]), a.max[1].max(b.max[1])],
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::builder::battery::{battery_advertisement, battery_cost_quadratic_form};
    use crate::wire::{codec, MessageBody};

    #[test]
    fn validates_battery_advertisement() {
        let adv = battery_advertisement(10.0, -5.0, 5.0, battery_cost_quadratic_form(1.0, 0.1));
        let report = validate_advertisement(&adv).unwrap();
        assert!(report.samples_checked > 0);
        assert!(report.pq_hull.min[0] <= 0.0 && report.pq_hull.max[0] >= 0.0);
    }

    #[test]
    fn validates_through_wire_round_trip() {
        let adv = battery_advertisement(10.0, -5.0, 5.0, battery_cost_quadratic_form(1.0, 0.1));
        let message = Message {
            agent_id: 1,
            body: MessageBody::Advertisement(adv),
        };
        let bytes = codec::encode_unpacked(&message);
        let decoded = codec::decode_unpacked(&bytes, Default::default()).unwrap();
        let report = validate(&decoded).unwrap();
        assert!(report.samples_checked > 0);
    }

    #[test]
    fn rejects_nan_setpoint() {
        let mut adv = battery_advertisement(10.0, -5.0, 5.0, battery_cost_quadratic_form(1.0, 0.1));
        adv.implemented_setpoint = [f64::NAN, 0.0];
        assert_eq!(
            validate_advertisement(&adv),
            Err(ValidateError::UninitializedImplementedSetpoint)
        );
    }
}
