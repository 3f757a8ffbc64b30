//! Computational-geometry kernel: axis-aligned boxes, the rectangular hull,
//! Euclidean projection, and the 2-D LP solver that backs both (spec.md
//! §4.6–§4.8).
//!
//! Every operation here works in the two-dimensional PQ plane, matching the
//! wire model's `implemented_setpoint: [f64; 2]` and the original's
//! `BoundingBox`/`ConvexPolygon` kernel (`boundingbox-convexpolygon.cpp`).

pub mod hull;
pub mod lp;
pub mod project;

use thiserror::Error;

use crate::expr::context::{EvalContext, EvalError};
use crate::expr::SetExpr;

/// Follow `Name`/`Reference` wrappers down to the underlying set variant.
pub(crate) fn resolve_set<'a>(
    mut set: &'a SetExpr,
    ctx: &EvalContext<'a>,
) -> Result<&'a SetExpr, GeomError> {
    loop {
        match set {
            SetExpr::Name(_, inner) => set = inner,
            SetExpr::Reference(name) => {
                set = ctx
                    .table
                    .set(name)
                    .ok_or_else(|| GeomError::Eval(EvalError::UnknownReference(name.clone())))?;
            }
            _ => return Ok(set),
        }
    }
}

/// The smallest axis-aligned box containing a set, or a half-space
/// constraint's bounding region.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct AxisAlignedBox {
    pub min: [f64; 2],
    pub max: [f64; 2],
}

impl AxisAlignedBox {
    pub fn degenerate(point: [f64; 2]) -> Self {
        AxisAlignedBox {
            min: point,
            max: point,
        }
    }

    pub fn contains(&self, p: [f64; 2]) -> bool {
        (0..2).all(|i| p[i] >= self.min[i] && p[i] <= self.max[i])
    }

    /// The four corners, in counter-clockwise order starting at `min`.
    pub fn corners(&self) -> [[f64; 2]; 4] {
        [
            self.min,
            [self.max[0], self.min[1]],
            self.max,
            [self.min[0], self.max[1]],
        ]
    }

    /// Intersect with `other`, erroring if the result is empty.
    pub fn intersect(&self, other: &AxisAlignedBox) -> Result<AxisAlignedBox, GeomError> {
        let min = [self.min[0].max(other.min[0]), self.min[1].max(other.min[1])];
        let max = [self.max[0].min(other.max[0]), self.max[1].min(other.max[1])];
        if min[0] > max[0] || min[1] > max[1] {
            return Err(GeomError::Infeasible);
        }
        Ok(AxisAlignedBox { min, max })
    }

    /// The box's four edges as unit-normal half-space rows `(a, b)` with
    /// `a . x <= b`, in the same representation the LP solver consumes.
    pub fn face_constraints(&self) -> [([f64; 2], f64); 4] {
        [
            ([1.0, 0.0], self.max[0]),
            ([-1.0, 0.0], -self.min[0]),
            ([0.0, 1.0], self.max[1]),
            ([0.0, -1.0], -self.min[1]),
        ]
    }
}

/// Errors raised by the geometry kernel (spec.md §7).
#[derive(Debug, Error, Clone, PartialEq)]
pub enum GeomError {
    #[error(transparent)]
    Eval(#[from] EvalError),
    #[error("linear program is infeasible")]
    Infeasible,
    #[error("linear program is unbounded")]
    Unbounded,
    #[error("linear program solver reached an internal inconsistency")]
    LpSolverInternal,
    #[error("Dykstra projection did not converge")]
    NoConvergence,
    #[error("set expression variant does not support this operation: {0}")]
    UnsupportedVariant(&'static str),
    #[error("expected a 2-dimensional point, got length {0}")]
    DimensionMismatch(usize),
}
