//! Typed in-memory representation of Real- and Set-valued expressions.
//!
//! This is the closed sum type the rest of the crate walks: [`RealExpr`] for
//! scalar functions over a variable binding, [`SetExpr`] for set-valued ones.
//! Neither type performs any evaluation itself — see [`crate::expr::eval`],
//! [`crate::expr::diff`], and [`crate::expr::membership`] for the operations
//! defined over these trees.
//!
//! ```
//! use commelec_advfunc::expr::{RealExpr, BinaryOpKind};
//!
//! // P^2 + 1
//! let e = RealExpr::BinaryOp {
//!     op: BinaryOpKind::Sum,
//!     a: Box::new(RealExpr::BinaryOp {
//!         op: BinaryOpKind::Pow,
//!         a: Box::new(RealExpr::Variable("P".to_string())),
//!         b: Box::new(RealExpr::Real(2.0)),
//!     }),
//!     b: Box::new(RealExpr::Real(1.0)),
//! };
//! assert!(matches!(e, RealExpr::BinaryOp { .. }));
//! ```

pub mod context;
pub mod diff;
pub mod eval;
pub mod membership;
pub mod resolve;

use serde::{Deserialize, Serialize};

/// One coefficient of a [`Polynomial`]: `value * monomial(offset)`.
///
/// `offset` is the base-`d` encoding of the monomial's exponent vector, where
/// `d = maxVarDegree + 1` (see [`Polynomial`]).
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct Coeff {
    pub offset: u32,
    pub value: f64,
}

/// A compact multivariate polynomial over a fixed, sorted list of variables.
///
/// `offset = sum_i(e_i * d^i)` where `e_i` is the exponent of `variables[i]`
/// in the monomial and `d = max_var_degree + 1` is an upper bound on any
/// single exponent. This is the wire-efficient encoding used by the original
/// protocol's `Polynomial` schema node; see [`eval::eval_polynomial`] for the
/// decode-and-evaluate routine.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Polynomial {
    pub variables: Vec<String>,
    pub max_var_degree: u32,
    pub coefficients: Vec<Coeff>,
}

/// `UnaryOp` operator tags (spec.md §3.2).
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum UnaryOpKind {
    Negate,
    Exp,
    Sin,
    Cos,
    Tan,
    Square,
    Sqrt,
    Log10,
    Ln,
    MultInv,
    Round,
    Floor,
    Ceil,
    Abs,
    Sign,
}

/// `BinaryOp` operator tags (spec.md §3.2). `LessEqThan`/`GreaterThan`
/// evaluate to `1.0`/`0.0`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum BinaryOpKind {
    Sum,
    Prod,
    Pow,
    Min,
    Max,
    LessEqThan,
    GreaterThan,
}

/// `ListOp` operator tags (spec.md §3.2).
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum ListOpKind {
    Sum,
    Prod,
}

/// One arm of a [`RealExpr::CaseDistinction`].
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct RealCase {
    pub set: SetExpr,
    pub expression: RealExpr,
}

/// One arm of a [`SetExpr::CaseDistinction`].
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SetCase {
    pub guard: SetExpr,
    pub body: SetExpr,
}

/// A pair of real-valued bounds `[min(a,b), max(a,b)]` for one axis of a
/// [`SetExpr::Rectangle`].
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct BoundaryPair {
    pub a: RealExpr,
    pub b: RealExpr,
}

/// Real-valued expression tree (spec.md §3.2).
///
/// Evaluated pointwise under a variable binding by [`eval::evaluate`];
/// differentiated by [`diff::partial`]. `Reference` nodes are resolved
/// against the table built by [`resolve::ReferenceTable`] when an
/// [`crate::Interpreter`] attaches an advertisement.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub enum RealExpr {
    Real(f64),
    Variable(String),
    Reference(String),
    Name(String, Box<RealExpr>),
    UnaryOp {
        op: UnaryOpKind,
        arg: Box<RealExpr>,
    },
    BinaryOp {
        op: BinaryOpKind,
        a: Box<RealExpr>,
        b: Box<RealExpr>,
    },
    ListOp {
        op: ListOpKind,
        args: Vec<RealExpr>,
    },
    Polynomial(Polynomial),
    CaseDistinction {
        vars: Vec<String>,
        cases: Vec<RealCase>,
    },
}

/// Set-valued expression tree (spec.md §3.3).
///
/// Membership is decided by [`membership::contains`]; the tightest
/// axis-aligned bounding box by [`crate::geom::hull::hull`]; the nearest
/// point by [`crate::geom::project::project`].
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub enum SetExpr {
    Singleton(Vec<RealExpr>),
    Ball {
        center: Vec<RealExpr>,
        radius: RealExpr,
    },
    Rectangle(Vec<BoundaryPair>),
    ConvexPolytope {
        a: Vec<Vec<RealExpr>>,
        b: Vec<RealExpr>,
    },
    Intersection(Vec<SetExpr>),
    Name(String, Box<SetExpr>),
    Reference(String),
    CaseDistinction {
        vars: Vec<String>,
        cases: Vec<SetCase>,
    },
}

impl RealExpr {
    /// The name this node registers itself under, if it is a `Name` wrapper.
    pub fn name(&self) -> Option<&str> {
        match self {
            RealExpr::Name(n, _) => Some(n.as_str()),
            _ => None,
        }
    }
}

impl SetExpr {
    /// The name this node registers itself under, if it is a `Name` wrapper.
    pub fn name(&self) -> Option<&str> {
        match self {
            SetExpr::Name(n, _) => Some(n.as_str()),
            _ => None,
        }
    }
}
