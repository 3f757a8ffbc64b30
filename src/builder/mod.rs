//! Runtime operator-overload DSL for constructing [`RealExpr`]/[`SetExpr`]
//! trees, replacing the original's compile-time expression-template
//! metaprogramming (`realexpr-convenience.hpp`, `polynomial-convenience.hpp`,
//! `polytope-convenience.hpp`). Compile-time machinery is not required here:
//! every constructor below just builds the same closed sum type at runtime.
//!
//! ```
//! use commelec_advfunc::builder::{real, var};
//!
//! let cost = (real(2.0) * var("P")) + real(1.0);
//! assert!(matches!(cost.build(), commelec_advfunc::expr::RealExpr::BinaryOp { .. }));
//! ```

pub mod battery;
pub mod pv;

use std::collections::BTreeMap;
use std::ops::{Add, BitXor, Mul, Neg};

use crate::expr::{
    BinaryOpKind, BoundaryPair, Coeff, Polynomial, RealExpr, SetExpr, UnaryOpKind,
};

/// Thin wrapper over [`RealExpr`] carrying `+`, `*`, unary `-`, and `^`
/// (power) operator overloads.
#[derive(Clone, Debug, PartialEq)]
pub struct RealExprBuilder(pub RealExpr);

impl RealExprBuilder {
    pub fn build(self) -> RealExpr {
        self.0
    }
}

pub fn real(x: f64) -> RealExprBuilder {
    RealExprBuilder(RealExpr::Real(x))
}
pub fn var(name: &str) -> RealExprBuilder {
    RealExprBuilder(RealExpr::Variable(name.to_string()))
}
pub fn reference(name: &str) -> RealExprBuilder {
    RealExprBuilder(RealExpr::Reference(name.to_string()))
}
pub fn named(n: &str, expr: RealExprBuilder) -> RealExprBuilder {
    RealExprBuilder(RealExpr::Name(n.to_string(), Box::new(expr.0)))
}

impl Add for RealExprBuilder {
    type Output = RealExprBuilder;
    fn add(self, rhs: RealExprBuilder) -> RealExprBuilder {
        RealExprBuilder(RealExpr::BinaryOp {
            op: BinaryOpKind::Sum,
            a: Box::new(self.0),
            b: Box::new(rhs.0),
        })
    }
}

impl Mul for RealExprBuilder {
    type Output = RealExprBuilder;
    fn mul(self, rhs: RealExprBuilder) -> RealExprBuilder {
        RealExprBuilder(RealExpr::BinaryOp {
            op: BinaryOpKind::Prod,
            a: Box::new(self.0),
            b: Box::new(rhs.0),
        })
    }
}

impl Mul<RealExprBuilder> for f64 {
    type Output = RealExprBuilder;
    fn mul(self, rhs: RealExprBuilder) -> RealExprBuilder {
        real(self) * rhs
    }
}

impl Neg for RealExprBuilder {
    type Output = RealExprBuilder;
    fn neg(self) -> RealExprBuilder {
        RealExprBuilder(RealExpr::UnaryOp {
            op: UnaryOpKind::Negate,
            arg: Box::new(self.0),
        })
    }
}

impl BitXor<f64> for RealExprBuilder {
    type Output = RealExprBuilder;
    fn bitxor(self, rhs: f64) -> RealExprBuilder {
        RealExprBuilder(RealExpr::BinaryOp {
            op: BinaryOpKind::Pow,
            a: Box::new(self.0),
            b: Box::new(RealExpr::Real(rhs)),
        })
    }
}

macro_rules! unary_fn {
    ($name:ident, $kind:expr) => {
        pub fn $name(x: RealExprBuilder) -> RealExprBuilder {
            RealExprBuilder(RealExpr::UnaryOp {
                op: $kind,
                arg: Box::new(x.0),
            })
        }
    };
}

unary_fn!(sqrt, UnaryOpKind::Sqrt);
unary_fn!(sin, UnaryOpKind::Sin);
unary_fn!(cos, UnaryOpKind::Cos);
unary_fn!(tan, UnaryOpKind::Tan);
unary_fn!(exp, UnaryOpKind::Exp);
unary_fn!(ln, UnaryOpKind::Ln);
unary_fn!(log10, UnaryOpKind::Log10);
unary_fn!(abs, UnaryOpKind::Abs);
unary_fn!(sign, UnaryOpKind::Sign);
unary_fn!(round, UnaryOpKind::Round);
unary_fn!(floor, UnaryOpKind::Floor);
unary_fn!(ceil, UnaryOpKind::Ceil);
unary_fn!(square, UnaryOpKind::Square);
unary_fn!(mult_inv, UnaryOpKind::MultInv);

pub fn min(a: RealExprBuilder, b: RealExprBuilder) -> RealExprBuilder {
    RealExprBuilder(RealExpr::BinaryOp {
        op: BinaryOpKind::Min,
        a: Box::new(a.0),
        b: Box::new(b.0),
    })
}

pub fn max(a: RealExprBuilder, b: RealExprBuilder) -> RealExprBuilder {
    RealExprBuilder(RealExpr::BinaryOp {
        op: BinaryOpKind::Max,
        a: Box::new(a.0),
        b: Box::new(b.0),
    })
}

// ------------------------------------------------------------------
// Polynomial construction: a small monomial-sum DSL, mirroring
// `polynomial-convenience.hpp`'s `buildPolynomial`.
// ------------------------------------------------------------------

/// A single polynomial variable, usable as `Var("P") ^ 2`.
#[derive(Clone, Debug)]
pub struct Var(pub String);

pub fn poly_var(name: &str) -> Var {
    Var(name.to_string())
}

/// One term of a polynomial: a coefficient times a product of variable
/// powers.
#[derive(Clone, Debug)]
pub struct Monomial {
    coeff: f64,
    exponents: BTreeMap<String, u32>,
}

impl Var {
    fn pow(&self, e: u32) -> Monomial {
        let mut exponents = BTreeMap::new();
        exponents.insert(self.0.clone(), e);
        Monomial { coeff: 1.0, exponents }
    }
}

impl BitXor<u32> for Var {
    type Output = Monomial;
    fn bitxor(self, e: u32) -> Monomial {
        self.pow(e)
    }
}

impl From<Var> for Monomial {
    fn from(v: Var) -> Monomial {
        v.pow(1)
    }
}

impl Mul<Var> for f64 {
    type Output = Monomial;
    fn mul(self, v: Var) -> Monomial {
        let mut m = v.pow(1);
        m.coeff *= self;
        m
    }
}

impl Mul<Monomial> for f64 {
    type Output = Monomial;
    fn mul(self, mut m: Monomial) -> Monomial {
        m.coeff *= self;
        m
    }
}

impl Mul for Monomial {
    type Output = Monomial;
    fn mul(mut self, rhs: Monomial) -> Monomial {
        self.coeff *= rhs.coeff;
        for (name, exp) in rhs.exponents {
            *self.exponents.entry(name).or_insert(0) += exp;
        }
        self
    }
}

impl Mul<Var> for Monomial {
    type Output = Monomial;
    fn mul(self, rhs: Var) -> Monomial {
        self * rhs.pow(1)
    }
}

impl Mul<Var> for Var {
    type Output = Monomial;
    fn mul(self, rhs: Var) -> Monomial {
        self.pow(1) * rhs.pow(1)
    }
}

impl Mul<Monomial> for Var {
    type Output = Monomial;
    fn mul(self, rhs: Monomial) -> Monomial {
        self.pow(1) * rhs
    }
}

/// An accumulating sum of [`Monomial`] terms, finalized by [`polynomial`].
#[derive(Clone, Debug, Default)]
pub struct MonomialSum(Vec<Monomial>);

impl Add<Monomial> for Monomial {
    type Output = MonomialSum;
    fn add(self, rhs: Monomial) -> MonomialSum {
        MonomialSum(vec![self, rhs])
    }
}

impl Add<Monomial> for MonomialSum {
    type Output = MonomialSum;
    fn add(mut self, rhs: Monomial) -> MonomialSum {
        self.0.push(rhs);
        self
    }
}

/// Build a [`RealExpr::Polynomial`] from a monomial sum, computing the
/// sorted variable list and base-`d` offset encoding (spec.md §3.4).
pub fn polynomial<S: Into<MonomialSum>>(sum: S) -> RealExpr {
    let sum = sum.into();
    let mut names = std::collections::BTreeSet::new();
    for m in &sum.0 {
        for k in m.exponents.keys() {
            names.insert(k.clone());
        }
    }
    let variables: Vec<String> = names.into_iter().collect();
    let max_var_degree = sum
        .0
        .iter()
        .flat_map(|m| m.exponents.values().copied())
        .max()
        .unwrap_or(0);
    let d = max_var_degree + 1;
    let mut coefficients = Vec::with_capacity(sum.0.len());
    for m in &sum.0 {
        let mut offset: u32 = 0;
        for (i, name) in variables.iter().enumerate() {
            let e = *m.exponents.get(name).unwrap_or(&0);
            offset += e * d.pow(i as u32);
        }
        coefficients.push(Coeff {
            offset,
            value: m.coeff,
        });
    }
    RealExpr::Polynomial(Polynomial {
        variables,
        max_var_degree,
        coefficients,
    })
}

impl From<Monomial> for MonomialSum {
    fn from(m: Monomial) -> MonomialSum {
        MonomialSum(vec![m])
    }
}

// ------------------------------------------------------------------
// Set constructors
// ------------------------------------------------------------------

pub fn rectangle(bounds: Vec<(RealExprBuilder, RealExprBuilder)>) -> SetExpr {
    SetExpr::Rectangle(
        bounds
            .into_iter()
            .map(|(a, b)| BoundaryPair { a: a.0, b: b.0 })
            .collect(),
    )
}

pub fn ball(center: Vec<RealExprBuilder>, radius: RealExprBuilder) -> SetExpr {
    SetExpr::Ball {
        center: center.into_iter().map(|c| c.0).collect(),
        radius: radius.0,
    }
}

pub fn convex_polytope(a: Vec<Vec<f64>>, b: Vec<f64>) -> SetExpr {
    SetExpr::ConvexPolytope {
        a: a.into_iter()
            .map(|row| row.into_iter().map(RealExpr::Real).collect())
            .collect(),
        b: b.into_iter().map(RealExpr::Real).collect(),
    }
}

pub fn intersection(children: Vec<SetExpr>) -> SetExpr {
    SetExpr::Intersection(children)
}

pub fn singleton(coords: Vec<RealExprBuilder>) -> SetExpr {
    SetExpr::Singleton(coords.into_iter().map(|c| c.0).collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::expr::eval::evaluate;
    use crate::expr::resolve::ReferenceTable;
    use crate::wire::Advertisement;
    use std::collections::HashMap;

    #[test]
    fn operator_overloads_build_expected_tree() {
        let expr = (2.0 * var("P")) + real(1.0);
        assert_eq!(
            expr.build(),
            RealExpr::BinaryOp {
                op: BinaryOpKind::Sum,
                a: Box::new(RealExpr::BinaryOp {
                    op: BinaryOpKind::Prod,
                    a: Box::new(RealExpr::Real(2.0)),
                    b: Box::new(RealExpr::Variable("P".to_string())),
                }),
                b: Box::new(RealExpr::Real(1.0)),
            }
        );
    }

    #[test]
    fn polynomial_builder_matches_manual_encoding() {
        let p = poly_var("P");
        let q = poly_var("Q");
        let expr = polynomial(2.0 * (p.clone() ^ 2) + 3.0 * q.clone());
        let adv = Advertisement {
            pq_profile: SetExpr::Singleton(vec![]),
            belief_function: SetExpr::Singleton(vec![]),
            cost_function: expr,
            implemented_setpoint: [0.0, 0.0],
        };
        let table = ReferenceTable::build(&adv).unwrap();
        let mut bindings = HashMap::new();
        bindings.insert("P".to_string(), 3.0);
        bindings.insert("Q".to_string(), 5.0);
        let ctx = crate::expr::context::EvalContext::new(&table, &bindings, 10_000);
        // 2*P^2 + 3*Q = 2*9 + 15 = 33
        assert_eq!(evaluate(&adv.cost_function, &ctx).unwrap(), 33.0);
    }
}
