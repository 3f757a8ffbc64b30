//! Symbolic differentiation, evaluated pointwise (spec.md §4.4).
//!
//! `partial` descends the tree once, computing `∂expr/∂wrt` at `ctx`'s
//! bindings. Product/quotient/power rules need sibling *values* as well as
//! sibling derivatives, so nodes that need a value call back into
//! [`super::eval::evaluate`] for that subtree.

use super::context::{EvalContext, EvalError};
use super::eval::evaluate;
use super::{BinaryOpKind, ListOpKind, RealExpr, UnaryOpKind};

/// `∂expr/∂wrt` evaluated at `ctx`'s bindings.
pub fn partial(expr: &RealExpr, wrt: &str, ctx: &EvalContext) -> Result<f64, EvalError> {
    let _guard = ctx.enter()?;
    match expr {
        RealExpr::Real(_) => Ok(0.0),
        RealExpr::Variable(name) => Ok(if name == wrt { 1.0 } else { 0.0 }),
        RealExpr::Reference(name) => {
            let target = ctx
                .table
                .real(name)
                .ok_or_else(|| EvalError::UnknownReference(name.clone()))?;
            partial(target, wrt, ctx)
        }
        RealExpr::Name(_, inner) => partial(inner, wrt, ctx),
        RealExpr::UnaryOp { op, arg } => partial_unary(*op, arg, wrt, ctx),
        RealExpr::BinaryOp { op, a, b } => partial_binary(*op, a, b, wrt, ctx),
        RealExpr::ListOp { op, args } => partial_list(*op, args, wrt, ctx),
        RealExpr::Polynomial(poly) => partial_polynomial(poly, wrt, ctx),
        RealExpr::CaseDistinction { vars, cases } => {
            let point: Result<Vec<f64>, EvalError> = vars
                .iter()
                .map(|v| {
                    ctx.bindings
                        .get(v)
                        .copied()
                        .ok_or_else(|| EvalError::UnknownVariable(v.clone()))
                })
                .collect();
            let point = point?;
            for case in cases {
                if super::membership::contains(&case.set, &point, ctx)? {
                    return partial(&case.expression, wrt, ctx);
                }
            }
            Err(EvalError::UnhandledCase)
        }
    }
}

fn partial_unary(
    op: UnaryOpKind,
    arg: &RealExpr,
    wrt: &str,
    ctx: &EvalContext,
) -> Result<f64, EvalError> {
    let d = partial(arg, wrt, ctx)?;
    Ok(match op {
        UnaryOpKind::Negate => -d,
        UnaryOpKind::Exp => evaluate(arg, ctx)?.exp() * d,
        UnaryOpKind::Sin => evaluate(arg, ctx)?.cos() * d,
        UnaryOpKind::Cos => -evaluate(arg, ctx)?.sin() * d,
        UnaryOpKind::Tan => d / evaluate(arg, ctx)?.cos().powi(2),
        UnaryOpKind::Square => 2.0 * evaluate(arg, ctx)? * d,
        UnaryOpKind::Sqrt => d / (2.0 * evaluate(arg, ctx)?.sqrt()),
        UnaryOpKind::Log10 => d / (evaluate(arg, ctx)? * 10f64.ln()),
        UnaryOpKind::Ln => d / evaluate(arg, ctx)?,
        UnaryOpKind::MultInv => -d / evaluate(arg, ctx)?.powi(2),
        UnaryOpKind::Round | UnaryOpKind::Floor | UnaryOpKind::Ceil => d,
        UnaryOpKind::Abs => evaluate(arg, ctx)?.signum() * d,
        UnaryOpKind::Sign => 0.0,
    })
}

fn partial_binary(
    op: BinaryOpKind,
    a: &RealExpr,
    b: &RealExpr,
    wrt: &str,
    ctx: &EvalContext,
) -> Result<f64, EvalError> {
    Ok(match op {
        BinaryOpKind::Sum => partial(a, wrt, ctx)? + partial(b, wrt, ctx)?,
        BinaryOpKind::Prod => {
            let (va, vb) = (evaluate(a, ctx)?, evaluate(b, ctx)?);
            let (da, db) = (partial(a, wrt, ctx)?, partial(b, wrt, ctx)?);
            da * vb + va * db
        }
        BinaryOpKind::Pow => {
            let (f, g) = (evaluate(a, ctx)?, evaluate(b, ctx)?);
            let (df, dg) = (partial(a, wrt, ctx)?, partial(b, wrt, ctx)?);
            f.powf(g - 1.0) * (g * df + f * f.ln() * dg)
        }
        BinaryOpKind::Min => {
            let (va, vb) = (evaluate(a, ctx)?, evaluate(b, ctx)?);
            if va <= vb {
                partial(a, wrt, ctx)?
            } else {
                partial(b, wrt, ctx)?
            }
        }
        BinaryOpKind::Max => {
            let (va, vb) = (evaluate(a, ctx)?, evaluate(b, ctx)?);
            if va >= vb {
                partial(a, wrt, ctx)?
            } else {
                partial(b, wrt, ctx)?
            }
        }
        BinaryOpKind::LessEqThan | BinaryOpKind::GreaterThan => 0.0,
    })
}

fn partial_list(
    op: ListOpKind,
    args: &[RealExpr],
    wrt: &str,
    ctx: &EvalContext,
) -> Result<f64, EvalError> {
    match op {
        ListOpKind::Sum => {
            let mut total = 0.0;
            for arg in args {
                total += partial(arg, wrt, ctx)?;
            }
            Ok(total)
        }
        ListOpKind::Prod => {
            let values: Result<Vec<f64>, EvalError> =
                args.iter().map(|a| evaluate(a, ctx)).collect();
            let values = values?;
            let mut total = 0.0;
            for (i, arg) in args.iter().enumerate() {
                let di = partial(arg, wrt, ctx)?;
                let rest: f64 = values
                    .iter()
                    .enumerate()
                    .filter(|(j, _)| *j != i)
                    .map(|(_, v)| v)
                    .product();
                total += di * rest;
            }
            Ok(total)
        }
    }
}

fn partial_polynomial(
    poly: &super::Polynomial,
    wrt: &str,
    ctx: &EvalContext,
) -> Result<f64, EvalError> {
    let Some(k) = poly.variables.iter().position(|v| v == wrt) else {
        return Ok(0.0);
    };
    let mut var_values = Vec::with_capacity(poly.variables.len());
    for name in &poly.variables {
        var_values.push(
            ctx.bindings
                .get(name)
                .copied()
                .ok_or_else(|| EvalError::UnknownVariable(name.clone()))?,
        );
    }
    let d = (poly.max_var_degree + 1) as u64;
    let mut total = 0.0;
    for coeff in &poly.coefficients {
        let mut offset = coeff.offset as u64;
        let mut exponents = Vec::with_capacity(var_values.len());
        for _ in &var_values {
            exponents.push((offset % d) as i32);
            offset /= d;
        }
        let ek = exponents[k];
        if ek == 0 {
            continue;
        }
        let mut term = coeff.value * ek as f64;
        for (i, &value) in var_values.iter().enumerate() {
            let exp = if i == k { ek - 1 } else { exponents[i] };
            term *= value.powi(exp);
        }
        total += term;
    }
    Ok(total)
}
