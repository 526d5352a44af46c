//! Symbolic differentiation over the typed IR.
//!
//! A pure function on closed (let-free) expressions. The variable of
//! differentiation is a state name, optionally narrowed to one record field
//! so record states can be solved field by field. Anything the calculus
//! closures do not cover (`abs`, `exprelr`, `min`/`max`, conditionals, and
//! uninlined calls) is an error when the variable occurs under it.

use std::rc::Rc;

use ionc_lang::ast::{BinaryOp, UnaryOp};
use ionc_lang::location::Location;

use crate::ir::*;
use crate::rtype::{real_type, RType};
use crate::{CompileError, Result};

/// The variable `∂/∂x` differentiates with respect to: a scalar state, or
/// one field of a record state.
#[derive(Debug, Clone)]
pub struct DiffVar {
    pub name: String,
    pub field: Option<String>,
}

pub fn is_var(e: &RExpr, var: &DiffVar) -> bool {
    match (&**e, &var.field) {
        (ResolvedExpr::Argument(a), None) => a.name == var.name,
        (ResolvedExpr::FieldAccess(f), Some(field)) => {
            f.field == *field
                && matches!(&*f.object, ResolvedExpr::Argument(a) if a.name == var.name)
        }
        _ => false,
    }
}

pub fn contains_var(e: &RExpr, var: &DiffVar) -> bool {
    if is_var(e, var) {
        return true;
    }
    match &**e {
        // a bare occurrence of the record name does not count when the
        // variable is a single field
        ResolvedExpr::Argument(a) => var.field.is_none() && a.name == var.name,
        ResolvedExpr::FieldAccess(f) => contains_var(&f.object, var),
        ResolvedExpr::Unary(u) => contains_var(&u.arg, var),
        ResolvedExpr::Binary(b) => contains_var(&b.lhs, var) || contains_var(&b.rhs, var),
        ResolvedExpr::If(i) => {
            contains_var(&i.condition, var)
                || contains_var(&i.if_true, var)
                || contains_var(&i.if_false, var)
        }
        ResolvedExpr::Call(c) => c.args.iter().any(|a| contains_var(a, var)),
        ResolvedExpr::Object(o) => o.fields.iter().any(|(_, v)| contains_var(v, var)),
        ResolvedExpr::Let(l) => contains_var(&l.value, var) || contains_var(&l.body, var),
        _ => false,
    }
}

fn real(loc: Location) -> RType {
    real_type(loc)
}

pub(crate) fn float(value: f64, loc: Location) -> RExpr {
    Rc::new(ResolvedExpr::Float(ResolvedFloat { value, ty: real(loc), loc }))
}

pub(crate) fn unary(op: UnaryOp, arg: RExpr, loc: Location) -> RExpr {
    let ty = type_of(&arg);
    Rc::new(ResolvedExpr::Unary(ResolvedUnary { op, arg, ty, loc }))
}

pub(crate) fn binary(op: BinaryOp, lhs: RExpr, rhs: RExpr, loc: Location) -> RExpr {
    let ty = type_of(&lhs);
    Rc::new(ResolvedExpr::Binary(ResolvedBinary { op, lhs, rhs, ty, loc }))
}

pub(crate) fn add(l: RExpr, r: RExpr, loc: Location) -> RExpr {
    binary(BinaryOp::Add, l, r, loc)
}
pub(crate) fn sub(l: RExpr, r: RExpr, loc: Location) -> RExpr {
    binary(BinaryOp::Sub, l, r, loc)
}
pub(crate) fn mul(l: RExpr, r: RExpr, loc: Location) -> RExpr {
    binary(BinaryOp::Mul, l, r, loc)
}
pub(crate) fn div(l: RExpr, r: RExpr, loc: Location) -> RExpr {
    binary(BinaryOp::Div, l, r, loc)
}
pub(crate) fn neg(e: RExpr, loc: Location) -> RExpr {
    unary(UnaryOp::Neg, e, loc)
}

/// ∂e/∂var under the standard calculus closures.
pub fn sym_diff(e: &RExpr, var: &DiffVar) -> Result<RExpr> {
    let loc = e.loc();
    if is_var(e, var) {
        return Ok(float(1.0, loc));
    }
    if !contains_var(e, var) {
        return Ok(float(0.0, loc));
    }
    match &**e {
        ResolvedExpr::Unary(u) => {
            let du = sym_diff(&u.arg, var)?;
            match u.op {
                UnaryOp::Neg => Ok(neg(du, loc)),
                UnaryOp::Exp => Ok(mul(e.clone(), du, loc)),
                UnaryOp::Sin => Ok(mul(unary(UnaryOp::Cos, u.arg.clone(), loc), du, loc)),
                UnaryOp::Cos => {
                    Ok(mul(neg(unary(UnaryOp::Sin, u.arg.clone(), loc), loc), du, loc))
                }
                UnaryOp::Log => Ok(div(du, u.arg.clone(), loc)),
                UnaryOp::Abs | UnaryOp::Exprelr | UnaryOp::Not => {
                    Err(non_differentiable(u.op, loc))
                }
            }
        }
        ResolvedExpr::Binary(b) => {
            match b.op {
                BinaryOp::Add => {
                    Ok(add(sym_diff(&b.lhs, var)?, sym_diff(&b.rhs, var)?, loc))
                }
                BinaryOp::Sub => {
                    Ok(sub(sym_diff(&b.lhs, var)?, sym_diff(&b.rhs, var)?, loc))
                }
                BinaryOp::Mul => {
                    // l'·r + l·r'
                    let dl = sym_diff(&b.lhs, var)?;
                    let dr = sym_diff(&b.rhs, var)?;
                    Ok(add(
                        mul(dl, b.rhs.clone(), loc),
                        mul(b.lhs.clone(), dr, loc),
                        loc,
                    ))
                }
                BinaryOp::Div => {
                    // (l'·r − l·r')/r²
                    let dl = sym_diff(&b.lhs, var)?;
                    let dr = sym_diff(&b.rhs, var)?;
                    let num = sub(
                        mul(dl, b.rhs.clone(), loc),
                        mul(b.lhs.clone(), dr, loc),
                        loc,
                    );
                    Ok(div(num, mul(b.rhs.clone(), b.rhs.clone(), loc), loc))
                }
                BinaryOp::Pow => {
                    if !contains_var(&b.rhs, var) {
                        // w·u^(w−1)·u'
                        let du = sym_diff(&b.lhs, var)?;
                        let w_minus_one = decrement(&b.rhs, loc);
                        let powered =
                            binary(BinaryOp::Pow, b.lhs.clone(), w_minus_one, loc);
                        Ok(mul(mul(b.rhs.clone(), powered, loc), du, loc))
                    } else if !contains_var(&b.lhs, var) {
                        // u^w·log(u)·w'
                        let dw = sym_diff(&b.rhs, var)?;
                        let ln = unary(UnaryOp::Log, b.lhs.clone(), loc);
                        Ok(mul(mul(e.clone(), ln, loc), dw, loc))
                    } else {
                        // u^w·(w'·log(u) + w·u'/u)
                        let du = sym_diff(&b.lhs, var)?;
                        let dw = sym_diff(&b.rhs, var)?;
                        let ln = unary(UnaryOp::Log, b.lhs.clone(), loc);
                        let inner = add(
                            mul(dw, ln, loc),
                            div(mul(b.rhs.clone(), du, loc), b.lhs.clone(), loc),
                            loc,
                        );
                        Ok(mul(e.clone(), inner, loc))
                    }
                }
                BinaryOp::Min | BinaryOp::Max => Err(CompileError::NonDifferentiable {
                    msg: "min/max of the state variable has no derivative".to_string(),
                    loc,
                }),
                _ => Err(CompileError::NonDifferentiable {
                    msg: "boolean operator applied to the state variable".to_string(),
                    loc,
                }),
            }
        }
        ResolvedExpr::If(_) => Err(CompileError::NonDifferentiable {
            msg: "conditional depends on the state variable".to_string(),
            loc,
        }),
        ResolvedExpr::Call(c) => Err(CompileError::NonDifferentiable {
            msg: format!("call to '{}' was not inlined before solving", c.function),
            loc,
        }),
        _ => Err(CompileError::InternalInvariant(format!(
            "cannot differentiate this expression form at {}",
            loc
        ))),
    }
}

fn non_differentiable(op: UnaryOp, loc: Location) -> CompileError {
    let name = match op {
        UnaryOp::Abs => "abs",
        UnaryOp::Exprelr => "exprelr",
        _ => "!",
    };
    CompileError::NonDifferentiable {
        msg: format!("'{}' of the state variable has no derivative", name),
        loc,
    }
}

/// `w − 1` with literal exponents folded in place.
fn decrement(w: &RExpr, loc: Location) -> RExpr {
    match &**w {
        ResolvedExpr::Int(i) => Rc::new(ResolvedExpr::Int(ResolvedInt {
            value: i.value - 1,
            ty: i.ty.clone(),
            loc,
        })),
        ResolvedExpr::Float(f) => float(f.value - 1.0, loc),
        _ => sub(w.clone(), float(1.0, loc), loc),
    }
}

/// Local algebraic cleanup of derivative trees: fold literal arithmetic and
/// the 0/1 identities. Keeps the solver's linearity test honest, since
/// `∂f/∂x` for linear `f` must reduce to an x-free expression.
pub fn simplify(e: &RExpr) -> RExpr {
    let loc = e.loc();
    match &**e {
        ResolvedExpr::Unary(u) => {
            let arg = simplify(&u.arg);
            if u.op == UnaryOp::Neg {
                if let Some(v) = lit(&arg) {
                    return float(-v, loc);
                }
            }
            unary(u.op, arg, loc)
        }
        ResolvedExpr::Binary(b) => {
            let l = simplify(&b.lhs);
            let r = simplify(&b.rhs);
            let (lv, rv) = (lit(&l), lit(&r));
            match b.op {
                BinaryOp::Add => match (lv, rv) {
                    (Some(a), Some(c)) => float(a + c, loc),
                    (Some(a), _) if a == 0.0 => r,
                    (_, Some(c)) if c == 0.0 => l,
                    _ => add(l, r, loc),
                },
                BinaryOp::Sub => match (lv, rv) {
                    (Some(a), Some(c)) => float(a - c, loc),
                    (_, Some(c)) if c == 0.0 => l,
                    (Some(a), _) if a == 0.0 => neg(r, loc),
                    _ => sub(l, r, loc),
                },
                BinaryOp::Mul => match (lv, rv) {
                    (Some(a), Some(c)) => float(a * c, loc),
                    (Some(a), _) if a == 0.0 => float(0.0, loc),
                    (_, Some(c)) if c == 0.0 => float(0.0, loc),
                    (Some(a), _) if a == 1.0 => r,
                    (_, Some(c)) if c == 1.0 => l,
                    _ => mul(l, r, loc),
                },
                BinaryOp::Div => match (lv, rv) {
                    (Some(a), Some(c)) => float(a / c, loc),
                    (Some(a), _) if a == 0.0 => float(0.0, loc),
                    (_, Some(c)) if c == 1.0 => l,
                    _ => div(l, r, loc),
                },
                BinaryOp::Pow => match (lv, rv) {
                    (Some(a), Some(c)) => float(a.powf(c), loc),
                    (_, Some(c)) if c == 1.0 => l,
                    (_, Some(c)) if c == 0.0 => float(1.0, loc),
                    _ => binary(BinaryOp::Pow, l, r, loc),
                },
                _ => binary(b.op, l, r, loc),
            }
        }
        _ => e.clone(),
    }
}

fn lit(e: &RExpr) -> Option<f64> {
    match &**e {
        ResolvedExpr::Float(f) => Some(f.value),
        ResolvedExpr::Int(i) => Some(i.value as f64),
        _ => None,
    }
}

pub fn is_zero(e: &RExpr) -> bool {
    lit(e) == Some(0.0)
}

/// Substitute every occurrence of the variable by a replacement expression.
pub fn subst_var(e: &RExpr, var: &DiffVar, replacement: &RExpr) -> RExpr {
    if is_var(e, var) {
        return replacement.clone();
    }
    match &**e {
        ResolvedExpr::Unary(u) => {
            let mut v = u.clone();
            v.arg = subst_var(&u.arg, var, replacement);
            Rc::new(ResolvedExpr::Unary(v))
        }
        ResolvedExpr::Binary(b) => {
            let mut v = b.clone();
            v.lhs = subst_var(&b.lhs, var, replacement);
            v.rhs = subst_var(&b.rhs, var, replacement);
            Rc::new(ResolvedExpr::Binary(v))
        }
        ResolvedExpr::If(i) => {
            let mut v = i.clone();
            v.condition = subst_var(&i.condition, var, replacement);
            v.if_true = subst_var(&i.if_true, var, replacement);
            v.if_false = subst_var(&i.if_false, var, replacement);
            Rc::new(ResolvedExpr::If(v))
        }
        ResolvedExpr::Call(c) => {
            let mut v = c.clone();
            v.args = c.args.iter().map(|a| subst_var(a, var, replacement)).collect();
            Rc::new(ResolvedExpr::Call(v))
        }
        ResolvedExpr::Object(o) => {
            let mut v = o.clone();
            v.fields = o
                .fields
                .iter()
                .map(|(n, f)| (n.clone(), subst_var(f, var, replacement)))
                .collect();
            Rc::new(ResolvedExpr::Object(v))
        }
        _ => e.clone(),
    }
}
