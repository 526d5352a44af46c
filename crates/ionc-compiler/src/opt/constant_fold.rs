//! Constant folding.
//!
//! Carries a map from let-bound names to known compile-time values. Numeric
//! operations whose operands are (or are bound to) literals are evaluated in
//! host `f64`; integer +, -, * and non-negative powers stay in `i64`.
//! Conditionals with a literal guard drop the dead branch, and field access
//! on a name bound to an object literal resolves to the field's value.

use std::collections::HashMap;
use std::rc::Rc;

use ionc_lang::ast::{BinaryOp, UnaryOp};

use crate::ir::*;

use super::{map_bodies, Pass};

pub struct ConstantFold;

impl Pass for ConstantFold {
    fn name(&self) -> &'static str {
        "constant-fold"
    }

    fn run(&self, m: &ResolvedMechanism) -> (ResolvedMechanism, bool) {
        map_bodies(m, constant_fold_expr)
    }
}

#[derive(Debug, Clone)]
enum Known {
    Num(f64),
    Int(i64),
    Bool(bool),
    Object(Vec<(String, RExpr)>),
}

pub fn constant_fold_expr(e: &RExpr) -> (RExpr, bool) {
    let mut env: HashMap<String, Known> = HashMap::new();
    walk(e, &mut env)
}

fn walk(e: &RExpr, env: &mut HashMap<String, Known>) -> (RExpr, bool) {
    match &**e {
        ResolvedExpr::Let(l) => {
            let (value, value_changed) = fold_value(&l.value, env);
            record(&l.name, &value, env);
            let (body, body_changed) = walk(&l.body, env);
            let out = Rc::new(ResolvedExpr::Let(ResolvedLet {
                name: l.name.clone(),
                value,
                body,
                ty: l.ty.clone(),
                loc: l.loc,
            }));
            (out, value_changed || body_changed)
        }
        _ => fold_value(e, env),
    }
}

fn record(name: &str, value: &RExpr, env: &mut HashMap<String, Known>) {
    match &**value {
        ResolvedExpr::Float(f) => {
            env.insert(name.to_string(), Known::Num(f.value));
        }
        ResolvedExpr::Int(i) => {
            env.insert(name.to_string(), Known::Int(i.value));
        }
        ResolvedExpr::Object(o) => {
            env.insert(name.to_string(), Known::Object(o.fields.clone()));
        }
        // boolean-valued bindings have no literal form; remember the value
        // so a conditional guarded by this name can select its branch
        ResolvedExpr::Binary(b) if b.op.is_boolean() => {
            if let Some(v) = eval_boolean(b, env) {
                env.insert(name.to_string(), Known::Bool(v));
            }
        }
        ResolvedExpr::Unary(u) if u.op == UnaryOp::Not => {
            if let Some(Known::Bool(v)) = atom_known(&u.arg, env) {
                env.insert(name.to_string(), Known::Bool(!v));
            }
        }
        _ => {}
    }
}

fn atom_known(e: &RExpr, env: &HashMap<String, Known>) -> Option<Known> {
    match &**e {
        ResolvedExpr::Float(f) => Some(Known::Num(f.value)),
        ResolvedExpr::Int(i) => Some(Known::Int(i.value)),
        ResolvedExpr::Argument(a) => env.get(&a.name).cloned(),
        _ => None,
    }
}

fn atom_numeric(e: &RExpr, env: &HashMap<String, Known>) -> Option<f64> {
    match atom_known(e, env)? {
        Known::Num(v) => Some(v),
        Known::Int(v) => Some(v as f64),
        _ => None,
    }
}

fn eval_boolean(b: &ResolvedBinary, env: &HashMap<String, Known>) -> Option<bool> {
    match b.op {
        BinaryOp::And | BinaryOp::Or => {
            let (Some(Known::Bool(l)), Some(Known::Bool(r))) =
                (atom_known(&b.lhs, env), atom_known(&b.rhs, env))
            else {
                return None;
            };
            Some(if b.op == BinaryOp::And { l && r } else { l || r })
        }
        BinaryOp::Lt | BinaryOp::Le | BinaryOp::Gt | BinaryOp::Ge | BinaryOp::Eq | BinaryOp::Ne => {
            let (Some(l), Some(r)) = (atom_numeric(&b.lhs, env), atom_numeric(&b.rhs, env)) else {
                return None;
            };
            Some(match b.op {
                BinaryOp::Lt => l < r,
                BinaryOp::Le => l <= r,
                BinaryOp::Gt => l > r,
                BinaryOp::Ge => l >= r,
                BinaryOp::Eq => l == r,
                BinaryOp::Ne => l != r,
                _ => unreachable!(),
            })
        }
        _ => None,
    }
}

/// Substitute a known-literal argument by the literal itself. The literal
/// keeps the argument's resolved type.
fn subst_literal(e: &RExpr, env: &HashMap<String, Known>) -> (RExpr, bool) {
    if let ResolvedExpr::Argument(a) = &**e {
        match env.get(&a.name) {
            Some(Known::Num(v)) => {
                return (
                    Rc::new(ResolvedExpr::Float(ResolvedFloat {
                        value: *v,
                        ty: a.ty.clone(),
                        loc: a.loc,
                    })),
                    true,
                )
            }
            Some(Known::Int(v)) => {
                return (
                    Rc::new(ResolvedExpr::Int(ResolvedInt {
                        value: *v,
                        ty: a.ty.clone(),
                        loc: a.loc,
                    })),
                    true,
                )
            }
            _ => {}
        }
    }
    (e.clone(), false)
}

fn fold_value(e: &RExpr, env: &HashMap<String, Known>) -> (RExpr, bool) {
    match &**e {
        ResolvedExpr::Argument(_) => subst_literal(e, env),
        ResolvedExpr::Float(_) | ResolvedExpr::Int(_) => (e.clone(), false),
        ResolvedExpr::Unary(u) => {
            let (arg, subst) = subst_literal(&u.arg, env);
            if let Some(folded) = fold_unary(u, &arg) {
                return (folded, true);
            }
            if subst {
                let mut v = u.clone();
                v.arg = arg;
                (Rc::new(ResolvedExpr::Unary(v)), true)
            } else {
                (e.clone(), false)
            }
        }
        ResolvedExpr::Binary(b) => {
            let (lhs, sl) = subst_literal(&b.lhs, env);
            let (rhs, sr) = subst_literal(&b.rhs, env);
            if let Some(folded) = fold_binary(b, &lhs, &rhs) {
                return (folded, true);
            }
            if sl || sr {
                let mut v = b.clone();
                v.lhs = lhs;
                v.rhs = rhs;
                (Rc::new(ResolvedExpr::Binary(v)), true)
            } else {
                (e.clone(), false)
            }
        }
        ResolvedExpr::If(i) => {
            if let Some(Known::Bool(c)) = atom_known(&i.condition, env) {
                let branch = if c { &i.if_true } else { &i.if_false };
                let (out, _) = subst_literal(branch, env);
                return (out, true);
            }
            let (t, st) = subst_literal(&i.if_true, env);
            let (f, sf) = subst_literal(&i.if_false, env);
            if st || sf {
                let mut v = i.clone();
                v.if_true = t;
                v.if_false = f;
                (Rc::new(ResolvedExpr::If(v)), true)
            } else {
                (e.clone(), false)
            }
        }
        ResolvedExpr::FieldAccess(f) => {
            if let ResolvedExpr::Argument(a) = &*f.object {
                if let Some(Known::Object(fields)) = env.get(&a.name) {
                    if let Some((_, v)) = fields.iter().find(|(n, _)| n == &f.field) {
                        return (v.clone(), true);
                    }
                }
            }
            (e.clone(), false)
        }
        ResolvedExpr::Call(c) => {
            let mut changed = false;
            let args: Vec<RExpr> = c
                .args
                .iter()
                .map(|a| {
                    let (a, s) = subst_literal(a, env);
                    changed |= s;
                    a
                })
                .collect();
            if changed {
                let mut v = c.clone();
                v.args = args;
                (Rc::new(ResolvedExpr::Call(v)), true)
            } else {
                (e.clone(), false)
            }
        }
        ResolvedExpr::Object(o) => {
            let mut changed = false;
            let fields: Vec<(String, RExpr)> = o
                .fields
                .iter()
                .map(|(n, v)| {
                    let (v, s) = subst_literal(v, env);
                    changed |= s;
                    (n.clone(), v)
                })
                .collect();
            if changed {
                let mut v = o.clone();
                v.fields = fields;
                (Rc::new(ResolvedExpr::Object(v)), true)
            } else {
                (e.clone(), false)
            }
        }
        _ => (e.clone(), false),
    }
}

fn lit_num(e: &RExpr) -> Option<f64> {
    match &**e {
        ResolvedExpr::Float(f) => Some(f.value),
        ResolvedExpr::Int(i) => Some(i.value as f64),
        _ => None,
    }
}

fn lit_int(e: &RExpr) -> Option<i64> {
    match &**e {
        ResolvedExpr::Int(i) => Some(i.value),
        _ => None,
    }
}

fn fold_unary(u: &ResolvedUnary, arg: &RExpr) -> Option<RExpr> {
    if u.op == UnaryOp::Neg {
        if let Some(v) = lit_int(arg) {
            return Some(Rc::new(ResolvedExpr::Int(ResolvedInt {
                value: -v,
                ty: u.ty.clone(),
                loc: u.loc,
            })));
        }
    }
    let v = lit_num(arg)?;
    let out = match u.op {
        UnaryOp::Neg => -v,
        UnaryOp::Exp => v.exp(),
        UnaryOp::Sin => v.sin(),
        UnaryOp::Cos => v.cos(),
        UnaryOp::Log => v.ln(),
        UnaryOp::Abs => v.abs(),
        UnaryOp::Exprelr => {
            if v.abs() < 1e-12 {
                1.0
            } else {
                v / v.exp_m1()
            }
        }
        UnaryOp::Not => return None,
    };
    Some(Rc::new(ResolvedExpr::Float(ResolvedFloat { value: out, ty: u.ty.clone(), loc: u.loc })))
}

fn fold_binary(b: &ResolvedBinary, lhs: &RExpr, rhs: &RExpr) -> Option<RExpr> {
    if b.op.is_boolean() {
        return None;
    }

    // integer arithmetic stays integral where it can
    if let (Some(l), Some(r)) = (lit_int(lhs), lit_int(rhs)) {
        let int_result = match b.op {
            BinaryOp::Add => l.checked_add(r),
            BinaryOp::Sub => l.checked_sub(r),
            BinaryOp::Mul => l.checked_mul(r),
            BinaryOp::Min => Some(l.min(r)),
            BinaryOp::Max => Some(l.max(r)),
            BinaryOp::Pow if r >= 0 => u32::try_from(r).ok().and_then(|n| l.checked_pow(n)),
            _ => None,
        };
        if let Some(v) = int_result {
            return Some(Rc::new(ResolvedExpr::Int(ResolvedInt {
                value: v,
                ty: b.ty.clone(),
                loc: b.loc,
            })));
        }
    }

    let (l, r) = (lit_num(lhs)?, lit_num(rhs)?);
    let out = match b.op {
        BinaryOp::Add => l + r,
        BinaryOp::Sub => l - r,
        BinaryOp::Mul => l * r,
        BinaryOp::Div => l / r,
        BinaryOp::Pow => l.powf(r),
        BinaryOp::Min => l.min(r),
        BinaryOp::Max => l.max(r),
        _ => return None,
    };
    Some(Rc::new(ResolvedExpr::Float(ResolvedFloat { value: out, ty: b.ty.clone(), loc: b.loc })))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::canonicalize::canonicalize_mechanism;
    use crate::interp::{eval_expr, Value};
    use crate::resolve::resolve_mechanism;
    use crate::single_assign::single_assign_mechanism;
    use ionc_lang::normalize::normalize_mechanism;
    use ionc_lang::parse_mechanism;

    fn folded_to_fixpoint(src: &str) -> RExpr {
        let m = parse_mechanism(src).expect("parse");
        let r = resolve_mechanism(&normalize_mechanism(&m)).expect("resolve");
        let m = single_assign_mechanism(&canonicalize_mechanism(&r));
        let last = m.parameters.last().unwrap().clone();
        let ResolvedExpr::Parameter(p) = &*last else {
            panic!()
        };
        let mut e = p.value.clone();
        loop {
            let (next, changed) = constant_fold_expr(&e);
            e = next;
            if !changed {
                break;
            }
        }
        e
    }

    fn result_value(e: &RExpr) -> Value {
        eval_expr(e, &std::collections::HashMap::new()).expect("eval")
    }

    #[test]
    fn literal_sum_folds() {
        let e = folded_to_fixpoint("density d { parameter p = 2 [mV] + 3 [mV]; }");
        assert_eq!(result_value(&e), Value::Num(5e-3));
    }

    #[test]
    fn literal_guard_selects_a_branch() {
        let e = folded_to_fixpoint(
            "density d { parameter p = if 1.0 < 2.0 { 10.0 } else { 20.0 }; }",
        );
        assert_eq!(result_value(&e), Value::Num(10.0));
    }

    #[test]
    fn integer_power_stays_integral() {
        let e = folded_to_fixpoint("density d { parameter p = 2^10*1.0; }");
        assert_eq!(result_value(&e), Value::Num(1024.0));
    }

    #[test]
    fn field_access_on_object_literals_resolves() {
        let e = folded_to_fixpoint(
            "density d { parameter p = (let o = { a = 4.0; b = 5.0; }; o.a) + 1.0; }",
        );
        assert_eq!(result_value(&e), Value::Num(5.0));
    }

    #[test]
    fn unknowns_are_left_alone() {
        let src = r#"density d {
            bind v = membrane_potential;
            parameter p : voltage = v + 0 [mV];
        }"#;
        let e = folded_to_fixpoint(src);
        // v is runtime-provided: nothing to fold
        let mut reads = std::collections::HashSet::new();
        read_arguments(&e, &mut reads);
        assert!(reads.contains("v"));
    }
}
