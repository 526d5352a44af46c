//! Reference interpreter over the typed IR.
//!
//! Exists to pin down semantics: the property tests evaluate each body
//! before and after a transformation and require identical results. It is
//! also handy for debugging solved mechanisms by hand.

use std::collections::{BTreeMap, HashMap};
use std::rc::Rc;

use ionc_lang::ast::{BinaryOp, UnaryOp};

use crate::ir::*;
use crate::{CompileError, Result};

#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Num(f64),
    Bool(bool),
    Record(BTreeMap<String, Value>),
}

impl Value {
    fn num(&self, what: &str) -> Result<f64> {
        match self {
            Value::Num(v) => Ok(*v),
            _ => Err(CompileError::InternalInvariant(format!("{} is not numeric", what))),
        }
    }

    fn boolean(&self, what: &str) -> Result<bool> {
        match self {
            Value::Bool(v) => Ok(*v),
            _ => Err(CompileError::InternalInvariant(format!("{} is not boolean", what))),
        }
    }
}

/// Evaluate an expression in an environment of free-variable values.
pub fn eval_expr(e: &RExpr, env: &HashMap<String, Value>) -> Result<Value> {
    eval_with_functions(e, env, &HashMap::new())
}

/// Evaluate with user functions available for `Call` nodes (used to compare
/// call-site evaluation with inlined evaluation).
pub fn eval_with_functions(
    e: &RExpr,
    env: &HashMap<String, Value>,
    funcs: &HashMap<String, Rc<ResolvedFunction>>,
) -> Result<Value> {
    match &**e {
        ResolvedExpr::Argument(a) => env
            .get(&a.name)
            .cloned()
            .ok_or_else(|| CompileError::InternalInvariant(format!("unbound '{}'", a.name))),
        ResolvedExpr::Float(f) => Ok(Value::Num(f.value)),
        ResolvedExpr::Int(i) => Ok(Value::Num(i.value as f64)),
        ResolvedExpr::Let(l) => {
            let v = eval_with_functions(&l.value, env, funcs)?;
            let mut inner = env.clone();
            inner.insert(l.name.clone(), v);
            eval_with_functions(&l.body, &inner, funcs)
        }
        ResolvedExpr::If(i) => {
            let c = eval_with_functions(&i.condition, env, funcs)?.boolean("condition")?;
            if c {
                eval_with_functions(&i.if_true, env, funcs)
            } else {
                eval_with_functions(&i.if_false, env, funcs)
            }
        }
        ResolvedExpr::Unary(u) => {
            let v = eval_with_functions(&u.arg, env, funcs)?;
            match u.op {
                UnaryOp::Neg => Ok(Value::Num(-v.num("operand")?)),
                UnaryOp::Not => Ok(Value::Bool(!v.boolean("operand")?)),
                UnaryOp::Exp => Ok(Value::Num(v.num("operand")?.exp())),
                UnaryOp::Sin => Ok(Value::Num(v.num("operand")?.sin())),
                UnaryOp::Cos => Ok(Value::Num(v.num("operand")?.cos())),
                UnaryOp::Log => Ok(Value::Num(v.num("operand")?.ln())),
                UnaryOp::Abs => Ok(Value::Num(v.num("operand")?.abs())),
                UnaryOp::Exprelr => Ok(Value::Num(exprelr(v.num("operand")?))),
            }
        }
        ResolvedExpr::Binary(b) => {
            let l = eval_with_functions(&b.lhs, env, funcs)?;
            let r = eval_with_functions(&b.rhs, env, funcs)?;
            match b.op {
                BinaryOp::Add => Ok(Value::Num(l.num("lhs")? + r.num("rhs")?)),
                BinaryOp::Sub => Ok(Value::Num(l.num("lhs")? - r.num("rhs")?)),
                BinaryOp::Mul => Ok(Value::Num(l.num("lhs")? * r.num("rhs")?)),
                BinaryOp::Div => Ok(Value::Num(l.num("lhs")? / r.num("rhs")?)),
                BinaryOp::Pow => Ok(Value::Num(l.num("lhs")?.powf(r.num("rhs")?))),
                BinaryOp::Min => Ok(Value::Num(l.num("lhs")?.min(r.num("rhs")?))),
                BinaryOp::Max => Ok(Value::Num(l.num("lhs")?.max(r.num("rhs")?))),
                BinaryOp::Lt => Ok(Value::Bool(l.num("lhs")? < r.num("rhs")?)),
                BinaryOp::Le => Ok(Value::Bool(l.num("lhs")? <= r.num("rhs")?)),
                BinaryOp::Gt => Ok(Value::Bool(l.num("lhs")? > r.num("rhs")?)),
                BinaryOp::Ge => Ok(Value::Bool(l.num("lhs")? >= r.num("rhs")?)),
                BinaryOp::Eq => Ok(Value::Bool(l.num("lhs")? == r.num("rhs")?)),
                BinaryOp::Ne => Ok(Value::Bool(l.num("lhs")? != r.num("rhs")?)),
                BinaryOp::And => Ok(Value::Bool(l.boolean("lhs")? && r.boolean("rhs")?)),
                BinaryOp::Or => Ok(Value::Bool(l.boolean("lhs")? || r.boolean("rhs")?)),
                BinaryOp::Dot => Err(CompileError::InternalInvariant(
                    "field access survived resolution as a binary op".to_string(),
                )),
            }
        }
        ResolvedExpr::Object(o) => {
            let mut fields = BTreeMap::new();
            for (name, v) in &o.fields {
                fields.insert(name.clone(), eval_with_functions(v, env, funcs)?);
            }
            Ok(Value::Record(fields))
        }
        ResolvedExpr::FieldAccess(f) => {
            let obj = eval_with_functions(&f.object, env, funcs)?;
            let Value::Record(fields) = obj else {
                return Err(CompileError::InternalInvariant(
                    "field access on a non-record value".to_string(),
                ));
            };
            fields.get(&f.field).cloned().ok_or_else(|| {
                CompileError::InternalInvariant(format!("record has no field '{}'", f.field))
            })
        }
        ResolvedExpr::Call(c) => {
            let Some(f) = funcs.get(&c.function) else {
                return Err(CompileError::InternalInvariant(format!(
                    "call to unknown function '{}'",
                    c.function
                )));
            };
            let mut inner = env.clone();
            for (formal, actual) in f.args.iter().zip(&c.args) {
                inner.insert(formal.name.clone(), eval_with_functions(actual, env, funcs)?);
            }
            eval_with_functions(&f.body, &inner, funcs)
        }
        other => Err(CompileError::InternalInvariant(format!(
            "declaration form in expression position at {}",
            other.loc()
        ))),
    }
}

/// x/(exp(x)-1), continuous through x = 0 where it takes the value 1.
fn exprelr(x: f64) -> f64 {
    if x.abs() < 1e-12 {
        1.0
    } else {
        x / x.exp_m1()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rtype::real_type;
    use ionc_lang::location::Location;

    fn float(v: f64) -> RExpr {
        Rc::new(ResolvedExpr::Float(ResolvedFloat {
            value: v,
            ty: real_type(Location::default()),
            loc: Location::default(),
        }))
    }

    #[test]
    fn exprelr_is_continuous_at_zero() {
        assert_eq!(exprelr(0.0), 1.0);
        assert!((exprelr(1e-6) - 1.0).abs() < 1e-5);
        assert!((exprelr(1.0) - 1.0 / 1.0f64.exp_m1()).abs() < 1e-15);
    }

    #[test]
    fn evaluates_arithmetic() {
        let e = Rc::new(ResolvedExpr::Binary(ResolvedBinary {
            op: BinaryOp::Mul,
            lhs: float(3.0),
            rhs: float(4.0),
            ty: real_type(Location::default()),
            loc: Location::default(),
        }));
        let env = HashMap::new();
        assert_eq!(eval_expr(&e, &env).unwrap(), Value::Num(12.0));
    }
}
