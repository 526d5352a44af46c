//! Name resolution and dimensional type checking: normalized parsed AST in,
//! typed IR out.
//!
//! Scope is carried in an `ScopeMap` with one sub-map per binding kind.
//! `constant` values are substituted at their use sites; `with` blocks open
//! their record's fields as locals (shadowing like `let`) and disappear.

use std::collections::HashMap;
use std::rc::Rc;

use ionc_lang::ast::{self, BinaryOp, ParsedExpr, ParsedMechanism, PExpr, UnaryOp};
use ionc_lang::units::unit_to_type;

use crate::ir::*;
use crate::rtype::*;
use crate::{CompileError, Result};

/// One sub-map per binding kind, so diagnostics can distinguish what a name
/// refers to and later stages can classify reads.
#[derive(Debug, Clone, Default)]
pub struct ScopeMap {
    pub params: HashMap<String, RType>,
    pub constants: HashMap<String, RExpr>,
    pub states: HashMap<String, RType>,
    pub bindings: HashMap<String, RType>,
    pub locals: HashMap<String, RExpr>,
    pub functions: HashMap<String, (Vec<ResolvedArgument>, RType)>,
    pub aliases: HashMap<String, RType>,
}

pub fn resolve_mechanism(m: &ParsedMechanism) -> Result<ResolvedMechanism> {
    let mut scope = ScopeMap::default();
    let mut declared: std::collections::HashSet<String> = std::collections::HashSet::new();
    let mut out = ResolvedMechanism::new(m.name.clone(), m.kind, m.loc);

    let mut declare = move |name: &str, loc| -> Result<()> {
        if declared.insert(name.to_string()) {
            Ok(())
        } else {
            Err(CompileError::TypeError {
                msg: format!("'{}' is declared more than once", name),
                loc,
            })
        }
    };

    for r in &m.records {
        let ParsedExpr::RecordAlias(r) = &**r else {
            return Err(internal("record list holds a non-record declaration"));
        };
        declare(&r.name, r.loc)?;
        let ty = resolve_type(&r.ty, &scope.aliases)?;
        scope.aliases.insert(r.name.clone(), ty);
    }

    for c in &m.constants {
        let ParsedExpr::Constant(c) = &**c else {
            return Err(internal("constant list holds a non-constant declaration"));
        };
        declare(&c.id.name, c.loc)?;
        let value = resolve_expr(&c.value, &scope)?;
        let ty = checked_declared_type(&c.id, &value, &scope)?;
        scope.constants.insert(c.id.name.clone(), value.clone());
        out.constants.push(Rc::new(ResolvedExpr::Constant(ResolvedConstant {
            name: c.id.name.clone(),
            value,
            ty,
            loc: c.loc,
        })));
    }

    for s in &m.states {
        let ParsedExpr::State(s) = &**s else {
            return Err(internal("state list holds a non-state declaration"));
        };
        declare(&s.id.name, s.loc)?;
        let ty = match &s.id.ty {
            Some(t) => resolve_type(t, &scope.aliases)?,
            None => real_type(s.loc),
        };
        let scalar_fields = match &*ty {
            ResolvedType::Quantity { .. } => true,
            ResolvedType::Record { fields, .. } => {
                fields.iter().all(|(_, t)| matches!(&**t, ResolvedType::Quantity { .. }))
            }
            ResolvedType::Bool { .. } => false,
        };
        if !scalar_fields {
            return Err(CompileError::TypeError {
                msg: format!(
                    "state '{}' must be a quantity or a record of quantities",
                    s.id.name
                ),
                loc: s.loc,
            });
        }
        scope.states.insert(s.id.name.clone(), ty.clone());
        out.states.push(Rc::new(ResolvedExpr::State(ResolvedState {
            name: s.id.name.clone(),
            ty,
            loc: s.loc,
        })));
    }

    for b in &m.bindings {
        let ParsedExpr::Bind(b) = &**b else {
            return Err(internal("binding list holds a non-bind declaration"));
        };
        declare(&b.name, b.loc)?;
        let ty = bindable_type(b.kind, b.loc);
        scope.bindings.insert(b.name.clone(), ty.clone());
        out.bindings.push(Rc::new(ResolvedExpr::Bind(ResolvedBind {
            name: b.name.clone(),
            kind: b.kind,
            ion: b.ion.clone(),
            ty,
            loc: b.loc,
        })));
    }

    for p in &m.parameters {
        let ParsedExpr::Parameter(p) = &**p else {
            return Err(internal("parameter list holds a non-parameter declaration"));
        };
        declare(&p.id.name, p.loc)?;
        let value = resolve_expr(&p.value, &scope)?;
        let ty = checked_declared_type(&p.id, &value, &scope)?;
        if !matches!(&*ty, ResolvedType::Quantity { .. }) {
            return Err(CompileError::TypeError {
                msg: format!("parameter '{}' must be a scalar quantity", p.id.name),
                loc: p.loc,
            });
        }
        scope.params.insert(p.id.name.clone(), ty.clone());
        out.parameters.push(Rc::new(ResolvedExpr::Parameter(ResolvedParameter {
            name: p.id.name.clone(),
            value,
            ty,
            loc: p.loc,
        })));
    }

    for f in &m.functions {
        let ParsedExpr::Function(f) = &**f else {
            return Err(internal("function list holds a non-function declaration"));
        };
        declare(&f.name, f.loc)?;
        let mut args = Vec::with_capacity(f.args.len());
        for a in &f.args {
            let ty = match &a.ty {
                Some(t) => resolve_type(t, &scope.aliases)?,
                None => real_type(a.loc),
            };
            args.push(ResolvedArgument { name: a.name.clone(), ty, loc: a.loc });
        }
        let declared_ret = match &f.ret {
            Some(t) => Some(resolve_type(t, &scope.aliases)?),
            None => None,
        };

        // The function's own signature goes into scope before its body is
        // resolved, so a self-call type-checks here and the inliner reports
        // the recursion.
        let placeholder_ret = declared_ret.clone().unwrap_or_else(|| real_type(f.loc));
        scope.functions.insert(f.name.clone(), (args.clone(), placeholder_ret));

        let mut body_scope = scope.clone();
        body_scope.locals.clear();
        for a in &args {
            body_scope.locals.insert(
                a.name.clone(),
                Rc::new(ResolvedExpr::Argument(a.clone())),
            );
        }
        let body = resolve_expr(&f.body, &body_scope)?;
        let inferred = type_of(&body);
        let ret = match declared_ret {
            Some(r) => {
                if !rtype_eq(&r, &inferred) {
                    return Err(CompileError::TypeError {
                        msg: format!(
                            "function '{}' declares return type {} but its body has type {}",
                            f.name,
                            type_to_string(&r),
                            type_to_string(&inferred)
                        ),
                        loc: f.loc,
                    });
                }
                r
            }
            None => inferred,
        };
        scope.functions.insert(f.name.clone(), (args.clone(), ret.clone()));
        out.functions.push(Rc::new(ResolvedExpr::Function(ResolvedFunction {
            name: f.name.clone(),
            args,
            body,
            ret,
            loc: f.loc,
        })));
    }

    for i in &m.initials {
        let ParsedExpr::Initial(i) = &**i else {
            return Err(internal("initial list holds a non-initial declaration"));
        };
        let Some(state_ty) = scope.states.get(&i.target).cloned() else {
            return Err(CompileError::UnboundIdentifier { name: i.target.clone(), loc: i.loc });
        };
        let value = resolve_expr(&i.value, &scope)?;
        let value_ty = type_of(&value);
        if !rtype_eq(&value_ty, &state_ty) {
            return Err(CompileError::TypeError {
                msg: format!(
                    "initial value for state '{}' has type {}, expected {}",
                    i.target,
                    type_to_string(&value_ty),
                    type_to_string(&state_ty)
                ),
                loc: i.loc,
            });
        }
        out.initials.push(Rc::new(ResolvedExpr::Initial(ResolvedInitial {
            target: i.target.clone(),
            value,
            ty: state_ty,
            loc: i.loc,
        })));
    }

    for ev in &m.evolutions {
        let ParsedExpr::Evolve(ev) = &**ev else {
            return Err(internal("evolve list holds a non-evolve declaration"));
        };
        let Some(state_ty) = scope.states.get(&ev.target).cloned() else {
            return Err(CompileError::UnboundIdentifier { name: ev.target.clone(), loc: ev.loc });
        };
        let Some(expected) = derive_type(&state_ty) else {
            return Err(CompileError::TypeError {
                msg: format!("state '{}' cannot evolve: it has no time derivative", ev.target),
                loc: ev.loc,
            });
        };
        let value = resolve_expr(&ev.value, &scope)?;
        let value_ty = type_of(&value);
        if !rtype_eq(&value_ty, &expected) {
            return Err(CompileError::TypeError {
                msg: format!(
                    "evolve value for state '{}' has type {}, expected {}",
                    ev.target,
                    type_to_string(&value_ty),
                    type_to_string(&expected)
                ),
                loc: ev.loc,
            });
        }
        out.evolutions.push(Rc::new(ResolvedExpr::Evolve(ResolvedEvolve {
            target: ev.target.clone(),
            value,
            ty: state_ty,
            loc: ev.loc,
        })));
    }

    for ef in &m.effects {
        let ParsedExpr::Effect(ef) = &**ef else {
            return Err(internal("effect list holds a non-effect declaration"));
        };
        let expected = affectable_type(ef.kind, ef.loc);
        let value = resolve_expr(&ef.value, &scope)?;
        let value_ty = type_of(&value);
        if !rtype_eq(&value_ty, &expected) {
            return Err(CompileError::TypeError {
                msg: format!(
                    "effect {} has type {}, expected {}",
                    ef.kind.name(),
                    type_to_string(&value_ty),
                    type_to_string(&expected)
                ),
                loc: ef.loc,
            });
        }
        out.effects.push(Rc::new(ResolvedExpr::Effect(ResolvedEffect {
            kind: ef.kind,
            ion: ef.ion.clone(),
            value,
            ty: expected,
            loc: ef.loc,
        })));
    }

    for x in &m.exports {
        let ParsedExpr::Export(x) = &**x else {
            return Err(internal("export list holds a non-export declaration"));
        };
        let Some(ty) = scope.params.get(&x.name).cloned() else {
            return Err(CompileError::TypeError {
                msg: format!("only parameters can be exported; '{}' is not a parameter", x.name),
                loc: x.loc,
            });
        };
        out.exports.push(Rc::new(ResolvedExpr::Export(ResolvedExport {
            name: x.name.clone(),
            ty,
            loc: x.loc,
        })));
    }

    Ok(out)
}

fn internal(msg: &str) -> CompileError {
    CompileError::InternalInvariant(msg.to_string())
}

fn checked_declared_type(
    id: &ast::ParsedIdentifier,
    value: &RExpr,
    scope: &ScopeMap,
) -> Result<RType> {
    let value_ty = type_of(value);
    match &id.ty {
        None => Ok(value_ty),
        Some(t) => {
            let declared = resolve_type(t, &scope.aliases)?;
            if !rtype_eq(&declared, &value_ty) {
                return Err(CompileError::TypeError {
                    msg: format!(
                        "'{}' declares type {} but its value has type {}",
                        id.name,
                        type_to_string(&declared),
                        type_to_string(&value_ty)
                    ),
                    loc: id.loc,
                });
            }
            Ok(declared)
        }
    }
}

pub fn resolve_expr(e: &PExpr, scope: &ScopeMap) -> Result<RExpr> {
    match &**e {
        ParsedExpr::Identifier(id) => {
            if let Some(local) = scope.locals.get(&id.name) {
                return Ok(local.clone());
            }
            if let Some(value) = scope.constants.get(&id.name) {
                return Ok(value.clone());
            }
            let ty = scope
                .params
                .get(&id.name)
                .or_else(|| scope.states.get(&id.name))
                .or_else(|| scope.bindings.get(&id.name));
            match ty {
                Some(ty) => Ok(Rc::new(ResolvedExpr::Argument(ResolvedArgument {
                    name: id.name.clone(),
                    ty: ty.clone(),
                    loc: id.loc,
                }))),
                None => {
                    Err(CompileError::UnboundIdentifier { name: id.name.clone(), loc: id.loc })
                }
            }
        }
        ParsedExpr::Float(f) => {
            let ty = literal_type(&f.unit, f.loc, scope)?;
            Ok(Rc::new(ResolvedExpr::Float(ResolvedFloat { value: f.value, ty, loc: f.loc })))
        }
        ParsedExpr::Int(i) => {
            let ty = literal_type(&i.unit, i.loc, scope)?;
            Ok(Rc::new(ResolvedExpr::Int(ResolvedInt { value: i.value, ty, loc: i.loc })))
        }
        ParsedExpr::Unary(u) => {
            let arg = resolve_expr(&u.arg, scope)?;
            let arg_ty = type_of(&arg);
            let ty = match u.op {
                UnaryOp::Neg => match &*arg_ty {
                    ResolvedType::Quantity { .. } => arg_ty.clone(),
                    _ => {
                        return Err(CompileError::TypeError {
                            msg: "negation needs a numeric operand".to_string(),
                            loc: u.loc,
                        })
                    }
                },
                UnaryOp::Not => match &*arg_ty {
                    ResolvedType::Bool { .. } => bool_type(u.loc),
                    _ => {
                        return Err(CompileError::TypeError {
                            msg: "'!' needs a boolean operand".to_string(),
                            loc: u.loc,
                        })
                    }
                },
                // the numeric standard library is dimensionless in and out
                UnaryOp::Exp
                | UnaryOp::Sin
                | UnaryOp::Cos
                | UnaryOp::Log
                | UnaryOp::Abs
                | UnaryOp::Exprelr => match &*arg_ty {
                    ResolvedType::Quantity { dims, .. } if dims.is_real() => real_type(u.loc),
                    _ => {
                        return Err(CompileError::TypeError {
                            msg: format!(
                                "'{}' needs a dimensionless operand, got {}",
                                unary_name(u.op),
                                type_to_string(&arg_ty)
                            ),
                            loc: u.loc,
                        })
                    }
                },
            };
            Ok(Rc::new(ResolvedExpr::Unary(ResolvedUnary { op: u.op, arg, ty, loc: u.loc })))
        }
        ParsedExpr::Binary(b) => resolve_binary(b, scope),
        ParsedExpr::If(i) => {
            let condition = resolve_expr(&i.condition, scope)?;
            if !matches!(&*type_of(&condition), ResolvedType::Bool { .. }) {
                return Err(CompileError::TypeError {
                    msg: "the condition of 'if' must be boolean".to_string(),
                    loc: i.loc,
                });
            }
            let if_true = resolve_expr(&i.if_true, scope)?;
            let if_false = resolve_expr(&i.if_false, scope)?;
            let ty = type_of(&if_true);
            if !rtype_eq(&ty, &type_of(&if_false)) {
                return Err(CompileError::TypeError {
                    msg: "both branches of 'if' must have the same type".to_string(),
                    loc: i.loc,
                });
            }
            Ok(Rc::new(ResolvedExpr::If(ResolvedIf {
                condition,
                if_true,
                if_false,
                ty,
                loc: i.loc,
            })))
        }
        ParsedExpr::Let(l) => {
            let value = resolve_expr(&l.value, scope)?;
            let value_ty = match &l.id.ty {
                Some(t) => {
                    let declared = resolve_type(t, &scope.aliases)?;
                    if !rtype_eq(&declared, &type_of(&value)) {
                        return Err(CompileError::TypeError {
                            msg: format!(
                                "'{}' declares type {} but its value has type {}",
                                l.id.name,
                                type_to_string(&declared),
                                type_to_string(&type_of(&value))
                            ),
                            loc: l.id.loc,
                        });
                    }
                    declared
                }
                None => type_of(&value),
            };
            let mut inner = scope.clone();
            inner.locals.insert(
                l.id.name.clone(),
                Rc::new(ResolvedExpr::Argument(ResolvedArgument {
                    name: l.id.name.clone(),
                    ty: value_ty,
                    loc: l.id.loc,
                })),
            );
            let body = resolve_expr(&l.body, &inner)?;
            let ty = type_of(&body);
            Ok(Rc::new(ResolvedExpr::Let(ResolvedLet {
                name: l.id.name.clone(),
                value,
                body,
                ty,
                loc: l.loc,
            })))
        }
        ParsedExpr::With(w) => {
            let value = resolve_expr(&w.value, scope)?;
            let value_ty = type_of(&value);
            let ResolvedType::Record { fields, .. } = &*value_ty else {
                return Err(CompileError::TypeError {
                    msg: format!(
                        "'with' needs a record value, got {}",
                        type_to_string(&value_ty)
                    ),
                    loc: w.loc,
                });
            };
            let mut inner = scope.clone();
            for (fname, fty) in fields {
                inner.locals.insert(
                    fname.clone(),
                    Rc::new(ResolvedExpr::FieldAccess(ResolvedFieldAccess {
                        object: value.clone(),
                        field: fname.clone(),
                        ty: fty.clone(),
                        loc: w.loc,
                    })),
                );
            }
            resolve_expr(&w.body, &inner)
        }
        ParsedExpr::Object(o) => {
            let mut fields = Vec::with_capacity(o.fields.len());
            let mut field_tys = Vec::with_capacity(o.fields.len());
            for (name, value) in &o.fields {
                let v = resolve_expr(value, scope)?;
                field_tys.push((name.clone(), type_of(&v)));
                fields.push((name.clone(), v));
            }
            let ty = Rc::new(ResolvedType::Record { fields: field_tys, loc: o.loc });
            Ok(Rc::new(ResolvedExpr::Object(ResolvedObject { fields, ty, loc: o.loc })))
        }
        ParsedExpr::Call(c) => {
            let Some((sig_args, ret)) = scope.functions.get(&c.function).cloned() else {
                return Err(CompileError::UnboundIdentifier {
                    name: c.function.clone(),
                    loc: c.loc,
                });
            };
            if sig_args.len() != c.args.len() {
                return Err(CompileError::ArityMismatch {
                    function: c.function.clone(),
                    expected: sig_args.len(),
                    got: c.args.len(),
                    loc: c.loc,
                });
            }
            let mut args = Vec::with_capacity(c.args.len());
            for (actual, formal) in c.args.iter().zip(&sig_args) {
                let a = resolve_expr(actual, scope)?;
                if !rtype_eq(&type_of(&a), &formal.ty) {
                    return Err(CompileError::TypeError {
                        msg: format!(
                            "argument '{}' of '{}' expects type {}, got {}",
                            formal.name,
                            c.function,
                            type_to_string(&formal.ty),
                            type_to_string(&type_of(&a))
                        ),
                        loc: a.loc(),
                    });
                }
                args.push(a);
            }
            Ok(Rc::new(ResolvedExpr::Call(ResolvedCall {
                function: c.function.clone(),
                args,
                ty: ret,
                loc: c.loc,
            })))
        }
        other => Err(CompileError::InternalInvariant(format!(
            "declaration form in expression position at {}",
            other.loc()
        ))),
    }
}

fn literal_type(
    unit: &ionc_lang::units::PUnit,
    loc: ionc_lang::location::Location,
    scope: &ScopeMap,
) -> Result<RType> {
    match unit_to_type(unit) {
        None => Ok(real_type(loc)),
        Some(pt) => resolve_type(&pt, &scope.aliases),
    }
}

fn resolve_binary(b: &ast::ParsedBinary, scope: &ScopeMap) -> Result<RExpr> {
    if b.op == BinaryOp::Dot {
        let object = resolve_expr(&b.lhs, scope)?;
        let ParsedExpr::Identifier(field) = &*b.rhs else {
            return Err(CompileError::InternalInvariant(
                "field access without an identifier field".to_string(),
            ));
        };
        let obj_ty = type_of(&object);
        let ResolvedType::Record { fields, .. } = &*obj_ty else {
            return Err(CompileError::TypeError {
                msg: format!("field access on non-record type {}", type_to_string(&obj_ty)),
                loc: b.loc,
            });
        };
        let Some((_, fty)) = fields.iter().find(|(n, _)| n == &field.name) else {
            return Err(CompileError::TypeError {
                msg: format!("record has no field '{}'", field.name),
                loc: b.loc,
            });
        };
        return Ok(Rc::new(ResolvedExpr::FieldAccess(ResolvedFieldAccess {
            object,
            field: field.name.clone(),
            ty: fty.clone(),
            loc: b.loc,
        })));
    }

    let lhs = resolve_expr(&b.lhs, scope)?;
    let rhs = resolve_expr(&b.rhs, scope)?;
    let lt = type_of(&lhs);
    let rt = type_of(&rhs);

    let ty = match b.op {
        BinaryOp::Add | BinaryOp::Sub | BinaryOp::Min | BinaryOp::Max => {
            let (ResolvedType::Quantity { dims: ld, .. }, ResolvedType::Quantity { dims: rd, .. }) =
                (&*lt, &*rt)
            else {
                return Err(numeric_operand_error(b));
            };
            if ld != rd {
                return Err(dimension_mismatch(b, &lt, &rt));
            }
            lt.clone()
        }
        BinaryOp::Mul | BinaryOp::Div => {
            let (ResolvedType::Quantity { dims: ld, .. }, ResolvedType::Quantity { dims: rd, .. }) =
                (&*lt, &*rt)
            else {
                return Err(numeric_operand_error(b));
            };
            let dims = if b.op == BinaryOp::Mul { ld.mul(*rd) } else { ld.div(*rd) };
            quantity_type(dims, b.loc)
        }
        BinaryOp::Pow => {
            let ResolvedType::Quantity { dims: ld, .. } = &*lt else {
                return Err(numeric_operand_error(b));
            };
            if ld.is_real() {
                match &*rt {
                    ResolvedType::Quantity { dims, .. } if dims.is_real() => real_type(b.loc),
                    _ => {
                        return Err(CompileError::TypeError {
                            msg: "the exponent must be dimensionless".to_string(),
                            loc: b.loc,
                        })
                    }
                }
            } else {
                // a dimensioned base needs a compile-time integer exponent
                let Some(n) = int_literal(&rhs) else {
                    return Err(CompileError::TypeError {
                        msg: "raising a dimensioned value needs an integer literal exponent"
                            .to_string(),
                        loc: b.loc,
                    });
                };
                quantity_type(ld.pow(n as i32), b.loc)
            }
        }
        BinaryOp::Lt | BinaryOp::Le | BinaryOp::Gt | BinaryOp::Ge | BinaryOp::Eq | BinaryOp::Ne => {
            let (ResolvedType::Quantity { dims: ld, .. }, ResolvedType::Quantity { dims: rd, .. }) =
                (&*lt, &*rt)
            else {
                return Err(numeric_operand_error(b));
            };
            if ld != rd {
                return Err(dimension_mismatch(b, &lt, &rt));
            }
            bool_type(b.loc)
        }
        BinaryOp::And | BinaryOp::Or => {
            if !matches!(&*lt, ResolvedType::Bool { .. })
                || !matches!(&*rt, ResolvedType::Bool { .. })
            {
                return Err(CompileError::TypeError {
                    msg: "logical operators need boolean operands".to_string(),
                    loc: b.loc,
                });
            }
            bool_type(b.loc)
        }
        BinaryOp::Dot => unreachable!("handled above"),
    };

    Ok(Rc::new(ResolvedExpr::Binary(ResolvedBinary { op: b.op, lhs, rhs, ty, loc: b.loc })))
}

/// A compile-time integer: an integer literal, possibly negated.
fn int_literal(e: &RExpr) -> Option<i64> {
    match &**e {
        ResolvedExpr::Int(i) => Some(i.value),
        ResolvedExpr::Unary(u) if u.op == UnaryOp::Neg => match &*u.arg {
            ResolvedExpr::Int(i) => Some(-i.value),
            _ => None,
        },
        _ => None,
    }
}

fn unary_name(op: UnaryOp) -> &'static str {
    match op {
        UnaryOp::Neg => "-",
        UnaryOp::Not => "!",
        UnaryOp::Exp => "exp",
        UnaryOp::Sin => "sin",
        UnaryOp::Cos => "cos",
        UnaryOp::Log => "log",
        UnaryOp::Abs => "abs",
        UnaryOp::Exprelr => "exprelr",
    }
}

fn numeric_operand_error(b: &ast::ParsedBinary) -> CompileError {
    CompileError::TypeError {
        msg: "arithmetic needs numeric operands".to_string(),
        loc: b.loc,
    }
}

fn dimension_mismatch(b: &ast::ParsedBinary, lt: &RType, rt: &RType) -> CompileError {
    CompileError::TypeError {
        msg: format!(
            "operands have mismatched dimensions: {} vs {}",
            type_to_string(lt),
            type_to_string(rt)
        ),
        loc: b.loc,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ionc_lang::normalize::normalize_mechanism;
    use ionc_lang::parse_mechanism;

    fn resolved(src: &str) -> Result<ResolvedMechanism> {
        let m = parse_mechanism(src).expect("parse");
        resolve_mechanism(&normalize_mechanism(&m))
    }

    #[test]
    fn literal_sum_keeps_voltage_dimensions() {
        // 2 [mV] + 3 [mV] is a voltage worth 5e-3 in base units
        let m = resolved("density d { parameter a = 2 [mV] + 3 [mV]; }").unwrap();
        let ResolvedExpr::Parameter(p) = &*m.parameters[0] else { panic!() };
        let ResolvedType::Quantity { dims, .. } = &*p.ty else { panic!() };
        assert_eq!(
            *dims,
            crate::rtype::Dimensions::from_quantity(ionc_lang::types::Quantity::Voltage)
        );
        let ResolvedExpr::Binary(sum) = &*p.value else { panic!() };
        let (ResolvedExpr::Float(a), ResolvedExpr::Float(b)) = (&*sum.lhs, &*sum.rhs) else {
            panic!()
        };
        assert_eq!(a.value, 2e-3);
        assert_eq!(b.value, 3e-3);
    }

    #[test]
    fn mismatched_dimensions_are_rejected() {
        let err = resolved("density d { parameter a = 2 [mV] + 3 [ms]; }").unwrap_err();
        assert!(matches!(err, CompileError::TypeError { .. }), "got {err}");
    }

    #[test]
    fn unbound_identifier_is_reported() {
        let err = resolved("density d { parameter a = b + 1.0; }").unwrap_err();
        assert!(matches!(err, CompileError::UnboundIdentifier { ref name, .. } if name == "b"));
    }

    #[test]
    fn conductance_times_voltage_matches_current_density_effect() {
        let src = r#"
            density pas {
                parameter g = 0.001 [S/cm^2];
                parameter e_rev = -70 [mV];
                bind v = membrane_potential;
                effect current_density = g*(v - e_rev);
            }
        "#;
        resolved(src).expect("effect type checks");
    }

    #[test]
    fn wrong_effect_dimensions_are_rejected() {
        let src = r#"
            density pas {
                bind v = membrane_potential;
                effect current_density = v;
            }
        "#;
        let err = resolved(src).unwrap_err();
        assert!(matches!(err, CompileError::TypeError { .. }));
    }

    #[test]
    fn arity_mismatch_is_reported() {
        let src = r#"
            density d {
                function f(x: real) : real { x + 1.0 }
                parameter a = f(1.0, 2.0);
            }
        "#;
        let err = resolved(src).unwrap_err();
        assert!(
            matches!(err, CompileError::ArityMismatch { expected: 1, got: 2, .. }),
            "got {err}"
        );
    }

    #[test]
    fn constants_substitute_at_use_sites() {
        let src = r#"
            density d {
                constant c = 2 [mV];
                parameter a = c + 1 [mV];
            }
        "#;
        let m = resolved(src).unwrap();
        let ResolvedExpr::Parameter(p) = &*m.parameters[0] else { panic!() };
        let ResolvedExpr::Binary(sum) = &*p.value else { panic!() };
        assert!(matches!(&*sum.lhs, ResolvedExpr::Float(f) if f.value == 2e-3));
    }

    #[test]
    fn with_opens_record_fields() {
        let src = r#"
            density d {
                record pair { a: real; b: real; };
                state s : pair;
                initial s = { a = 1.0; b = 2.0; };
                parameter p = with s; a + b;
            }
        "#;
        let m = resolved(src).unwrap();
        let ResolvedExpr::Parameter(p) = &*m.parameters[0] else { panic!() };
        // `with` disappears: the body is a sum of field accesses on s
        let ResolvedExpr::Binary(sum) = &*p.value else { panic!() };
        assert!(matches!(&*sum.lhs, ResolvedExpr::FieldAccess(f) if f.field == "a"));
        assert!(matches!(&*sum.rhs, ResolvedExpr::FieldAccess(f) if f.field == "b"));
    }

    #[test]
    fn evolve_needs_derivative_dimensions() {
        // n is real, so n' must be a frequency (1/time)
        let ok = r#"
            density d {
                state n : real;
                bind v = membrane_potential;
                initial n = 0.5;
                evolve n' = (1.0 - n)/5 [ms];
            }
        "#;
        resolved(ok).expect("derivative dimensions check out");

        let bad = r#"
            density d {
                state n : real;
                initial n = 0.5;
                evolve n' = 1.0 - n;
            }
        "#;
        let err = resolved(bad).unwrap_err();
        assert!(matches!(err, CompileError::TypeError { .. }));
    }

    #[test]
    fn exports_must_name_parameters() {
        let err = resolved("density d { state n : real; export n; }").unwrap_err();
        assert!(matches!(err, CompileError::TypeError { .. }));
    }

    #[test]
    fn dimensioned_pow_needs_integer_exponent() {
        let err =
            resolved("density d { parameter a = 2.0; parameter b = 3 [mV] ^ a; }").unwrap_err();
        assert!(matches!(err, CompileError::TypeError { .. }));
        resolved("density d { parameter b = 3 [mV] ^ 2; }").expect("integer exponent works");
    }
}
