//! Pre-printer simplification.
//!
//! Dimensional checking is complete by now and carries no further
//! information, so every type collapses to the dimensionless quantity.
//! Record states are exploded into one scalar per field: a field access
//! `s.m` becomes a read of the flat name from the `StateFieldMap`.

use std::collections::HashMap;
use std::rc::Rc;

use crate::ir::*;
use crate::rtype::{real_type, ResolvedType, RType};
use crate::{CompileError, Result};

/// state name → field name → flattened scalar name.
pub type StateFieldMap = HashMap<String, HashMap<String, String>>;

pub fn gen_state_field_map(states: &[RExpr]) -> StateFieldMap {
    let mut map = StateFieldMap::new();
    for s in states {
        let ResolvedExpr::State(s) = &**s else { continue };
        if let ResolvedType::Record { fields, .. } = &*s.ty {
            let flat = fields
                .iter()
                .map(|(f, _)| (f.clone(), format!("{}_{}", s.name, f)))
                .collect();
            map.insert(s.name.clone(), flat);
        }
    }
    map
}

/// Quantity and boolean types become real; records keep their shape with
/// real fields.
pub fn simplify_type(t: &RType) -> RType {
    match &**t {
        ResolvedType::Quantity { loc, .. } | ResolvedType::Bool { loc } => real_type(*loc),
        ResolvedType::Record { fields, loc } => Rc::new(ResolvedType::Record {
            fields: fields.iter().map(|(n, t)| (n.clone(), simplify_type(t))).collect(),
            loc: *loc,
        }),
    }
}

pub fn simplify_expr(e: &RExpr, sfm: &StateFieldMap) -> Result<RExpr> {
    match &**e {
        ResolvedExpr::Argument(a) => Ok(Rc::new(ResolvedExpr::Argument(ResolvedArgument {
            name: a.name.clone(),
            ty: simplify_type(&a.ty),
            loc: a.loc,
        }))),
        ResolvedExpr::Float(f) => Ok(Rc::new(ResolvedExpr::Float(ResolvedFloat {
            value: f.value,
            ty: real_type(f.loc),
            loc: f.loc,
        }))),
        ResolvedExpr::Int(i) => Ok(Rc::new(ResolvedExpr::Int(ResolvedInt {
            value: i.value,
            ty: real_type(i.loc),
            loc: i.loc,
        }))),
        ResolvedExpr::FieldAccess(f) => {
            let ResolvedExpr::Argument(obj) = &*f.object else {
                return Err(CompileError::InternalInvariant(format!(
                    "field access on a non-identifier at {}",
                    f.loc
                )));
            };
            let Some(flat) = sfm.get(&obj.name).and_then(|m| m.get(&f.field)) else {
                return Err(CompileError::InternalInvariant(format!(
                    "field access '{}.{}' survived optimization but '{}' is not a record state",
                    obj.name, f.field, obj.name
                )));
            };
            Ok(Rc::new(ResolvedExpr::Argument(ResolvedArgument {
                name: flat.clone(),
                ty: real_type(f.loc),
                loc: f.loc,
            })))
        }
        ResolvedExpr::Let(l) => Ok(Rc::new(ResolvedExpr::Let(ResolvedLet {
            name: l.name.clone(),
            value: simplify_expr(&l.value, sfm)?,
            body: simplify_expr(&l.body, sfm)?,
            ty: real_type(l.loc),
            loc: l.loc,
        }))),
        ResolvedExpr::If(i) => Ok(Rc::new(ResolvedExpr::If(ResolvedIf {
            condition: simplify_expr(&i.condition, sfm)?,
            if_true: simplify_expr(&i.if_true, sfm)?,
            if_false: simplify_expr(&i.if_false, sfm)?,
            ty: real_type(i.loc),
            loc: i.loc,
        }))),
        ResolvedExpr::Unary(u) => Ok(Rc::new(ResolvedExpr::Unary(ResolvedUnary {
            op: u.op,
            arg: simplify_expr(&u.arg, sfm)?,
            ty: real_type(u.loc),
            loc: u.loc,
        }))),
        ResolvedExpr::Binary(b) => Ok(Rc::new(ResolvedExpr::Binary(ResolvedBinary {
            op: b.op,
            lhs: simplify_expr(&b.lhs, sfm)?,
            rhs: simplify_expr(&b.rhs, sfm)?,
            ty: real_type(b.loc),
            loc: b.loc,
        }))),
        ResolvedExpr::Object(o) => {
            let mut fields = Vec::with_capacity(o.fields.len());
            for (n, v) in &o.fields {
                fields.push((n.clone(), simplify_expr(v, sfm)?));
            }
            Ok(Rc::new(ResolvedExpr::Object(ResolvedObject {
                fields,
                ty: simplify_type(&o.ty),
                loc: o.loc,
            })))
        }
        ResolvedExpr::Call(c) => {
            let mut args = Vec::with_capacity(c.args.len());
            for a in &c.args {
                args.push(simplify_expr(a, sfm)?);
            }
            Ok(Rc::new(ResolvedExpr::Call(ResolvedCall {
                function: c.function.clone(),
                args,
                ty: real_type(c.loc),
                loc: c.loc,
            })))
        }
        _ => Err(CompileError::InternalInvariant(format!(
            "declaration form in expression position at {}",
            e.loc()
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ionc_lang::location::Location;
    use ionc_lang::types::Quantity;

    use crate::rtype::{quantity_type, Dimensions};

    #[test]
    fn field_accesses_flatten_through_the_state_map() {
        let loc = Location::default();
        let rec_ty = Rc::new(ResolvedType::Record {
            fields: vec![("m".to_string(), real_type(loc))],
            loc,
        });
        let state = Rc::new(ResolvedExpr::State(ResolvedState {
            name: "s".to_string(),
            ty: rec_ty.clone(),
            loc,
        }));
        let sfm = gen_state_field_map(&[state]);
        assert_eq!(sfm["s"]["m"], "s_m");

        let access = Rc::new(ResolvedExpr::FieldAccess(ResolvedFieldAccess {
            object: Rc::new(ResolvedExpr::Argument(ResolvedArgument {
                name: "s".to_string(),
                ty: rec_ty,
                loc,
            })),
            field: "m".to_string(),
            ty: real_type(loc),
            loc,
        }));
        let out = simplify_expr(&access, &sfm).unwrap();
        assert!(matches!(&*out, ResolvedExpr::Argument(a) if a.name == "s_m"));
    }

    #[test]
    fn dimensional_types_erase_to_real() {
        let loc = Location::default();
        let v = Rc::new(ResolvedExpr::Float(ResolvedFloat {
            value: 1.0,
            ty: quantity_type(Dimensions::from_quantity(Quantity::Voltage), loc),
            loc,
        }));
        let out = simplify_expr(&v, &StateFieldMap::new()).unwrap();
        let ty = type_of(&out);
        let ResolvedType::Quantity { dims, .. } = &*ty else { panic!() };
        assert!(dims.is_real());
    }
}
