//! Common-subexpression elimination.
//!
//! Walks each body's let chain keeping a map from the structural hash of the
//! bound value to the first name that computed it. A later binding with the
//! same value becomes a copy of the first; copy propagation then removes it.
//! Floats hash bitwise; literal hashes include the dimension tuple so equal
//! numbers of different dimensions never merge.

use std::collections::HashMap;
use std::rc::Rc;

use ionc_lang::ast::{BinaryOp, UnaryOp};

use crate::ir::*;
use crate::rtype::{Dimensions, ResolvedType};

use super::{map_bodies, Pass};

pub struct Cse;

impl Pass for Cse {
    fn name(&self) -> &'static str {
        "cse"
    }

    fn run(&self, m: &ResolvedMechanism) -> (ResolvedMechanism, bool) {
        map_bodies(m, cse_expr)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
enum Key {
    Arg(String),
    Float(u64, Dimensions),
    Int(i64, Dimensions),
    Unary(UnaryOp, Box<Key>),
    Binary(BinaryOp, Box<Key>, Box<Key>),
    Call(String, Vec<Key>),
    Object(Vec<(String, Key)>),
    Field(Box<Key>, String),
    Cond(Box<Key>, Box<Key>, Box<Key>),
}

fn dims_of(e: &RExpr) -> Dimensions {
    match &*type_of(e) {
        ResolvedType::Quantity { dims, .. } => *dims,
        _ => Dimensions::real(),
    }
}

fn key_of(e: &RExpr) -> Option<Key> {
    match &**e {
        ResolvedExpr::Argument(a) => Some(Key::Arg(a.name.clone())),
        ResolvedExpr::Float(f) => Some(Key::Float(f.value.to_bits(), dims_of(e))),
        ResolvedExpr::Int(i) => Some(Key::Int(i.value, dims_of(e))),
        ResolvedExpr::Unary(u) => Some(Key::Unary(u.op, Box::new(key_of(&u.arg)?))),
        ResolvedExpr::Binary(b) => Some(Key::Binary(
            b.op,
            Box::new(key_of(&b.lhs)?),
            Box::new(key_of(&b.rhs)?),
        )),
        ResolvedExpr::Call(c) => {
            let mut keys = Vec::with_capacity(c.args.len());
            for a in &c.args {
                keys.push(key_of(a)?);
            }
            Some(Key::Call(c.function.clone(), keys))
        }
        ResolvedExpr::Object(o) => {
            let mut keys = Vec::with_capacity(o.fields.len());
            for (n, v) in &o.fields {
                keys.push((n.clone(), key_of(v)?));
            }
            Some(Key::Object(keys))
        }
        ResolvedExpr::FieldAccess(f) => {
            Some(Key::Field(Box::new(key_of(&f.object)?), f.field.clone()))
        }
        ResolvedExpr::If(i) => Some(Key::Cond(
            Box::new(key_of(&i.condition)?),
            Box::new(key_of(&i.if_true)?),
            Box::new(key_of(&i.if_false)?),
        )),
        _ => None,
    }
}

pub fn cse_expr(e: &RExpr) -> (RExpr, bool) {
    let mut seen: HashMap<Key, RExpr> = HashMap::new();
    walk(e, &mut seen)
}

fn walk(e: &RExpr, seen: &mut HashMap<Key, RExpr>) -> (RExpr, bool) {
    match &**e {
        ResolvedExpr::Let(l) => {
            let mut changed = false;
            let value = match key_of(&l.value) {
                Some(key) => match seen.get(&key) {
                    Some(first) => {
                        // keep literal and identifier bindings as they are;
                        // aliasing them saves nothing
                        if is_trivial(&l.value) {
                            l.value.clone()
                        } else {
                            changed = true;
                            first.clone()
                        }
                    }
                    None => {
                        seen.insert(
                            key,
                            Rc::new(ResolvedExpr::Argument(ResolvedArgument {
                                name: l.name.clone(),
                                ty: type_of(&l.value),
                                loc: l.loc,
                            })),
                        );
                        l.value.clone()
                    }
                },
                None => l.value.clone(),
            };
            let (body, body_changed) = walk(&l.body, seen);
            let out = Rc::new(ResolvedExpr::Let(ResolvedLet {
                name: l.name.clone(),
                value,
                body,
                ty: l.ty.clone(),
                loc: l.loc,
            }));
            (out, changed || body_changed)
        }
        _ => (e.clone(), false),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::canonicalize::canonicalize_mechanism;
    use crate::resolve::resolve_mechanism;
    use crate::single_assign::single_assign_mechanism;
    use ionc_lang::normalize::normalize_mechanism;
    use ionc_lang::parse_mechanism;

    fn body(src: &str) -> RExpr {
        let m = parse_mechanism(src).expect("parse");
        let r = resolve_mechanism(&normalize_mechanism(&m)).expect("resolve");
        let m = single_assign_mechanism(&canonicalize_mechanism(&r));
        let last = m.parameters.last().unwrap().clone();
        let ResolvedExpr::Parameter(p) = &*last else {
            panic!()
        };
        p.value.clone()
    }

    #[test]
    fn duplicate_products_collapse_to_the_first_name() {
        // let a = x*y; let b = x*y; a + b — b's value becomes a copy of a
        let e = body(
            r#"density d {
                parameter x = 2.0;
                parameter y = 3.0;
                parameter p = let a = x*y; let b = x*y; a + b;
            }"#,
        );
        let (out, changed) = cse_expr(&e);
        assert!(changed);
        let ResolvedExpr::Let(first) = &*out else { panic!() };
        let ResolvedExpr::Let(second) = &*first.body else { panic!() };
        assert!(
            matches!(&*second.value, ResolvedExpr::Argument(a) if a.name == first.name),
            "second binding should alias the first"
        );
    }

    #[test]
    fn distinct_values_are_untouched() {
        let e = body(
            r#"density d {
                parameter x = 2.0;
                parameter p = let a = x*x; let b = x + x; a + b;
            }"#,
        );
        let (_, changed) = cse_expr(&e);
        assert!(!changed);
    }
}
