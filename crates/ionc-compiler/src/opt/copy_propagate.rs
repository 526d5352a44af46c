//! Copy propagation: a binding `let x = y;` where `y` is an identifier is
//! removed, with `y` substituted for `x` throughout the body. Copy chains
//! collapse because substitution happens before the binding is classified.

use std::collections::HashMap;
use std::rc::Rc;

use crate::ir::*;

use super::{map_bodies, Pass};

pub struct CopyPropagate;

impl Pass for CopyPropagate {
    fn name(&self) -> &'static str {
        "copy-propagate"
    }

    fn run(&self, m: &ResolvedMechanism) -> (ResolvedMechanism, bool) {
        map_bodies(m, copy_propagate_expr)
    }
}

pub fn copy_propagate_expr(e: &RExpr) -> (RExpr, bool) {
    let mut copies: HashMap<String, RExpr> = HashMap::new();
    walk(e, &mut copies)
}

fn walk(e: &RExpr, copies: &mut HashMap<String, RExpr>) -> (RExpr, bool) {
    match &**e {
        ResolvedExpr::Let(l) => {
            let (value, substituted) = substitute(&l.value, copies);
            if matches!(&*value, ResolvedExpr::Argument(_)) {
                copies.insert(l.name.clone(), value);
                let (body, _) = walk(&l.body, copies);
                return (body, true);
            }
            let (body, body_changed) = walk(&l.body, copies);
            let out = Rc::new(ResolvedExpr::Let(ResolvedLet {
                name: l.name.clone(),
                value,
                body,
                ty: l.ty.clone(),
                loc: l.loc,
            }));
            (out, substituted || body_changed)
        }
        _ => substitute(e, copies),
    }
}

fn substitute(e: &RExpr, copies: &HashMap<String, RExpr>) -> (RExpr, bool) {
    match &**e {
        ResolvedExpr::Argument(a) => match copies.get(&a.name) {
            Some(replacement) => (replacement.clone(), true),
            None => (e.clone(), false),
        },
        ResolvedExpr::Float(_) | ResolvedExpr::Int(_) => (e.clone(), false),
        ResolvedExpr::Unary(u) => {
            let (arg, c) = substitute(&u.arg, copies);
            if c {
                let mut v = u.clone();
                v.arg = arg;
                (Rc::new(ResolvedExpr::Unary(v)), true)
            } else {
                (e.clone(), false)
            }
        }
        ResolvedExpr::Binary(b) => {
            let (lhs, cl) = substitute(&b.lhs, copies);
            let (rhs, cr) = substitute(&b.rhs, copies);
            if cl || cr {
                let mut v = b.clone();
                v.lhs = lhs;
                v.rhs = rhs;
                (Rc::new(ResolvedExpr::Binary(v)), true)
            } else {
                (e.clone(), false)
            }
        }
        ResolvedExpr::If(i) => {
            let (condition, cc) = substitute(&i.condition, copies);
            let (if_true, ct) = substitute(&i.if_true, copies);
            let (if_false, cf) = substitute(&i.if_false, copies);
            if cc || ct || cf {
                let mut v = i.clone();
                v.condition = condition;
                v.if_true = if_true;
                v.if_false = if_false;
                (Rc::new(ResolvedExpr::If(v)), true)
            } else {
                (e.clone(), false)
            }
        }
        ResolvedExpr::Call(c) => {
            let mut changed = false;
            let args: Vec<RExpr> = c
                .args
                .iter()
                .map(|a| {
                    let (a, s) = substitute(a, copies);
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
                    let (v, s) = substitute(v, copies);
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
        ResolvedExpr::FieldAccess(f) => {
            let (object, c) = substitute(&f.object, copies);
            if c {
                let mut v = f.clone();
                v.object = object;
                (Rc::new(ResolvedExpr::FieldAccess(v)), true)
            } else {
                (e.clone(), false)
            }
        }
        ResolvedExpr::Let(l) => {
            // nested lets only appear transiently; substitute through them
            let (value, cv) = substitute(&l.value, copies);
            let (body, cb) = substitute(&l.body, copies);
            if cv || cb {
                let mut v = l.clone();
                v.value = value;
                v.body = body;
                (Rc::new(ResolvedExpr::Let(v)), true)
            } else {
                (e.clone(), false)
            }
        }
        _ => (e.clone(), false),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rtype::real_type;
    use ionc_lang::location::Location;

    fn arg(name: &str) -> RExpr {
        Rc::new(ResolvedExpr::Argument(ResolvedArgument {
            name: name.to_string(),
            ty: real_type(Location::default()),
            loc: Location::default(),
        }))
    }

    fn let_in(name: &str, value: RExpr, body: RExpr) -> RExpr {
        let ty = type_of(&body);
        Rc::new(ResolvedExpr::Let(ResolvedLet {
            name: name.to_string(),
            value,
            body,
            ty,
            loc: Location::default(),
        }))
    }

    #[test]
    fn copies_are_removed_and_uses_rewritten() {
        // let a = x; a  ->  x
        let e = let_in("a", arg("x"), arg("a"));
        let (out, changed) = copy_propagate_expr(&e);
        assert!(changed);
        assert!(matches!(&*out, ResolvedExpr::Argument(a) if a.name == "x"));
    }

    #[test]
    fn copy_chains_collapse() {
        // let a = x; let b = a; b  ->  x
        let e = let_in("a", arg("x"), let_in("b", arg("a"), arg("b")));
        let (out, _) = copy_propagate_expr(&e);
        assert!(matches!(&*out, ResolvedExpr::Argument(a) if a.name == "x"));
    }

    #[test]
    fn non_copies_are_kept() {
        let ty = real_type(Location::default());
        let sum = Rc::new(ResolvedExpr::Binary(ResolvedBinary {
            op: ionc_lang::ast::BinaryOp::Add,
            lhs: arg("x"),
            rhs: arg("y"),
            ty,
            loc: Location::default(),
        }));
        let e = let_in("a", sum, arg("a"));
        let (out, changed) = copy_propagate_expr(&e);
        assert!(!changed);
        assert!(matches!(&*out, ResolvedExpr::Let(_)));
    }
}
