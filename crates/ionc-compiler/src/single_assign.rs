//! Single assignment: α-rename let bindings so the multiset of bound names
//! across the whole mechanism has multiplicity 1. Shadowing disappears;
//! name → defining expression becomes a partial function.

use std::collections::{HashMap, HashSet};
use std::rc::Rc;

use crate::ir::*;

pub fn single_assign_mechanism(m: &ResolvedMechanism) -> ResolvedMechanism {
    // Reserve declaration names; let-bound names are claimed as bodies are
    // walked, so a name reused across bodies gets renamed at its second use.
    let mut used = m.declared_names();
    let mut out = m.clone();
    let rename = |e: &RExpr, used: &mut HashSet<String>| {
        single_assign_expr(e, used, &HashMap::new())
    };

    out.parameters = map_decl_values(&m.parameters, &mut used, rename);
    out.functions = m
        .functions
        .iter()
        .map(|f| {
            let ResolvedExpr::Function(f) = &**f else { return f.clone() };
            let mut g = f.clone();
            for a in &g.args {
                used.insert(a.name.clone());
            }
            g.body = single_assign_expr(&f.body, &mut used, &HashMap::new());
            Rc::new(ResolvedExpr::Function(g))
        })
        .collect();
    out.initials = map_decl_values(&m.initials, &mut used, rename);
    out.evolutions = map_decl_values(&m.evolutions, &mut used, rename);
    out.effects = map_decl_values(&m.effects, &mut used, rename);
    out
}

fn map_decl_values<F>(decls: &[RExpr], used: &mut HashSet<String>, mut f: F) -> Vec<RExpr>
where
    F: FnMut(&RExpr, &mut HashSet<String>) -> RExpr,
{
    decls
        .iter()
        .map(|e| match &**e {
            ResolvedExpr::Parameter(x) => {
                let mut y = x.clone();
                y.value = f(&x.value, used);
                Rc::new(ResolvedExpr::Parameter(y))
            }
            ResolvedExpr::Initial(x) => {
                let mut y = x.clone();
                y.value = f(&x.value, used);
                Rc::new(ResolvedExpr::Initial(y))
            }
            ResolvedExpr::Evolve(x) => {
                let mut y = x.clone();
                y.value = f(&x.value, used);
                Rc::new(ResolvedExpr::Evolve(y))
            }
            ResolvedExpr::Effect(x) => {
                let mut y = x.clone();
                y.value = f(&x.value, used);
                Rc::new(ResolvedExpr::Effect(y))
            }
            _ => e.clone(),
        })
        .collect()
}

fn single_assign_expr(
    e: &RExpr,
    used: &mut HashSet<String>,
    renames: &HashMap<String, String>,
) -> RExpr {
    match &**e {
        ResolvedExpr::Let(l) => {
            let value = single_assign_expr(&l.value, used, renames);
            let fresh = if used.insert(l.name.clone()) {
                l.name.clone()
            } else {
                unique_name(used, &strip_leading_underscore(&l.name))
            };
            let mut inner = renames.clone();
            inner.insert(l.name.clone(), fresh.clone());
            let body = single_assign_expr(&l.body, used, &inner);
            Rc::new(ResolvedExpr::Let(ResolvedLet {
                name: fresh,
                value,
                body,
                ty: l.ty.clone(),
                loc: l.loc,
            }))
        }
        ResolvedExpr::Argument(a) => match renames.get(&a.name) {
            Some(new) => Rc::new(ResolvedExpr::Argument(ResolvedArgument {
                name: new.clone(),
                ty: a.ty.clone(),
                loc: a.loc,
            })),
            None => e.clone(),
        },
        ResolvedExpr::Unary(u) => {
            let mut v = u.clone();
            v.arg = single_assign_expr(&u.arg, used, renames);
            Rc::new(ResolvedExpr::Unary(v))
        }
        ResolvedExpr::Binary(b) => {
            let mut v = b.clone();
            v.lhs = single_assign_expr(&b.lhs, used, renames);
            v.rhs = single_assign_expr(&b.rhs, used, renames);
            Rc::new(ResolvedExpr::Binary(v))
        }
        ResolvedExpr::If(i) => {
            let mut v = i.clone();
            v.condition = single_assign_expr(&i.condition, used, renames);
            v.if_true = single_assign_expr(&i.if_true, used, renames);
            v.if_false = single_assign_expr(&i.if_false, used, renames);
            Rc::new(ResolvedExpr::If(v))
        }
        ResolvedExpr::Call(c) => {
            let mut v = c.clone();
            v.args = c.args.iter().map(|a| single_assign_expr(a, used, renames)).collect();
            Rc::new(ResolvedExpr::Call(v))
        }
        ResolvedExpr::Object(o) => {
            let mut v = o.clone();
            v.fields = o
                .fields
                .iter()
                .map(|(n, f)| (n.clone(), single_assign_expr(f, used, renames)))
                .collect();
            Rc::new(ResolvedExpr::Object(v))
        }
        ResolvedExpr::FieldAccess(f) => {
            let mut v = f.clone();
            v.object = single_assign_expr(&f.object, used, renames);
            Rc::new(ResolvedExpr::FieldAccess(v))
        }
        _ => e.clone(),
    }
}

fn strip_leading_underscore(name: &str) -> String {
    name.trim_start_matches('_').to_string()
}

/// The multiset of let-bound names in a mechanism's bodies; used by tests
/// and the internal-invariant check.
pub fn all_bound_names(m: &ResolvedMechanism) -> Vec<String> {
    let mut names = Vec::new();
    for e in m
        .parameters
        .iter()
        .chain(&m.functions)
        .chain(&m.initials)
        .chain(&m.evolutions)
        .chain(&m.effects)
    {
        match &**e {
            ResolvedExpr::Parameter(x) => bound_names(&x.value, &mut names),
            ResolvedExpr::Function(x) => bound_names(&x.body, &mut names),
            ResolvedExpr::Initial(x) => bound_names(&x.value, &mut names),
            ResolvedExpr::Evolve(x) => bound_names(&x.value, &mut names),
            ResolvedExpr::Effect(x) => bound_names(&x.value, &mut names),
            _ => {}
        }
    }
    names
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::canonicalize::canonicalize_mechanism;
    use crate::resolve::resolve_mechanism;
    use ionc_lang::normalize::normalize_mechanism;
    use ionc_lang::parse_mechanism;

    fn ssa(src: &str) -> ResolvedMechanism {
        let m = parse_mechanism(src).expect("parse");
        let r = resolve_mechanism(&normalize_mechanism(&m)).expect("resolve");
        single_assign_mechanism(&canonicalize_mechanism(&r))
    }

    fn assert_unique(m: &ResolvedMechanism) {
        let names = all_bound_names(m);
        let unique: std::collections::HashSet<_> = names.iter().collect();
        assert_eq!(unique.len(), names.len(), "duplicate bound names: {:?}", names);
    }

    #[test]
    fn shadowed_lets_are_renamed() {
        let m = ssa(
            "density d { parameter a = let x = 1.0; let x = x + 1.0; x*2.0; }",
        );
        assert_unique(&m);
    }

    #[test]
    fn names_reused_across_bodies_are_renamed() {
        let m = ssa(
            r#"density d {
                parameter a = let x = 1.0 + 1.0; x;
                parameter b = let x = 2.0 + 2.0; x;
            }"#,
        );
        assert_unique(&m);
    }

    #[test]
    fn shadowing_preserves_meaning() {
        // let x = 1; let x = x + 1; x*2 must still compute 4
        let m = ssa("density d { parameter a = let x = 1.0; let x = x + 1.0; x*2.0; }");
        let ResolvedExpr::Parameter(p) = &*m.parameters[0] else { panic!() };
        let env = std::collections::HashMap::new();
        let v = crate::interp::eval_expr(&p.value, &env).expect("eval");
        assert_eq!(v, crate::interp::Value::Num(4.0));
    }
}
