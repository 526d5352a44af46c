//! Dead-code elimination.
//!
//! Bodies are linear let chains after canonicalization, so liveness is one
//! backward walk: the result's reads seed the live set, and a binding is
//! kept only if its name is live when reached, adding its own reads in turn.
//! Expression-level bindings are all pure, so an unread binding is simply
//! dropped; the observable roots (effects, evolve targets, exports) live at
//! mechanism level and are never candidates.

use std::collections::HashSet;
use std::rc::Rc;

use crate::ir::*;

use super::{map_bodies, Pass};

pub struct EliminateDeadCode;

impl Pass for EliminateDeadCode {
    fn name(&self) -> &'static str {
        "dce"
    }

    fn run(&self, m: &ResolvedMechanism) -> (ResolvedMechanism, bool) {
        map_bodies(m, dce_expr)
    }
}

pub fn dce_expr(e: &RExpr) -> (RExpr, bool) {
    // split the chain
    let mut chain: Vec<(&ResolvedLet, &RExpr)> = Vec::new();
    let mut cursor = e;
    while let ResolvedExpr::Let(l) = &**cursor {
        chain.push((l, &l.value));
        cursor = &l.body;
    }
    let result = cursor.clone();

    let mut live = HashSet::new();
    read_arguments(&result, &mut live);

    let mut keep = vec![false; chain.len()];
    for (i, (l, value)) in chain.iter().enumerate().rev() {
        if live.contains(&l.name) {
            keep[i] = true;
            read_arguments(value, &mut live);
        }
    }

    let changed = keep.iter().any(|k| !k);
    if !changed {
        return (e.clone(), false);
    }

    let out = chain
        .into_iter()
        .zip(keep)
        .rev()
        .filter(|(_, k)| *k)
        .fold(result, |body, ((l, _), _)| {
            let ty = type_of(&body);
            Rc::new(ResolvedExpr::Let(ResolvedLet {
                name: l.name.clone(),
                value: l.value.clone(),
                body,
                ty,
                loc: l.loc,
            }))
        });
    (out, true)
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
    fn unread_bindings_are_dropped() {
        // let a = x*y; let b = x + 1; b — a is dead
        let e = body(
            r#"density d {
                parameter x = 2.0;
                parameter y = 3.0;
                parameter p = let a = x*y; let b = x + 1.0; b;
            }"#,
        );
        let (out, changed) = dce_expr(&e);
        assert!(changed);
        let mut names = Vec::new();
        bound_names(&out, &mut names);
        assert!(!names.contains(&"a".to_string()), "dead 'a' survived: {:?}", names);
        assert!(names.contains(&"b".to_string()));
    }

    #[test]
    fn dead_chains_disappear_transitively() {
        // c depends on a; both dead once the result ignores c
        let e = body(
            r#"density d {
                parameter x = 2.0;
                parameter p = let a = x + 1.0; let c = a*2.0; let b = x*x; b;
            }"#,
        );
        let (out, changed) = dce_expr(&e);
        assert!(changed);
        let mut names = Vec::new();
        bound_names(&out, &mut names);
        assert_eq!(names, vec!["b".to_string()]);
    }

    #[test]
    fn live_chains_are_kept_in_full() {
        let e = body(
            r#"density d {
                parameter x = 2.0;
                parameter p = let a = x + 1.0; let b = a*a; b;
            }"#,
        );
        let (out, changed) = dce_expr(&e);
        assert!(!changed);
        assert_eq!(node_count(&out), node_count(&e));
    }
}
