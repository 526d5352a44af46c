//! Canonicalization to A-normal form.
//!
//! Post-order traversal: every non-trivial sub-expression becomes the value
//! side of a `let _tN = …`, with the reserved-name set threaded through the
//! whole mechanism so temporaries are fresh everywhere. Afterwards the
//! operands of calls, binary operators, conditionals, objects, and field
//! accesses are identifiers or literals, and each body is a linear chain of
//! lets ending in an atom.

use std::collections::HashSet;
use std::rc::Rc;

use crate::ir::*;

pub fn canonicalize_mechanism(m: &ResolvedMechanism) -> ResolvedMechanism {
    let mut temps = reserved_names(m);
    let mut out = m.clone();
    out.parameters = map_values(&m.parameters, &mut temps);
    out.functions = m
        .functions
        .iter()
        .map(|f| {
            let ResolvedExpr::Function(f) = &**f else { return f.clone() };
            let mut g = f.clone();
            g.body = canonicalize_expr(&f.body, &mut temps);
            Rc::new(ResolvedExpr::Function(g))
        })
        .collect();
    out.initials = map_values(&m.initials, &mut temps);
    out.evolutions = map_values(&m.evolutions, &mut temps);
    out.effects = map_values(&m.effects, &mut temps);
    out
}

/// Every name bound anywhere in the mechanism, so fresh temporaries cannot
/// collide with user names.
pub fn reserved_names(m: &ResolvedMechanism) -> HashSet<String> {
    let mut names = m.declared_names();
    let mut lets = Vec::new();
    for e in m
        .parameters
        .iter()
        .chain(&m.constants)
        .chain(&m.functions)
        .chain(&m.initials)
        .chain(&m.evolutions)
        .chain(&m.effects)
    {
        if let Some(v) = declaration_value(e) {
            bound_names(&v, &mut lets);
        }
        if let ResolvedExpr::Function(f) = &**e {
            bound_names(&f.body, &mut lets);
        }
    }
    names.extend(lets);
    names
}

fn declaration_value(e: &RExpr) -> Option<RExpr> {
    match &**e {
        ResolvedExpr::Parameter(x) => Some(x.value.clone()),
        ResolvedExpr::Constant(x) => Some(x.value.clone()),
        ResolvedExpr::Initial(x) => Some(x.value.clone()),
        ResolvedExpr::Evolve(x) => Some(x.value.clone()),
        ResolvedExpr::Effect(x) => Some(x.value.clone()),
        _ => None,
    }
}

fn map_values(decls: &[RExpr], temps: &mut HashSet<String>) -> Vec<RExpr> {
    decls
        .iter()
        .map(|e| match &**e {
            ResolvedExpr::Parameter(x) => {
                let mut y = x.clone();
                y.value = canonicalize_expr(&x.value, temps);
                Rc::new(ResolvedExpr::Parameter(y))
            }
            ResolvedExpr::Initial(x) => {
                let mut y = x.clone();
                y.value = canonicalize_expr(&x.value, temps);
                Rc::new(ResolvedExpr::Initial(y))
            }
            ResolvedExpr::Evolve(x) => {
                let mut y = x.clone();
                y.value = canonicalize_expr(&x.value, temps);
                Rc::new(ResolvedExpr::Evolve(y))
            }
            ResolvedExpr::Effect(x) => {
                let mut y = x.clone();
                y.value = canonicalize_expr(&x.value, temps);
                Rc::new(ResolvedExpr::Effect(y))
            }
            _ => e.clone(),
        })
        .collect()
}

struct Canon<'a> {
    temps: &'a mut HashSet<String>,
    bindings: Vec<(String, RExpr)>,
}

/// Canonicalize one body. The result is `let _t0 = …; … ; atom`.
pub fn canonicalize_expr(e: &RExpr, temps: &mut HashSet<String>) -> RExpr {
    let mut canon = Canon { temps, bindings: Vec::new() };
    let result = canon.atom(e);
    canon.bindings.into_iter().rev().fold(result, |body, (name, value)| {
        let ty = type_of(&body);
        let loc = body.loc();
        Rc::new(ResolvedExpr::Let(ResolvedLet { name, value, body, ty, loc }))
    })
}

impl Canon<'_> {
    /// Reduce an expression to an identifier or literal, emitting bindings
    /// for everything else.
    fn atom(&mut self, e: &RExpr) -> RExpr {
        match &**e {
            ResolvedExpr::Argument(_) | ResolvedExpr::Float(_) | ResolvedExpr::Int(_) => e.clone(),
            ResolvedExpr::Let(l) => {
                let value = self.flat(&l.value);
                self.bindings.push((l.name.clone(), value));
                self.temps.insert(l.name.clone());
                self.atom(&l.body)
            }
            _ => {
                let rhs = self.flat(e);
                let name = unique_name(self.temps, "t");
                let ty = type_of(&rhs);
                let loc = rhs.loc();
                self.bindings.push((name.clone(), rhs));
                Rc::new(ResolvedExpr::Argument(ResolvedArgument { name, ty, loc }))
            }
        }
    }

    /// Flatten one level: the node keeps its shape, its operands become
    /// atoms.
    fn flat(&mut self, e: &RExpr) -> RExpr {
        match &**e {
            ResolvedExpr::Argument(_) | ResolvedExpr::Float(_) | ResolvedExpr::Int(_) => e.clone(),
            ResolvedExpr::Let(l) => {
                let value = self.flat(&l.value);
                self.bindings.push((l.name.clone(), value));
                self.temps.insert(l.name.clone());
                self.flat(&l.body)
            }
            ResolvedExpr::Unary(u) => {
                let mut v = u.clone();
                v.arg = self.atom(&u.arg);
                Rc::new(ResolvedExpr::Unary(v))
            }
            ResolvedExpr::Binary(b) => {
                let mut v = b.clone();
                v.lhs = self.atom(&b.lhs);
                v.rhs = self.atom(&b.rhs);
                Rc::new(ResolvedExpr::Binary(v))
            }
            ResolvedExpr::If(i) => {
                let mut v = i.clone();
                v.condition = self.atom(&i.condition);
                v.if_true = self.atom(&i.if_true);
                v.if_false = self.atom(&i.if_false);
                Rc::new(ResolvedExpr::If(v))
            }
            ResolvedExpr::Call(c) => {
                let mut v = c.clone();
                v.args = c.args.iter().map(|a| self.atom(a)).collect();
                Rc::new(ResolvedExpr::Call(v))
            }
            ResolvedExpr::Object(o) => {
                let mut v = o.clone();
                v.fields = o.fields.iter().map(|(n, f)| (n.clone(), self.atom(f))).collect();
                Rc::new(ResolvedExpr::Object(v))
            }
            ResolvedExpr::FieldAccess(f) => {
                let mut v = f.clone();
                v.object = self.atom(&f.object);
                Rc::new(ResolvedExpr::FieldAccess(v))
            }
            _ => e.clone(),
        }
    }
}

/// Check the A-normal-form property: every operand of a call, binary op,
/// conditional, object, or field access is an identifier or a literal.
pub fn is_canonical(e: &RExpr) -> bool {
    fn operands_trivial(e: &RExpr) -> bool {
        match &**e {
            ResolvedExpr::Unary(u) => is_trivial(&u.arg),
            ResolvedExpr::Binary(b) => is_trivial(&b.lhs) && is_trivial(&b.rhs),
            ResolvedExpr::If(i) => {
                is_trivial(&i.condition) && is_trivial(&i.if_true) && is_trivial(&i.if_false)
            }
            ResolvedExpr::Call(c) => c.args.iter().all(is_trivial),
            ResolvedExpr::Object(o) => o.fields.iter().all(|(_, v)| is_trivial(v)),
            ResolvedExpr::FieldAccess(f) => is_trivial(&f.object),
            ResolvedExpr::Argument(_) | ResolvedExpr::Float(_) | ResolvedExpr::Int(_) => true,
            ResolvedExpr::Let(_) => false,
            _ => false,
        }
    }
    match &**e {
        ResolvedExpr::Let(l) => operands_trivial(&l.value) && is_canonical(&l.body),
        _ => is_trivial(e),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::resolve::resolve_mechanism;
    use ionc_lang::normalize::normalize_mechanism;
    use ionc_lang::parse_mechanism;

    fn canonicalized(src: &str) -> ResolvedMechanism {
        let m = parse_mechanism(src).expect("parse");
        let r = resolve_mechanism(&normalize_mechanism(&m)).expect("resolve");
        canonicalize_mechanism(&r)
    }

    #[test]
    fn nested_arithmetic_flattens_to_a_let_chain() {
        let m = canonicalized(
            "density d { parameter a = 1.0; parameter b = (a + 2.0)*(a + 3.0); }",
        );
        let ResolvedExpr::Parameter(p) = &*m.parameters[1] else { panic!() };
        assert!(is_canonical(&p.value), "not canonical: {:?}", p.value);
        // the outer product must sit in a let whose operands are temporaries
        let ResolvedExpr::Let(_) = &*p.value else { panic!("expected a let chain") };
    }

    #[test]
    fn user_lets_are_preserved_in_the_chain() {
        let m = canonicalized(
            "density d { parameter a = let x = 1.0 + 2.0; x*x; }",
        );
        let ResolvedExpr::Parameter(p) = &*m.parameters[0] else { panic!() };
        assert!(is_canonical(&p.value));
        let mut names = Vec::new();
        bound_names(&p.value, &mut names);
        assert!(names.contains(&"x".to_string()));
    }

    #[test]
    fn temporaries_are_fresh_across_the_mechanism() {
        let m = canonicalized(
            r#"density d {
                parameter a = 1.0 + 2.0;
                parameter b = 3.0 + 4.0;
            }"#,
        );
        let mut names = Vec::new();
        for p in &m.parameters {
            let ResolvedExpr::Parameter(p) = &**p else { panic!() };
            bound_names(&p.value, &mut names);
        }
        let unique: std::collections::HashSet<_> = names.iter().collect();
        assert_eq!(unique.len(), names.len(), "duplicate temporaries: {:?}", names);
    }

    #[test]
    fn trivial_bodies_stay_trivial() {
        let m = canonicalized("density d { state n : real; initial n = 0.5; }");
        let ResolvedExpr::Initial(i) = &*m.initials[0] else { panic!() };
        assert!(matches!(&*i.value, ResolvedExpr::Float(_)));
    }
}
