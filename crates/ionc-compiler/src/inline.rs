//! Function inlining.
//!
//! Functions are inlined bottom-up in topological order of the call graph,
//! so every body being substituted is already call-free. At each call site
//! the formals are bound to the actual arguments under fresh names and the
//! body's bindings are α-renamed with a per-call-site prefix. Recursion is
//! not permitted in the source language; a cycle is an error.

use std::collections::{HashMap, HashSet};
use std::rc::Rc;

use crate::canonicalize::reserved_names;
use crate::ir::*;
use crate::{CompileError, Result};

pub fn inline_mechanism(m: &ResolvedMechanism) -> Result<ResolvedMechanism> {
    if m.functions.is_empty() {
        return Ok(m.clone());
    }

    let mut funcs: HashMap<String, Rc<ResolvedFunction>> = HashMap::new();
    for f in &m.functions {
        let ResolvedExpr::Function(f) = &**f else {
            return Err(CompileError::InternalInvariant(
                "function list holds a non-function declaration".to_string(),
            ));
        };
        funcs.insert(f.name.clone(), Rc::new(f.clone()));
    }

    let order = topological_order(&funcs)?;
    let mut temps = reserved_names(m);

    // make every function body call-free before it is used at a call site
    let mut ready: HashMap<String, Rc<ResolvedFunction>> = HashMap::new();
    for name in order {
        let f = &funcs[&name];
        let mut g = (**f).clone();
        g.body = inline_expr(&f.body, &ready, &mut temps)?;
        ready.insert(name, Rc::new(g));
    }

    let mut out = m.clone();
    let rewrite = |decls: &[RExpr], temps: &mut HashSet<String>| -> Result<Vec<RExpr>> {
        decls
            .iter()
            .map(|e| {
                Ok(match &**e {
                    ResolvedExpr::Parameter(x) => {
                        let mut y = x.clone();
                        y.value = inline_expr(&x.value, &ready, temps)?;
                        Rc::new(ResolvedExpr::Parameter(y))
                    }
                    ResolvedExpr::Initial(x) => {
                        let mut y = x.clone();
                        y.value = inline_expr(&x.value, &ready, temps)?;
                        Rc::new(ResolvedExpr::Initial(y))
                    }
                    ResolvedExpr::Evolve(x) => {
                        let mut y = x.clone();
                        y.value = inline_expr(&x.value, &ready, temps)?;
                        Rc::new(ResolvedExpr::Evolve(y))
                    }
                    ResolvedExpr::Effect(x) => {
                        let mut y = x.clone();
                        y.value = inline_expr(&x.value, &ready, temps)?;
                        Rc::new(ResolvedExpr::Effect(y))
                    }
                    _ => e.clone(),
                })
            })
            .collect()
    };
    out.parameters = rewrite(&m.parameters, &mut temps)?;
    out.initials = rewrite(&m.initials, &mut temps)?;
    out.evolutions = rewrite(&m.evolutions, &mut temps)?;
    out.effects = rewrite(&m.effects, &mut temps)?;
    // all call sites are gone
    out.functions = Vec::new();
    Ok(out)
}

/// User functions called from an expression.
fn calls_in(e: &RExpr, out: &mut HashSet<String>) {
    match &**e {
        ResolvedExpr::Call(c) => {
            out.insert(c.function.clone());
            for a in &c.args {
                calls_in(a, out);
            }
        }
        ResolvedExpr::Let(l) => {
            calls_in(&l.value, out);
            calls_in(&l.body, out);
        }
        ResolvedExpr::If(i) => {
            calls_in(&i.condition, out);
            calls_in(&i.if_true, out);
            calls_in(&i.if_false, out);
        }
        ResolvedExpr::Unary(u) => calls_in(&u.arg, out),
        ResolvedExpr::Binary(b) => {
            calls_in(&b.lhs, out);
            calls_in(&b.rhs, out);
        }
        ResolvedExpr::Object(o) => {
            for (_, v) in &o.fields {
                calls_in(v, out);
            }
        }
        ResolvedExpr::FieldAccess(f) => calls_in(&f.object, out),
        _ => {}
    }
}

/// DFS over the call graph; callees come before callers. A back edge is a
/// recursion error.
fn topological_order(funcs: &HashMap<String, Rc<ResolvedFunction>>) -> Result<Vec<String>> {
    #[derive(PartialEq, Clone, Copy)]
    enum Mark {
        Visiting,
        Done,
    }

    fn visit(
        name: &str,
        funcs: &HashMap<String, Rc<ResolvedFunction>>,
        marks: &mut HashMap<String, Mark>,
        order: &mut Vec<String>,
    ) -> Result<()> {
        match marks.get(name) {
            Some(Mark::Done) => return Ok(()),
            Some(Mark::Visiting) => {
                let f = &funcs[name];
                return Err(CompileError::RecursiveFunction {
                    name: name.to_string(),
                    loc: f.loc,
                });
            }
            None => {}
        }
        marks.insert(name.to_string(), Mark::Visiting);
        let mut callees = HashSet::new();
        calls_in(&funcs[name].body, &mut callees);
        for callee in callees {
            if funcs.contains_key(&callee) {
                visit(&callee, funcs, marks, order)?;
            }
        }
        marks.insert(name.to_string(), Mark::Done);
        order.push(name.to_string());
        Ok(())
    }

    let mut names: Vec<&String> = funcs.keys().collect();
    names.sort();
    let mut marks = HashMap::new();
    let mut order = Vec::new();
    for name in names {
        visit(name, funcs, &mut marks, &mut order)?;
    }
    Ok(order)
}

/// Inline calls in one canonical body.
fn inline_expr(
    e: &RExpr,
    funcs: &HashMap<String, Rc<ResolvedFunction>>,
    temps: &mut HashSet<String>,
) -> Result<RExpr> {
    let mut bindings: Vec<(String, RExpr)> = Vec::new();
    let mut cursor = e.clone();
    let result = loop {
        let next = match &*cursor {
            ResolvedExpr::Let(l) => {
                match &*l.value {
                    ResolvedExpr::Call(c) if funcs.contains_key(&c.function) => {
                        let value = splice_call(c, funcs, temps, &mut bindings)?;
                        bindings.push((l.name.clone(), value));
                    }
                    _ => bindings.push((l.name.clone(), l.value.clone())),
                }
                l.body.clone()
            }
            ResolvedExpr::Call(c) if funcs.contains_key(&c.function) => {
                break splice_call(c, funcs, temps, &mut bindings)?;
            }
            _ => break cursor.clone(),
        };
        cursor = next;
    };

    Ok(bindings.into_iter().rev().fold(result, |body, (name, value)| {
        let ty = type_of(&body);
        let loc = body.loc();
        Rc::new(ResolvedExpr::Let(ResolvedLet { name, value, body, ty, loc }))
    }))
}

/// Substitute one call: bind the formals to the actuals under fresh names,
/// splice the α-renamed body bindings, and return the body's result.
fn splice_call(
    c: &ResolvedCall,
    funcs: &HashMap<String, Rc<ResolvedFunction>>,
    temps: &mut HashSet<String>,
    out: &mut Vec<(String, RExpr)>,
) -> Result<RExpr> {
    let f = &funcs[&c.function];
    if f.args.len() != c.args.len() {
        return Err(CompileError::ArityMismatch {
            function: c.function.clone(),
            expected: f.args.len(),
            got: c.args.len(),
            loc: c.loc,
        });
    }

    let mut rename: HashMap<String, String> = HashMap::new();
    for (formal, actual) in f.args.iter().zip(&c.args) {
        let fresh = unique_name(temps, &format!("{}_{}", c.function, formal.name));
        rename.insert(formal.name.clone(), fresh.clone());
        out.push((fresh, actual.clone()));
    }

    let mut cursor = f.body.clone();
    loop {
        match &*cursor {
            ResolvedExpr::Let(l) => {
                let local = l.name.trim_start_matches('_');
                let fresh = unique_name(temps, &format!("{}_{}", c.function, local));
                let value = rename_arguments(&l.value, &rename);
                rename.insert(l.name.clone(), fresh.clone());
                out.push((fresh, value));
                cursor = l.body.clone();
            }
            _ => return Ok(rename_arguments(&cursor, &rename)),
        }
    }
}

fn rename_arguments(e: &RExpr, rename: &HashMap<String, String>) -> RExpr {
    match &**e {
        ResolvedExpr::Argument(a) => match rename.get(&a.name) {
            Some(new) => Rc::new(ResolvedExpr::Argument(ResolvedArgument {
                name: new.clone(),
                ty: a.ty.clone(),
                loc: a.loc,
            })),
            None => e.clone(),
        },
        ResolvedExpr::Unary(u) => {
            let mut v = u.clone();
            v.arg = rename_arguments(&u.arg, rename);
            Rc::new(ResolvedExpr::Unary(v))
        }
        ResolvedExpr::Binary(b) => {
            let mut v = b.clone();
            v.lhs = rename_arguments(&b.lhs, rename);
            v.rhs = rename_arguments(&b.rhs, rename);
            Rc::new(ResolvedExpr::Binary(v))
        }
        ResolvedExpr::If(i) => {
            let mut v = i.clone();
            v.condition = rename_arguments(&i.condition, rename);
            v.if_true = rename_arguments(&i.if_true, rename);
            v.if_false = rename_arguments(&i.if_false, rename);
            Rc::new(ResolvedExpr::If(v))
        }
        ResolvedExpr::Call(c) => {
            let mut v = c.clone();
            v.args = c.args.iter().map(|a| rename_arguments(a, rename)).collect();
            Rc::new(ResolvedExpr::Call(v))
        }
        ResolvedExpr::Object(o) => {
            let mut v = o.clone();
            v.fields =
                o.fields.iter().map(|(n, f)| (n.clone(), rename_arguments(f, rename))).collect();
            Rc::new(ResolvedExpr::Object(v))
        }
        ResolvedExpr::FieldAccess(f) => {
            let mut v = f.clone();
            v.object = rename_arguments(&f.object, rename);
            Rc::new(ResolvedExpr::FieldAccess(v))
        }
        _ => e.clone(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::canonicalize::canonicalize_mechanism;
    use crate::interp::{eval_with_functions, Value};
    use crate::resolve::resolve_mechanism;
    use crate::single_assign::single_assign_mechanism;
    use ionc_lang::normalize::normalize_mechanism;
    use ionc_lang::parse_mechanism;

    fn prepared(src: &str) -> ResolvedMechanism {
        let m = parse_mechanism(src).expect("parse");
        let r = resolve_mechanism(&normalize_mechanism(&m)).expect("resolve");
        single_assign_mechanism(&canonicalize_mechanism(&r))
    }

    #[test]
    fn recursion_is_detected() {
        let m = prepared("density d { function f(x: real) : real { f(x) } }");
        let err = inline_mechanism(&m).unwrap_err();
        assert!(
            matches!(err, CompileError::RecursiveFunction { ref name, .. } if name == "f"),
            "got {err}"
        );
    }

    #[test]
    fn mutual_recursion_is_detected() {
        let m = prepared(
            r#"density d {
                function f(x: real) : real { g(x) }
                function g(x: real) : real { f(x) }
            }"#,
        );
        assert!(matches!(inline_mechanism(&m).unwrap_err(), CompileError::RecursiveFunction { .. }));
    }

    #[test]
    fn inlined_body_has_no_calls() {
        let m = prepared(
            r#"density d {
                function sq(x: real) : real { x*x }
                function quad(x: real) : real { sq(x)*sq(x) }
                parameter p = quad(3.0);
            }"#,
        );
        let out = inline_mechanism(&m).expect("inline");
        assert!(out.functions.is_empty());
        let ResolvedExpr::Parameter(p) = &*out.parameters[0] else { panic!() };
        let mut calls = HashSet::new();
        calls_in(&p.value, &mut calls);
        assert!(calls.is_empty(), "calls survive inlining: {:?}", calls);
    }

    #[test]
    fn inlining_preserves_evaluation() {
        let m = prepared(
            r#"density d {
                function gate(u: real, k: real) : real { 1.0/(1.0 + exp(-u/k)) }
                parameter p = gate(0.5, 2.0)*gate(-0.5, 2.0);
            }"#,
        );
        // evaluate the call-site form with functions available
        let mut funcs = HashMap::new();
        for f in &m.functions {
            let ResolvedExpr::Function(f) = &**f else { panic!() };
            funcs.insert(f.name.clone(), Rc::new(f.clone()));
        }
        let ResolvedExpr::Parameter(p) = &*m.parameters[0] else { panic!() };
        let env = HashMap::new();
        let before = eval_with_functions(&p.value, &env, &funcs).expect("eval before");

        let out = inline_mechanism(&m).expect("inline");
        let ResolvedExpr::Parameter(p) = &*out.parameters[0] else { panic!() };
        let after = eval_with_functions(&p.value, &env, &HashMap::new()).expect("eval after");

        let (Value::Num(b), Value::Num(a)) = (before, after) else { panic!() };
        assert_eq!(b.to_bits(), a.to_bits(), "inlining changed the value");
    }
}
