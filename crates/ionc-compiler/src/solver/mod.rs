//! The symbolic ODE solver.
//!
//! Each `evolve x' = f(x, …)` is rewritten into an update expression over
//! one time step, classified per state variable:
//!
//! - `∂f/∂x = 0`: forward step `x + f·dt`.
//! - `∂f/∂x` independent of `x` (linear and separable, `f = a·x + b`):
//!   closed form `x∞ + (x − x∞)·exp(a·dt)` with `x∞ = −b/a`, `b = f|ₓ₌₀`.
//! - otherwise: implicit Euler, one Newton step from `x`:
//!   `x + dt·f(x)/(1 − dt·∂f/∂x)`.
//!
//! Record states are solved field by field; the result carries no
//! derivatives and reads `dt`, which is bound automatically when the
//! mechanism did not bind it.

pub mod sym_diff;

use std::collections::HashMap;
use std::rc::Rc;

use ionc_lang::ast::Bindable;
use tracing::debug;

use crate::canonicalize::{canonicalize_expr, reserved_names};
use crate::ir::*;
use crate::rtype::{bindable_type, ResolvedType, RType};
use crate::{CompileError, Result};

use sym_diff::*;

pub fn solve_mechanism(m: &ResolvedMechanism) -> Result<ResolvedMechanism> {
    if m.evolutions.is_empty() {
        return Ok(m.clone());
    }

    let mut out = m.clone();
    let (dt_name, dt_ty) = ensure_dt_binding(&mut out);
    let mut temps = reserved_names(&out);
    temps.insert(dt_name.clone());

    let evolutions = m
        .evolutions
        .iter()
        .map(|ev| solve_evolve(ev, &dt_name, &dt_ty, &mut temps))
        .collect::<Result<Vec<_>>>()?;
    out.evolutions = evolutions;
    Ok(out)
}

/// The solver's update expressions read the simulator time step. Reuse the
/// mechanism's own `dt` binding or introduce one.
fn ensure_dt_binding(m: &mut ResolvedMechanism) -> (String, RType) {
    for b in &m.bindings {
        if let ResolvedExpr::Bind(b) = &**b {
            if b.kind == Bindable::Dt {
                return (b.name.clone(), b.ty.clone());
            }
        }
    }
    let ty = bindable_type(Bindable::Dt, m.loc);
    let mut declared = m.declared_names();
    let name = if declared.contains("dt") {
        unique_name(&mut declared, "dt")
    } else {
        "dt".to_string()
    };
    m.bindings.push(Rc::new(ResolvedExpr::Bind(ResolvedBind {
        name: name.clone(),
        kind: Bindable::Dt,
        ion: None,
        ty: ty.clone(),
        loc: m.loc,
    })));
    (name, ty)
}

fn solve_evolve(
    e: &RExpr,
    dt_name: &str,
    dt_ty: &RType,
    temps: &mut std::collections::HashSet<String>,
) -> Result<RExpr> {
    let ResolvedExpr::Evolve(ev) = &**e else {
        return Err(CompileError::InternalInvariant(
            "evolve list holds a non-evolve declaration".to_string(),
        ));
    };
    let loc = ev.loc;
    let closed = expand_lets(&ev.value);
    let dt = Rc::new(ResolvedExpr::Argument(ResolvedArgument {
        name: dt_name.to_string(),
        ty: dt_ty.clone(),
        loc,
    }));
    let state = Rc::new(ResolvedExpr::Argument(ResolvedArgument {
        name: ev.target.clone(),
        ty: ev.ty.clone(),
        loc,
    }));

    let update = match &*closed {
        // a record state: the object's fields are the per-field equations
        ResolvedExpr::Object(o) => {
            let ResolvedType::Record { fields: field_tys, .. } = &*ev.ty else {
                return Err(CompileError::InternalInvariant(format!(
                    "object-valued evolve for non-record state '{}'",
                    ev.target
                )));
            };
            let mut fields = Vec::with_capacity(o.fields.len());
            for (fname, fexpr) in &o.fields {
                let fty = field_tys
                    .iter()
                    .find(|(n, _)| n == fname)
                    .map(|(_, t)| t.clone())
                    .ok_or_else(|| CompileError::InternalInvariant(format!(
                        "evolve writes unknown field '{}' of state '{}'",
                        fname, ev.target
                    )))?;
                let var = DiffVar { name: ev.target.clone(), field: Some(fname.clone()) };
                let x = Rc::new(ResolvedExpr::FieldAccess(ResolvedFieldAccess {
                    object: state.clone(),
                    field: fname.clone(),
                    ty: fty,
                    loc,
                }));
                fields.push((fname.clone(), solve_single(ev, fexpr, &var, &dt, &x)?));
            }
            Rc::new(ResolvedExpr::Object(ResolvedObject {
                fields,
                ty: ev.ty.clone(),
                loc,
            }))
        }
        _ => {
            let var = DiffVar { name: ev.target.clone(), field: None };
            solve_single(ev, &closed, &var, &dt, &state)?
        }
    };

    let value = canonicalize_expr(&update, temps);
    Ok(Rc::new(ResolvedExpr::Evolve(ResolvedEvolve {
        target: ev.target.clone(),
        value,
        ty: ev.ty.clone(),
        loc,
    })))
}

/// Rewrite one scalar equation `x' = f` into an update for `x`.
fn solve_single(
    ev: &ResolvedEvolve,
    f: &RExpr,
    var: &DiffVar,
    dt: &RExpr,
    x: &RExpr,
) -> Result<RExpr> {
    let loc = f.loc();
    let a = simplify(&sym_diff(f, var)?);

    if is_zero(&a) {
        // x' is independent of x: plain forward step x + f·dt
        debug!(state = %ev.target, "evolve has constant derivative, forward step");
        return Ok(add(x.clone(), mul(f.clone(), dt.clone(), loc), loc));
    }

    if !contains_var(&a, var) {
        // linear and separable: f = a·x + b with a, b independent of x
        debug!(state = %ev.target, "evolve is linear, closed-form update");
        let b = simplify(&subst_var(f, var, &float(0.0, loc)));
        let xinf = div(neg(b, loc), a.clone(), loc);
        let decay = unary(ionc_lang::ast::UnaryOp::Exp, mul(a, dt.clone(), loc), loc);
        return Ok(add(
            xinf.clone(),
            mul(sub(x.clone(), xinf, loc), decay, loc),
            loc,
        ));
    }

    // general nonlinear: solve x_new − x = dt·f(x_new) with one Newton step
    // from x_new = x, giving x + dt·f(x)/(1 − dt·f'(x))
    debug!(state = %ev.target, "evolve is nonlinear, implicit-Euler step");
    let denom = sub(float(1.0, loc), mul(dt.clone(), a, loc), loc);
    Ok(add(x.clone(), div(mul(dt.clone(), f.clone(), loc), denom, loc), loc))
}

/// Expand a canonical let chain back into a closed expression tree.
fn expand_lets(e: &RExpr) -> RExpr {
    fn go(e: &RExpr, env: &HashMap<String, RExpr>) -> RExpr {
        match &**e {
            ResolvedExpr::Let(l) => {
                let value = go(&l.value, env);
                let mut inner = env.clone();
                inner.insert(l.name.clone(), value);
                go(&l.body, &inner)
            }
            ResolvedExpr::Argument(a) => match env.get(&a.name) {
                Some(v) => v.clone(),
                None => e.clone(),
            },
            ResolvedExpr::Unary(u) => {
                let mut v = u.clone();
                v.arg = go(&u.arg, env);
                Rc::new(ResolvedExpr::Unary(v))
            }
            ResolvedExpr::Binary(b) => {
                let mut v = b.clone();
                v.lhs = go(&b.lhs, env);
                v.rhs = go(&b.rhs, env);
                Rc::new(ResolvedExpr::Binary(v))
            }
            ResolvedExpr::If(i) => {
                let mut v = i.clone();
                v.condition = go(&i.condition, env);
                v.if_true = go(&i.if_true, env);
                v.if_false = go(&i.if_false, env);
                Rc::new(ResolvedExpr::If(v))
            }
            ResolvedExpr::Call(c) => {
                let mut v = c.clone();
                v.args = c.args.iter().map(|a| go(a, env)).collect();
                Rc::new(ResolvedExpr::Call(v))
            }
            ResolvedExpr::Object(o) => {
                let mut v = o.clone();
                v.fields = o.fields.iter().map(|(n, f)| (n.clone(), go(f, env))).collect();
                Rc::new(ResolvedExpr::Object(v))
            }
            ResolvedExpr::FieldAccess(f) => {
                let mut v = f.clone();
                v.object = go(&f.object, env);
                Rc::new(ResolvedExpr::FieldAccess(v))
            }
            _ => e.clone(),
        }
    }
    go(e, &HashMap::new())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::canonicalize::canonicalize_mechanism;
    use crate::interp::{eval_expr, Value};
    use crate::opt::Optimizer;
    use crate::resolve::resolve_mechanism;
    use crate::single_assign::single_assign_mechanism;
    use ionc_lang::normalize::normalize_mechanism;
    use ionc_lang::parse_mechanism;

    fn solved(src: &str) -> ResolvedMechanism {
        let m = parse_mechanism(src).expect("parse");
        let r = resolve_mechanism(&normalize_mechanism(&m)).expect("resolve");
        let m = single_assign_mechanism(&canonicalize_mechanism(&r));
        let m = Optimizer::standard().optimize(&m);
        solve_mechanism(&m).expect("solve")
    }

    fn eval_update(m: &ResolvedMechanism, env: &[(&str, f64)]) -> f64 {
        let ResolvedExpr::Evolve(ev) = &*m.evolutions[0] else { panic!() };
        let env: HashMap<String, Value> =
            env.iter().map(|(n, v)| (n.to_string(), Value::Num(*v))).collect();
        match eval_expr(&ev.value, &env).unwrap() {
            Value::Num(v) => v,
            other => panic!("expected a number, got {:?}", other),
        }
    }

    #[test]
    fn linear_ode_solves_to_exponential_relaxation() {
        // n' = (ninf − n)/tau  ⇒  n := ninf + (n − ninf)·exp(−dt/tau)
        let m = solved(
            r#"density d {
                parameter ninf = 0.8;
                parameter tau = 5 [ms];
                state n : real;
                initial n = 0.1;
                evolve n' = (ninf - n)/tau;
            }"#,
        );
        let (n, ninf, tau, dt) = (0.1, 0.8, 5e-3, 2.5e-4);
        let got = eval_update(&m, &[("n", n), ("ninf", ninf), ("tau", tau), ("dt", dt)]);
        let expect = ninf + (n - ninf) * (-dt / tau).exp();
        assert!((got - expect).abs() < 1e-9, "got {}, expected {}", got, expect);
    }

    #[test]
    fn state_free_derivative_takes_a_forward_step() {
        // c' = r with r independent of c  ⇒  c := c + r·dt
        let m = solved(
            r#"concentration pool {
                parameter r : concentration/time = 2.0 [mM/s];
                state c : concentration;
                initial c = 1.0 [mM];
                evolve c' = r;
            }"#,
        );
        let (c, r, dt) = (1.0, 2.0, 0.5);
        let got = eval_update(&m, &[("c", c), ("r", r), ("dt", dt)]);
        assert!((got - (c + r * dt)).abs() < 1e-12);
    }

    #[test]
    fn nonlinear_ode_takes_one_newton_step() {
        // n' = −k·n²  ⇒  one implicit-Euler Newton step from n
        let m = solved(
            r#"density d {
                parameter k : frequency = 3.0 [Hz];
                state n : real;
                initial n = 0.5;
                evolve n' = -(k*n^2);
            }"#,
        );
        let (n, k, dt) = (0.5, 3.0, 0.01);
        let f = -(k * n * n);
        let fp = -(2.0 * k * n);
        let expect = n + dt * f / (1.0 - dt * fp);
        let got = eval_update(&m, &[("n", n), ("k", k), ("dt", dt)]);
        assert!((got - expect).abs() < 1e-9, "got {}, expected {}", got, expect);
    }

    #[test]
    fn solved_mechanism_gains_a_dt_binding() {
        let m = solved(
            r#"density d {
                state n : real;
                initial n = 1.0;
                evolve n' = -n/4 [ms];
            }"#,
        );
        let has_dt = m.bindings.iter().any(|b| {
            matches!(&**b, ResolvedExpr::Bind(b) if b.kind == Bindable::Dt)
        });
        assert!(has_dt);
    }

    #[test]
    fn record_states_solve_field_by_field() {
        let m = solved(
            r#"point syn {
                record gates { a: real; b: real; };
                constant tau_a = 0.5 [ms];
                constant tau_b = 2 [ms];
                state s : gates;
                initial s = { a = 0.0; b = 0.0; };
                evolve s' = { a = -s.a/tau_a; b = -s.b/tau_b; };
            }"#,
        );
        let ResolvedExpr::Evolve(ev) = &*m.evolutions[0] else { panic!() };
        // decay of each field over one step matches the scalar closed form
        let env: HashMap<String, Value> = [
            (
                "s".to_string(),
                Value::Record(
                    [
                        ("a".to_string(), Value::Num(1.0)),
                        ("b".to_string(), Value::Num(1.0)),
                    ]
                    .into_iter()
                    .collect(),
                ),
            ),
            ("dt".to_string(), Value::Num(1e-4)),
        ]
        .into_iter()
        .collect();
        let Value::Record(fields) = eval_expr(&ev.value, &env).unwrap() else { panic!() };
        let Value::Num(a) = fields["a"] else { panic!() };
        let Value::Num(b) = fields["b"] else { panic!() };
        assert!((a - (-1e-4f64 / 0.5e-3).exp()).abs() < 1e-9);
        assert!((b - (-1e-4f64 / 2e-3).exp()).abs() < 1e-9);
    }

    #[test]
    fn abs_in_an_evolve_is_rejected() {
        let src = r#"density d {
            state n : real;
            initial n = 1.0;
            evolve n' = abs(n)*1 [s^-1];
        }"#;
        let m = parse_mechanism(src).expect("parse");
        let r = resolve_mechanism(&normalize_mechanism(&m)).expect("resolve");
        let m = single_assign_mechanism(&canonicalize_mechanism(&r));
        let err = solve_mechanism(&m).unwrap_err();
        assert!(matches!(err, CompileError::NonDifferentiable { .. }), "got {err}");
    }
}
