//! End-to-end pipeline tests on realistic mechanisms: every stage runs, the
//! solved update matches the analytic form, and evaluation is preserved
//! through the pure stages on a concrete channel model.

use std::collections::HashMap;
use std::rc::Rc;

use ionc_compiler::canonicalize::canonicalize_mechanism;
use ionc_compiler::inline::inline_mechanism;
use ionc_compiler::interp::{eval_expr, eval_with_functions, Value};
use ionc_compiler::ir::{ResolvedExpr, ResolvedFunction, ResolvedMechanism, RExpr};
use ionc_compiler::opt::Optimizer;
use ionc_compiler::resolve::resolve_mechanism;
use ionc_compiler::single_assign::single_assign_mechanism;
use ionc_compiler::{compile, lower};
use ionc_lang::normalize::normalize_mechanism;
use ionc_lang::parse_mechanism;

const KD: &str = r#"
# delayed-rectifier potassium channel
density kd {
    parameter gbar = 1e-5 [S/cm^2];
    parameter ek = -77 [mV];
    constant q = 0.1;
    bind v = membrane_potential(k);
    state n : real;

    function ninf(u: voltage) : real {
        1.0/(1.0 + exp(-(u + 55 [mV])/(10 [mV])))
    }
    function ntau(u: voltage) : time {
        let r = q*exp(-(u + 60 [mV])/(40 [mV]));
        3 [ms]/(1.0 + r)
    }

    initial n = ninf(v);
    evolve n' = (ninf(v) - n)/ntau(v);
    effect current_density(k) = gbar*n^4*(v - ek);

    export gbar;
}
"#;

fn resolved(src: &str) -> ResolvedMechanism {
    let parsed = parse_mechanism(src).expect("parse");
    resolve_mechanism(&normalize_mechanism(&parsed)).expect("resolve")
}

fn effect_body(m: &ResolvedMechanism) -> RExpr {
    let ResolvedExpr::Effect(e) = &*m.effects[0] else { panic!() };
    e.value.clone()
}

fn functions_of(m: &ResolvedMechanism) -> HashMap<String, Rc<ResolvedFunction>> {
    m.functions
        .iter()
        .filter_map(|f| match &**f {
            ResolvedExpr::Function(f) => Some((f.name.clone(), Rc::new(f.clone()))),
            _ => None,
        })
        .collect()
}

#[test]
fn kd_channel_compiles_to_a_printable_mechanism() {
    let parsed = parse_mechanism(KD).expect("parse");
    let printable = compile(&parsed).expect("compile");

    assert_eq!(printable.name, "kd");
    assert_eq!(printable.field_pack.param_sources, vec!["gbar", "ek"]);
    assert_eq!(printable.field_pack.state_sources, vec!["n"]);
    assert_eq!(printable.procedure_pack.initializations.len(), 1);
    assert_eq!(printable.procedure_pack.evolutions.len(), 1);
    assert_eq!(printable.procedure_pack.effects.len(), 1);

    // the solver introduced the dt read; the effect writes the k current
    assert!(printable.evolve_read_map.binding_map.contains_key("_pp_dt"));
    assert!(printable.effect_write_map.effect_map.contains_key("_pp_i_k"));
}

#[test]
fn effect_evaluation_is_preserved_through_the_pure_stages() {
    let r = resolved(KD);
    let canonical = canonicalize_mechanism(&r);
    let ssa = single_assign_mechanism(&canonical);
    let optimized = Optimizer::standard().optimize(&ssa);
    let inlined = inline_mechanism(&optimized).expect("inline");
    let final_opt = Optimizer::standard().optimize(&inlined);

    let env: HashMap<String, Value> = [
        ("gbar".to_string(), Value::Num(1e-1)),
        ("ek".to_string(), Value::Num(-77e-3)),
        ("v".to_string(), Value::Num(-40e-3)),
        ("n".to_string(), Value::Num(0.3)),
    ]
    .into_iter()
    .collect();

    let funcs = functions_of(&r);
    let reference = eval_with_functions(&effect_body(&r), &env, &funcs).expect("eval resolved");
    for m in [&canonical, &ssa, &optimized] {
        let v = eval_with_functions(&effect_body(m), &env, &funcs).expect("eval");
        assert_eq!(v, reference);
    }
    for m in [&inlined, &final_opt] {
        let v = eval_expr(&effect_body(m), &env).expect("eval");
        assert_eq!(v, reference);
    }
}

#[test]
fn solved_update_matches_the_analytic_relaxation() {
    let parsed = parse_mechanism(KD).expect("parse");
    let solved = lower(&parsed).expect("lower");
    let ResolvedExpr::Evolve(ev) = &*solved.evolutions[0] else { panic!() };

    // evaluate the emitted update and compare against
    // n + (ninf - n)·(1 - exp(-dt/tau)) computed by hand
    let (v, n, dt, q) = (-40e-3f64, 0.3f64, 2.5e-5f64, 0.1f64);
    let ninf = 1.0 / (1.0 + (-(v + 55e-3) / 10e-3).exp());
    let tau = 3e-3 / (1.0 + q * (-(v + 60e-3) / 40e-3).exp());
    let expect = ninf + (n - ninf) * (-dt / tau).exp();

    let env: HashMap<String, Value> = [
        ("v".to_string(), Value::Num(v)),
        ("n".to_string(), Value::Num(n)),
        ("dt".to_string(), Value::Num(dt)),
    ]
    .into_iter()
    .collect();
    let Value::Num(got) = eval_expr(&ev.value, &env).expect("eval update") else { panic!() };
    assert!(
        (got - expect).abs() < 1e-9,
        "solved update {} differs from analytic {}",
        got,
        expect
    );
}

#[test]
fn small_step_integration_stays_close_to_the_exact_solution() {
    let parsed = parse_mechanism(KD).expect("parse");
    let solved = lower(&parsed).expect("lower");
    let ResolvedExpr::Evolve(ev) = &*solved.evolutions[0] else { panic!() };

    let (v, q) = (-40e-3f64, 0.1f64);
    let ninf = 1.0 / (1.0 + (-(v + 55e-3) / 10e-3).exp());
    let tau = 3e-3 / (1.0 + q * (-(v + 60e-3) / 40e-3).exp());

    // integrate 100 steps of dt and compare against the exact relaxation
    let dt = 1e-5f64;
    let mut n = 0.05f64;
    for _ in 0..100 {
        let env: HashMap<String, Value> = [
            ("v".to_string(), Value::Num(v)),
            ("n".to_string(), Value::Num(n)),
            ("dt".to_string(), Value::Num(dt)),
        ]
        .into_iter()
        .collect();
        let Value::Num(next) = eval_expr(&ev.value, &env).expect("eval") else { panic!() };
        n = next;
    }
    let exact = ninf + (0.05 - ninf) * (-100.0 * dt / tau).exp();
    assert!((n - exact).abs() < 1e-9, "integrated {} vs exact {}", n, exact);
}

#[test]
fn the_optimizer_performs_the_classic_rewrites() {
    // CSE then copy propagation: let a = x*y; let b = x*y; a+b becomes a+a
    let src = r#"density d {
        parameter x = 2.0;
        parameter y = 3.0;
        parameter p = (let a = x*y; let b = x*y; a + b)*1.0;
    }"#;
    let m = resolved(src);
    let m = single_assign_mechanism(&canonicalize_mechanism(&m));
    let optimized = Optimizer::standard().optimize(&m);
    let last = optimized.parameters.last().unwrap().clone();
    let ResolvedExpr::Parameter(p) = &*last else {
        panic!()
    };
    // only one multiplication of x and y survives
    let rendered = ionc_compiler::pretty::body_to_string(&p.value, "");
    let product_count = rendered.matches("(x * y)").count();
    assert_eq!(product_count, 1, "duplicate products survive:\n{}", rendered);
}
