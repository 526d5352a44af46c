//! Property tests over generated expression trees: A-normal form after
//! canonicalization, single-assignment uniqueness, optimizer monotonicity
//! and fixpoint idempotence, and bitwise semantic preservation through the
//! pure stages.

use std::collections::{HashMap, HashSet};

use proptest::prelude::*;

use ionc_compiler::canonicalize::{canonicalize_mechanism, is_canonical};
use ionc_compiler::interp::{eval_expr, Value};
use ionc_compiler::ir::{ResolvedExpr, ResolvedMechanism, RExpr};
use ionc_compiler::opt::{mechanism_size, Optimizer};
use ionc_compiler::resolve::resolve_mechanism;
use ionc_compiler::single_assign::{all_bound_names, single_assign_mechanism};
use ionc_lang::normalize::normalize_mechanism;
use ionc_lang::parse_mechanism;

/// Random dimensionless expressions over the parameters x, y, z.
fn arb_expr() -> impl Strategy<Value = String> {
    let leaf = prop_oneof![
        Just("x".to_string()),
        Just("y".to_string()),
        Just("z".to_string()),
        (0u32..10).prop_map(|v| format!("{}.5", v)),
        (1u32..5).prop_map(|v| format!("{}", v)),
    ];
    leaf.prop_recursive(5, 48, 3, |inner| {
        prop_oneof![
            (inner.clone(), inner.clone()).prop_map(|(a, b)| format!("({} + {})", a, b)),
            (inner.clone(), inner.clone()).prop_map(|(a, b)| format!("({} - {})", a, b)),
            (inner.clone(), inner.clone()).prop_map(|(a, b)| format!("({} * {})", a, b)),
            (inner.clone(), inner.clone()).prop_map(|(a, b)| format!("min({}, {})", a, b)),
            inner.clone().prop_map(|a| format!("(-{})", a)),
            (inner.clone(), inner.clone())
                .prop_map(|(a, b)| format!("(let w = {}; ({} + w))", a, b)),
            (inner.clone(), inner.clone(), inner)
                .prop_map(|(c, a, b)| format!("(if {} < {} {{ {} }} else {{ {} }})", c, a, a, b)),
        ]
    })
}

fn mechanism_for(expr: &str) -> ResolvedMechanism {
    let src = format!(
        "density gen {{ parameter x = 1.0; parameter y = 2.0; parameter z = 3.0; parameter p = {}; }}",
        expr
    );
    let parsed = parse_mechanism(&src).expect("generated source parses");
    resolve_mechanism(&normalize_mechanism(&parsed)).expect("generated source resolves")
}

fn last_parameter_body(m: &ResolvedMechanism) -> RExpr {
    let last = m.parameters.last().unwrap().clone();
    let ResolvedExpr::Parameter(p) = &*last else {
        panic!("expected a parameter")
    };
    p.value.clone()
}

fn eval_bits(e: &RExpr, x: f64, y: f64, z: f64) -> u64 {
    let env: HashMap<String, Value> = [
        ("x".to_string(), Value::Num(x)),
        ("y".to_string(), Value::Num(y)),
        ("z".to_string(), Value::Num(z)),
    ]
    .into_iter()
    .collect();
    match eval_expr(e, &env).expect("evaluation") {
        Value::Num(v) => v.to_bits(),
        other => panic!("expected a number, got {:?}", other),
    }
}

proptest! {
    #[test]
    fn canonicalization_produces_a_normal_form(expr in arb_expr()) {
        let m = canonicalize_mechanism(&mechanism_for(&expr));
        prop_assert!(is_canonical(&last_parameter_body(&m)));
    }

    #[test]
    fn single_assignment_names_are_unique(expr in arb_expr()) {
        let m = single_assign_mechanism(&canonicalize_mechanism(&mechanism_for(&expr)));
        let names = all_bound_names(&m);
        let unique: HashSet<_> = names.iter().collect();
        prop_assert_eq!(unique.len(), names.len());
    }

    #[test]
    fn each_optimizer_round_is_monotone_in_node_count(expr in arb_expr()) {
        let m = single_assign_mechanism(&canonicalize_mechanism(&mechanism_for(&expr)));
        let opt = Optimizer::standard();
        let before = mechanism_size(&m);
        let (after_one, _) = opt.one_round(&m);
        prop_assert!(mechanism_size(&after_one) <= before);
    }

    #[test]
    fn the_optimizer_reaches_a_fixpoint(expr in arb_expr()) {
        let m = single_assign_mechanism(&canonicalize_mechanism(&mechanism_for(&expr)));
        let opt = Optimizer::standard();
        let optimized = opt.optimize(&m);
        let (_, changed) = opt.one_round(&optimized);
        prop_assert!(!changed, "a second round over an optimizer output changed the tree");
    }

    #[test]
    fn pure_stages_preserve_bitwise_evaluation(
        expr in arb_expr(),
        x in -8.0f64..8.0,
        y in -8.0f64..8.0,
        z in -8.0f64..8.0,
    ) {
        let resolved = mechanism_for(&expr);
        let canonical = canonicalize_mechanism(&resolved);
        let ssa = single_assign_mechanism(&canonical);
        let optimized = Optimizer::standard().optimize(&ssa);

        let reference = eval_bits(&last_parameter_body(&resolved), x, y, z);
        prop_assert_eq!(eval_bits(&last_parameter_body(&canonical), x, y, z), reference);
        prop_assert_eq!(eval_bits(&last_parameter_body(&ssa), x, y, z), reference);
        prop_assert_eq!(eval_bits(&last_parameter_body(&optimized), x, y, z), reference);
    }
}
