//! The fixpoint optimizer: CSE, constant folding, copy propagation, and
//! dead-code elimination run in a fixed order until a full round reports no
//! change. Every pass is monotone in the node count, so the fixpoint is
//! reached in a number of rounds bounded by the mechanism size.

use std::rc::Rc;

use tracing::debug;

use crate::ir::*;

pub mod constant_fold;
pub mod copy_propagate;
pub mod cse;
pub mod dce;

/// One rewrite over a mechanism. Passes are pure: they consume the input by
/// reference and build a fresh tree.
pub trait Pass {
    fn name(&self) -> &'static str;
    fn run(&self, m: &ResolvedMechanism) -> (ResolvedMechanism, bool);
}

pub struct Optimizer {
    passes: Vec<Box<dyn Pass>>,
}

impl Optimizer {
    /// The standard pipeline, in the canonical order.
    pub fn standard() -> Self {
        Self {
            passes: vec![
                Box::new(cse::Cse),
                Box::new(constant_fold::ConstantFold),
                Box::new(copy_propagate::CopyPropagate),
                Box::new(dce::EliminateDeadCode),
            ],
        }
    }

    pub fn optimize(&self, m: &ResolvedMechanism) -> ResolvedMechanism {
        let mut mech = m.clone();
        let mut round = 0usize;
        loop {
            let mut changed = false;
            for pass in &self.passes {
                let (next, pass_changed) = pass.run(&mech);
                debug!(pass = pass.name(), round, changed = pass_changed, "optimizer pass");
                mech = next;
                changed |= pass_changed;
            }
            if !changed {
                break;
            }
            round += 1;
        }
        mech
    }

    /// Run a single full round; used by the fixpoint-idempotence tests.
    pub fn one_round(&self, m: &ResolvedMechanism) -> (ResolvedMechanism, bool) {
        let mut mech = m.clone();
        let mut changed = false;
        for pass in &self.passes {
            let (next, pass_changed) = pass.run(&mech);
            mech = next;
            changed |= pass_changed;
        }
        (mech, changed)
    }
}

/// Total node count over every body in the mechanism; the measure the
/// optimizer is monotone in.
pub fn mechanism_size(m: &ResolvedMechanism) -> usize {
    let mut n = 0;
    for_each_body(m, |e| n += node_count(e));
    n
}

pub(crate) fn for_each_body<F: FnMut(&RExpr)>(m: &ResolvedMechanism, mut f: F) {
    for e in m
        .parameters
        .iter()
        .chain(&m.functions)
        .chain(&m.initials)
        .chain(&m.evolutions)
        .chain(&m.effects)
    {
        match &**e {
            ResolvedExpr::Parameter(x) => f(&x.value),
            ResolvedExpr::Function(x) => f(&x.body),
            ResolvedExpr::Initial(x) => f(&x.value),
            ResolvedExpr::Evolve(x) => f(&x.value),
            ResolvedExpr::Effect(x) => f(&x.value),
            _ => {}
        }
    }
}

/// Apply a body transformation to every value expression in the mechanism.
pub(crate) fn map_bodies<F>(m: &ResolvedMechanism, mut f: F) -> (ResolvedMechanism, bool)
where
    F: FnMut(&RExpr) -> (RExpr, bool),
{
    let mut changed = false;
    let mut out = m.clone();
    let mut apply = |e: &RExpr, changed: &mut bool| -> RExpr {
        match &**e {
            ResolvedExpr::Parameter(x) => {
                let (value, c) = f(&x.value);
                *changed |= c;
                let mut y = x.clone();
                y.value = value;
                Rc::new(ResolvedExpr::Parameter(y))
            }
            ResolvedExpr::Function(x) => {
                let (body, c) = f(&x.body);
                *changed |= c;
                let mut y = x.clone();
                y.body = body;
                Rc::new(ResolvedExpr::Function(y))
            }
            ResolvedExpr::Initial(x) => {
                let (value, c) = f(&x.value);
                *changed |= c;
                let mut y = x.clone();
                y.value = value;
                Rc::new(ResolvedExpr::Initial(y))
            }
            ResolvedExpr::Evolve(x) => {
                let (value, c) = f(&x.value);
                *changed |= c;
                let mut y = x.clone();
                y.value = value;
                Rc::new(ResolvedExpr::Evolve(y))
            }
            ResolvedExpr::Effect(x) => {
                let (value, c) = f(&x.value);
                *changed |= c;
                let mut y = x.clone();
                y.value = value;
                Rc::new(ResolvedExpr::Effect(y))
            }
            _ => e.clone(),
        }
    };

    out.parameters = m.parameters.iter().map(|e| apply(e, &mut changed)).collect();
    out.functions = m.functions.iter().map(|e| apply(e, &mut changed)).collect();
    out.initials = m.initials.iter().map(|e| apply(e, &mut changed)).collect();
    out.evolutions = m.evolutions.iter().map(|e| apply(e, &mut changed)).collect();
    out.effects = m.effects.iter().map(|e| apply(e, &mut changed)).collect();
    (out, changed)
}
