//! The hand-off structure consumed by the printer.
//!
//! Gathers the solved, simplified procedure bodies plus four auxiliary
//! tables (parameter, state, bind, and effect sources) and, per procedure,
//! a read map from pointer name to local variable and a write map from
//! pointer name to the variable holding the value to store. Externally
//! visible pointers carry the `_pp_` prefix.

use std::collections::HashMap;
use std::rc::Rc;

use ionc_lang::ast::{Affectable, Bindable, MechanismKind};

use crate::ir::*;
use crate::rtype::ResolvedType;
use crate::simplify::{gen_state_field_map, simplify_expr, simplify_type, StateFieldMap};
use crate::{CompileError, Result};

pub const PP_PREFIX: &str = "_pp_";

#[derive(Debug, Clone, Default)]
pub struct ReadMap {
    /// pointer name → local variable name
    pub state_map: HashMap<String, String>,
    pub parameter_map: HashMap<String, String>,
    pub binding_map: HashMap<String, String>,
}

#[derive(Debug, Clone, Default)]
pub struct WriteMap {
    /// pointer name → variable (or literal) holding the value to store
    pub state_map: HashMap<String, String>,
    pub parameter_map: HashMap<String, String>,
    pub effect_map: HashMap<String, String>,
}

/// Storage and pointer declarations the host needs.
#[derive(Debug, Clone, Default)]
pub struct FieldPack {
    pub param_sources: Vec<String>,
    pub state_sources: Vec<String>,
    pub bind_sources: Vec<(Bindable, Option<String>, String)>,
    pub effect_sources: Vec<(Affectable, Option<String>, String)>,
}

/// The procedure bodies, post-solve and type-erased.
#[derive(Debug, Clone, Default)]
pub struct ProcedurePack {
    pub constant_parameters: Vec<RExpr>,
    pub assigned_parameters: Vec<RExpr>,
    pub initializations: Vec<RExpr>,
    pub effects: Vec<RExpr>,
    pub evolutions: Vec<RExpr>,
}

#[derive(Debug, Clone)]
pub struct PrintableMechanism {
    pub name: String,
    pub kind: MechanismKind,
    pub procedure_pack: ProcedurePack,
    pub field_pack: FieldPack,
    pub state_field_map: StateFieldMap,

    pub init_read_map: ReadMap,
    pub init_write_map: WriteMap,
    pub effect_read_map: ReadMap,
    pub effect_write_map: WriteMap,
    pub evolve_read_map: ReadMap,
    pub evolve_write_map: WriteMap,
}

pub fn pp_name(n: &str) -> String {
    format!("{}{}", PP_PREFIX, n)
}

pub fn printable_mechanism(m: &ResolvedMechanism) -> Result<PrintableMechanism> {
    let sfm = gen_state_field_map(&m.states);

    let mut field_pack = FieldPack::default();
    for s in &m.states {
        let ResolvedExpr::State(s) = &**s else { continue };
        match &*s.ty {
            ResolvedType::Record { fields, .. } => {
                for (f, _) in fields {
                    field_pack.state_sources.push(format!("{}_{}", s.name, f));
                }
            }
            _ => field_pack.state_sources.push(s.name.clone()),
        }
    }
    for b in &m.bindings {
        let ResolvedExpr::Bind(b) = &**b else { continue };
        field_pack.bind_sources.push((b.kind, b.ion.clone(), b.name.clone()));
    }
    for e in &m.effects {
        let ResolvedExpr::Effect(e) = &**e else { continue };
        field_pack
            .effect_sources
            .push((e.kind, e.ion.clone(), effect_variable_name(e.kind, e.ion.as_deref())));
    }

    let mut procedure_pack = ProcedurePack::default();
    let mut init_write_map = WriteMap::default();
    let mut effect_write_map = WriteMap::default();
    let mut evolve_write_map = WriteMap::default();

    for p in &m.parameters {
        let ResolvedExpr::Parameter(p) = &**p else {
            return Err(CompileError::InternalInvariant(
                "parameter list holds a non-parameter declaration".to_string(),
            ));
        };
        field_pack.param_sources.push(p.name.clone());
        let value = simplify_expr(&p.value, &sfm)?;
        let node = Rc::new(ResolvedExpr::Parameter(ResolvedParameter {
            name: p.name.clone(),
            value: value.clone(),
            ty: simplify_type(&p.ty),
            loc: p.loc,
        }));
        if is_trivial(&value) && !matches!(&*value, ResolvedExpr::Argument(_)) {
            procedure_pack.constant_parameters.push(node);
        } else {
            init_write_map
                .parameter_map
                .insert(pp_name(&p.name), result_variable(&value)?);
            procedure_pack.assigned_parameters.push(node);
        }
    }

    for i in &m.initials {
        let ResolvedExpr::Initial(i) = &**i else {
            return Err(CompileError::InternalInvariant(
                "initial list holds a non-initial declaration".to_string(),
            ));
        };
        let value = simplify_expr(&i.value, &sfm)?;
        fill_state_writes(&i.target, &value, &sfm, &mut init_write_map)?;
        procedure_pack.initializations.push(Rc::new(ResolvedExpr::Initial(ResolvedInitial {
            target: i.target.clone(),
            value,
            ty: simplify_type(&i.ty),
            loc: i.loc,
        })));
    }

    for e in &m.effects {
        let ResolvedExpr::Effect(e) = &**e else {
            return Err(CompileError::InternalInvariant(
                "effect list holds a non-effect declaration".to_string(),
            ));
        };
        let value = simplify_expr(&e.value, &sfm)?;
        let target = effect_variable_name(e.kind, e.ion.as_deref());
        effect_write_map.effect_map.insert(pp_name(&target), result_variable(&value)?);
        procedure_pack.effects.push(Rc::new(ResolvedExpr::Effect(ResolvedEffect {
            kind: e.kind,
            ion: e.ion.clone(),
            value,
            ty: simplify_type(&e.ty),
            loc: e.loc,
        })));
    }

    for ev in &m.evolutions {
        let ResolvedExpr::Evolve(ev) = &**ev else {
            return Err(CompileError::InternalInvariant(
                "evolve list holds a non-evolve declaration".to_string(),
            ));
        };
        let value = simplify_expr(&ev.value, &sfm)?;
        fill_state_writes(&ev.target, &value, &sfm, &mut evolve_write_map)?;
        procedure_pack.evolutions.push(Rc::new(ResolvedExpr::Evolve(ResolvedEvolve {
            target: ev.target.clone(),
            value,
            ty: simplify_type(&ev.ty),
            loc: ev.loc,
        })));
    }

    let init_read_map = gather_reads(
        procedure_pack
            .assigned_parameters
            .iter()
            .chain(&procedure_pack.initializations),
        &field_pack,
    );
    let effect_read_map = gather_reads(procedure_pack.effects.iter(), &field_pack);
    let evolve_read_map = gather_reads(procedure_pack.evolutions.iter(), &field_pack);

    Ok(PrintableMechanism {
        name: m.name.clone(),
        kind: m.kind,
        procedure_pack,
        field_pack,
        state_field_map: sfm,
        init_read_map,
        init_write_map,
        effect_read_map,
        effect_write_map,
        evolve_read_map,
        evolve_write_map,
    })
}

/// A stable variable name for an effect target.
pub fn effect_variable_name(kind: Affectable, ion: Option<&str>) -> String {
    let base = match kind {
        Affectable::CurrentDensityContribution | Affectable::CurrentContribution => "i",
        Affectable::MolarFluxContribution => "flux",
        Affectable::InternalConcentrationRate => "xi",
        Affectable::ExternalConcentrationRate => "xo",
    };
    match ion {
        Some(ion) => format!("{}_{}", base, ion),
        None => base.to_string(),
    }
}

/// The token the printer stores for a body's result: the result variable's
/// name, or the literal itself when the body folded to a constant.
fn result_variable(body: &RExpr) -> Result<String> {
    let mut cursor = body;
    while let ResolvedExpr::Let(l) = &**cursor {
        cursor = &l.body;
    }
    match &**cursor {
        ResolvedExpr::Argument(a) => Ok(a.name.clone()),
        ResolvedExpr::Float(f) => Ok(format!("{:?}", f.value)),
        ResolvedExpr::Int(i) => Ok(format!("{}", i.value)),
        other => Err(CompileError::InternalInvariant(format!(
            "body result is not an atom at {}",
            other.loc()
        ))),
    }
}

/// Map a body writing a (possibly record) state to per-pointer entries.
fn fill_state_writes(
    target: &str,
    body: &RExpr,
    sfm: &StateFieldMap,
    writes: &mut WriteMap,
) -> Result<()> {
    match sfm.get(target) {
        None => {
            writes.state_map.insert(pp_name(target), result_variable(body)?);
            Ok(())
        }
        Some(fields) => {
            // trace the result atom back to its defining object
            let mut defs: HashMap<&str, &RExpr> = HashMap::new();
            let mut cursor = body;
            while let ResolvedExpr::Let(l) = &**cursor {
                defs.insert(&l.name, &l.value);
                cursor = &l.body;
            }
            let object = match &**cursor {
                ResolvedExpr::Object(o) => o,
                ResolvedExpr::Argument(a) => match defs.get(a.name.as_str()) {
                    Some(def) => match &***def {
                        ResolvedExpr::Object(o) => o,
                        _ => {
                            return Err(CompileError::InternalInvariant(format!(
                                "record state '{}' is not written through an object",
                                target
                            )))
                        }
                    },
                    None => {
                        return Err(CompileError::InternalInvariant(format!(
                            "record state '{}' is not written through an object",
                            target
                        )))
                    }
                },
                _ => {
                    return Err(CompileError::InternalInvariant(format!(
                        "record state '{}' is not written through an object",
                        target
                    )))
                }
            };
            for (fname, fvalue) in &object.fields {
                let Some(flat) = fields.get(fname) else {
                    return Err(CompileError::InternalInvariant(format!(
                        "state '{}' has no field '{}'",
                        target, fname
                    )));
                };
                writes.state_map.insert(pp_name(flat), result_variable(fvalue)?);
            }
            Ok(())
        }
    }
}

/// Per procedure group: which parameters, states, and bindings the bodies
/// read, keyed by pointer name.
fn gather_reads<'a>(
    bodies: impl Iterator<Item = &'a RExpr>,
    field_pack: &FieldPack,
) -> ReadMap {
    let mut reads = std::collections::HashSet::new();
    let mut locals = Vec::new();
    for e in bodies {
        let value = match &**e {
            ResolvedExpr::Parameter(x) => &x.value,
            ResolvedExpr::Initial(x) => &x.value,
            ResolvedExpr::Evolve(x) => &x.value,
            ResolvedExpr::Effect(x) => &x.value,
            _ => continue,
        };
        read_arguments(value, &mut reads);
        bound_names(value, &mut locals);
    }
    for l in locals {
        reads.remove(&l);
    }

    let mut map = ReadMap::default();
    for name in reads {
        if field_pack.param_sources.iter().any(|p| p == &name) {
            map.parameter_map.insert(pp_name(&name), name);
        } else if field_pack.state_sources.iter().any(|s| s == &name) {
            map.state_map.insert(pp_name(&name), name);
        } else if field_pack.bind_sources.iter().any(|(_, _, b)| b == &name) {
            map.binding_map.insert(pp_name(&name), name);
        }
    }
    map
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::canonicalize::canonicalize_mechanism;
    use crate::inline::inline_mechanism;
    use crate::opt::Optimizer;
    use crate::resolve::resolve_mechanism;
    use crate::single_assign::single_assign_mechanism;
    use crate::solver::solve_mechanism;
    use ionc_lang::normalize::normalize_mechanism;
    use ionc_lang::parse_mechanism;

    fn printable(src: &str) -> PrintableMechanism {
        let m = parse_mechanism(src).expect("parse");
        let r = resolve_mechanism(&normalize_mechanism(&m)).expect("resolve");
        let m = single_assign_mechanism(&canonicalize_mechanism(&r));
        let opt = Optimizer::standard();
        let m = opt.optimize(&m);
        let m = inline_mechanism(&m).expect("inline");
        let m = opt.optimize(&m);
        let m = solve_mechanism(&m).expect("solve");
        printable_mechanism(&m).expect("printable")
    }

    #[test]
    fn passive_channel_maps() {
        let p = printable(
            r#"density pas {
                parameter g = 0.001 [S/cm^2];
                parameter e_rev = -70 [mV];
                bind v = membrane_potential;
                effect current_density = g*(v - e_rev);
                export g;
            }"#,
        );
        assert_eq!(p.field_pack.param_sources, vec!["g", "e_rev"]);
        // e_rev folds to a literal, g is a plain literal: both constant
        assert_eq!(p.procedure_pack.constant_parameters.len(), 2);
        assert!(p.procedure_pack.assigned_parameters.is_empty());

        // the effect reads v, g, and e_rev and writes _pp_i
        assert_eq!(p.effect_read_map.binding_map.get("_pp_v"), Some(&"v".to_string()));
        assert_eq!(p.effect_read_map.parameter_map.get("_pp_g"), Some(&"g".to_string()));
        assert!(p.effect_write_map.effect_map.contains_key("_pp_i"));
    }

    #[test]
    fn gated_channel_evolve_maps() {
        let p = printable(
            r#"density kd {
                parameter gbar = 1e-5 [S/cm^2];
                parameter ek = -77 [mV];
                bind v = membrane_potential(k);
                state n : real;
                initial n = 0.5;
                evolve n' = (1.0 - n)/3 [ms];
                effect current_density(k) = gbar*n^4*(v - ek);
            }"#,
        );
        assert_eq!(p.field_pack.state_sources, vec!["n"]);
        // the solver introduced dt; the evolve body must read it
        assert!(p.evolve_read_map.binding_map.contains_key("_pp_dt"));
        assert!(p.evolve_read_map.state_map.contains_key("_pp_n"));
        assert!(p.evolve_write_map.state_map.contains_key("_pp_n"));
        assert!(p.init_write_map.state_map.contains_key("_pp_n"));
        assert!(p.effect_write_map.effect_map.contains_key("_pp_i_k"));
    }

    #[test]
    fn record_states_flatten_into_per_field_pointers() {
        let p = printable(
            r#"point syn {
                record gates { a: real; b: real; };
                state s : gates;
                initial s = { a = 0.1; b = 0.2; };
                evolve s' = { a = -s.a/0.5 [ms]; b = -s.b/2 [ms]; };
            }"#,
        );
        assert_eq!(p.field_pack.state_sources, vec!["s_a", "s_b"]);
        assert!(p.init_write_map.state_map.contains_key("_pp_s_a"));
        assert!(p.init_write_map.state_map.contains_key("_pp_s_b"));
        assert!(p.evolve_write_map.state_map.contains_key("_pp_s_a"));
        assert!(p.evolve_read_map.state_map.contains_key("_pp_s_a"));
        assert_eq!(p.state_field_map["s"]["a"], "s_a");
    }
}
