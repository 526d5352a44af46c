//! Text emission of the compiled mechanism: a host-visible descriptor
//! header and a CPU translation unit with init / compute-currents /
//! advance-state procedures, both wrapped in the requested namespace.
//!
//! Everything here consumes the `PrintableMechanism` hand-off structure;
//! the pointer names in its read/write maps become the members of the
//! parameter pack the host fills in.

use std::fmt::Write as _;

use ionc_compiler::ir::{ResolvedExpr, RExpr};
use ionc_compiler::printable::{pp_name, PrintableMechanism, ReadMap, WriteMap};
use ionc_lang::ast::{BinaryOp, MechanismKind, UnaryOp};

/// Emission errors: a body the C++ renderer cannot express.
#[derive(thiserror::Error, Debug)]
pub enum PrintError {
    #[error("cannot print expression: {0}")]
    Unprintable(String),
}

pub type Result<T> = std::result::Result<T, PrintError>;

fn kind_name(kind: MechanismKind) -> &'static str {
    match kind {
        MechanismKind::Point => "point",
        MechanismKind::Density => "density",
        MechanismKind::Concentration => "concentration",
        MechanismKind::ReversalPotential => "reversal_potential",
        MechanismKind::Junction => "junction",
    }
}

/// The `<prefix>.hpp` contents: the mechanism descriptor the host links
/// against.
pub fn print_header(mech: &PrintableMechanism, namespace: &str) -> Result<String> {
    let mut out = String::new();
    let guard = format!("{}_{}", namespace.to_uppercase(), mech.name.to_uppercase());

    let _ = writeln!(out, "#pragma once");
    let _ = writeln!(out);
    let _ = writeln!(out, "#include <cstddef>");
    let _ = writeln!(out);
    let _ = writeln!(out, "// generated by ionc; do not edit");
    let _ = writeln!(out, "namespace {} {{", namespace);
    let _ = writeln!(out, "namespace {}_mech {{", mech.name);
    let _ = writeln!(out);
    let _ = writeln!(out, "struct {}_pack {{", mech.name);
    let _ = writeln!(out, "    std::size_t width = 0;");
    for p in &mech.field_pack.param_sources {
        let _ = writeln!(out, "    double* {} = nullptr; // parameter {}", pp_name(p), p);
    }
    for s in &mech.field_pack.state_sources {
        let _ = writeln!(out, "    double* {} = nullptr; // state {}", pp_name(s), s);
    }
    for (kind, ion, name) in &mech.field_pack.bind_sources {
        let ion_note = match ion {
            Some(ion) => format!(" ({})", ion),
            None => String::new(),
        };
        let _ = writeln!(
            out,
            "    const double* {} = nullptr; // bind {}{}",
            pp_name(name),
            kind.name(),
            ion_note
        );
    }
    for (kind, ion, name) in &mech.field_pack.effect_sources {
        let ion_note = match ion {
            Some(ion) => format!(" ({})", ion),
            None => String::new(),
        };
        let _ = writeln!(
            out,
            "    double* {} = nullptr; // effect {}{}",
            pp_name(name),
            kind.name(),
            ion_note
        );
    }
    let _ = writeln!(out, "}};");
    let _ = writeln!(out);
    let _ = writeln!(out, "// kind: {}", kind_name(mech.kind));
    let _ = writeln!(out, "inline constexpr const char* {}_kind = \"{}\";", mech.name, kind_name(mech.kind));
    let _ = writeln!(out);

    // default values for constant parameters
    let _ = writeln!(out, "struct {}_defaults {{", mech.name);
    for p in &mech.procedure_pack.constant_parameters {
        if let ResolvedExpr::Parameter(p) = &**p {
            let value = print_expression_inline(&p.value)?;
            let _ = writeln!(out, "    static constexpr double {} = {};", p.name, value);
        }
    }
    let _ = writeln!(out, "}};");
    let _ = writeln!(out);
    let _ = writeln!(out, "void init({}_pack& pp);", mech.name);
    let _ = writeln!(out, "void compute_currents({}_pack& pp);", mech.name);
    let _ = writeln!(out, "void advance_state({}_pack& pp);", mech.name);
    let _ = writeln!(out);
    let _ = writeln!(out, "}} // namespace {}_mech", mech.name);
    let _ = writeln!(out, "}} // namespace {}", namespace);
    let _ = writeln!(out, "// include guard token: {}", guard);
    Ok(out)
}

/// The `<prefix>_cpu.cpp` contents: the three mechanism procedures.
pub fn print_mechanism(mech: &PrintableMechanism, namespace: &str, header: &str) -> Result<String> {
    let mut out = String::new();
    let _ = writeln!(out, "#include <cmath>");
    let _ = writeln!(out);
    let _ = writeln!(out, "#include \"{}\"", header);
    let _ = writeln!(out);
    let _ = writeln!(out, "namespace {} {{", namespace);
    let _ = writeln!(out, "namespace {}_mech {{", mech.name);
    let _ = writeln!(out);
    let _ = writeln!(out, "namespace {{");
    let _ = writeln!(out, "double exprelr(double x) {{");
    let _ = writeln!(out, "    if (x == 0.) return 1.;");
    let _ = writeln!(out, "    return x/std::expm1(x);");
    let _ = writeln!(out, "}}");
    let _ = writeln!(out, "}} // namespace");
    let _ = writeln!(out);

    print_procedure(
        &mut out,
        mech,
        "init",
        mech.procedure_pack
            .assigned_parameters
            .iter()
            .chain(&mech.procedure_pack.initializations),
        &mech.init_read_map,
        &mech.init_write_map,
    )?;
    print_procedure(
        &mut out,
        mech,
        "compute_currents",
        mech.procedure_pack.effects.iter(),
        &mech.effect_read_map,
        &mech.effect_write_map,
    )?;
    print_procedure(
        &mut out,
        mech,
        "advance_state",
        mech.procedure_pack.evolutions.iter(),
        &mech.evolve_read_map,
        &mech.evolve_write_map,
    )?;

    let _ = writeln!(out, "}} // namespace {}_mech", mech.name);
    let _ = writeln!(out, "}} // namespace {}", namespace);
    Ok(out)
}

fn print_procedure<'a>(
    out: &mut String,
    mech: &PrintableMechanism,
    name: &str,
    bodies: impl Iterator<Item = &'a RExpr>,
    reads: &ReadMap,
    writes: &WriteMap,
) -> Result<()> {
    let _ = writeln!(out, "void {}({}_pack& pp) {{", name, mech.name);
    let _ = writeln!(out, "    for (std::size_t i = 0; i < pp.width; ++i) {{");

    let mut read_lines: Vec<(String, String)> = Vec::new();
    for (ptr, var) in reads
        .parameter_map
        .iter()
        .chain(&reads.state_map)
        .chain(&reads.binding_map)
    {
        read_lines.push((var.clone(), ptr.clone()));
    }
    read_lines.sort();
    for (var, ptr) in read_lines {
        let _ = writeln!(out, "        const double {} = pp.{}[i];", var, ptr);
    }

    for body in bodies {
        let value = match &**body {
            ResolvedExpr::Parameter(p) => &p.value,
            ResolvedExpr::Initial(i) => &i.value,
            ResolvedExpr::Evolve(e) => &e.value,
            ResolvedExpr::Effect(e) => &e.value,
            other => {
                return Err(PrintError::Unprintable(format!(
                    "unexpected declaration in a procedure body at {}",
                    other.loc()
                )))
            }
        };
        print_body(out, value)?;
    }

    let mut write_lines: Vec<(String, String)> = Vec::new();
    for (ptr, var) in writes
        .parameter_map
        .iter()
        .chain(&writes.state_map)
        .chain(&writes.effect_map)
    {
        write_lines.push((ptr.clone(), var.clone()));
    }
    write_lines.sort();
    for (ptr, var) in write_lines {
        let _ = writeln!(out, "        pp.{}[i] = {};", ptr, var);
    }

    let _ = writeln!(out, "    }}");
    let _ = writeln!(out, "}}");
    let _ = writeln!(out);
    Ok(())
}

/// A canonical body: one `const double` per let binding. The final atom is
/// not emitted here; the write maps name it.
fn print_body(out: &mut String, e: &RExpr) -> Result<()> {
    let mut cursor = e;
    while let ResolvedExpr::Let(l) = &**cursor {
        let value = print_expression_inline(&l.value)?;
        let _ = writeln!(out, "        const double {} = {};", l.name, value);
        cursor = &l.body;
    }
    if let ResolvedExpr::Object(o) = &**cursor {
        // record-state results reach the stores through their field atoms
        for (field, v) in &o.fields {
            if !matches!(&**v, ResolvedExpr::Argument(_) | ResolvedExpr::Float(_) | ResolvedExpr::Int(_)) {
                return Err(PrintError::Unprintable(format!(
                    "record field '{}' is not an atom",
                    field
                )));
            }
        }
    }
    Ok(())
}

/// C++ rendering of one simplified expression.
pub fn print_expression_inline(e: &RExpr) -> Result<String> {
    match &**e {
        ResolvedExpr::Argument(a) => Ok(a.name.clone()),
        ResolvedExpr::Float(f) => Ok(format_double(f.value)),
        ResolvedExpr::Int(i) => Ok(format!("{}.", i.value)),
        ResolvedExpr::Unary(u) => {
            let arg = print_expression_inline(&u.arg)?;
            Ok(match u.op {
                UnaryOp::Neg => format!("-{}", arg),
                UnaryOp::Not => format!("!{}", arg),
                UnaryOp::Exp => format!("std::exp({})", arg),
                UnaryOp::Sin => format!("std::sin({})", arg),
                UnaryOp::Cos => format!("std::cos({})", arg),
                UnaryOp::Log => format!("std::log({})", arg),
                UnaryOp::Abs => format!("std::fabs({})", arg),
                UnaryOp::Exprelr => format!("exprelr({})", arg),
            })
        }
        ResolvedExpr::Binary(b) => {
            let lhs = print_expression_inline(&b.lhs)?;
            let rhs = print_expression_inline(&b.rhs)?;
            Ok(match b.op {
                BinaryOp::Add => format!("({} + {})", lhs, rhs),
                BinaryOp::Sub => format!("({} - {})", lhs, rhs),
                BinaryOp::Mul => format!("({}*{})", lhs, rhs),
                BinaryOp::Div => format!("({}/{})", lhs, rhs),
                BinaryOp::Pow => format!("std::pow({}, {})", lhs, rhs),
                BinaryOp::Min => format!("std::min({}, {})", lhs, rhs),
                BinaryOp::Max => format!("std::max({}, {})", lhs, rhs),
                BinaryOp::Lt => format!("({} < {})", lhs, rhs),
                BinaryOp::Le => format!("({} <= {})", lhs, rhs),
                BinaryOp::Gt => format!("({} > {})", lhs, rhs),
                BinaryOp::Ge => format!("({} >= {})", lhs, rhs),
                BinaryOp::Eq => format!("({} == {})", lhs, rhs),
                BinaryOp::Ne => format!("({} != {})", lhs, rhs),
                BinaryOp::And => format!("({} && {})", lhs, rhs),
                BinaryOp::Or => format!("({} || {})", lhs, rhs),
                BinaryOp::Dot => {
                    return Err(PrintError::Unprintable(
                        "field access survived simplification".to_string(),
                    ))
                }
            })
        }
        ResolvedExpr::If(i) => Ok(format!(
            "({} ? {} : {})",
            print_expression_inline(&i.condition)?,
            print_expression_inline(&i.if_true)?,
            print_expression_inline(&i.if_false)?
        )),
        other => Err(PrintError::Unprintable(format!(
            "expression form not expressible in generated code at {}",
            other.loc()
        ))),
    }
}

fn format_double(v: f64) -> String {
    if v == v.trunc() && v.abs() < 1e15 {
        format!("{:.1}", v)
    } else {
        format!("{:e}", v)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ionc_compiler::compile;
    use ionc_lang::parse_mechanism;

    const PAS: &str = r#"
        density pas {
            parameter g = 0.001 [S/cm^2];
            parameter e_rev = -70 [mV];
            bind v = membrane_potential;
            effect current_density = g*(v - e_rev);
            export g;
        }
    "#;

    fn printable() -> ionc_compiler::printable::PrintableMechanism {
        let parsed = parse_mechanism(PAS).expect("parse");
        compile(&parsed).expect("compile")
    }

    #[test]
    fn header_declares_the_pack_and_procedures() {
        let hpp = print_header(&printable(), "arb").expect("print");
        assert!(hpp.contains("namespace arb {"));
        assert!(hpp.contains("struct pas_pack {"));
        assert!(hpp.contains("double* _pp_g"));
        assert!(hpp.contains("const double* _pp_v"));
        assert!(hpp.contains("double* _pp_i"));
        assert!(hpp.contains("void compute_currents(pas_pack& pp);"));
    }

    #[test]
    fn source_reads_binds_and_writes_effects() {
        let cpp = print_mechanism(&printable(), "arb", "pas.hpp").expect("print");
        assert!(cpp.contains("#include \"pas.hpp\""));
        assert!(cpp.contains("const double v = pp._pp_v[i];"));
        assert!(cpp.contains("pp._pp_i[i] ="));
        assert!(cpp.contains("void advance_state(pas_pack& pp)"));
    }

    #[test]
    fn constant_parameters_become_defaults() {
        let hpp = print_header(&printable(), "arb").expect("print");
        assert!(hpp.contains("static constexpr double g ="));
        assert!(hpp.contains("static constexpr double e_rev ="));
    }
}
