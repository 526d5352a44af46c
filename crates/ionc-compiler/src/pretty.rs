//! Pretty-printing of the typed IR, for `--dump-ir` and test diagnostics.

use crate::ir::*;
use crate::rtype::type_to_string;

use ionc_lang::ast::{BinaryOp, UnaryOp};

pub fn mechanism_to_string(m: &ResolvedMechanism) -> String {
    let mut out = format!("{} {} {{\n", m.kind, m.name);
    for group in [
        &m.constants,
        &m.parameters,
        &m.states,
        &m.bindings,
        &m.functions,
        &m.initials,
        &m.evolutions,
        &m.effects,
        &m.exports,
    ] {
        for e in group.iter() {
            out.push_str(&decl_to_string(e, "  "));
            out.push('\n');
        }
    }
    out.push_str("}\n");
    out
}

fn decl_to_string(e: &RExpr, indent: &str) -> String {
    match &**e {
        ResolvedExpr::Parameter(p) => format!(
            "{}parameter {}: {} =\n{}",
            indent,
            p.name,
            type_to_string(&p.ty),
            body_to_string(&p.value, &format!("{}  ", indent))
        ),
        ResolvedExpr::Constant(c) => format!(
            "{}constant {}: {} =\n{}",
            indent,
            c.name,
            type_to_string(&c.ty),
            body_to_string(&c.value, &format!("{}  ", indent))
        ),
        ResolvedExpr::State(s) => {
            format!("{}state {}: {};", indent, s.name, type_to_string(&s.ty))
        }
        ResolvedExpr::Bind(b) => match &b.ion {
            Some(ion) => format!("{}bind {} = {}({});", indent, b.name, b.kind.name(), ion),
            None => format!("{}bind {} = {};", indent, b.name, b.kind.name()),
        },
        ResolvedExpr::Function(f) => {
            let args: Vec<String> = f
                .args
                .iter()
                .map(|a| format!("{}: {}", a.name, type_to_string(&a.ty)))
                .collect();
            format!(
                "{}function {}({}): {} =\n{}",
                indent,
                f.name,
                args.join(", "),
                type_to_string(&f.ret),
                body_to_string(&f.body, &format!("{}  ", indent))
            )
        }
        ResolvedExpr::Initial(i) => format!(
            "{}initial {} =\n{}",
            indent,
            i.target,
            body_to_string(&i.value, &format!("{}  ", indent))
        ),
        ResolvedExpr::Evolve(ev) => format!(
            "{}evolve {}' =\n{}",
            indent,
            ev.target,
            body_to_string(&ev.value, &format!("{}  ", indent))
        ),
        ResolvedExpr::Effect(ef) => {
            let head = match &ef.ion {
                Some(ion) => format!("{}effect {}({})", indent, ef.kind.name(), ion),
                None => format!("{}effect {}", indent, ef.kind.name()),
            };
            format!("{} =\n{}", head, body_to_string(&ef.value, &format!("{}  ", indent)))
        }
        ResolvedExpr::Export(x) => format!("{}export {};", indent, x.name),
        _ => format!("{}{}", indent, expr_to_string(e)),
    }
}

/// A let chain, one binding per line.
pub fn body_to_string(e: &RExpr, indent: &str) -> String {
    let mut out = String::new();
    let mut cursor = e;
    while let ResolvedExpr::Let(l) = &**cursor {
        out.push_str(&format!("{}let {} = {};\n", indent, l.name, expr_to_string(&l.value)));
        cursor = &l.body;
    }
    out.push_str(&format!("{}{}", indent, expr_to_string(cursor)));
    out
}

pub fn expr_to_string(e: &RExpr) -> String {
    match &**e {
        ResolvedExpr::Argument(a) => a.name.clone(),
        ResolvedExpr::Float(f) => format!("{:?}", f.value),
        ResolvedExpr::Int(i) => format!("{}", i.value),
        ResolvedExpr::Unary(u) => match u.op {
            UnaryOp::Neg => format!("-{}", expr_to_string(&u.arg)),
            UnaryOp::Not => format!("!{}", expr_to_string(&u.arg)),
            UnaryOp::Exp => format!("exp({})", expr_to_string(&u.arg)),
            UnaryOp::Sin => format!("sin({})", expr_to_string(&u.arg)),
            UnaryOp::Cos => format!("cos({})", expr_to_string(&u.arg)),
            UnaryOp::Log => format!("log({})", expr_to_string(&u.arg)),
            UnaryOp::Abs => format!("abs({})", expr_to_string(&u.arg)),
            UnaryOp::Exprelr => format!("exprelr({})", expr_to_string(&u.arg)),
        },
        ResolvedExpr::Binary(b) => match b.op {
            BinaryOp::Min => format!("min({}, {})", expr_to_string(&b.lhs), expr_to_string(&b.rhs)),
            BinaryOp::Max => format!("max({}, {})", expr_to_string(&b.lhs), expr_to_string(&b.rhs)),
            op => format!(
                "({} {} {})",
                expr_to_string(&b.lhs),
                binop_symbol(op),
                expr_to_string(&b.rhs)
            ),
        },
        ResolvedExpr::If(i) => format!(
            "(if {} then {} else {})",
            expr_to_string(&i.condition),
            expr_to_string(&i.if_true),
            expr_to_string(&i.if_false)
        ),
        ResolvedExpr::Call(c) => {
            let args: Vec<String> = c.args.iter().map(expr_to_string).collect();
            format!("{}({})", c.function, args.join(", "))
        }
        ResolvedExpr::Object(o) => {
            let fields: Vec<String> =
                o.fields.iter().map(|(n, v)| format!("{} = {}", n, expr_to_string(v))).collect();
            format!("{{ {} }}", fields.join("; "))
        }
        ResolvedExpr::FieldAccess(f) => format!("{}.{}", expr_to_string(&f.object), f.field),
        ResolvedExpr::Let(l) => format!(
            "(let {} = {}; {})",
            l.name,
            expr_to_string(&l.value),
            expr_to_string(&l.body)
        ),
        _ => "<declaration>".to_string(),
    }
}

fn binop_symbol(op: BinaryOp) -> &'static str {
    match op {
        BinaryOp::Add => "+",
        BinaryOp::Sub => "-",
        BinaryOp::Mul => "*",
        BinaryOp::Div => "/",
        BinaryOp::Pow => "^",
        BinaryOp::Lt => "<",
        BinaryOp::Le => "<=",
        BinaryOp::Gt => ">",
        BinaryOp::Ge => ">=",
        BinaryOp::Eq => "==",
        BinaryOp::Ne => "!=",
        BinaryOp::And => "&&",
        BinaryOp::Or => "||",
        BinaryOp::Min | BinaryOp::Max => unreachable!("printed elsewhere"),
        BinaryOp::Dot => ".",
    }
}
