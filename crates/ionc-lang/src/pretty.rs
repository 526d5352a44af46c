//! Source-syntax printing of the parsed AST, and location-insensitive
//! structural equality. `parse(print(m))` must be structurally equal to `m`;
//! the printer fully parenthesizes to make that unconditional.

use crate::ast::*;
use crate::types::{ParsedType, PType, TypeOp};
use crate::units::{unit_to_string, UnitExpr};

pub fn mechanism_to_string(m: &ParsedMechanism) -> String {
    let mut out = String::new();
    out.push_str(&format!("{} {} {{\n", m.kind, m.name));
    for group in [
        &m.records,
        &m.parameters,
        &m.constants,
        &m.states,
        &m.bindings,
        &m.functions,
        &m.initials,
        &m.evolutions,
        &m.effects,
        &m.exports,
    ] {
        for e in group.iter() {
            out.push_str("  ");
            out.push_str(&expr_to_string(e));
            out.push('\n');
        }
    }
    out.push_str("}\n");
    out
}

pub fn expr_to_string(e: &PExpr) -> String {
    match &**e {
        ParsedExpr::Parameter(p) => {
            format!("parameter {} = {};", id_to_string(&p.id), expr_to_string(&p.value))
        }
        ParsedExpr::Constant(c) => {
            format!("constant {} = {};", id_to_string(&c.id), expr_to_string(&c.value))
        }
        ParsedExpr::State(s) => format!("state {};", id_to_string(&s.id)),
        ParsedExpr::RecordAlias(r) => {
            let ParsedType::Record { fields, .. } = &*r.ty else {
                return format!("record {} {{}};", r.name);
            };
            let mut out = format!("record {} {{ ", r.name);
            for (f, ty) in fields {
                out.push_str(&format!("{}: {}; ", f, type_to_string(ty)));
            }
            out.push_str("};");
            out
        }
        ParsedExpr::Function(f) => {
            let args: Vec<String> = f.args.iter().map(id_to_string).collect();
            let ret = match &f.ret {
                Some(t) => format!(": {} ", type_to_string(t)),
                None => " ".to_string(),
            };
            format!(
                "function {}({}){}{{ {} }}",
                f.name,
                args.join(", "),
                ret,
                expr_to_string(&f.body)
            )
        }
        ParsedExpr::Bind(b) => match &b.ion {
            Some(ion) => format!("bind {} = {}({});", b.name, b.kind.name(), ion),
            None => format!("bind {} = {};", b.name, b.kind.name()),
        },
        ParsedExpr::Initial(i) => format!("initial {} = {};", i.target, expr_to_string(&i.value)),
        ParsedExpr::Evolve(ev) => {
            format!("evolve {}' = {};", ev.target, expr_to_string(&ev.value))
        }
        ParsedExpr::Effect(ef) => match &ef.ion {
            Some(ion) => {
                format!("effect {}({}) = {};", ef.kind.name(), ion, expr_to_string(&ef.value))
            }
            None => format!("effect {} = {};", ef.kind.name(), expr_to_string(&ef.value)),
        },
        ParsedExpr::Export(x) => format!("export {};", x.name),
        ParsedExpr::Call(c) => {
            let args: Vec<String> = c.args.iter().map(expr_to_string).collect();
            format!("{}({})", c.function, args.join(", "))
        }
        ParsedExpr::Object(o) => {
            let mut out = String::from("{ ");
            for (f, v) in &o.fields {
                out.push_str(&format!("{} = {}; ", f, expr_to_string(v)));
            }
            out.push('}');
            out
        }
        ParsedExpr::Let(l) => format!(
            "(let {} = {}; {})",
            id_to_string(&l.id),
            expr_to_string(&l.value),
            expr_to_string(&l.body)
        ),
        ParsedExpr::With(w) => {
            format!("(with {}; {})", expr_to_string(&w.value), expr_to_string(&w.body))
        }
        ParsedExpr::If(i) => format!(
            "(if {} {{ {} }} else {{ {} }})",
            expr_to_string(&i.condition),
            expr_to_string(&i.if_true),
            expr_to_string(&i.if_false)
        ),
        ParsedExpr::Identifier(id) => id.name.clone(),
        ParsedExpr::Float(f) => match &*f.unit {
            UnitExpr::NoUnit => format!("{:?}", f.value),
            _ => format!("{:?} [{}]", f.value, unit_to_string(&f.unit)),
        },
        ParsedExpr::Int(i) => match &*i.unit {
            UnitExpr::NoUnit => format!("{}", i.value),
            _ => format!("{} [{}]", i.value, unit_to_string(&i.unit)),
        },
        ParsedExpr::Unary(u) => match u.op {
            UnaryOp::Neg => format!("(-{})", expr_to_string(&u.arg)),
            UnaryOp::Not => format!("(!{})", expr_to_string(&u.arg)),
            UnaryOp::Exp => format!("exp({})", expr_to_string(&u.arg)),
            UnaryOp::Sin => format!("sin({})", expr_to_string(&u.arg)),
            UnaryOp::Cos => format!("cos({})", expr_to_string(&u.arg)),
            UnaryOp::Log => format!("log({})", expr_to_string(&u.arg)),
            UnaryOp::Abs => format!("abs({})", expr_to_string(&u.arg)),
            UnaryOp::Exprelr => format!("exprelr({})", expr_to_string(&u.arg)),
        },
        ParsedExpr::Binary(b) => match b.op {
            BinaryOp::Min => {
                format!("min({}, {})", expr_to_string(&b.lhs), expr_to_string(&b.rhs))
            }
            BinaryOp::Max => {
                format!("max({}, {})", expr_to_string(&b.lhs), expr_to_string(&b.rhs))
            }
            BinaryOp::Dot => format!("({}.{})", expr_to_string(&b.lhs), expr_to_string(&b.rhs)),
            op => format!(
                "({} {} {})",
                expr_to_string(&b.lhs),
                binop_symbol(op),
                expr_to_string(&b.rhs)
            ),
        },
    }
}

fn id_to_string(id: &ParsedIdentifier) -> String {
    match &id.ty {
        Some(t) => format!("{}: {}", id.name, type_to_string(t)),
        None => id.name.clone(),
    }
}

pub fn type_to_string(t: &PType) -> String {
    match &**t {
        ParsedType::Integer { val, .. } => val.to_string(),
        ParsedType::Quantity { quantity, .. } => quantity.name().to_string(),
        ParsedType::Binary { op, lhs, rhs, .. } => {
            let op_str = match op {
                TypeOp::Mul => "*",
                TypeOp::Div => "/",
                TypeOp::Pow => "^",
            };
            format!("({}{}{})", type_to_string(lhs), op_str, type_to_string(rhs))
        }
        ParsedType::Bool { .. } => "bool".to_string(),
        ParsedType::Record { fields, .. } => {
            let fs: Vec<String> =
                fields.iter().map(|(n, t)| format!("{}: {}", n, type_to_string(t))).collect();
            format!("{{ {} }}", fs.join("; "))
        }
        ParsedType::Alias { name, .. } => name.clone(),
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
        BinaryOp::Min | BinaryOp::Max | BinaryOp::Dot => unreachable!("printed elsewhere"),
    }
}

// ---- structural equality (locations ignored) ------------------------------

pub fn mechanism_eq(a: &ParsedMechanism, b: &ParsedMechanism) -> bool {
    a.name == b.name
        && a.kind == b.kind
        && exprs_eq(&a.parameters, &b.parameters)
        && exprs_eq(&a.constants, &b.constants)
        && exprs_eq(&a.states, &b.states)
        && exprs_eq(&a.records, &b.records)
        && exprs_eq(&a.functions, &b.functions)
        && exprs_eq(&a.bindings, &b.bindings)
        && exprs_eq(&a.initials, &b.initials)
        && exprs_eq(&a.evolutions, &b.evolutions)
        && exprs_eq(&a.effects, &b.effects)
        && exprs_eq(&a.exports, &b.exports)
}

fn exprs_eq(a: &[PExpr], b: &[PExpr]) -> bool {
    a.len() == b.len() && a.iter().zip(b).all(|(x, y)| expr_eq(x, y))
}

pub fn expr_eq(a: &PExpr, b: &PExpr) -> bool {
    use ParsedExpr::*;
    match (&**a, &**b) {
        (Parameter(x), Parameter(y)) => id_eq(&x.id, &y.id) && expr_eq(&x.value, &y.value),
        (Constant(x), Constant(y)) => id_eq(&x.id, &y.id) && expr_eq(&x.value, &y.value),
        (State(x), State(y)) => id_eq(&x.id, &y.id),
        (RecordAlias(x), RecordAlias(y)) => x.name == y.name && type_eq(&x.ty, &y.ty),
        (Function(x), Function(y)) => {
            x.name == y.name
                && x.args.len() == y.args.len()
                && x.args.iter().zip(&y.args).all(|(p, q)| id_eq(p, q))
                && opt_type_eq(&x.ret, &y.ret)
                && expr_eq(&x.body, &y.body)
        }
        (Bind(x), Bind(y)) => x.name == y.name && x.kind == y.kind && x.ion == y.ion,
        (Initial(x), Initial(y)) => x.target == y.target && expr_eq(&x.value, &y.value),
        (Evolve(x), Evolve(y)) => x.target == y.target && expr_eq(&x.value, &y.value),
        (Effect(x), Effect(y)) => {
            x.kind == y.kind && x.ion == y.ion && expr_eq(&x.value, &y.value)
        }
        (Export(x), Export(y)) => x.name == y.name,
        (Call(x), Call(y)) => {
            x.function == y.function
                && x.args.len() == y.args.len()
                && x.args.iter().zip(&y.args).all(|(p, q)| expr_eq(p, q))
        }
        (Object(x), Object(y)) => {
            x.record == y.record
                && x.fields.len() == y.fields.len()
                && x.fields
                    .iter()
                    .zip(&y.fields)
                    .all(|((nf, vf), (ng, vg))| nf == ng && expr_eq(vf, vg))
        }
        (Let(x), Let(y)) => {
            id_eq(&x.id, &y.id) && expr_eq(&x.value, &y.value) && expr_eq(&x.body, &y.body)
        }
        (With(x), With(y)) => expr_eq(&x.value, &y.value) && expr_eq(&x.body, &y.body),
        (If(x), If(y)) => {
            expr_eq(&x.condition, &y.condition)
                && expr_eq(&x.if_true, &y.if_true)
                && expr_eq(&x.if_false, &y.if_false)
        }
        (Identifier(x), Identifier(y)) => x.name == y.name && opt_type_eq(&x.ty, &y.ty),
        (Float(x), Float(y)) => x.value == y.value && unit_eq(&x.unit, &y.unit),
        (Int(x), Int(y)) => x.value == y.value && unit_eq(&x.unit, &y.unit),
        (Unary(x), Unary(y)) => x.op == y.op && expr_eq(&x.arg, &y.arg),
        (Binary(x), Binary(y)) => {
            x.op == y.op && expr_eq(&x.lhs, &y.lhs) && expr_eq(&x.rhs, &y.rhs)
        }
        _ => false,
    }
}

fn id_eq(a: &ParsedIdentifier, b: &ParsedIdentifier) -> bool {
    a.name == b.name && opt_type_eq(&a.ty, &b.ty)
}

fn opt_type_eq(a: &Option<PType>, b: &Option<PType>) -> bool {
    match (a, b) {
        (None, None) => true,
        (Some(x), Some(y)) => type_eq(x, y),
        _ => false,
    }
}

pub fn type_eq(a: &PType, b: &PType) -> bool {
    use ParsedType::*;
    match (&**a, &**b) {
        (Integer { val: x, .. }, Integer { val: y, .. }) => x == y,
        (Quantity { quantity: x, .. }, Quantity { quantity: y, .. }) => x == y,
        (
            Binary { op: xo, lhs: xl, rhs: xr, .. },
            Binary { op: yo, lhs: yl, rhs: yr, .. },
        ) => xo == yo && type_eq(xl, yl) && type_eq(xr, yr),
        (Bool { .. }, Bool { .. }) => true,
        (Record { fields: x, .. }, Record { fields: y, .. }) => {
            x.len() == y.len()
                && x.iter().zip(y).all(|((nf, tf), (ng, tg))| nf == ng && type_eq(tf, tg))
        }
        (Alias { name: x, .. }, Alias { name: y, .. }) => x == y,
        _ => false,
    }
}

pub fn unit_eq(a: &crate::units::PUnit, b: &crate::units::PUnit) -> bool {
    use UnitExpr::*;
    match (&**a, &**b) {
        (NoUnit, NoUnit) => true,
        (Integer { val: x, .. }, Integer { val: y, .. }) => x == y,
        (
            Simple { prefix: xp, symbol: xs, .. },
            Simple { prefix: yp, symbol: ys, .. },
        ) => xp == yp && xs == ys,
        (
            Binary { op: xo, lhs: xl, rhs: xr, .. },
            Binary { op: yo, lhs: yl, rhs: yr, .. },
        ) => xo == yo && unit_eq(xl, yl) && unit_eq(xr, yr),
        _ => false,
    }
}
