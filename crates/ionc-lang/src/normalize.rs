//! Unit normalization: rewrite every literal `v [unit]` so its unit is
//! prefix-free, folding the stripped power of ten into the value.
//! `2 [mV]` becomes `0.002 [V]`; `10 [mV/mA]` stays `10 [V/A]`.

use std::rc::Rc;

use crate::ast::*;
use crate::units::normalize_unit;

pub fn normalize_mechanism(m: &ParsedMechanism) -> ParsedMechanism {
    let map = |v: &Vec<PExpr>| v.iter().map(normalize_expr).collect();
    ParsedMechanism {
        name: m.name.clone(),
        kind: m.kind,
        parameters: map(&m.parameters),
        constants: map(&m.constants),
        states: map(&m.states),
        records: map(&m.records),
        functions: map(&m.functions),
        bindings: map(&m.bindings),
        initials: map(&m.initials),
        evolutions: map(&m.evolutions),
        effects: map(&m.effects),
        exports: map(&m.exports),
        loc: m.loc,
    }
}

pub fn normalize_expr(e: &PExpr) -> PExpr {
    match &**e {
        ParsedExpr::Parameter(p) => Rc::new(ParsedExpr::Parameter(ParsedParameter {
            id: p.id.clone(),
            value: normalize_expr(&p.value),
            loc: p.loc,
        })),
        ParsedExpr::Constant(c) => Rc::new(ParsedExpr::Constant(ParsedConstant {
            id: c.id.clone(),
            value: normalize_expr(&c.value),
            loc: c.loc,
        })),
        ParsedExpr::State(_)
        | ParsedExpr::RecordAlias(_)
        | ParsedExpr::Bind(_)
        | ParsedExpr::Export(_)
        | ParsedExpr::Identifier(_) => e.clone(),
        ParsedExpr::Function(f) => Rc::new(ParsedExpr::Function(ParsedFunction {
            name: f.name.clone(),
            args: f.args.clone(),
            ret: f.ret.clone(),
            body: normalize_expr(&f.body),
            loc: f.loc,
        })),
        ParsedExpr::Initial(i) => Rc::new(ParsedExpr::Initial(ParsedInitial {
            target: i.target.clone(),
            value: normalize_expr(&i.value),
            loc: i.loc,
        })),
        ParsedExpr::Evolve(ev) => Rc::new(ParsedExpr::Evolve(ParsedEvolve {
            target: ev.target.clone(),
            value: normalize_expr(&ev.value),
            loc: ev.loc,
        })),
        ParsedExpr::Effect(ef) => Rc::new(ParsedExpr::Effect(ParsedEffect {
            kind: ef.kind,
            ion: ef.ion.clone(),
            value: normalize_expr(&ef.value),
            loc: ef.loc,
        })),
        ParsedExpr::Call(c) => Rc::new(ParsedExpr::Call(ParsedCall {
            function: c.function.clone(),
            args: c.args.iter().map(normalize_expr).collect(),
            loc: c.loc,
        })),
        ParsedExpr::Object(o) => Rc::new(ParsedExpr::Object(ParsedObject {
            record: o.record.clone(),
            fields: o.fields.iter().map(|(n, v)| (n.clone(), normalize_expr(v))).collect(),
            loc: o.loc,
        })),
        ParsedExpr::Let(l) => Rc::new(ParsedExpr::Let(ParsedLet {
            id: l.id.clone(),
            value: normalize_expr(&l.value),
            body: normalize_expr(&l.body),
            loc: l.loc,
        })),
        ParsedExpr::With(w) => Rc::new(ParsedExpr::With(ParsedWith {
            value: normalize_expr(&w.value),
            body: normalize_expr(&w.body),
            loc: w.loc,
        })),
        ParsedExpr::If(i) => Rc::new(ParsedExpr::If(ParsedIf {
            condition: normalize_expr(&i.condition),
            if_true: normalize_expr(&i.if_true),
            if_false: normalize_expr(&i.if_false),
            loc: i.loc,
        })),
        ParsedExpr::Unary(u) => Rc::new(ParsedExpr::Unary(ParsedUnary {
            op: u.op,
            arg: normalize_expr(&u.arg),
            loc: u.loc,
        })),
        ParsedExpr::Binary(b) => Rc::new(ParsedExpr::Binary(ParsedBinary {
            op: b.op,
            lhs: normalize_expr(&b.lhs),
            rhs: normalize_expr(&b.rhs),
            loc: b.loc,
        })),
        ParsedExpr::Float(f) => {
            let (unit, k) = normalize_unit(&f.unit);
            Rc::new(ParsedExpr::Float(ParsedFloat {
                value: f.value * 10f64.powi(k),
                unit,
                loc: f.loc,
            }))
        }
        ParsedExpr::Int(i) => {
            let (unit, k) = normalize_unit(&i.unit);
            if k == 0 {
                Rc::new(ParsedExpr::Int(ParsedInt { value: i.value, unit, loc: i.loc }))
            } else {
                Rc::new(ParsedExpr::Float(ParsedFloat {
                    value: i.value as f64 * 10f64.powi(k),
                    unit,
                    loc: i.loc,
                }))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::Parser;
    use crate::units::{unit_to_string, UnitExpr};

    fn normalized(src: &str) -> PExpr {
        let e = Parser::new(src).parse_expr().expect("parse");
        normalize_expr(&e)
    }

    #[test]
    fn millivolts_fold_into_the_literal() {
        let e = normalized("2 [mV]");
        let ParsedExpr::Float(f) = &*e else { panic!("expected float") };
        assert_eq!(f.value, 0.002);
        assert_eq!(unit_to_string(&f.unit), "V");
    }

    #[test]
    fn balanced_prefixes_cancel() {
        // 10 [mV/mA] normalizes to 10 [V/A]
        let e = normalized("10 [mV/mA]");
        let ParsedExpr::Int(i) = &*e else { panic!("expected int") };
        assert_eq!(i.value, 10);
        assert_eq!(unit_to_string(&i.unit), "(V/A)");
    }

    #[test]
    fn conductance_density_scale() {
        // S/cm^2 carries 10^4 relative to S/m^2
        let e = normalized("0.001 [S/cm^2]");
        let ParsedExpr::Float(f) = &*e else { panic!() };
        assert!((f.value - 10.0).abs() < 1e-12);
    }

    #[test]
    fn unitless_literals_are_untouched() {
        let e = normalized("42");
        let ParsedExpr::Int(i) = &*e else { panic!() };
        assert_eq!(i.value, 42);
        assert!(matches!(&*i.unit, UnitExpr::NoUnit));
    }
}
