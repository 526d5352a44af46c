//! SI unit expressions: prefixes, symbols, and the unit algebra.
//!
//! `normalize_unit` reduces any unit expression to its prefix-free form plus
//! a power of ten, e.g. `mV -> (V, -3)` and `mV/mA -> (V/A, 0)`.

use std::rc::Rc;

use crate::location::Location;
use crate::types::{ParsedType, PType, Quantity, TypeOp};

pub type PUnit = Rc<UnitExpr>;

/// Base and derived unit symbols recognized inside `[ ]`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum UnitSymbol {
    Meter,
    Gram,
    Second,
    Ampere,
    Kelvin,
    Mole,
    Hertz,
    Litre,
    Newton,
    Pascal,
    Watt,
    Joule,
    Coulomb,
    Volt,
    Farad,
    Henry,
    Ohm,
    Siemens,
    Molar,
}

impl UnitSymbol {
    pub fn from_str(s: &str) -> Option<UnitSymbol> {
        let u = match s {
            "m" => UnitSymbol::Meter,
            "g" => UnitSymbol::Gram,
            "s" => UnitSymbol::Second,
            "A" => UnitSymbol::Ampere,
            "K" => UnitSymbol::Kelvin,
            "mol" => UnitSymbol::Mole,
            "Hz" => UnitSymbol::Hertz,
            "L" | "l" => UnitSymbol::Litre,
            "N" => UnitSymbol::Newton,
            "Pa" => UnitSymbol::Pascal,
            "W" => UnitSymbol::Watt,
            "J" => UnitSymbol::Joule,
            "C" => UnitSymbol::Coulomb,
            "V" => UnitSymbol::Volt,
            "F" => UnitSymbol::Farad,
            "H" => UnitSymbol::Henry,
            "Ohm" => UnitSymbol::Ohm,
            "S" => UnitSymbol::Siemens,
            "M" => UnitSymbol::Molar,
            _ => return None,
        };
        Some(u)
    }

    pub fn symbol(self) -> &'static str {
        match self {
            UnitSymbol::Meter => "m",
            UnitSymbol::Gram => "g",
            UnitSymbol::Second => "s",
            UnitSymbol::Ampere => "A",
            UnitSymbol::Kelvin => "K",
            UnitSymbol::Mole => "mol",
            UnitSymbol::Hertz => "Hz",
            UnitSymbol::Litre => "L",
            UnitSymbol::Newton => "N",
            UnitSymbol::Pascal => "Pa",
            UnitSymbol::Watt => "W",
            UnitSymbol::Joule => "J",
            UnitSymbol::Coulomb => "C",
            UnitSymbol::Volt => "V",
            UnitSymbol::Farad => "F",
            UnitSymbol::Henry => "H",
            UnitSymbol::Ohm => "Ohm",
            UnitSymbol::Siemens => "S",
            UnitSymbol::Molar => "M",
        }
    }

    /// The quantity measured by this symbol.
    pub fn quantity(self) -> Quantity {
        match self {
            UnitSymbol::Meter => Quantity::Length,
            UnitSymbol::Gram => Quantity::Mass,
            UnitSymbol::Second => Quantity::Time,
            UnitSymbol::Ampere => Quantity::Current,
            UnitSymbol::Kelvin => Quantity::Temperature,
            UnitSymbol::Mole => Quantity::Amount,
            UnitSymbol::Hertz => Quantity::Frequency,
            UnitSymbol::Litre => Quantity::Volume,
            UnitSymbol::Newton => Quantity::Force,
            UnitSymbol::Pascal => Quantity::Pressure,
            UnitSymbol::Watt => Quantity::Power,
            UnitSymbol::Joule => Quantity::Energy,
            UnitSymbol::Coulomb => Quantity::Charge,
            UnitSymbol::Volt => Quantity::Voltage,
            UnitSymbol::Farad => Quantity::Capacitance,
            UnitSymbol::Henry => Quantity::Inductance,
            UnitSymbol::Ohm => Quantity::Resistance,
            UnitSymbol::Siemens => Quantity::Conductance,
            UnitSymbol::Molar => Quantity::Concentration,
        }
    }
}

/// SI prefixes, yotta through yocto.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum UnitPrefix {
    Yotta,
    Zetta,
    Exa,
    Peta,
    Tera,
    Giga,
    Mega,
    Kilo,
    Hecto,
    Deca,
    Deci,
    Centi,
    Milli,
    Micro,
    Nano,
    Pico,
    Femto,
    Atto,
    Zepto,
    Yocto,
    None,
}

impl UnitPrefix {
    pub fn from_str(s: &str) -> Option<UnitPrefix> {
        let p = match s {
            "Y" => UnitPrefix::Yotta,
            "Z" => UnitPrefix::Zetta,
            "E" => UnitPrefix::Exa,
            "P" => UnitPrefix::Peta,
            "T" => UnitPrefix::Tera,
            "G" => UnitPrefix::Giga,
            "M" => UnitPrefix::Mega,
            "k" => UnitPrefix::Kilo,
            "h" => UnitPrefix::Hecto,
            "da" => UnitPrefix::Deca,
            "d" => UnitPrefix::Deci,
            "c" => UnitPrefix::Centi,
            "m" => UnitPrefix::Milli,
            "u" => UnitPrefix::Micro,
            "n" => UnitPrefix::Nano,
            "p" => UnitPrefix::Pico,
            "f" => UnitPrefix::Femto,
            "a" => UnitPrefix::Atto,
            "z" => UnitPrefix::Zepto,
            "y" => UnitPrefix::Yocto,
            _ => return None,
        };
        Some(p)
    }

    /// The power of ten the prefix scales by.
    pub fn exponent(self) -> i32 {
        match self {
            UnitPrefix::Yotta => 24,
            UnitPrefix::Zetta => 21,
            UnitPrefix::Exa => 18,
            UnitPrefix::Peta => 15,
            UnitPrefix::Tera => 12,
            UnitPrefix::Giga => 9,
            UnitPrefix::Mega => 6,
            UnitPrefix::Kilo => 3,
            UnitPrefix::Hecto => 2,
            UnitPrefix::Deca => 1,
            UnitPrefix::Deci => -1,
            UnitPrefix::Centi => -2,
            UnitPrefix::Milli => -3,
            UnitPrefix::Micro => -6,
            UnitPrefix::Nano => -9,
            UnitPrefix::Pico => -12,
            UnitPrefix::Femto => -15,
            UnitPrefix::Atto => -18,
            UnitPrefix::Zepto => -21,
            UnitPrefix::Yocto => -24,
            UnitPrefix::None => 0,
        }
    }

    pub fn symbol(self) -> &'static str {
        match self {
            UnitPrefix::Yotta => "Y",
            UnitPrefix::Zetta => "Z",
            UnitPrefix::Exa => "E",
            UnitPrefix::Peta => "P",
            UnitPrefix::Tera => "T",
            UnitPrefix::Giga => "G",
            UnitPrefix::Mega => "M",
            UnitPrefix::Kilo => "k",
            UnitPrefix::Hecto => "h",
            UnitPrefix::Deca => "da",
            UnitPrefix::Deci => "d",
            UnitPrefix::Centi => "c",
            UnitPrefix::Milli => "m",
            UnitPrefix::Micro => "u",
            UnitPrefix::Nano => "n",
            UnitPrefix::Pico => "p",
            UnitPrefix::Femto => "f",
            UnitPrefix::Atto => "a",
            UnitPrefix::Zepto => "z",
            UnitPrefix::Yocto => "y",
            UnitPrefix::None => "",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum UnitOp {
    Mul,
    Div,
    Pow,
}

/// A parsed unit expression. `NoUnit` marks a literal written without `[ ]`.
#[derive(Debug, Clone, PartialEq)]
pub enum UnitExpr {
    Integer { val: i64, loc: Location },
    Simple { prefix: UnitPrefix, symbol: UnitSymbol, loc: Location },
    Binary { op: UnitOp, lhs: PUnit, rhs: PUnit, loc: Location },
    NoUnit,
}

impl UnitExpr {
    pub fn no_unit() -> PUnit {
        Rc::new(UnitExpr::NoUnit)
    }

    pub fn is_no_unit(&self) -> bool {
        matches!(self, UnitExpr::NoUnit)
    }

    /// `pow` units require an integer-literal exponent.
    pub fn binary(op: UnitOp, lhs: PUnit, rhs: PUnit, loc: Location) -> Result<PUnit, String> {
        if op == UnitOp::Pow && !matches!(*rhs, UnitExpr::Integer { .. }) {
            return Err("the exponent of a unit power must be an integer literal".to_string());
        }
        Ok(Rc::new(UnitExpr::Binary { op, lhs, rhs, loc }))
    }
}

/// Recognize a string as `prefix? symbol`, preferring a bare symbol, then the
/// longest prefix with a valid remainder. `mol` is the unit mole, not
/// milli-`ol`; `dam` is deca-meter.
pub fn check_simple_unit(s: &str) -> Option<(UnitPrefix, UnitSymbol)> {
    if let Some(sym) = UnitSymbol::from_str(s) {
        return Some((UnitPrefix::None, sym));
    }
    for split in 1..s.len() {
        let (pref_str, sym_str) = s.split_at(split);
        if let (Some(pref), Some(sym)) =
            (UnitPrefix::from_str(pref_str), UnitSymbol::from_str(sym_str))
        {
            return Some((pref, sym));
        }
    }
    None
}

/// Reduce a unit expression to its prefix-free form and the power of ten that
/// was stripped. The caller folds `10^k` into the numeric literal.
pub fn normalize_unit(u: &PUnit) -> (PUnit, i32) {
    match &**u {
        UnitExpr::NoUnit => (UnitExpr::no_unit(), 0),
        UnitExpr::Integer { .. } => (u.clone(), 0),
        UnitExpr::Simple { prefix, symbol, loc } => (
            Rc::new(UnitExpr::Simple { prefix: UnitPrefix::None, symbol: *symbol, loc: *loc }),
            prefix.exponent(),
        ),
        UnitExpr::Binary { op, lhs, rhs, loc } => {
            let (l, kl) = normalize_unit(lhs);
            let (r, kr) = normalize_unit(rhs);
            let k = match op {
                UnitOp::Mul => kl + kr,
                UnitOp::Div => kl - kr,
                UnitOp::Pow => {
                    let n = match &**rhs {
                        UnitExpr::Integer { val, .. } => *val as i32,
                        _ => 0,
                    };
                    kl * n
                }
            };
            (Rc::new(UnitExpr::Binary { op: *op, lhs: l, rhs: r, loc: *loc }), k)
        }
    }
}

/// The type expression equivalent to a unit expression, or `None` for
/// `NoUnit` (the literal is then dimensionless).
pub fn unit_to_type(u: &PUnit) -> Option<PType> {
    match &**u {
        UnitExpr::NoUnit => None,
        UnitExpr::Integer { val, loc } => Some(Rc::new(ParsedType::Integer { val: *val, loc: *loc })),
        UnitExpr::Simple { symbol, loc, .. } => Some(Rc::new(ParsedType::Quantity {
            quantity: symbol.quantity(),
            loc: *loc,
        })),
        UnitExpr::Binary { op, lhs, rhs, loc } => {
            let top = match op {
                UnitOp::Mul => TypeOp::Mul,
                UnitOp::Div => TypeOp::Div,
                UnitOp::Pow => TypeOp::Pow,
            };
            let l = unit_to_type(lhs)?;
            let r = unit_to_type(rhs)?;
            Some(Rc::new(ParsedType::Binary { op: top, lhs: l, rhs: r, loc: *loc }))
        }
    }
}

/// Source form of a unit expression, e.g. `mV/mA`.
pub fn unit_to_string(u: &PUnit) -> String {
    match &**u {
        UnitExpr::NoUnit => String::new(),
        UnitExpr::Integer { val, .. } => val.to_string(),
        UnitExpr::Simple { prefix, symbol, .. } => {
            format!("{}{}", prefix.symbol(), symbol.symbol())
        }
        UnitExpr::Binary { op, lhs, rhs, .. } => {
            let op_str = match op {
                UnitOp::Mul => "*",
                UnitOp::Div => "/",
                UnitOp::Pow => "^",
            };
            format!("({}{}{})", unit_to_string(lhs), op_str, unit_to_string(rhs))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn simple_units_resolve() {
        assert_eq!(check_simple_unit("V"), Some((UnitPrefix::None, UnitSymbol::Volt)));
        assert_eq!(check_simple_unit("mV"), Some((UnitPrefix::Milli, UnitSymbol::Volt)));
        assert_eq!(check_simple_unit("mol"), Some((UnitPrefix::None, UnitSymbol::Mole)));
        assert_eq!(check_simple_unit("dam"), Some((UnitPrefix::Deca, UnitSymbol::Meter)));
        assert_eq!(check_simple_unit("uS"), Some((UnitPrefix::Micro, UnitSymbol::Siemens)));
        assert_eq!(check_simple_unit("kOhm"), Some((UnitPrefix::Kilo, UnitSymbol::Ohm)));
        assert_eq!(check_simple_unit("xyz"), None);
    }

    #[test]
    fn normalize_strips_prefix() {
        let loc = Location::default();
        let mv = Rc::new(UnitExpr::Simple {
            prefix: UnitPrefix::Milli,
            symbol: UnitSymbol::Volt,
            loc,
        });
        let (base, k) = normalize_unit(&mv);
        assert_eq!(k, -3);
        assert!(matches!(
            &*base,
            UnitExpr::Simple { prefix: UnitPrefix::None, symbol: UnitSymbol::Volt, .. }
        ));
    }

    #[test]
    fn normalize_quotient_cancels_prefixes() {
        let loc = Location::default();
        let mv = Rc::new(UnitExpr::Simple {
            prefix: UnitPrefix::Milli,
            symbol: UnitSymbol::Volt,
            loc,
        });
        let ma = Rc::new(UnitExpr::Simple {
            prefix: UnitPrefix::Milli,
            symbol: UnitSymbol::Ampere,
            loc,
        });
        let quot = UnitExpr::binary(UnitOp::Div, mv, ma, loc).unwrap();
        let (base, k) = normalize_unit(&quot);
        assert_eq!(k, 0);
        assert_eq!(unit_to_string(&base), "(V/A)");
    }

    #[test]
    fn normalize_pow_scales_factor() {
        let loc = Location::default();
        let cm = Rc::new(UnitExpr::Simple {
            prefix: UnitPrefix::Centi,
            symbol: UnitSymbol::Meter,
            loc,
        });
        let two = Rc::new(UnitExpr::Integer { val: 2, loc });
        let sq = UnitExpr::binary(UnitOp::Pow, cm, two, loc).unwrap();
        let (_, k) = normalize_unit(&sq);
        assert_eq!(k, -4);
    }

    #[test]
    fn pow_requires_integer_exponent() {
        let loc = Location::default();
        let v = Rc::new(UnitExpr::Simple { prefix: UnitPrefix::None, symbol: UnitSymbol::Volt, loc });
        assert!(UnitExpr::binary(UnitOp::Pow, v.clone(), v, loc).is_err());
    }
}
