//! Parsed quantity-type expressions attached to identifiers and declarations.

use std::rc::Rc;

use crate::location::Location;

pub type PType = Rc<ParsedType>;

/// A physical quantity name usable in type annotations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Quantity {
    Real,
    Length,
    Mass,
    Time,
    Current,
    Amount,
    Temperature,
    Charge,
    Frequency,
    Voltage,
    Resistance,
    Conductance,
    Capacitance,
    Inductance,
    Force,
    Pressure,
    Energy,
    Power,
    Area,
    Volume,
    Concentration,
}

impl Quantity {
    pub fn from_name(s: &str) -> Option<Quantity> {
        let q = match s {
            "real" => Quantity::Real,
            "length" => Quantity::Length,
            "mass" => Quantity::Mass,
            "time" => Quantity::Time,
            "current" => Quantity::Current,
            "amount" => Quantity::Amount,
            "temperature" => Quantity::Temperature,
            "charge" => Quantity::Charge,
            "frequency" => Quantity::Frequency,
            "voltage" => Quantity::Voltage,
            "resistance" => Quantity::Resistance,
            "conductance" => Quantity::Conductance,
            "capacitance" => Quantity::Capacitance,
            "inductance" => Quantity::Inductance,
            "force" => Quantity::Force,
            "pressure" => Quantity::Pressure,
            "energy" => Quantity::Energy,
            "power" => Quantity::Power,
            "area" => Quantity::Area,
            "volume" => Quantity::Volume,
            "concentration" => Quantity::Concentration,
            _ => return None,
        };
        Some(q)
    }

    pub fn name(self) -> &'static str {
        match self {
            Quantity::Real => "real",
            Quantity::Length => "length",
            Quantity::Mass => "mass",
            Quantity::Time => "time",
            Quantity::Current => "current",
            Quantity::Amount => "amount",
            Quantity::Temperature => "temperature",
            Quantity::Charge => "charge",
            Quantity::Frequency => "frequency",
            Quantity::Voltage => "voltage",
            Quantity::Resistance => "resistance",
            Quantity::Conductance => "conductance",
            Quantity::Capacitance => "capacitance",
            Quantity::Inductance => "inductance",
            Quantity::Force => "force",
            Quantity::Pressure => "pressure",
            Quantity::Energy => "energy",
            Quantity::Power => "power",
            Quantity::Area => "area",
            Quantity::Volume => "volume",
            Quantity::Concentration => "concentration",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TypeOp {
    Mul,
    Div,
    Pow,
}

/// A parsed (pre-resolution) type expression.
#[derive(Debug, Clone, PartialEq)]
pub enum ParsedType {
    /// Integer literal in a type position (exponent of `pow`).
    Integer { val: i64, loc: Location },
    Quantity { quantity: Quantity, loc: Location },
    Binary { op: TypeOp, lhs: PType, rhs: PType, loc: Location },
    Bool { loc: Location },
    Record { fields: Vec<(String, PType)>, loc: Location },
    /// Reference to a `record` alias declared in the mechanism.
    Alias { name: String, loc: Location },
}

impl ParsedType {
    pub fn loc(&self) -> Location {
        match self {
            ParsedType::Integer { loc, .. }
            | ParsedType::Quantity { loc, .. }
            | ParsedType::Binary { loc, .. }
            | ParsedType::Bool { loc }
            | ParsedType::Record { loc, .. }
            | ParsedType::Alias { loc, .. } => *loc,
        }
    }

    /// `pow` types require an integer-literal exponent.
    pub fn binary(op: TypeOp, lhs: PType, rhs: PType, loc: Location) -> Result<PType, String> {
        if op == TypeOp::Pow && !matches!(*rhs, ParsedType::Integer { .. }) {
            return Err("the exponent of a type power must be an integer literal".to_string());
        }
        Ok(Rc::new(ParsedType::Binary { op, lhs, rhs, loc }))
    }
}
