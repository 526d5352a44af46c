//! Resolved (dimensional) types.
//!
//! Every compound quantity collapses to a point in ℤ⁶: exponents over the six
//! base SI dimensions mass (g), length (m), time (s), current (A),
//! temperature (K), and amount (mol). Two quantity types are equal exactly
//! when their exponent tuples are equal.

use std::rc::Rc;

use ionc_lang::ast::{Affectable, Bindable};
use ionc_lang::location::Location;
use ionc_lang::types::{ParsedType, PType, Quantity, TypeOp};

use crate::{CompileError, Result};

const MASS: usize = 0;
const LENGTH: usize = 1;
const TIME: usize = 2;
const CURRENT: usize = 3;
const TEMPERATURE: usize = 4;
const AMOUNT: usize = 5;

/// Exponents over (g, m, s, A, K, mol).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct Dimensions(pub [i32; 6]);

impl Dimensions {
    pub fn real() -> Self {
        Self::default()
    }

    pub fn is_real(&self) -> bool {
        self.0 == [0; 6]
    }

    pub fn mul(self, other: Self) -> Self {
        let mut out = [0; 6];
        for i in 0..6 {
            out[i] = self.0[i] + other.0[i];
        }
        Dimensions(out)
    }

    pub fn div(self, other: Self) -> Self {
        let mut out = [0; 6];
        for i in 0..6 {
            out[i] = self.0[i] - other.0[i];
        }
        Dimensions(out)
    }

    pub fn pow(self, n: i32) -> Self {
        let mut out = [0; 6];
        for i in 0..6 {
            out[i] = self.0[i] * n;
        }
        Dimensions(out)
    }

    pub fn from_quantity(q: Quantity) -> Self {
        let mut d = [0i32; 6];
        match q {
            Quantity::Real => {}
            Quantity::Mass => d[MASS] = 1,
            Quantity::Length => d[LENGTH] = 1,
            Quantity::Time => d[TIME] = 1,
            Quantity::Current => d[CURRENT] = 1,
            Quantity::Temperature => d[TEMPERATURE] = 1,
            Quantity::Amount => d[AMOUNT] = 1,
            Quantity::Charge => {
                d[CURRENT] = 1;
                d[TIME] = 1;
            }
            Quantity::Frequency => d[TIME] = -1,
            Quantity::Voltage => {
                d[MASS] = 1;
                d[LENGTH] = 2;
                d[TIME] = -3;
                d[CURRENT] = -1;
            }
            Quantity::Resistance => {
                d[MASS] = 1;
                d[LENGTH] = 2;
                d[TIME] = -3;
                d[CURRENT] = -2;
            }
            Quantity::Conductance => {
                d[MASS] = -1;
                d[LENGTH] = -2;
                d[TIME] = 3;
                d[CURRENT] = 2;
            }
            Quantity::Capacitance => {
                d[MASS] = -1;
                d[LENGTH] = -2;
                d[TIME] = 4;
                d[CURRENT] = 2;
            }
            Quantity::Inductance => {
                d[MASS] = 1;
                d[LENGTH] = 2;
                d[TIME] = -2;
                d[CURRENT] = -2;
            }
            Quantity::Force => {
                d[MASS] = 1;
                d[LENGTH] = 1;
                d[TIME] = -2;
            }
            Quantity::Pressure => {
                d[MASS] = 1;
                d[LENGTH] = -1;
                d[TIME] = -2;
            }
            Quantity::Energy => {
                d[MASS] = 1;
                d[LENGTH] = 2;
                d[TIME] = -2;
            }
            Quantity::Power => {
                d[MASS] = 1;
                d[LENGTH] = 2;
                d[TIME] = -3;
            }
            Quantity::Area => d[LENGTH] = 2,
            Quantity::Volume => d[LENGTH] = 3,
            Quantity::Concentration => {
                d[AMOUNT] = 1;
                d[LENGTH] = -3;
            }
        }
        Dimensions(d)
    }
}

pub type RType = Rc<ResolvedType>;

#[derive(Debug, Clone, PartialEq)]
pub enum ResolvedType {
    Quantity { dims: Dimensions, loc: Location },
    Bool { loc: Location },
    Record { fields: Vec<(String, RType)>, loc: Location },
}

impl ResolvedType {
    pub fn loc(&self) -> Location {
        match self {
            ResolvedType::Quantity { loc, .. }
            | ResolvedType::Bool { loc }
            | ResolvedType::Record { loc, .. } => *loc,
        }
    }
}

pub fn quantity_type(dims: Dimensions, loc: Location) -> RType {
    Rc::new(ResolvedType::Quantity { dims, loc })
}

pub fn real_type(loc: Location) -> RType {
    quantity_type(Dimensions::real(), loc)
}

pub fn bool_type(loc: Location) -> RType {
    Rc::new(ResolvedType::Bool { loc })
}

/// Structural equality, ignoring locations. Record fields compare as an
/// unordered name → type map.
pub fn rtype_eq(a: &RType, b: &RType) -> bool {
    match (&**a, &**b) {
        (ResolvedType::Quantity { dims: x, .. }, ResolvedType::Quantity { dims: y, .. }) => x == y,
        (ResolvedType::Bool { .. }, ResolvedType::Bool { .. }) => true,
        (ResolvedType::Record { fields: x, .. }, ResolvedType::Record { fields: y, .. }) => {
            x.len() == y.len()
                && x.iter().all(|(n, t)| {
                    y.iter().any(|(m, u)| n == m && rtype_eq(t, u))
                })
        }
        _ => false,
    }
}

/// Resolve a parsed type, looking record aliases up in `aliases`.
pub fn resolve_type(
    pt: &PType,
    aliases: &std::collections::HashMap<String, RType>,
) -> Result<RType> {
    match &**pt {
        ParsedType::Quantity { quantity, loc } => {
            Ok(quantity_type(Dimensions::from_quantity(*quantity), *loc))
        }
        // An integer in type position only carries dimension information as
        // a `pow` exponent; standalone it is dimensionless.
        ParsedType::Integer { loc, .. } => Ok(real_type(*loc)),
        ParsedType::Bool { loc } => Ok(bool_type(*loc)),
        ParsedType::Binary { op, lhs, rhs, loc } => {
            let l = resolve_type(lhs, aliases)?;
            let ResolvedType::Quantity { dims: ld, .. } = &*l else {
                return Err(CompileError::TypeError {
                    msg: "expected a quantity type".to_string(),
                    loc: *loc,
                });
            };
            match op {
                TypeOp::Pow => {
                    let ParsedType::Integer { val, .. } = &**rhs else {
                        return Err(CompileError::TypeError {
                            msg: "the exponent of a type power must be an integer literal"
                                .to_string(),
                            loc: *loc,
                        });
                    };
                    Ok(quantity_type(ld.pow(*val as i32), *loc))
                }
                TypeOp::Mul | TypeOp::Div => {
                    let r = resolve_type(rhs, aliases)?;
                    let ResolvedType::Quantity { dims: rd, .. } = &*r else {
                        return Err(CompileError::TypeError {
                            msg: "expected a quantity type".to_string(),
                            loc: *loc,
                        });
                    };
                    let dims =
                        if *op == TypeOp::Mul { ld.mul(*rd) } else { ld.div(*rd) };
                    Ok(quantity_type(dims, *loc))
                }
            }
        }
        ParsedType::Record { fields, loc } => {
            let mut rf = Vec::with_capacity(fields.len());
            for (name, ty) in fields {
                rf.push((name.clone(), resolve_type(ty, aliases)?));
            }
            Ok(Rc::new(ResolvedType::Record { fields: rf, loc: *loc }))
        }
        ParsedType::Alias { name, loc } => aliases.get(name).cloned().ok_or_else(|| {
            CompileError::UnboundIdentifier { name: name.clone(), loc: *loc }
        }),
    }
}

/// The type of the simulator-provided value behind a binding.
pub fn bindable_type(b: Bindable, loc: Location) -> RType {
    let dims = match b {
        Bindable::MembranePotential | Bindable::NernstPotential => {
            Dimensions::from_quantity(Quantity::Voltage)
        }
        Bindable::Temperature => Dimensions::from_quantity(Quantity::Temperature),
        Bindable::CurrentDensity => Dimensions::from_quantity(Quantity::Current)
            .div(Dimensions::from_quantity(Quantity::Area)),
        Bindable::MolarFlux => Dimensions::from_quantity(Quantity::Amount)
            .div(Dimensions::from_quantity(Quantity::Area))
            .div(Dimensions::from_quantity(Quantity::Time)),
        Bindable::Charge => Dimensions::from_quantity(Quantity::Charge),
        Bindable::InternalConcentration | Bindable::ExternalConcentration => {
            Dimensions::from_quantity(Quantity::Concentration)
        }
        Bindable::Dt => Dimensions::from_quantity(Quantity::Time),
    };
    quantity_type(dims, loc)
}

/// The type an effect's value must have.
pub fn affectable_type(a: Affectable, loc: Location) -> RType {
    let dims = match a {
        Affectable::CurrentDensityContribution => Dimensions::from_quantity(Quantity::Current)
            .div(Dimensions::from_quantity(Quantity::Area)),
        Affectable::CurrentContribution => Dimensions::from_quantity(Quantity::Current),
        Affectable::MolarFluxContribution => Dimensions::from_quantity(Quantity::Amount)
            .div(Dimensions::from_quantity(Quantity::Area))
            .div(Dimensions::from_quantity(Quantity::Time)),
        Affectable::InternalConcentrationRate | Affectable::ExternalConcentrationRate => {
            Dimensions::from_quantity(Quantity::Concentration)
                .div(Dimensions::from_quantity(Quantity::Time))
        }
    };
    quantity_type(dims, loc)
}

/// The type of a state's time derivative: the state's dimensions divided by
/// time. `None` for boolean states (which cannot evolve).
pub fn derive_type(t: &RType) -> Option<RType> {
    match &**t {
        ResolvedType::Quantity { dims, loc } => Some(quantity_type(
            dims.div(Dimensions::from_quantity(Quantity::Time)),
            *loc,
        )),
        ResolvedType::Record { fields, loc } => {
            let mut df = Vec::with_capacity(fields.len());
            for (name, ty) in fields {
                df.push((name.clone(), derive_type(ty)?));
            }
            Some(Rc::new(ResolvedType::Record { fields: df, loc: *loc }))
        }
        ResolvedType::Bool { .. } => None,
    }
}

pub fn type_to_string(t: &RType) -> String {
    match &**t {
        ResolvedType::Quantity { dims, .. } => {
            if dims.is_real() {
                return "real".to_string();
            }
            let names = ["g", "m", "s", "A", "K", "mol"];
            let parts: Vec<String> = dims
                .0
                .iter()
                .zip(names)
                .filter(|(e, _)| **e != 0)
                .map(|(e, n)| if *e == 1 { n.to_string() } else { format!("{}^{}", n, e) })
                .collect();
            parts.join("*")
        }
        ResolvedType::Bool { .. } => "bool".to_string(),
        ResolvedType::Record { fields, .. } => {
            let fs: Vec<String> =
                fields.iter().map(|(n, t)| format!("{}: {}", n, type_to_string(t))).collect();
            format!("{{ {} }}", fs.join("; "))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn voltage_decomposes_to_base_dimensions() {
        // V = g·m²·s⁻³·A⁻¹ over the (g, m, s, A, K, mol) basis
        let v = Dimensions::from_quantity(Quantity::Voltage);
        assert_eq!(v.0, [1, 2, -3, -1, 0, 0]);
    }

    #[test]
    fn voltage_over_current_is_resistance() {
        let v = Dimensions::from_quantity(Quantity::Voltage);
        let i = Dimensions::from_quantity(Quantity::Current);
        assert_eq!(v.div(i), Dimensions::from_quantity(Quantity::Resistance));
    }

    #[test]
    fn conductance_times_voltage_is_current() {
        let g = Dimensions::from_quantity(Quantity::Conductance);
        let v = Dimensions::from_quantity(Quantity::Voltage);
        assert_eq!(g.mul(v), Dimensions::from_quantity(Quantity::Current));
    }

    #[test]
    fn power_of_length_is_volume() {
        let m = Dimensions::from_quantity(Quantity::Length);
        assert_eq!(m.pow(3), Dimensions::from_quantity(Quantity::Volume));
    }

    #[test]
    fn derive_divides_by_time() {
        let conc = quantity_type(Dimensions::from_quantity(Quantity::Concentration), Location::default());
        let rate = derive_type(&conc).unwrap();
        let ResolvedType::Quantity { dims, .. } = &*rate else { panic!() };
        assert_eq!(dims.0, [0, -3, -1, 0, 0, 1]);
    }

    #[test]
    fn frequency_is_inverse_time() {
        let hz = Dimensions::from_quantity(Quantity::Frequency);
        let s = Dimensions::from_quantity(Quantity::Time);
        assert!(hz.mul(s).is_real());
    }
}
