//! The parsed AST: one struct per expression form, collected in the
//! `ParsedExpr` sum type, with shared `Rc` handles between nodes.

use std::fmt::{Display, Formatter};
use std::rc::Rc;

use crate::location::Location;
use crate::types::PType;
use crate::units::PUnit;

pub type PExpr = Rc<ParsedExpr>;

/// What a mechanism is, from the host's point of view.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MechanismKind {
    Point,
    Density,
    Concentration,
    ReversalPotential,
    Junction,
}

impl Display for MechanismKind {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            MechanismKind::Point => "point",
            MechanismKind::Density => "density",
            MechanismKind::Concentration => "concentration",
            MechanismKind::ReversalPotential => "reversal_potential",
            MechanismKind::Junction => "junction",
        };
        write!(f, "{}", s)
    }
}

/// Simulator-provided quantities a mechanism may bind to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Bindable {
    MembranePotential,
    Temperature,
    CurrentDensity,
    MolarFlux,
    Charge,
    InternalConcentration,
    ExternalConcentration,
    NernstPotential,
    Dt,
}

impl Bindable {
    pub fn from_name(s: &str) -> Option<Bindable> {
        let b = match s {
            "membrane_potential" => Bindable::MembranePotential,
            "temperature" => Bindable::Temperature,
            "current_density" => Bindable::CurrentDensity,
            "molar_flux" => Bindable::MolarFlux,
            "charge" => Bindable::Charge,
            "internal_concentration" => Bindable::InternalConcentration,
            "external_concentration" => Bindable::ExternalConcentration,
            "nernst_potential" => Bindable::NernstPotential,
            "dt" => Bindable::Dt,
            _ => return None,
        };
        Some(b)
    }

    pub fn name(self) -> &'static str {
        match self {
            Bindable::MembranePotential => "membrane_potential",
            Bindable::Temperature => "temperature",
            Bindable::CurrentDensity => "current_density",
            Bindable::MolarFlux => "molar_flux",
            Bindable::Charge => "charge",
            Bindable::InternalConcentration => "internal_concentration",
            Bindable::ExternalConcentration => "external_concentration",
            Bindable::NernstPotential => "nernst_potential",
            Bindable::Dt => "dt",
        }
    }
}

/// Simulator quantities a mechanism may contribute to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Affectable {
    CurrentDensityContribution,
    CurrentContribution,
    MolarFluxContribution,
    InternalConcentrationRate,
    ExternalConcentrationRate,
}

impl Affectable {
    pub fn from_name(s: &str) -> Option<Affectable> {
        let a = match s {
            "current_density" => Affectable::CurrentDensityContribution,
            "current" => Affectable::CurrentContribution,
            "molar_flux" => Affectable::MolarFluxContribution,
            "internal_concentration_rate" => Affectable::InternalConcentrationRate,
            "external_concentration_rate" => Affectable::ExternalConcentrationRate,
            _ => return None,
        };
        Some(a)
    }

    pub fn name(self) -> &'static str {
        match self {
            Affectable::CurrentDensityContribution => "current_density",
            Affectable::CurrentContribution => "current",
            Affectable::MolarFluxContribution => "molar_flux",
            Affectable::InternalConcentrationRate => "internal_concentration_rate",
            Affectable::ExternalConcentrationRate => "external_concentration_rate",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum UnaryOp {
    Neg,
    Not,
    Exp,
    Sin,
    Cos,
    Log,
    Abs,
    Exprelr,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BinaryOp {
    Add,
    Sub,
    Mul,
    Div,
    Pow,
    Min,
    Max,
    Lt,
    Le,
    Gt,
    Ge,
    Eq,
    Ne,
    And,
    Or,
    /// Record field access; the right operand is always an identifier.
    Dot,
}

impl BinaryOp {
    pub fn is_boolean(self) -> bool {
        matches!(
            self,
            BinaryOp::Lt
                | BinaryOp::Le
                | BinaryOp::Gt
                | BinaryOp::Ge
                | BinaryOp::Eq
                | BinaryOp::Ne
                | BinaryOp::And
                | BinaryOp::Or
        )
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum ParsedExpr {
    // mechanism-level declarations
    Parameter(ParsedParameter),
    Constant(ParsedConstant),
    State(ParsedState),
    RecordAlias(ParsedRecordAlias),
    Function(ParsedFunction),
    Bind(ParsedBind),
    Initial(ParsedInitial),
    Evolve(ParsedEvolve),
    Effect(ParsedEffect),
    Export(ParsedExport),

    // value expressions
    Call(ParsedCall),
    Object(ParsedObject),
    Let(ParsedLet),
    With(ParsedWith),
    If(ParsedIf),
    Identifier(ParsedIdentifier),
    Float(ParsedFloat),
    Int(ParsedInt),
    Unary(ParsedUnary),
    Binary(ParsedBinary),
}

#[derive(Debug, Clone, PartialEq)]
pub struct ParsedIdentifier {
    pub name: String,
    pub ty: Option<PType>,
    pub loc: Location,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ParsedParameter {
    pub id: ParsedIdentifier,
    pub value: PExpr,
    pub loc: Location,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ParsedConstant {
    pub id: ParsedIdentifier,
    pub value: PExpr,
    pub loc: Location,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ParsedState {
    pub id: ParsedIdentifier,
    pub loc: Location,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ParsedRecordAlias {
    pub name: String,
    pub ty: PType,
    pub loc: Location,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ParsedFunction {
    pub name: String,
    pub args: Vec<ParsedIdentifier>,
    pub ret: Option<PType>,
    pub body: PExpr,
    pub loc: Location,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ParsedBind {
    pub name: String,
    pub kind: Bindable,
    pub ion: Option<String>,
    pub loc: Location,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ParsedInitial {
    pub target: String,
    pub value: PExpr,
    pub loc: Location,
}

/// `evolve x' = f;` — the target name is stored without the prime.
#[derive(Debug, Clone, PartialEq)]
pub struct ParsedEvolve {
    pub target: String,
    pub value: PExpr,
    pub loc: Location,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ParsedEffect {
    pub kind: Affectable,
    pub ion: Option<String>,
    pub value: PExpr,
    pub loc: Location,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ParsedExport {
    pub name: String,
    pub loc: Location,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ParsedCall {
    pub function: String,
    pub args: Vec<PExpr>,
    pub loc: Location,
}

/// `{ field = expr; ... }`. `record` is filled during resolution when the
/// object's record type is known from context.
#[derive(Debug, Clone, PartialEq)]
pub struct ParsedObject {
    pub record: Option<String>,
    pub fields: Vec<(String, PExpr)>,
    pub loc: Location,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ParsedLet {
    pub id: ParsedIdentifier,
    pub value: PExpr,
    pub body: PExpr,
    pub loc: Location,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ParsedWith {
    pub value: PExpr,
    pub body: PExpr,
    pub loc: Location,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ParsedIf {
    pub condition: PExpr,
    pub if_true: PExpr,
    pub if_false: PExpr,
    pub loc: Location,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ParsedFloat {
    pub value: f64,
    pub unit: PUnit,
    pub loc: Location,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ParsedInt {
    pub value: i64,
    pub unit: PUnit,
    pub loc: Location,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ParsedUnary {
    pub op: UnaryOp,
    pub arg: PExpr,
    pub loc: Location,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ParsedBinary {
    pub op: BinaryOp,
    pub lhs: PExpr,
    pub rhs: PExpr,
    pub loc: Location,
}

impl ParsedExpr {
    pub fn loc(&self) -> Location {
        match self {
            ParsedExpr::Parameter(e) => e.loc,
            ParsedExpr::Constant(e) => e.loc,
            ParsedExpr::State(e) => e.loc,
            ParsedExpr::RecordAlias(e) => e.loc,
            ParsedExpr::Function(e) => e.loc,
            ParsedExpr::Bind(e) => e.loc,
            ParsedExpr::Initial(e) => e.loc,
            ParsedExpr::Evolve(e) => e.loc,
            ParsedExpr::Effect(e) => e.loc,
            ParsedExpr::Export(e) => e.loc,
            ParsedExpr::Call(e) => e.loc,
            ParsedExpr::Object(e) => e.loc,
            ParsedExpr::Let(e) => e.loc,
            ParsedExpr::With(e) => e.loc,
            ParsedExpr::If(e) => e.loc,
            ParsedExpr::Identifier(e) => e.loc,
            ParsedExpr::Float(e) => e.loc,
            ParsedExpr::Int(e) => e.loc,
            ParsedExpr::Unary(e) => e.loc,
            ParsedExpr::Binary(e) => e.loc,
        }
    }
}

/// A parsed mechanism: declarations grouped by kind, in source order.
#[derive(Debug, Clone, PartialEq)]
pub struct ParsedMechanism {
    pub name: String,
    pub kind: MechanismKind,
    pub parameters: Vec<PExpr>,
    pub constants: Vec<PExpr>,
    pub states: Vec<PExpr>,
    pub records: Vec<PExpr>,
    pub functions: Vec<PExpr>,
    pub bindings: Vec<PExpr>,
    pub initials: Vec<PExpr>,
    pub evolutions: Vec<PExpr>,
    pub effects: Vec<PExpr>,
    pub exports: Vec<PExpr>,
    pub loc: Location,
}

impl ParsedMechanism {
    pub fn new(name: String, kind: MechanismKind, loc: Location) -> Self {
        Self {
            name,
            kind,
            parameters: Vec::new(),
            constants: Vec::new(),
            states: Vec::new(),
            records: Vec::new(),
            functions: Vec::new(),
            bindings: Vec::new(),
            initials: Vec::new(),
            evolutions: Vec::new(),
            effects: Vec::new(),
            exports: Vec::new(),
            loc,
        }
    }
}
