//! The typed IR produced by the resolver and consumed by every later stage.
//!
//! Mirrors the parsed AST but: every node carries a resolved type, all
//! identifiers refer to their binding site by name (`Argument`), `with`
//! blocks have been lowered away, and record field access is its own node.

use std::collections::HashSet;
use std::rc::Rc;

use ionc_lang::ast::{Affectable, Bindable, BinaryOp, MechanismKind, UnaryOp};
use ionc_lang::location::Location;

use crate::rtype::RType;

pub type RExpr = Rc<ResolvedExpr>;

#[derive(Debug, Clone, PartialEq)]
pub enum ResolvedExpr {
    // mechanism-level declarations
    Parameter(ResolvedParameter),
    Constant(ResolvedConstant),
    State(ResolvedState),
    Function(ResolvedFunction),
    Bind(ResolvedBind),
    Initial(ResolvedInitial),
    Evolve(ResolvedEvolve),
    Effect(ResolvedEffect),
    Export(ResolvedExport),

    // value expressions
    Call(ResolvedCall),
    Object(ResolvedObject),
    Let(ResolvedLet),
    If(ResolvedIf),
    FieldAccess(ResolvedFieldAccess),
    Argument(ResolvedArgument),
    Float(ResolvedFloat),
    Int(ResolvedInt),
    Unary(ResolvedUnary),
    Binary(ResolvedBinary),
}

#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedParameter {
    pub name: String,
    pub value: RExpr,
    pub ty: RType,
    pub loc: Location,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedConstant {
    pub name: String,
    pub value: RExpr,
    pub ty: RType,
    pub loc: Location,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedState {
    pub name: String,
    pub ty: RType,
    pub loc: Location,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedFunction {
    pub name: String,
    pub args: Vec<ResolvedArgument>,
    pub body: RExpr,
    pub ret: RType,
    pub loc: Location,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedBind {
    pub name: String,
    pub kind: Bindable,
    pub ion: Option<String>,
    pub ty: RType,
    pub loc: Location,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedInitial {
    pub target: String,
    pub value: RExpr,
    /// The target state's type.
    pub ty: RType,
    pub loc: Location,
}

/// An `evolve` block. Before the solver runs, `value` is the state's time
/// derivative; afterwards it is the state's updated value over one `dt`.
#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedEvolve {
    pub target: String,
    pub value: RExpr,
    /// The target state's type.
    pub ty: RType,
    pub loc: Location,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedEffect {
    pub kind: Affectable,
    pub ion: Option<String>,
    pub value: RExpr,
    pub ty: RType,
    pub loc: Location,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedExport {
    pub name: String,
    pub ty: RType,
    pub loc: Location,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedCall {
    pub function: String,
    pub args: Vec<RExpr>,
    pub ty: RType,
    pub loc: Location,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedObject {
    pub fields: Vec<(String, RExpr)>,
    pub ty: RType,
    pub loc: Location,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedLet {
    pub name: String,
    pub value: RExpr,
    pub body: RExpr,
    /// The body's type.
    pub ty: RType,
    pub loc: Location,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedIf {
    pub condition: RExpr,
    pub if_true: RExpr,
    pub if_false: RExpr,
    pub ty: RType,
    pub loc: Location,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedFieldAccess {
    pub object: RExpr,
    pub field: String,
    pub ty: RType,
    pub loc: Location,
}

/// A reference to a binding in scope: a parameter, state, bind, function
/// argument, or let-bound local.
#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedArgument {
    pub name: String,
    pub ty: RType,
    pub loc: Location,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedFloat {
    pub value: f64,
    pub ty: RType,
    pub loc: Location,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedInt {
    pub value: i64,
    pub ty: RType,
    pub loc: Location,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedUnary {
    pub op: UnaryOp,
    pub arg: RExpr,
    pub ty: RType,
    pub loc: Location,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedBinary {
    /// Never `BinaryOp::Dot`; field access resolves to `FieldAccess`.
    pub op: BinaryOp,
    pub lhs: RExpr,
    pub rhs: RExpr,
    pub ty: RType,
    pub loc: Location,
}

impl ResolvedExpr {
    pub fn loc(&self) -> Location {
        match self {
            ResolvedExpr::Parameter(e) => e.loc,
            ResolvedExpr::Constant(e) => e.loc,
            ResolvedExpr::State(e) => e.loc,
            ResolvedExpr::Function(e) => e.loc,
            ResolvedExpr::Bind(e) => e.loc,
            ResolvedExpr::Initial(e) => e.loc,
            ResolvedExpr::Evolve(e) => e.loc,
            ResolvedExpr::Effect(e) => e.loc,
            ResolvedExpr::Export(e) => e.loc,
            ResolvedExpr::Call(e) => e.loc,
            ResolvedExpr::Object(e) => e.loc,
            ResolvedExpr::Let(e) => e.loc,
            ResolvedExpr::If(e) => e.loc,
            ResolvedExpr::FieldAccess(e) => e.loc,
            ResolvedExpr::Argument(e) => e.loc,
            ResolvedExpr::Float(e) => e.loc,
            ResolvedExpr::Int(e) => e.loc,
            ResolvedExpr::Unary(e) => e.loc,
            ResolvedExpr::Binary(e) => e.loc,
        }
    }
}

/// The type of a value expression. Declarations report the type of the value
/// they introduce.
pub fn type_of(e: &RExpr) -> RType {
    match &**e {
        ResolvedExpr::Parameter(x) => x.ty.clone(),
        ResolvedExpr::Constant(x) => x.ty.clone(),
        ResolvedExpr::State(x) => x.ty.clone(),
        ResolvedExpr::Function(x) => x.ret.clone(),
        ResolvedExpr::Bind(x) => x.ty.clone(),
        ResolvedExpr::Initial(x) => x.ty.clone(),
        ResolvedExpr::Evolve(x) => x.ty.clone(),
        ResolvedExpr::Effect(x) => x.ty.clone(),
        ResolvedExpr::Export(x) => x.ty.clone(),
        ResolvedExpr::Call(x) => x.ty.clone(),
        ResolvedExpr::Object(x) => x.ty.clone(),
        ResolvedExpr::Let(x) => x.ty.clone(),
        ResolvedExpr::If(x) => x.ty.clone(),
        ResolvedExpr::FieldAccess(x) => x.ty.clone(),
        ResolvedExpr::Argument(x) => x.ty.clone(),
        ResolvedExpr::Float(x) => x.ty.clone(),
        ResolvedExpr::Int(x) => x.ty.clone(),
        ResolvedExpr::Unary(x) => x.ty.clone(),
        ResolvedExpr::Binary(x) => x.ty.clone(),
    }
}

/// Identifiers and literals are trivial: canonicalization leaves them in
/// place, everything else moves to the value side of a `let`.
pub fn is_trivial(e: &RExpr) -> bool {
    matches!(
        &**e,
        ResolvedExpr::Argument(_) | ResolvedExpr::Float(_) | ResolvedExpr::Int(_)
    )
}

/// A resolved mechanism: declarations grouped by kind.
#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedMechanism {
    pub name: String,
    pub kind: MechanismKind,
    pub parameters: Vec<RExpr>,
    pub constants: Vec<RExpr>,
    pub states: Vec<RExpr>,
    pub bindings: Vec<RExpr>,
    pub functions: Vec<RExpr>,
    pub initials: Vec<RExpr>,
    pub evolutions: Vec<RExpr>,
    pub effects: Vec<RExpr>,
    pub exports: Vec<RExpr>,
    pub loc: Location,
}

impl ResolvedMechanism {
    pub fn new(name: String, kind: MechanismKind, loc: Location) -> Self {
        Self {
            name,
            kind,
            parameters: Vec::new(),
            constants: Vec::new(),
            states: Vec::new(),
            bindings: Vec::new(),
            functions: Vec::new(),
            initials: Vec::new(),
            evolutions: Vec::new(),
            effects: Vec::new(),
            exports: Vec::new(),
            loc,
        }
    }

    /// Every name declared at mechanism scope, for seeding fresh-name sets.
    pub fn declared_names(&self) -> HashSet<String> {
        let mut names = HashSet::new();
        for e in self
            .parameters
            .iter()
            .chain(&self.constants)
            .chain(&self.states)
            .chain(&self.bindings)
            .chain(&self.functions)
        {
            match &**e {
                ResolvedExpr::Parameter(x) => {
                    names.insert(x.name.clone());
                }
                ResolvedExpr::Constant(x) => {
                    names.insert(x.name.clone());
                }
                ResolvedExpr::State(x) => {
                    names.insert(x.name.clone());
                }
                ResolvedExpr::Bind(x) => {
                    names.insert(x.name.clone());
                }
                ResolvedExpr::Function(x) => {
                    names.insert(x.name.clone());
                    for a in &x.args {
                        names.insert(a.name.clone());
                    }
                }
                _ => {}
            }
        }
        names
    }
}

/// Generate a name of the form `_{prefix}{i}` not yet in `reserved`, and
/// reserve it.
pub fn unique_name(reserved: &mut HashSet<String>, prefix: &str) -> String {
    for i in 0.. {
        let name = format!("_{}{}", prefix, i);
        if reserved.insert(name.clone()) {
            return name;
        }
    }
    unreachable!()
}

/// All let-bound names reachable from an expression, including nested ones.
pub fn bound_names(e: &RExpr, out: &mut Vec<String>) {
    match &**e {
        ResolvedExpr::Let(l) => {
            out.push(l.name.clone());
            bound_names(&l.value, out);
            bound_names(&l.body, out);
        }
        ResolvedExpr::If(i) => {
            bound_names(&i.condition, out);
            bound_names(&i.if_true, out);
            bound_names(&i.if_false, out);
        }
        ResolvedExpr::Unary(u) => bound_names(&u.arg, out),
        ResolvedExpr::Binary(b) => {
            bound_names(&b.lhs, out);
            bound_names(&b.rhs, out);
        }
        ResolvedExpr::Call(c) => {
            for a in &c.args {
                bound_names(a, out);
            }
        }
        ResolvedExpr::Object(o) => {
            for (_, v) in &o.fields {
                bound_names(v, out);
            }
        }
        ResolvedExpr::FieldAccess(f) => bound_names(&f.object, out),
        _ => {}
    }
}

/// All `Argument` names read by an expression.
pub fn read_arguments(e: &RExpr, out: &mut HashSet<String>) {
    match &**e {
        ResolvedExpr::Argument(a) => {
            out.insert(a.name.clone());
        }
        ResolvedExpr::Let(l) => {
            read_arguments(&l.value, out);
            read_arguments(&l.body, out);
        }
        ResolvedExpr::If(i) => {
            read_arguments(&i.condition, out);
            read_arguments(&i.if_true, out);
            read_arguments(&i.if_false, out);
        }
        ResolvedExpr::Unary(u) => read_arguments(&u.arg, out),
        ResolvedExpr::Binary(b) => {
            read_arguments(&b.lhs, out);
            read_arguments(&b.rhs, out);
        }
        ResolvedExpr::Call(c) => {
            for a in &c.args {
                read_arguments(a, out);
            }
        }
        ResolvedExpr::Object(o) => {
            for (_, v) in &o.fields {
                read_arguments(v, out);
            }
        }
        ResolvedExpr::FieldAccess(f) => read_arguments(&f.object, out),
        _ => {}
    }
}

/// Number of nodes in an expression tree; the well-founded measure the
/// optimizer passes are monotone in.
pub fn node_count(e: &RExpr) -> usize {
    1 + match &**e {
        ResolvedExpr::Let(l) => node_count(&l.value) + node_count(&l.body),
        ResolvedExpr::If(i) => {
            node_count(&i.condition) + node_count(&i.if_true) + node_count(&i.if_false)
        }
        ResolvedExpr::Unary(u) => node_count(&u.arg),
        ResolvedExpr::Binary(b) => node_count(&b.lhs) + node_count(&b.rhs),
        ResolvedExpr::Call(c) => c.args.iter().map(node_count).sum(),
        ResolvedExpr::Object(o) => o.fields.iter().map(|(_, v)| node_count(v)).sum(),
        ResolvedExpr::FieldAccess(f) => node_count(&f.object),
        _ => 0,
    }
}
