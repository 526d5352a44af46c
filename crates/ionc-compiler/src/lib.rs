//! ionc middle end: the compilation pipeline from parsed mechanisms to the
//! printable hand-off structure.
//!
//! Stages, strictly sequential; each consumes its input by reference and
//! builds a fresh immutable tree:
//!
//! 1. [`resolve`] — scope, name-resolve, and dimensionally type-check into
//!    the typed IR ([`ir`], [`rtype`])
//! 2. [`canonicalize`] — flatten to A-normal form with fresh temporaries
//! 3. [`single_assign`] — α-rename so every bound name is defined once
//! 4. [`opt`] — CSE, constant folding, copy propagation, and dead-code
//!    elimination to a fixpoint
//! 5. [`inline`] — substitute pure function bodies, then re-optimize
//! 6. [`solver`] — rewrite `evolve` blocks into closed-form or
//!    implicit-Euler updates via symbolic differentiation
//! 7. [`simplify`]/[`printable`] — erase dimensional types, flatten record
//!    states, and gather the read/write maps for the printer
//!
//! [`interp`] is a reference interpreter used by the property tests, and
//! [`pretty`] renders the IR for `--dump-ir`.

pub mod canonicalize;
pub mod inline;
pub mod interp;
pub mod ir;
pub mod opt;
pub mod pretty;
pub mod printable;
pub mod resolve;
pub mod rtype;
pub mod simplify;
pub mod single_assign;
pub mod solver;

use ionc_lang::ast::ParsedMechanism;
use ionc_lang::location::Location;
use ionc_lang::normalize::normalize_mechanism;
use tracing::info;

use ir::ResolvedMechanism;
use printable::PrintableMechanism;

/// Middle-end errors. The pipeline aborts on the first one.
#[derive(thiserror::Error, Debug)]
pub enum CompileError {
    /// Reference with no binding in scope.
    #[error("unbound identifier '{name}' at {loc}")]
    UnboundIdentifier { name: String, loc: Location },
    /// Dimensional or structural type mismatch.
    #[error("type error at {loc}: {msg}")]
    TypeError { msg: String, loc: Location },
    /// Wrong number of arguments to a function.
    #[error("arity mismatch at {loc}: '{function}' takes {expected} argument(s), got {got}")]
    ArityMismatch { function: String, expected: usize, got: usize, loc: Location },
    /// Cycle detected by the inliner.
    #[error("recursive function '{name}' at {loc}: recursion is not permitted")]
    RecursiveFunction { name: String, loc: Location },
    /// Symbolic differentiation hit an unsupported form.
    #[error("cannot solve evolve block at {loc}: {msg}")]
    NonDifferentiable { msg: String, loc: Location },
    /// A post-condition of an earlier stage does not hold.
    #[error("internal invariant violated: {0}")]
    InternalInvariant(String),
}

pub type Result<T> = std::result::Result<T, CompileError>;

/// Run the pipeline up to the solved, optimized IR.
pub fn lower(parsed: &ParsedMechanism) -> Result<ResolvedMechanism> {
    info!(mechanism = %parsed.name, "normalizing units");
    let normalized = normalize_mechanism(parsed);

    info!(mechanism = %parsed.name, "resolving");
    let resolved = resolve::resolve_mechanism(&normalized)?;

    let canonical = canonicalize::canonicalize_mechanism(&resolved);
    let ssa = single_assign::single_assign_mechanism(&canonical);

    info!(mechanism = %parsed.name, "optimizing");
    let optimizer = opt::Optimizer::standard();
    let optimized = optimizer.optimize(&ssa);

    info!(mechanism = %parsed.name, "inlining functions");
    let inlined = inline::inline_mechanism(&optimized)?;
    let optimized = optimizer.optimize(&inlined);

    info!(mechanism = %parsed.name, "solving evolve blocks");
    solver::solve_mechanism(&optimized)
}

/// Full pipeline: parsed mechanism to the printer hand-off structure.
pub fn compile(parsed: &ParsedMechanism) -> Result<PrintableMechanism> {
    let solved = lower(parsed)?;
    info!(mechanism = %parsed.name, "building printable mechanism");
    printable::printable_mechanism(&solved)
}
