//! ionc language frontend.
//!
//! Turns `.ion` mechanism source text into a parsed AST with physical-unit
//! and quantity-type expressions attached:
//!
//! - [`lexer`]: character stream → token stream
//! - [`parser`]: token stream → [`ast::ParsedMechanism`]
//! - [`normalize`]: rewrite every literal's unit to a prefix-free base form,
//!   folding the power of ten into the value
//! - [`pretty`]: source-syntax printing and structural equality
//!
//! Scoping, dimensional type checking, and everything downstream live in the
//! `ionc-compiler` crate.

pub mod ast;
pub mod lexer;
pub mod location;
pub mod normalize;
pub mod parser;
pub mod pretty;
pub mod token;
pub mod types;
pub mod units;

use location::Location;

/// Frontend errors. The pipeline aborts on the first one.
#[derive(thiserror::Error, Debug, Clone)]
pub enum ParseError {
    /// Unrecognized character in the input.
    #[error("lexical error at {loc}: {msg}")]
    Lex { msg: String, loc: Location },
    /// Unexpected token.
    #[error("parse error at {loc}: {msg}")]
    Parse { msg: String, loc: Location },
}

pub type Result<T> = std::result::Result<T, ParseError>;

/// Parse all mechanisms in a source file.
pub fn parse_mechanisms(src: &str) -> Result<Vec<ast::ParsedMechanism>> {
    parser::Parser::new(src).parse_mechanisms()
}

/// Parse a single mechanism.
pub fn parse_mechanism(src: &str) -> Result<ast::ParsedMechanism> {
    parser::Parser::new(src).parse_mechanism()
}
