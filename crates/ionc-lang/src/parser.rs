//! Recursive-descent parser with Pratt-style precedence climbing for binary
//! operators. Fails on the first unexpected token; there is no recovery.

use std::rc::Rc;

use crate::ast::*;
use crate::lexer::Lexer;
use crate::token::{associativity, binop_precedence, Assoc, Tok, Token, UNARY_PRECEDENCE};
use crate::types::{ParsedType, PType, Quantity, TypeOp};
use crate::units::{check_simple_unit, PUnit, UnitExpr, UnitOp};
use crate::{ParseError, Result};

pub struct Parser {
    lexer: Lexer,
    current: Token,
}

impl Parser {
    pub fn new(src: &str) -> Self {
        let mut lexer = Lexer::new(src);
        let current = lexer.next_token();
        Self { lexer, current }
    }

    fn advance(&mut self) -> Token {
        std::mem::replace(&mut self.current, self.lexer.next_token())
    }

    fn unexpected(&self, expected: &str) -> ParseError {
        if self.current.tok == Tok::Error {
            ParseError::Lex { msg: self.current.spelling.clone(), loc: self.current.loc }
        } else {
            ParseError::Parse {
                msg: format!("unexpected token '{}', expected {}", self.current.spelling, expected),
                loc: self.current.loc,
            }
        }
    }

    fn expect(&mut self, t: Tok, expected: &str) -> Result<Token> {
        if self.current.tok == t {
            Ok(self.advance())
        } else {
            Err(self.unexpected(expected))
        }
    }

    /// Parse every mechanism in the source, to end of input.
    pub fn parse_mechanisms(&mut self) -> Result<Vec<ParsedMechanism>> {
        let mut mechs = Vec::new();
        while self.current.tok != Tok::Eof {
            mechs.push(self.parse_mechanism()?);
        }
        Ok(mechs)
    }

    pub fn parse_mechanism(&mut self) -> Result<ParsedMechanism> {
        let kind = match self.current.tok {
            Tok::Point => MechanismKind::Point,
            Tok::Density => MechanismKind::Density,
            Tok::Concentration => MechanismKind::Concentration,
            Tok::ReversalPotential => MechanismKind::ReversalPotential,
            Tok::Junction => MechanismKind::Junction,
            _ => return Err(self.unexpected("a mechanism kind")),
        };
        let kind_tok = self.advance();
        let name = self.expect(Tok::Identifier, "mechanism name")?;
        let mut mech = ParsedMechanism::new(name.spelling, kind, kind_tok.loc);

        self.expect(Tok::LBrace, "'{'")?;
        while self.current.tok != Tok::RBrace {
            match self.current.tok {
                Tok::Parameter => mech.parameters.push(self.parse_parameter()?),
                Tok::Constant => mech.constants.push(self.parse_constant()?),
                Tok::State => mech.states.push(self.parse_state()?),
                Tok::Record => mech.records.push(self.parse_record_alias()?),
                Tok::Function => mech.functions.push(self.parse_function()?),
                Tok::Bind => mech.bindings.push(self.parse_binding()?),
                Tok::Initial => mech.initials.push(self.parse_initial()?),
                Tok::Evolve => mech.evolutions.push(self.parse_evolve()?),
                Tok::Effect => mech.effects.push(self.parse_effect()?),
                Tok::Export => mech.exports.push(self.parse_export()?),
                _ => return Err(self.unexpected("a declaration or '}'")),
            }
        }
        self.advance();
        Ok(mech)
    }

    // ---- declarations -----------------------------------------------------

    fn parse_parameter(&mut self) -> Result<PExpr> {
        let kw = self.advance();
        let id = self.parse_typed_identifier()?;
        self.expect(Tok::Assign, "'='")?;
        let value = self.parse_expr()?;
        self.expect(Tok::Semicolon, "';'")?;
        Ok(Rc::new(ParsedExpr::Parameter(ParsedParameter { id, value, loc: kw.loc })))
    }

    fn parse_constant(&mut self) -> Result<PExpr> {
        let kw = self.advance();
        let id = self.parse_typed_identifier()?;
        self.expect(Tok::Assign, "'='")?;
        let value = self.parse_expr()?;
        self.expect(Tok::Semicolon, "';'")?;
        Ok(Rc::new(ParsedExpr::Constant(ParsedConstant { id, value, loc: kw.loc })))
    }

    fn parse_state(&mut self) -> Result<PExpr> {
        let kw = self.advance();
        let id = self.parse_typed_identifier()?;
        self.expect(Tok::Semicolon, "';'")?;
        Ok(Rc::new(ParsedExpr::State(ParsedState { id, loc: kw.loc })))
    }

    fn parse_record_alias(&mut self) -> Result<PExpr> {
        let kw = self.advance();
        let name = self.expect(Tok::Identifier, "record name")?;
        self.expect(Tok::LBrace, "'{'")?;
        let mut fields = Vec::new();
        let fields_loc = self.current.loc;
        while self.current.tok != Tok::RBrace {
            let field = self.expect(Tok::Identifier, "field name")?;
            self.expect(Tok::Colon, "':'")?;
            let ty = self.parse_type()?;
            self.expect(Tok::Semicolon, "';'")?;
            fields.push((field.spelling, ty));
        }
        self.advance();
        if self.current.tok == Tok::Semicolon {
            self.advance();
        }
        let ty = Rc::new(ParsedType::Record { fields, loc: fields_loc });
        Ok(Rc::new(ParsedExpr::RecordAlias(ParsedRecordAlias {
            name: name.spelling,
            ty,
            loc: kw.loc,
        })))
    }

    fn parse_function(&mut self) -> Result<PExpr> {
        let kw = self.advance();
        let name = self.expect(Tok::Identifier, "function name")?;
        self.expect(Tok::LParen, "'('")?;
        let mut args = Vec::new();
        if self.current.tok != Tok::RParen {
            loop {
                args.push(self.parse_typed_identifier()?);
                if self.current.tok == Tok::Comma {
                    self.advance();
                } else {
                    break;
                }
            }
        }
        self.expect(Tok::RParen, "')'")?;
        let ret = if self.current.tok == Tok::Colon {
            self.advance();
            Some(self.parse_type()?)
        } else {
            None
        };
        self.expect(Tok::LBrace, "'{'")?;
        let body = self.parse_expr()?;
        self.expect(Tok::RBrace, "'}'")?;
        Ok(Rc::new(ParsedExpr::Function(ParsedFunction {
            name: name.spelling,
            args,
            ret,
            body,
            loc: kw.loc,
        })))
    }

    fn parse_binding(&mut self) -> Result<PExpr> {
        let kw = self.advance();
        let name = self.expect(Tok::Identifier, "binding name")?;
        self.expect(Tok::Assign, "'='")?;
        let source = self.expect(Tok::Identifier, "a bindable quantity")?;
        let Some(kind) = Bindable::from_name(&source.spelling) else {
            return Err(ParseError::Parse {
                msg: format!("unknown bindable quantity '{}'", source.spelling),
                loc: source.loc,
            });
        };
        let ion = self.parse_optional_ion()?;
        self.expect(Tok::Semicolon, "';'")?;
        Ok(Rc::new(ParsedExpr::Bind(ParsedBind { name: name.spelling, kind, ion, loc: kw.loc })))
    }

    fn parse_initial(&mut self) -> Result<PExpr> {
        let kw = self.advance();
        let target = self.expect(Tok::Identifier, "state name")?;
        self.expect(Tok::Assign, "'='")?;
        let value = self.parse_expr()?;
        self.expect(Tok::Semicolon, "';'")?;
        Ok(Rc::new(ParsedExpr::Initial(ParsedInitial {
            target: target.spelling,
            value,
            loc: kw.loc,
        })))
    }

    fn parse_evolve(&mut self) -> Result<PExpr> {
        let kw = self.advance();
        let target = self.expect(Tok::Identifier, "state name")?;
        self.expect(Tok::Prime, "'''")?;
        self.expect(Tok::Assign, "'='")?;
        let value = self.parse_expr()?;
        self.expect(Tok::Semicolon, "';'")?;
        Ok(Rc::new(ParsedExpr::Evolve(ParsedEvolve {
            target: target.spelling,
            value,
            loc: kw.loc,
        })))
    }

    fn parse_effect(&mut self) -> Result<PExpr> {
        let kw = self.advance();
        let target = self.expect(Tok::Identifier, "an affectable quantity")?;
        let Some(kind) = Affectable::from_name(&target.spelling) else {
            return Err(ParseError::Parse {
                msg: format!("unknown affectable quantity '{}'", target.spelling),
                loc: target.loc,
            });
        };
        let ion = self.parse_optional_ion()?;
        self.expect(Tok::Assign, "'='")?;
        let value = self.parse_expr()?;
        self.expect(Tok::Semicolon, "';'")?;
        Ok(Rc::new(ParsedExpr::Effect(ParsedEffect { kind, ion, value, loc: kw.loc })))
    }

    fn parse_export(&mut self) -> Result<PExpr> {
        let kw = self.advance();
        let name = self.expect(Tok::Identifier, "parameter name")?;
        self.expect(Tok::Semicolon, "';'")?;
        Ok(Rc::new(ParsedExpr::Export(ParsedExport { name: name.spelling, loc: kw.loc })))
    }

    fn parse_optional_ion(&mut self) -> Result<Option<String>> {
        if self.current.tok != Tok::LParen {
            return Ok(None);
        }
        self.advance();
        let ion = self.expect(Tok::Identifier, "ion name")?;
        self.expect(Tok::RParen, "')'")?;
        Ok(Some(ion.spelling))
    }

    fn parse_typed_identifier(&mut self) -> Result<ParsedIdentifier> {
        let name = self.expect(Tok::Identifier, "identifier")?;
        let ty = if self.current.tok == Tok::Colon {
            self.advance();
            Some(self.parse_type()?)
        } else {
            None
        };
        Ok(ParsedIdentifier { name: name.spelling, ty, loc: name.loc })
    }

    // ---- value expressions ------------------------------------------------

    pub fn parse_expr(&mut self) -> Result<PExpr> {
        self.parse_binary_expr(0)
    }

    fn parse_binary_expr(&mut self, min_prec: i32) -> Result<PExpr> {
        let mut lhs = self.parse_prefix_expr()?;
        while let Some(prec) = binop_precedence(self.current.tok) {
            if prec < min_prec {
                break;
            }
            let op_tok = self.advance();
            if op_tok.tok == Tok::Dot {
                let field = self.expect(Tok::Identifier, "field name")?;
                let rhs = Rc::new(ParsedExpr::Identifier(ParsedIdentifier {
                    name: field.spelling,
                    ty: None,
                    loc: field.loc,
                }));
                lhs = Rc::new(ParsedExpr::Binary(ParsedBinary {
                    op: BinaryOp::Dot,
                    lhs,
                    rhs,
                    loc: op_tok.loc,
                }));
                continue;
            }
            let next_min = if associativity(op_tok.tok) == Assoc::Right { prec } else { prec + 1 };
            let rhs = self.parse_binary_expr(next_min)?;
            let op = binop_from_tok(op_tok.tok);
            lhs = Rc::new(ParsedExpr::Binary(ParsedBinary { op, lhs, rhs, loc: op_tok.loc }));
        }
        Ok(lhs)
    }

    fn parse_prefix_expr(&mut self) -> Result<PExpr> {
        match self.current.tok {
            Tok::Minus => {
                let t = self.advance();
                let arg = self.parse_binary_expr(UNARY_PRECEDENCE)?;
                Ok(Rc::new(ParsedExpr::Unary(ParsedUnary { op: UnaryOp::Neg, arg, loc: t.loc })))
            }
            Tok::Not => {
                let t = self.advance();
                let arg = self.parse_binary_expr(UNARY_PRECEDENCE)?;
                Ok(Rc::new(ParsedExpr::Unary(ParsedUnary { op: UnaryOp::Not, arg, loc: t.loc })))
            }
            Tok::Exp | Tok::Sin | Tok::Cos | Tok::Log | Tok::Abs | Tok::Exprelr => {
                let op = match self.current.tok {
                    Tok::Exp => UnaryOp::Exp,
                    Tok::Sin => UnaryOp::Sin,
                    Tok::Cos => UnaryOp::Cos,
                    Tok::Log => UnaryOp::Log,
                    Tok::Abs => UnaryOp::Abs,
                    _ => UnaryOp::Exprelr,
                };
                let t = self.advance();
                self.expect(Tok::LParen, "'('")?;
                let arg = self.parse_expr()?;
                self.expect(Tok::RParen, "')'")?;
                Ok(Rc::new(ParsedExpr::Unary(ParsedUnary { op, arg, loc: t.loc })))
            }
            Tok::Min | Tok::Max => {
                let op = if self.current.tok == Tok::Min { BinaryOp::Min } else { BinaryOp::Max };
                let t = self.advance();
                self.expect(Tok::LParen, "'('")?;
                let lhs = self.parse_expr()?;
                self.expect(Tok::Comma, "','")?;
                let rhs = self.parse_expr()?;
                self.expect(Tok::RParen, "')'")?;
                Ok(Rc::new(ParsedExpr::Binary(ParsedBinary { op, lhs, rhs, loc: t.loc })))
            }
            Tok::Let => self.parse_let(),
            Tok::With => self.parse_with(),
            Tok::If => self.parse_if(),
            Tok::LBrace => self.parse_object(),
            Tok::LParen => {
                self.advance();
                let e = self.parse_expr()?;
                self.expect(Tok::RParen, "')'")?;
                Ok(e)
            }
            Tok::Identifier => {
                let id = self.advance();
                if self.current.tok == Tok::LParen {
                    self.parse_call(id)
                } else {
                    Ok(Rc::new(ParsedExpr::Identifier(ParsedIdentifier {
                        name: id.spelling,
                        ty: None,
                        loc: id.loc,
                    })))
                }
            }
            Tok::Real => {
                let t = self.advance();
                let value: f64 = t.spelling.parse().map_err(|_| ParseError::Parse {
                    msg: format!("malformed real literal '{}'", t.spelling),
                    loc: t.loc,
                })?;
                let unit = self.try_parse_unit()?;
                Ok(Rc::new(ParsedExpr::Float(ParsedFloat { value, unit, loc: t.loc })))
            }
            Tok::Integer => {
                let t = self.advance();
                let value: i64 = t.spelling.parse().map_err(|_| ParseError::Parse {
                    msg: format!("malformed integer literal '{}'", t.spelling),
                    loc: t.loc,
                })?;
                let unit = self.try_parse_unit()?;
                Ok(Rc::new(ParsedExpr::Int(ParsedInt { value, unit, loc: t.loc })))
            }
            _ => Err(self.unexpected("an expression")),
        }
    }

    fn parse_call(&mut self, name: Token) -> Result<PExpr> {
        self.expect(Tok::LParen, "'('")?;
        let mut args = Vec::new();
        if self.current.tok != Tok::RParen {
            loop {
                args.push(self.parse_expr()?);
                if self.current.tok == Tok::Comma {
                    self.advance();
                } else {
                    break;
                }
            }
        }
        self.expect(Tok::RParen, "')'")?;
        Ok(Rc::new(ParsedExpr::Call(ParsedCall {
            function: name.spelling,
            args,
            loc: name.loc,
        })))
    }

    fn parse_object(&mut self) -> Result<PExpr> {
        let open = self.expect(Tok::LBrace, "'{'")?;
        let mut fields = Vec::new();
        while self.current.tok != Tok::RBrace {
            let field = self.expect(Tok::Identifier, "field name")?;
            self.expect(Tok::Assign, "'='")?;
            let value = self.parse_expr()?;
            self.expect(Tok::Semicolon, "';'")?;
            fields.push((field.spelling, value));
        }
        self.advance();
        Ok(Rc::new(ParsedExpr::Object(ParsedObject { record: None, fields, loc: open.loc })))
    }

    fn parse_let(&mut self) -> Result<PExpr> {
        let kw = self.advance();
        let id = self.parse_typed_identifier()?;
        self.expect(Tok::Assign, "'='")?;
        let value = self.parse_expr()?;
        self.expect(Tok::Semicolon, "';'")?;
        let body = self.parse_expr()?;
        Ok(Rc::new(ParsedExpr::Let(ParsedLet { id, value, body, loc: kw.loc })))
    }

    fn parse_with(&mut self) -> Result<PExpr> {
        let kw = self.advance();
        let value = self.parse_expr()?;
        self.expect(Tok::Semicolon, "';'")?;
        let body = self.parse_expr()?;
        Ok(Rc::new(ParsedExpr::With(ParsedWith { value, body, loc: kw.loc })))
    }

    fn parse_if(&mut self) -> Result<PExpr> {
        let kw = self.advance();
        let condition = self.parse_expr()?;
        self.expect(Tok::LBrace, "'{'")?;
        let if_true = self.parse_expr()?;
        self.expect(Tok::RBrace, "'}'")?;
        self.expect(Tok::Else, "'else'")?;
        self.expect(Tok::LBrace, "'{'")?;
        let if_false = self.parse_expr()?;
        self.expect(Tok::RBrace, "'}'")?;
        Ok(Rc::new(ParsedExpr::If(ParsedIf { condition, if_true, if_false, loc: kw.loc })))
    }

    // ---- units ------------------------------------------------------------

    /// Parse `[unit_expr]` if present, `NoUnit` otherwise.
    fn try_parse_unit(&mut self) -> Result<PUnit> {
        if self.current.tok != Tok::LBracket {
            return Ok(UnitExpr::no_unit());
        }
        self.advance();
        let u = self.parse_unit_expr(0)?;
        self.expect(Tok::RBracket, "']'")?;
        Ok(u)
    }

    fn parse_unit_expr(&mut self, min_prec: i32) -> Result<PUnit> {
        let mut lhs = self.parse_unit_element()?;
        loop {
            let op = match self.current.tok {
                Tok::Times => UnitOp::Mul,
                Tok::Divide => UnitOp::Div,
                Tok::Pow => UnitOp::Pow,
                _ => break,
            };
            let prec = binop_precedence(self.current.tok).unwrap();
            if prec < min_prec {
                break;
            }
            let op_tok = self.advance();
            let next_min = if op == UnitOp::Pow { prec } else { prec + 1 };
            let rhs = self.parse_unit_expr(next_min)?;
            lhs = UnitExpr::binary(op, lhs, rhs, op_tok.loc)
                .map_err(|msg| ParseError::Parse { msg, loc: op_tok.loc })?;
        }
        Ok(lhs)
    }

    fn parse_unit_element(&mut self) -> Result<PUnit> {
        match self.current.tok {
            Tok::Identifier => {
                let t = self.advance();
                let Some((prefix, symbol)) = check_simple_unit(&t.spelling) else {
                    return Err(ParseError::Parse {
                        msg: format!("unknown unit '{}'", t.spelling),
                        loc: t.loc,
                    });
                };
                Ok(Rc::new(UnitExpr::Simple { prefix, symbol, loc: t.loc }))
            }
            Tok::Integer => {
                let t = self.advance();
                let val: i64 = t.spelling.parse().map_err(|_| ParseError::Parse {
                    msg: format!("malformed integer literal '{}'", t.spelling),
                    loc: t.loc,
                })?;
                Ok(Rc::new(UnitExpr::Integer { val, loc: t.loc }))
            }
            Tok::Minus => {
                let t = self.advance();
                let n = self.expect(Tok::Integer, "integer exponent")?;
                let val: i64 = n.spelling.parse().map_err(|_| ParseError::Parse {
                    msg: format!("malformed integer literal '{}'", n.spelling),
                    loc: n.loc,
                })?;
                Ok(Rc::new(UnitExpr::Integer { val: -val, loc: t.loc }))
            }
            Tok::LParen => {
                self.advance();
                let u = self.parse_unit_expr(0)?;
                self.expect(Tok::RParen, "')'")?;
                Ok(u)
            }
            _ => Err(self.unexpected("a unit")),
        }
    }

    // ---- types ------------------------------------------------------------

    fn parse_type(&mut self) -> Result<PType> {
        self.parse_quantity_type(0)
    }

    fn parse_quantity_type(&mut self, min_prec: i32) -> Result<PType> {
        let mut lhs = self.parse_type_element()?;
        loop {
            let op = match self.current.tok {
                Tok::Times => TypeOp::Mul,
                Tok::Divide => TypeOp::Div,
                Tok::Pow => TypeOp::Pow,
                _ => break,
            };
            let prec = binop_precedence(self.current.tok).unwrap();
            if prec < min_prec {
                break;
            }
            let op_tok = self.advance();
            let next_min = if op == TypeOp::Pow { prec } else { prec + 1 };
            let rhs = self.parse_quantity_type(next_min)?;
            lhs = ParsedType::binary(op, lhs, rhs, op_tok.loc)
                .map_err(|msg| ParseError::Parse { msg, loc: op_tok.loc })?;
        }
        Ok(lhs)
    }

    fn parse_type_element(&mut self) -> Result<PType> {
        match self.current.tok {
            Tok::Identifier => {
                let t = self.advance();
                if t.spelling == "bool" {
                    return Ok(Rc::new(ParsedType::Bool { loc: t.loc }));
                }
                match Quantity::from_name(&t.spelling) {
                    Some(q) => Ok(Rc::new(ParsedType::Quantity { quantity: q, loc: t.loc })),
                    None => Ok(Rc::new(ParsedType::Alias { name: t.spelling, loc: t.loc })),
                }
            }
            Tok::Integer => {
                let t = self.advance();
                let val: i64 = t.spelling.parse().map_err(|_| ParseError::Parse {
                    msg: format!("malformed integer literal '{}'", t.spelling),
                    loc: t.loc,
                })?;
                Ok(Rc::new(ParsedType::Integer { val, loc: t.loc }))
            }
            Tok::Minus => {
                let t = self.advance();
                let n = self.expect(Tok::Integer, "integer exponent")?;
                let val: i64 = n.spelling.parse().map_err(|_| ParseError::Parse {
                    msg: format!("malformed integer literal '{}'", n.spelling),
                    loc: n.loc,
                })?;
                Ok(Rc::new(ParsedType::Integer { val: -val, loc: t.loc }))
            }
            Tok::LParen => {
                self.advance();
                let ty = self.parse_quantity_type(0)?;
                self.expect(Tok::RParen, "')'")?;
                Ok(ty)
            }
            _ => Err(self.unexpected("a type")),
        }
    }
}

fn binop_from_tok(t: Tok) -> BinaryOp {
    match t {
        Tok::Plus => BinaryOp::Add,
        Tok::Minus => BinaryOp::Sub,
        Tok::Times => BinaryOp::Mul,
        Tok::Divide => BinaryOp::Div,
        Tok::Pow => BinaryOp::Pow,
        Tok::Lt => BinaryOp::Lt,
        Tok::Le => BinaryOp::Le,
        Tok::Gt => BinaryOp::Gt,
        Tok::Ge => BinaryOp::Ge,
        Tok::EqEq => BinaryOp::Eq,
        Tok::Ne => BinaryOp::Ne,
        Tok::And => BinaryOp::And,
        Tok::Or => BinaryOp::Or,
        _ => unreachable!("not a binary operator token"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::units::{UnitPrefix, UnitSymbol};

    fn parse_value(src: &str) -> PExpr {
        Parser::new(src).parse_expr().expect("parse")
    }

    #[test]
    fn precedence_builds_expected_tree() {
        // a + b*c^2 parses as a + (b*(c^2))
        let e = parse_value("a + b*c^2");
        let ParsedExpr::Binary(add) = &*e else { panic!("expected binary") };
        assert_eq!(add.op, BinaryOp::Add);
        let ParsedExpr::Binary(mul) = &*add.rhs else { panic!("expected mul") };
        assert_eq!(mul.op, BinaryOp::Mul);
        let ParsedExpr::Binary(pow) = &*mul.rhs else { panic!("expected pow") };
        assert_eq!(pow.op, BinaryOp::Pow);
    }

    #[test]
    fn pow_is_right_associative() {
        let e = parse_value("a^b^c");
        let ParsedExpr::Binary(outer) = &*e else { panic!() };
        assert_eq!(outer.op, BinaryOp::Pow);
        assert!(matches!(&*outer.lhs, ParsedExpr::Identifier(_)));
        assert!(matches!(&*outer.rhs, ParsedExpr::Binary(b) if b.op == BinaryOp::Pow));
    }

    #[test]
    fn field_access_binds_tighter_than_pow() {
        let e = parse_value("s.m^2");
        let ParsedExpr::Binary(pow) = &*e else { panic!() };
        assert_eq!(pow.op, BinaryOp::Pow);
        assert!(matches!(&*pow.lhs, ParsedExpr::Binary(b) if b.op == BinaryOp::Dot));
    }

    #[test]
    fn literal_with_unit() {
        let e = parse_value("5e-4 [S/cm^2]");
        let ParsedExpr::Float(f) = &*e else { panic!() };
        assert_eq!(f.value, 5e-4);
        assert!(matches!(&*f.unit, UnitExpr::Binary { op: UnitOp::Div, .. }));
    }

    #[test]
    fn negative_unit_exponent() {
        let e = parse_value("3 [s^-1]");
        let ParsedExpr::Int(i) = &*e else { panic!() };
        let UnitExpr::Binary { op: UnitOp::Pow, rhs, .. } = &*i.unit else { panic!() };
        assert!(matches!(&**rhs, UnitExpr::Integer { val: -1, .. }));
    }

    #[test]
    fn let_with_if_and_object() {
        let e = parse_value("let a = if v > 0 { 1.0 } else { 0.0 }; { m = a; h = a; }");
        let ParsedExpr::Let(l) = &*e else { panic!() };
        assert!(matches!(&*l.value, ParsedExpr::If(_)));
        let ParsedExpr::Object(o) = &*l.body else { panic!() };
        assert_eq!(o.fields.len(), 2);
    }

    #[test]
    fn min_is_a_prefix_binary_operator() {
        let e = parse_value("min(a, b + 1)");
        let ParsedExpr::Binary(m) = &*e else { panic!() };
        assert_eq!(m.op, BinaryOp::Min);
    }

    #[test]
    fn parses_full_mechanism() {
        let src = r#"
            # passive leak channel
            density pas {
                parameter g : conductance/area = 0.001 [S/cm^2];
                parameter e_rev = -70 [mV];
                bind v = membrane_potential;
                effect current_density = g*(v - e_rev);
                export g;
            }
        "#;
        let mech = Parser::new(src).parse_mechanism().expect("parse");
        assert_eq!(mech.name, "pas");
        assert_eq!(mech.kind, MechanismKind::Density);
        assert_eq!(mech.parameters.len(), 2);
        assert_eq!(mech.bindings.len(), 1);
        assert_eq!(mech.effects.len(), 1);
        assert_eq!(mech.exports.len(), 1);
    }

    #[test]
    fn parses_record_state_mechanism() {
        let src = r#"
            density kd {
                record gates {
                    m: real;
                    h: real;
                };
                state s : gates;
                bind v = membrane_potential;
                initial s = { m = 0.1; h = 0.9; };
                evolve s' = { m = -s.m; h = -s.h; };
            }
        "#;
        let mech = Parser::new(src).parse_mechanism().expect("parse");
        assert_eq!(mech.records.len(), 1);
        assert_eq!(mech.states.len(), 1);
        assert_eq!(mech.initials.len(), 1);
        assert_eq!(mech.evolutions.len(), 1);
    }

    #[test]
    fn bind_with_ion() {
        let src = "concentration ca_pool { bind f = molar_flux(ca); }";
        let mech = Parser::new(src).parse_mechanism().expect("parse");
        let ParsedExpr::Bind(b) = &*mech.bindings[0] else { panic!() };
        assert_eq!(b.kind, Bindable::MolarFlux);
        assert_eq!(b.ion.as_deref(), Some("ca"));
    }

    #[test]
    fn unknown_bindable_is_an_error() {
        let src = "density m { bind v = membrane_foo; }";
        let err = Parser::new(src).parse_mechanism().unwrap_err();
        assert!(err.to_string().contains("membrane_foo"));
    }

    #[test]
    fn lexer_errors_are_fatal() {
        let src = "density m { parameter a = $; }";
        let err = Parser::new(src).parse_mechanism().unwrap_err();
        assert!(err.to_string().contains("unexpected character"));
    }

    #[test]
    fn milli_volt_unit_on_parameter() {
        let e = parse_value("-77 [mV]");
        let ParsedExpr::Unary(neg) = &*e else { panic!() };
        assert_eq!(neg.op, UnaryOp::Neg);
        let ParsedExpr::Int(i) = &*neg.arg else { panic!() };
        assert!(matches!(
            &*i.unit,
            UnitExpr::Simple { prefix: UnitPrefix::Milli, symbol: UnitSymbol::Volt, .. }
        ));
    }
}
