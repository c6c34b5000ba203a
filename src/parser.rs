//! Recursive-descent parser (§4.1): consumes the flat token stream from
//! `token::tokenize` and builds a `CstProgram`, or a non-empty list of
//! `ParseError`. No default error listener ever writes to stderr — every
//! diagnostic is captured into the returned list, per spec.
//!
//! Statement forms are matched explicitly on keyword text (`match` arms on
//! `Ident` tokens) rather than through a second layer of combinators, the
//! same way `chapaty`'s enum parsing favors explicit keyword matching over
//! combinator cleverness (see SPEC_FULL.md §4.1).

use std::str::FromStr;

use rust_decimal::prelude::ToPrimitive;

use crate::ast::*;
use crate::error::ParseError;
use crate::stream::Stream;
use crate::token::{Spanned, Sym, Token};
use crate::units::{BaseUnit, Unit};

pub struct ParseResult {
    program: Option<CstProgram>,
    errors: Vec<ParseError>,
}

impl ParseResult {
    pub fn has_errors(&self) -> bool {
        !self.errors.is_empty()
    }

    pub fn errors(&self) -> &[ParseError] {
        &self.errors
    }

    pub fn into_program(self) -> Option<CstProgram> {
        self.program
    }
}

/// Parse `source` into a `ParseResult`. Exactly one of `has_errors()` /
/// `into_program().is_some()` holds (§7 invariant #1); constructing the
/// opposite is a programming error caught by `debug_assert!` below.
pub fn parse(source: &str) -> ParseResult {
    match crate::token::tokenize(source) {
        Ok(tokens) => {
            let mut p = Parser { toks: tokens, pos: 0, errors: Vec::new() };
            let program = p.parse_program();
            let result = if p.errors.is_empty() {
                ParseResult { program: Some(program), errors: Vec::new() }
            } else {
                ParseResult { program: None, errors: p.errors }
            };
            debug_assert!(result.has_errors() ^ result.program.is_some());
            result
        }
        Err(errors) => {
            debug_assert!(!errors.is_empty());
            ParseResult { program: None, errors }
        }
    }
}

struct Parser {
    toks: Vec<Spanned>,
    pos: usize,
    errors: Vec<ParseError>,
}

impl Parser {
    fn peek(&self) -> Option<&Token> {
        self.toks.get(self.pos).map(|s| &s.tok)
    }

    fn peek_n(&self, n: usize) -> Option<&Token> {
        self.toks.get(self.pos + n).map(|s| &s.tok)
    }

    fn line(&self) -> usize {
        self.toks
            .get(self.pos)
            .or_else(|| self.toks.last())
            .map(|s| s.line)
            .unwrap_or(1)
    }

    fn advance(&mut self) -> Option<Token> {
        let tok = self.toks.get(self.pos).map(|s| s.tok.clone());
        if tok.is_some() {
            self.pos += 1;
        }
        tok
    }

    fn error(&mut self, msg: impl Into<String>) {
        self.errors.push(ParseError::new(self.line(), msg.into()));
    }

    fn is_ident(&self, word: &str) -> bool {
        matches!(self.peek(), Some(Token::Ident(s)) if s == word)
    }

    fn is_ident_n(&self, n: usize, word: &str) -> bool {
        matches!(self.peek_n(n), Some(Token::Ident(s)) if s == word)
    }

    fn eat_ident(&mut self, word: &str) -> bool {
        if self.is_ident(word) {
            self.advance();
            true
        } else {
            false
        }
    }

    fn expect_ident(&mut self, word: &str) -> bool {
        if self.eat_ident(word) {
            true
        } else {
            self.error(format!("expected '{word}'"));
            false
        }
    }

    fn expect_sym(&mut self, sym: Sym) -> bool {
        if matches!(self.peek(), Some(Token::Sym(s)) if *s == sym) {
            self.advance();
            true
        } else {
            self.error(format!("expected symbol {sym:?}"));
            false
        }
    }

    fn take_ident(&mut self) -> Option<String> {
        match self.peek().cloned() {
            Some(Token::Ident(s)) => {
                self.advance();
                Some(s)
            }
            _ => {
                self.error("expected an identifier");
                None
            }
        }
    }

    fn take_string(&mut self) -> Option<String> {
        match self.peek().cloned() {
            Some(Token::Str(s)) => {
                self.advance();
                Some(s)
            }
            _ => {
                self.error("expected a quoted string");
                None
            }
        }
    }

    fn take_num(&mut self) -> Option<rust_decimal::Decimal> {
        match self.peek().cloned() {
            Some(Token::Num(n)) => {
                self.advance();
                Some(n)
            }
            _ => {
                self.error("expected a number");
                None
            }
        }
    }

    fn take_year(&mut self) -> Option<i32> {
        self.take_num().map(|n| n.to_i32().unwrap_or(0))
    }

    fn take_stream(&mut self) -> Option<Stream> {
        let name = self.take_ident()?;
        match Stream::from_str(&name) {
            Ok(s) => Some(s),
            Err(_) => {
                self.error(format!("unknown stream keyword '{name}'"));
                None
            }
        }
    }

    fn take_base_unit(&mut self) -> Option<BaseUnit> {
        let name = self.take_ident()?;
        match BaseUnit::from_str(&name) {
            Ok(u) => Some(u),
            Err(_) => {
                self.error(format!("unknown unit keyword '{name}'"));
                None
            }
        }
    }

    // -- top level -----------------------------------------------------

    fn parse_program(&mut self) -> CstProgram {
        let mut stanzas = Vec::new();
        while self.peek().is_some() {
            if !self.expect_ident("start") {
                self.advance();
                continue;
            }
            if self.eat_ident("about") {
                self.skip_until_end("about");
                stanzas.push(Stanza::About);
            } else if self.eat_ident("default") {
                let items = self.parse_app_items();
                self.expect_end("default");
                stanzas.push(Stanza::Default(items));
            } else if self.eat_ident("policy") {
                let name = self.take_string().unwrap_or_default();
                let items = self.parse_app_items();
                self.expect_end("policy");
                stanzas.push(Stanza::Policy(name, items));
            } else if self.eat_ident("simulations") {
                let items = self.parse_sim_items();
                self.expect_end("simulations");
                stanzas.push(Stanza::Simulations(items));
            } else {
                self.error("expected 'about', 'default', 'policy', or 'simulations'");
                self.advance();
            }
        }
        CstProgram { stanzas }
    }

    fn expect_end(&mut self, keyword: &str) {
        if !self.expect_ident("end") {
            return;
        }
        self.expect_ident(keyword);
    }

    fn skip_until_end(&mut self, keyword: &str) {
        while self.peek().is_some() {
            if self.is_ident("end") && self.is_ident_n(1, keyword) {
                self.advance();
                self.advance();
                return;
            }
            self.advance();
        }
        self.error(format!("unterminated 'about' stanza (expected 'end {keyword}')"));
    }

    fn at_end_keyword(&self) -> bool {
        self.is_ident("end") || self.peek().is_none()
    }

    // -- application / substance item lists -----------------------------

    fn parse_app_items(&mut self) -> Vec<AppItem> {
        let mut items = Vec::new();
        while !self.at_end_keyword() {
            if self.is_ident("define") && self.is_ident_n(1, "application") {
                self.advance();
                self.advance();
                items.push(AppItem::Define(self.parse_app_body("application")));
            } else if self.is_ident("modify") && self.is_ident_n(1, "application") {
                self.advance();
                self.advance();
                items.push(AppItem::Modify(self.parse_app_body("application")));
            } else if self.is_ident("define") {
                items.push(AppItem::Global(self.parse_global_define()));
            } else if self.is_ident("set") {
                items.push(AppItem::Global(self.parse_global_set()));
            } else {
                self.error("expected 'define application', 'modify application', 'define', or 'set'");
                self.advance();
            }
        }
        items
    }

    fn parse_app_body(&mut self, end_keyword: &str) -> AppBody {
        let name = self.take_string().unwrap_or_default();
        let mut substances = Vec::new();
        while !self.at_end_keyword() {
            if self.is_ident("uses") && self.is_ident_n(1, "substance") {
                self.advance();
                self.advance();
                substances.push(SubstanceItem::Substance(self.parse_substance_body("substance")));
            } else if self.is_ident("modify") && self.is_ident_n(1, "substance") {
                self.advance();
                self.advance();
                substances.push(SubstanceItem::Substance(self.parse_substance_body("substance")));
            } else if self.is_ident("define") {
                substances.push(SubstanceItem::Global(self.parse_global_define()));
            } else if self.is_ident("set") {
                substances.push(SubstanceItem::Global(self.parse_global_set()));
            } else {
                self.error("expected 'uses substance', 'modify substance', 'define', or 'set'");
                self.advance();
            }
        }
        self.expect_end(end_keyword);
        AppBody { name, substances }
    }

    fn parse_substance_body(&mut self, end_keyword: &str) -> SubstanceBody {
        let name = self.take_string().unwrap_or_default();
        let mut statements = Vec::new();
        while !self.at_end_keyword() {
            match self.parse_stmt() {
                Some(stmt) => statements.push(stmt),
                None => {
                    self.advance();
                }
            }
        }
        self.expect_end(end_keyword);
        SubstanceBody { name, statements }
    }

    fn parse_sim_items(&mut self) -> Vec<SimItem> {
        let mut items = Vec::new();
        while !self.at_end_keyword() {
            if self.is_ident("simulate") {
                self.advance();
                items.push(SimItem::Simulate(self.parse_simulate()));
            } else if self.is_ident("define") {
                items.push(SimItem::Global(self.parse_global_define()));
            } else if self.is_ident("set") {
                items.push(SimItem::Global(self.parse_global_set()));
            } else {
                self.error("expected 'simulate', 'define', or 'set'");
                self.advance();
            }
        }
        items
    }

    fn parse_global_define(&mut self) -> GlobalStmt {
        self.advance(); // "define"
        let name = self.take_ident().unwrap_or_default();
        self.expect_ident("as");
        let value = self.parse_expr();
        GlobalStmt::Define(name, value)
    }

    fn parse_global_set(&mut self) -> GlobalStmt {
        self.advance(); // "set"
        let name = self.take_ident().unwrap_or_default();
        self.expect_ident("to");
        let value = self.parse_expr();
        GlobalStmt::Set(name, value)
    }

    fn parse_simulate(&mut self) -> SimulateDef {
        let name = self.take_string().unwrap_or_default();
        let mut policies = Vec::new();
        if self.eat_ident("using") {
            if let Some(p) = self.take_string() {
                policies.push(p);
            }
            while self.eat_ident("then") {
                if let Some(p) = self.take_string() {
                    policies.push(p);
                }
            }
        }
        self.expect_ident("from");
        self.expect_ident("years");
        let start_year = self.take_year().unwrap_or(0);
        self.expect_ident("to");
        let end_year = self.take_year().unwrap_or(0);
        let mut trials = 1u32;
        if self.eat_ident("across") {
            trials = self.take_num().and_then(|n| n.to_u32()).unwrap_or(1);
            self.expect_ident("trials");
        }
        SimulateDef { name, policies, start_year, end_year, trials }
    }

    // -- substance statements --------------------------------------------

    fn parse_stmt(&mut self) -> Option<Stmt> {
        if self.is_ident("cap") {
            self.advance();
            let target = self.take_stream()?;
            self.expect_ident("to");
            let value = self.parse_expr();
            let during = self.parse_during();
            Some(Stmt::Cap { target, value, during })
        } else if self.is_ident("floor") {
            self.advance();
            let target = self.take_stream()?;
            self.expect_ident("to");
            let value = self.parse_expr();
            let displacing = if self.eat_ident("displacing") { self.take_string() } else { None };
            let during = self.parse_during();
            Some(Stmt::Floor { target, value, displacing, during })
        } else if self.is_ident("change") {
            self.advance();
            let target = self.take_stream()?;
            self.expect_ident("by");
            let value = self.parse_expr();
            let during = self.parse_during();
            Some(Stmt::Change { target, value, during })
        } else if self.is_ident("emit") {
            self.advance();
            let value = self.parse_expr();
            let during = self.parse_during();
            Some(Stmt::Emit { value, during })
        } else if self.is_ident("initial") {
            self.advance();
            self.expect_ident("charge");
            self.expect_ident("with");
            let per_unit_volume = self.parse_expr();
            self.expect_ident("for");
            let stream = self.take_stream()?;
            let during = self.parse_during();
            Some(Stmt::InitialCharge { per_unit_volume, stream, during })
        } else if self.is_ident("recharge") {
            self.advance();
            let population_pct = self.parse_expr();
            self.expect_ident("with");
            let per_unit_volume = self.parse_expr();
            let during = self.parse_during();
            Some(Stmt::Recharge { population_pct, per_unit_volume, during })
        } else if self.is_ident("recover") {
            self.advance();
            let volume = self.parse_expr();
            self.expect_ident("with");
            let yield_fraction = self.parse_expr();
            self.expect_ident("reuse");
            let during = self.parse_during();
            Some(Stmt::Recover { volume, yield_fraction, during })
        } else if self.is_ident("replace") {
            self.advance();
            let volume = self.parse_expr();
            self.expect_ident("of");
            let target = self.take_stream()?;
            self.expect_ident("with");
            let destination = self.take_string().unwrap_or_default();
            let during = self.parse_during();
            Some(Stmt::Replace { volume, target, destination, during })
        } else if self.is_ident("retire") {
            self.advance();
            let volume = self.parse_expr();
            let during = self.parse_during();
            Some(Stmt::Retire { volume, during })
        } else if self.is_ident("set") {
            self.advance();
            let target = self.take_stream()?;
            self.expect_ident("to");
            let value = self.parse_expr();
            let during = self.parse_during();
            Some(Stmt::Set { target, value, during })
        } else if self.is_ident("enable") {
            self.advance();
            let stream = self.take_stream()?;
            Some(Stmt::Enable { stream })
        } else if self.is_ident("equals") {
            self.advance();
            let factor = self.parse_expr();
            let numerator = self.take_base_unit()?;
            self.expect_sym(Sym::Slash);
            let denominator = self.take_base_unit()?;
            Some(Stmt::Equals { factor, numerator, denominator })
        } else if self.is_ident("define") {
            self.advance();
            let name = self.take_ident().unwrap_or_default();
            self.expect_ident("as");
            let value = self.parse_expr();
            Some(Stmt::Define(name, value))
        } else {
            self.error("expected a substance statement");
            None
        }
    }

    fn parse_during(&mut self) -> During {
        if !self.eat_ident("during") {
            return During::always();
        }
        if self.eat_ident("year") {
            let tp = self.parse_timepoint();
            During { start: tp.clone(), end: tp }
        } else if self.eat_ident("years") {
            let left = self.parse_timepoint();
            if self.eat_ident("to") {
                let right = self.parse_timepoint();
                During { start: left, end: right }
            } else if self.eat_ident("and") {
                self.expect_ident("onwards");
                During { start: left, end: Some(TimePointFuture::Dynamic(DynamicCap::Onwards)) }
            } else {
                self.error("expected 'to' or 'and onwards' after 'during years'");
                During::always()
            }
        } else {
            self.error("expected 'year' or 'years' after 'during'");
            During::always()
        }
    }

    fn parse_timepoint(&mut self) -> Option<TimePointFuture> {
        if self.eat_ident("beginning") {
            Some(TimePointFuture::Dynamic(DynamicCap::Beginning))
        } else if self.eat_ident("onwards") {
            Some(TimePointFuture::Dynamic(DynamicCap::Onwards))
        } else if matches!(self.peek(), Some(Token::Num(_))) {
            self.take_year().map(TimePointFuture::Literal)
        } else if matches!(self.peek(), Some(Token::Sym(Sym::LParen))) {
            self.advance();
            let expr = self.parse_expr();
            self.expect_sym(Sym::RParen);
            Some(TimePointFuture::Calculated(Box::new(expr)))
        } else {
            self.error("expected a year, 'beginning', 'onwards', or a parenthesized expression");
            None
        }
    }

    // -- expressions, lowest to highest precedence -----------------------

    fn parse_expr(&mut self) -> Expr {
        self.parse_conditional()
    }

    fn parse_conditional(&mut self) -> Expr {
        let then_branch = self.parse_comparison();
        if self.eat_ident("if") {
            let cond = self.parse_comparison();
            self.expect_ident("else");
            let else_branch = self.parse_conditional();
            self.expect_ident("endif");
            Expr::If { cond: Box::new(cond), then_branch: Box::new(then_branch), else_branch: Box::new(else_branch) }
        } else {
            then_branch
        }
    }

    fn parse_comparison(&mut self) -> Expr {
        let left = self.parse_additive();
        let op = match self.peek() {
            Some(Token::Sym(Sym::EqEq)) => Some(CmpOp::Eq),
            Some(Token::Sym(Sym::Ne)) => Some(CmpOp::Ne),
            Some(Token::Sym(Sym::Lt)) => Some(CmpOp::Lt),
            Some(Token::Sym(Sym::Le)) => Some(CmpOp::Le),
            Some(Token::Sym(Sym::Gt)) => Some(CmpOp::Gt),
            Some(Token::Sym(Sym::Ge)) => Some(CmpOp::Ge),
            _ => None,
        };
        match op {
            Some(op) => {
                self.advance();
                let right = self.parse_additive();
                Expr::Cmp(op, Box::new(left), Box::new(right))
            }
            None => left,
        }
    }

    fn parse_additive(&mut self) -> Expr {
        let mut left = self.parse_multiplicative();
        loop {
            let op = match self.peek() {
                Some(Token::Sym(Sym::Plus)) => BinOp::Add,
                Some(Token::Sym(Sym::Minus)) => BinOp::Sub,
                _ => break,
            };
            self.advance();
            let right = self.parse_multiplicative();
            left = Expr::BinOp(op, Box::new(left), Box::new(right));
        }
        left
    }

    fn parse_multiplicative(&mut self) -> Expr {
        let mut left = self.parse_power();
        loop {
            let op = match self.peek() {
                Some(Token::Sym(Sym::Star)) => BinOp::Mul,
                Some(Token::Sym(Sym::Slash)) => BinOp::Div,
                _ => break,
            };
            self.advance();
            let right = self.parse_power();
            left = Expr::BinOp(op, Box::new(left), Box::new(right));
        }
        left
    }

    fn parse_power(&mut self) -> Expr {
        let left = self.parse_unary();
        if matches!(self.peek(), Some(Token::Sym(Sym::Caret))) {
            self.advance();
            let right = self.parse_power();
            Expr::BinOp(BinOp::Pow, Box::new(left), Box::new(right))
        } else {
            left
        }
    }

    fn parse_unary(&mut self) -> Expr {
        if matches!(self.peek(), Some(Token::Sym(Sym::Minus))) {
            self.advance();
            Expr::Neg(Box::new(self.parse_unary()))
        } else {
            let atom = self.parse_primary();
            self.parse_unit_suffix(atom)
        }
    }

    fn parse_unit_suffix(&mut self, expr: Expr) -> Expr {
        let saved = self.pos;
        if let Some(Token::Ident(name)) = self.peek().cloned() {
            if let Ok(base) = BaseUnit::from_str(&name) {
                self.advance();
                if matches!(self.peek(), Some(Token::Sym(Sym::Slash))) {
                    self.advance();
                    if let Some(Token::Ident(name2)) = self.peek().cloned() {
                        if let Ok(denom) = BaseUnit::from_str(&name2) {
                            self.advance();
                            return Expr::WithUnit(Box::new(expr), Unit::Compound(base, denom));
                        }
                    }
                    self.pos = saved;
                    return expr;
                }
                return Expr::WithUnit(Box::new(expr), Unit::Base(base));
            }
        }
        expr
    }

    fn parse_primary(&mut self) -> Expr {
        match self.peek().cloned() {
            Some(Token::Num(n)) => {
                self.advance();
                Expr::Num(n)
            }
            Some(Token::Sym(Sym::LParen)) => {
                self.advance();
                let inner = self.parse_expr();
                self.expect_sym(Sym::RParen);
                inner
            }
            Some(Token::Ident(ref kw)) if kw == "get" => self.parse_get(),
            Some(Token::Ident(ref kw)) if kw == "sample" => self.parse_sample(),
            Some(Token::Ident(ref kw)) if kw == "limit" => self.parse_limit(),
            Some(Token::Ident(name)) => {
                self.advance();
                Expr::Var(name)
            }
            _ => {
                self.error("expected an expression");
                Expr::Num(rust_decimal::Decimal::ZERO)
            }
        }
    }

    fn parse_get(&mut self) -> Expr {
        self.advance(); // "get"
        let stream = self.take_stream().unwrap_or(Stream::Manufacture);
        self.expect_ident("of");
        let substance = self.take_string().unwrap_or_default();
        let application = if self.eat_ident("in") { self.take_string() } else { None };
        Expr::Get { stream, substance, application }
    }

    fn parse_sample(&mut self) -> Expr {
        self.advance(); // "sample"
        if self.eat_ident("normally") {
            self.expect_ident("from");
            self.expect_ident("mean");
            self.expect_ident("of");
            let mean = self.parse_additive();
            self.expect_ident("std");
            self.expect_ident("of");
            let std = self.parse_additive();
            Expr::SampleNormal { mean: Box::new(mean), std: Box::new(std) }
        } else {
            self.expect_ident("uniformly");
            self.expect_ident("from");
            let low = self.parse_additive();
            self.expect_ident("to");
            let high = self.parse_additive();
            Expr::SampleUniform { low: Box::new(low), high: Box::new(high) }
        }
    }

    fn parse_limit(&mut self) -> Expr {
        self.advance(); // "limit"
        let x = self.parse_additive();
        self.expect_ident("to");
        self.expect_sym(Sym::LBracket);
        let lo = if matches!(self.peek(), Some(Token::Sym(Sym::Comma))) { None } else { Some(Box::new(self.parse_additive())) };
        self.expect_sym(Sym::Comma);
        let hi = if matches!(self.peek(), Some(Token::Sym(Sym::RBracket))) { None } else { Some(Box::new(self.parse_additive())) };
        self.expect_sym(Sym::RBracket);
        Expr::Limit { x: Box::new(x), lo, hi }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn invalid_source_yields_line_tagged_errors() {
        let result = parse("invalid code");
        assert!(result.has_errors());
        assert!(result.into_program().is_none());
        for e in result.errors() {
            let _ = e;
        }
    }

    #[test]
    fn parses_minimal_default_policy() {
        let src = r#"
        start default
          define application "Cooling"
            uses substance "HFC-134a"
              set manufacture to 100 kg
              equals 5 tCO2e / mt
            end substance
          end application
        end default

        start simulations
          simulate "sim" from years 1 to 1
        end simulations
        "#;
        let result = parse(src);
        assert!(!result.has_errors(), "{:?}", result.errors());
        let program = result.into_program().unwrap();
        assert_eq!(program.stanzas.len(), 2);
    }
}
