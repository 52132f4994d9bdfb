//! Expression grammar and AST (§4.2).
//!
//! `parse` builds an [`Ast`] from a small C-like expression language.
//! Resolution against a scope is deliberately decoupled from the scope
//! stack itself: [`Ast::resolve_names`] takes a resolver closure so this
//! module has no dependency on [`crate::eval`]; [`crate::eval`] is the one
//! place that knows the name-resolution rules of §4.3.

use crate::diag::{ParseError, Sink};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinOp {
    Add,
    Sub,
    Mul,
    Div,
    Rem,
    BitOr,
    BitAnd,
    BitXor,
    Shl,
    Shr,
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
    And,
    Or,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnOp {
    Neg,
    Not,
    BitNot,
}

/// A node in a deferred expression tree. Every child pointer is exclusively
/// owned; use [`Ast::clone`] (`deep_copy` in spec terms) when the same
/// expression needs to live at more than one store path.
#[derive(Debug, Clone)]
pub enum Ast {
    Num(i64),
    Ident { name: String, resolved: Option<i64> },
    Unary(UnOp, Box<Ast>),
    Binary(BinOp, Box<Ast>, Box<Ast>),
    Ternary(Box<Ast>, Box<Ast>, Box<Ast>),
}

impl Ast {
    pub fn ident(name: impl Into<String>) -> Self {
        Ast::Ident { name: name.into(), resolved: None }
    }

    /// Deep-copies this node. Named to match the spec's ownership
    /// terminology even though `Clone` already does the work.
    pub fn deep_copy(&self) -> Ast {
        self.clone()
    }

    /// True iff every `Ident` leaf has a resolved integer value.
    pub fn is_defined(&self) -> bool {
        match self {
            Ast::Num(_) => true,
            Ast::Ident { resolved, .. } => resolved.is_some(),
            Ast::Unary(_, a) => a.is_defined(),
            Ast::Binary(_, a, b) => a.is_defined() && b.is_defined(),
            Ast::Ternary(c, a, b) => c.is_defined() && a.is_defined() && b.is_defined(),
        }
    }

    /// Walks every unresolved `Ident` leaf, calling `resolver(name)` and
    /// storing the result if found. Defined leaves are left untouched.
    pub fn resolve_names(&mut self, resolver: &mut dyn FnMut(&str) -> Option<i64>) {
        match self {
            Ast::Num(_) => {}
            Ast::Ident { name, resolved } => {
                if resolved.is_none() {
                    *resolved = resolver(name);
                }
            }
            Ast::Unary(_, a) => a.resolve_names(resolver),
            Ast::Binary(_, a, b) => {
                a.resolve_names(resolver);
                b.resolve_names(resolver);
            }
            Ast::Ternary(c, a, b) => {
                c.resolve_names(resolver);
                a.resolve_names(resolver);
                b.resolve_names(resolver);
            }
        }
    }

    /// Evaluates a fully-defined expression. Division and modulo by zero
    /// yield 0 silently; use [`Ast::evaluate_reporting`] when a diagnostic
    /// sink is available so that case gets recorded.
    pub fn evaluate(&self) -> i64 {
        self.evaluate_reporting(&mut None)
    }

    pub fn evaluate_reporting(&self, sink: &mut Option<&mut Sink>) -> i64 {
        match self {
            Ast::Num(n) => *n,
            Ast::Ident { resolved, .. } => resolved.unwrap_or(0),
            Ast::Unary(op, a) => {
                let v = a.evaluate_reporting(sink);
                match op {
                    UnOp::Neg => v.wrapping_neg(),
                    UnOp::Not => (v == 0) as i64,
                    UnOp::BitNot => !v,
                }
            }
            Ast::Binary(op, a, b) => {
                let l = a.evaluate_reporting(sink);
                // Short-circuit && and || per usual C semantics.
                match op {
                    BinOp::And => return ((l != 0) && (b.evaluate_reporting(sink) != 0)) as i64,
                    BinOp::Or => return ((l != 0) || (b.evaluate_reporting(sink) != 0)) as i64,
                    _ => {}
                }
                let r = b.evaluate_reporting(sink);
                match op {
                    BinOp::Add => l.wrapping_add(r),
                    BinOp::Sub => l.wrapping_sub(r),
                    BinOp::Mul => l.wrapping_mul(r),
                    BinOp::Div => {
                        if r == 0 {
                            if let Some(s) = sink.as_deref_mut() {
                                s.warn("eval", None, "division by zero");
                            }
                            0
                        } else {
                            l.wrapping_div(r)
                        }
                    }
                    BinOp::Rem => {
                        if r == 0 {
                            if let Some(s) = sink.as_deref_mut() {
                                s.warn("eval", None, "modulo by zero");
                            }
                            0
                        } else {
                            l.wrapping_rem(r)
                        }
                    }
                    BinOp::BitOr => l | r,
                    BinOp::BitAnd => l & r,
                    BinOp::BitXor => l ^ r,
                    BinOp::Shl => l.wrapping_shl(r as u32),
                    BinOp::Shr => l.wrapping_shr(r as u32),
                    BinOp::Eq => (l == r) as i64,
                    BinOp::Ne => (l != r) as i64,
                    BinOp::Lt => (l < r) as i64,
                    BinOp::Le => (l <= r) as i64,
                    BinOp::Gt => (l > r) as i64,
                    BinOp::Ge => (l >= r) as i64,
                    BinOp::And | BinOp::Or => unreachable!("handled above"),
                }
            }
            Ast::Ternary(c, a, b) => {
                if c.evaluate_reporting(sink) != 0 {
                    a.evaluate_reporting(sink)
                } else {
                    b.evaluate_reporting(sink)
                }
            }
        }
    }
}

impl fmt::Display for Ast {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Ast::Num(n) => write!(f, "{n}"),
            Ast::Ident { name, .. } => write!(f, "{name}"),
            Ast::Unary(op, a) => {
                let c = match op {
                    UnOp::Neg => "-",
                    UnOp::Not => "!",
                    UnOp::BitNot => "~",
                };
                write!(f, "{c}{a}")
            }
            Ast::Binary(op, a, b) => write!(f, "({a} {} {b})", bin_op_str(*op)),
            Ast::Ternary(c, a, b) => write!(f, "({c} ? {a} : {b})"),
        }
    }
}

fn bin_op_str(op: BinOp) -> &'static str {
    match op {
        BinOp::Add => "+",
        BinOp::Sub => "-",
        BinOp::Mul => "*",
        BinOp::Div => "/",
        BinOp::Rem => "%",
        BinOp::BitOr => "|",
        BinOp::BitAnd => "&",
        BinOp::BitXor => "^",
        BinOp::Shl => "<<",
        BinOp::Shr => ">>",
        BinOp::Eq => "==",
        BinOp::Ne => "!=",
        BinOp::Lt => "<",
        BinOp::Le => "<=",
        BinOp::Gt => ">",
        BinOp::Ge => ">=",
        BinOp::And => "&&",
        BinOp::Or => "||",
    }
}

#[derive(Debug, Clone, PartialEq)]
enum Tok {
    Num(i64),
    Ident(String),
    Op(&'static str),
    LParen,
    RParen,
    Question,
    Colon,
}

struct Lexer<'a> {
    src: &'a str,
    pos: usize,
}

impl<'a> Lexer<'a> {
    fn new(src: &'a str) -> Self {
        Lexer { src, pos: 0 }
    }

    fn rest(&self) -> &'a str {
        &self.src[self.pos..]
    }

    fn tokenize(mut self) -> Result<Vec<Tok>, ParseError> {
        let mut out = Vec::new();
        loop {
            self.skip_ws();
            if self.rest().is_empty() {
                break;
            }
            let c = self.rest().chars().next().unwrap();
            if c.is_ascii_digit() {
                out.push(self.lex_number()?);
            } else if c == '_' || c.is_alphabetic() || c == '.' || c == '/' || c == '+' {
                out.push(self.lex_ident());
            } else {
                out.push(self.lex_op()?);
            }
        }
        Ok(out)
    }

    fn skip_ws(&mut self) {
        let n = self.rest().chars().take_while(|c| c.is_whitespace()).map(|c| c.len_utf8()).sum::<usize>();
        self.pos += n;
    }

    fn lex_number(&mut self) -> Result<Tok, ParseError> {
        let rest = self.rest();
        if let Some(hex) = rest.strip_prefix("0x").or_else(|| rest.strip_prefix("0X")) {
            let digits: String = hex.chars().take_while(|c| c.is_ascii_hexdigit()).collect();
            self.pos += 2 + digits.len();
            let v = i64::from_str_radix(&digits, 16).map_err(|_| ParseError::BadNumber(rest.to_string()))?;
            return Ok(Tok::Num(v));
        }
        if let Some(bin) = rest.strip_prefix("0b").or_else(|| rest.strip_prefix("0B")) {
            let digits: String = bin.chars().take_while(|c| c == '0' || c == '1').collect();
            self.pos += 2 + digits.len();
            let v = i64::from_str_radix(&digits, 2).map_err(|_| ParseError::BadNumber(rest.to_string()))?;
            return Ok(Tok::Num(v));
        }
        let digits: String = rest.chars().take_while(|c| c.is_ascii_digit()).collect();
        self.pos += digits.len();
        let v: i64 = digits.parse().map_err(|_| ParseError::BadNumber(digits.clone()))?;
        Ok(Tok::Num(v))
    }

    fn lex_ident(&mut self) -> Tok {
        let rest = self.rest();
        let n: String = rest
            .chars()
            .take_while(|c| c.is_alphanumeric() || *c == '_' || *c == '.' || *c == '/' || *c == '+')
            .collect();
        self.pos += n.len();
        Tok::Ident(n)
    }

    fn lex_op(&mut self) -> Result<Tok, ParseError> {
        const TWO: &[&str] = &["==", "!=", "<=", ">=", "&&", "||", "<<", ">>"];
        let rest = self.rest();
        for op in TWO {
            if rest.starts_with(op) {
                self.pos += 2;
                return Ok(Tok::Op(op));
            }
        }
        let c = rest.chars().next().unwrap();
        self.pos += c.len_utf8();
        Ok(match c {
            '(' => Tok::LParen,
            ')' => Tok::RParen,
            '?' => Tok::Question,
            ':' => Tok::Colon,
            '+' => Tok::Op("+"),
            '-' => Tok::Op("-"),
            '*' => Tok::Op("*"),
            '/' => Tok::Op("/"),
            '%' => Tok::Op("%"),
            '|' => Tok::Op("|"),
            '&' => Tok::Op("&"),
            '^' => Tok::Op("^"),
            '~' => Tok::Op("~"),
            '!' => Tok::Op("!"),
            '<' => Tok::Op("<"),
            '>' => Tok::Op(">"),
            other => return Err(ParseError::UnexpectedToken(other.to_string())),
        })
    }
}

struct Parser {
    toks: Vec<Tok>,
    pos: usize,
}

impl Parser {
    fn peek(&self) -> Option<&Tok> {
        self.toks.get(self.pos)
    }

    fn bump(&mut self) -> Option<Tok> {
        let t = self.toks.get(self.pos).cloned();
        self.pos += 1;
        t
    }

    fn eat_op(&mut self, op: &str) -> bool {
        if matches!(self.peek(), Some(Tok::Op(o)) if *o == op) {
            self.pos += 1;
            true
        } else {
            false
        }
    }

    fn parse_expr(&mut self) -> Result<Ast, ParseError> {
        self.parse_ternary()
    }

    fn parse_ternary(&mut self) -> Result<Ast, ParseError> {
        let cond = self.parse_or()?;
        if matches!(self.peek(), Some(Tok::Question)) {
            self.pos += 1;
            let then_branch = self.parse_ternary()?;
            match self.bump() {
                Some(Tok::Colon) => {}
                _ => return Err(ParseError::UnexpectedToken("expected ':'".to_string())),
            }
            let else_branch = self.parse_ternary()?;
            Ok(Ast::Ternary(Box::new(cond), Box::new(then_branch), Box::new(else_branch)))
        } else {
            Ok(cond)
        }
    }

    fn parse_or(&mut self) -> Result<Ast, ParseError> {
        let mut lhs = self.parse_and()?;
        while self.eat_op("||") {
            let rhs = self.parse_and()?;
            lhs = Ast::Binary(BinOp::Or, Box::new(lhs), Box::new(rhs));
        }
        Ok(lhs)
    }

    fn parse_and(&mut self) -> Result<Ast, ParseError> {
        let mut lhs = self.parse_bitor()?;
        while self.eat_op("&&") {
            let rhs = self.parse_bitor()?;
            lhs = Ast::Binary(BinOp::And, Box::new(lhs), Box::new(rhs));
        }
        Ok(lhs)
    }

    fn parse_bitor(&mut self) -> Result<Ast, ParseError> {
        let mut lhs = self.parse_bitxor()?;
        while self.eat_op("|") {
            let rhs = self.parse_bitxor()?;
            lhs = Ast::Binary(BinOp::BitOr, Box::new(lhs), Box::new(rhs));
        }
        Ok(lhs)
    }

    fn parse_bitxor(&mut self) -> Result<Ast, ParseError> {
        let mut lhs = self.parse_bitand()?;
        while self.eat_op("^") {
            let rhs = self.parse_bitand()?;
            lhs = Ast::Binary(BinOp::BitXor, Box::new(lhs), Box::new(rhs));
        }
        Ok(lhs)
    }

    fn parse_bitand(&mut self) -> Result<Ast, ParseError> {
        let mut lhs = self.parse_equality()?;
        while self.eat_op("&") {
            let rhs = self.parse_equality()?;
            lhs = Ast::Binary(BinOp::BitAnd, Box::new(lhs), Box::new(rhs));
        }
        Ok(lhs)
    }

    fn parse_equality(&mut self) -> Result<Ast, ParseError> {
        let mut lhs = self.parse_relational()?;
        loop {
            let op = if self.eat_op("==") {
                BinOp::Eq
            } else if self.eat_op("!=") {
                BinOp::Ne
            } else {
                break;
            };
            let rhs = self.parse_relational()?;
            lhs = Ast::Binary(op, Box::new(lhs), Box::new(rhs));
        }
        Ok(lhs)
    }

    fn parse_relational(&mut self) -> Result<Ast, ParseError> {
        let mut lhs = self.parse_shift()?;
        loop {
            let op = if self.eat_op("<=") {
                BinOp::Le
            } else if self.eat_op(">=") {
                BinOp::Ge
            } else if self.eat_op("<") {
                BinOp::Lt
            } else if self.eat_op(">") {
                BinOp::Gt
            } else {
                break;
            };
            let rhs = self.parse_shift()?;
            lhs = Ast::Binary(op, Box::new(lhs), Box::new(rhs));
        }
        Ok(lhs)
    }

    fn parse_shift(&mut self) -> Result<Ast, ParseError> {
        let mut lhs = self.parse_additive()?;
        loop {
            let op = if self.eat_op("<<") {
                BinOp::Shl
            } else if self.eat_op(">>") {
                BinOp::Shr
            } else {
                break;
            };
            let rhs = self.parse_additive()?;
            lhs = Ast::Binary(op, Box::new(lhs), Box::new(rhs));
        }
        Ok(lhs)
    }

    fn parse_additive(&mut self) -> Result<Ast, ParseError> {
        let mut lhs = self.parse_mul()?;
        loop {
            let op = if self.eat_op("+") {
                BinOp::Add
            } else if self.eat_op("-") {
                BinOp::Sub
            } else {
                break;
            };
            let rhs = self.parse_mul()?;
            lhs = Ast::Binary(op, Box::new(lhs), Box::new(rhs));
        }
        Ok(lhs)
    }

    fn parse_mul(&mut self) -> Result<Ast, ParseError> {
        let mut lhs = self.parse_unary()?;
        loop {
            let op = if self.eat_op("*") {
                BinOp::Mul
            } else if self.eat_op("/") {
                BinOp::Div
            } else if self.eat_op("%") {
                BinOp::Rem
            } else {
                break;
            };
            let rhs = self.parse_unary()?;
            lhs = Ast::Binary(op, Box::new(lhs), Box::new(rhs));
        }
        Ok(lhs)
    }

    fn parse_unary(&mut self) -> Result<Ast, ParseError> {
        if self.eat_op("-") {
            return Ok(Ast::Unary(UnOp::Neg, Box::new(self.parse_unary()?)));
        }
        if self.eat_op("!") {
            return Ok(Ast::Unary(UnOp::Not, Box::new(self.parse_unary()?)));
        }
        if self.eat_op("~") {
            return Ok(Ast::Unary(UnOp::BitNot, Box::new(self.parse_unary()?)));
        }
        self.parse_primary()
    }

    fn parse_primary(&mut self) -> Result<Ast, ParseError> {
        match self.bump() {
            Some(Tok::Num(n)) => Ok(Ast::Num(n)),
            Some(Tok::Ident(name)) => Ok(Ast::ident(name)),
            Some(Tok::LParen) => {
                let inner = self.parse_expr()?;
                match self.bump() {
                    Some(Tok::RParen) => Ok(inner),
                    _ => Err(ParseError::UnexpectedToken("expected ')'".to_string())),
                }
            }
            Some(other) => Err(ParseError::UnexpectedToken(format!("{other:?}"))),
            None => Err(ParseError::UnexpectedEof),
        }
    }
}

/// Parses a small C-like expression grammar (§4.2) into an [`Ast`].
pub fn parse(source: &str) -> Result<Ast, ParseError> {
    let toks = Lexer::new(source).tokenize()?;
    let mut p = Parser { toks, pos: 0 };
    let ast = p.parse_expr()?;
    if p.pos != p.toks.len() {
        return Err(ParseError::UnexpectedToken(format!("trailing input at token {}", p.pos)));
    }
    Ok(ast)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_precedence() {
        let ast = parse("1 + 2 * 3").unwrap();
        assert_eq!(ast.evaluate(), 7);
    }

    #[test]
    fn parses_ternary_right_assoc() {
        let ast = parse("1 ? 2 : 0 ? 3 : 4").unwrap();
        assert_eq!(ast.evaluate(), 2);
    }

    #[test]
    fn parses_hex_and_binary_literals() {
        assert_eq!(parse("0x10").unwrap().evaluate(), 16);
        assert_eq!(parse("0b101").unwrap().evaluate(), 5);
    }

    #[test]
    fn division_by_zero_yields_zero_and_warns() {
        let ast = parse("4 / 0").unwrap();
        let mut sink = Sink::new();
        let mut opt = Some(&mut sink);
        assert_eq!(ast.evaluate_reporting(&mut opt), 0);
        assert_eq!(sink.records().len(), 1);
    }

    #[test]
    fn resolves_dotted_identifier() {
        let mut ast = parse("X + 4").unwrap();
        assert!(!ast.is_defined());
        ast.resolve_names(&mut |name| if name == "X" { Some(3) } else { None });
        assert!(ast.is_defined());
        assert_eq!(ast.evaluate(), 7);
    }
}
