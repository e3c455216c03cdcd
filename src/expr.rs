//! Guards, invariants and updates of the system declaration.
//!
//! Expressions range over integer constants, bounded integer variables and
//! clocks. The discrete engine never represents clock values: a comparison
//! involving a clock evaluates to "unknown", and a guard holds unless it is
//! definitely false. That makes the discrete transition relation an
//! over-approximation of the timed one.

use std::fmt;

use thiserror::Error;

/// Something an identifier of an expression can resolve to.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum Symbol {
    Int(u32),
    Clock(u32),
}

#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum UnaryOp {
    Neg,
    Not,
}

#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum BinaryOp {
    Add,
    Sub,
    Mul,
    Div,
    Mod,
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
    And,
    Or,
}

impl BinaryOp {
    fn symbol(self) -> &'static str {
        match self {
            BinaryOp::Add => "+",
            BinaryOp::Sub => "-",
            BinaryOp::Mul => "*",
            BinaryOp::Div => "/",
            BinaryOp::Mod => "%",
            BinaryOp::Eq => "==",
            BinaryOp::Ne => "!=",
            BinaryOp::Lt => "<",
            BinaryOp::Le => "<=",
            BinaryOp::Gt => ">",
            BinaryOp::Ge => ">=",
            BinaryOp::And => "&&",
            BinaryOp::Or => "||",
        }
    }
}

#[derive(Debug, Clone, Eq, PartialEq)]
pub enum Expr {
    Const(i64),
    Int(u32),
    Clock(u32),
    Unary(UnaryOp, Box<Expr>),
    Binary(BinaryOp, Box<Expr>, Box<Expr>),
}

/// One assignment of a statement.
#[derive(Debug, Clone, Eq, PartialEq)]
pub enum Update {
    Int(u32, Expr),
    Clock(u32, Expr),
}

#[derive(Debug, Error, Copy, Clone, Eq, PartialEq)]
pub enum EvalError {
    #[error("division by zero")]
    DivisionByZero,
    #[error("clock values are not available")]
    ClockValue,
}

#[derive(Debug, Copy, Clone, Eq, PartialEq)]
enum Truth {
    False,
    True,
    Unknown,
}

impl Expr {
    pub const TRUE: Expr = Expr::Const(1);

    pub fn mentions_clock(&self) -> bool {
        match self {
            Expr::Clock(_) => true,
            Expr::Const(_) | Expr::Int(_) => false,
            Expr::Unary(_, e) => e.mentions_clock(),
            Expr::Binary(_, l, r) => l.mentions_clock() || r.mentions_clock(),
        }
    }

    /// Integer value of the expression (booleans are 0/1).
    pub fn eval(&self, vals: &[i32]) -> Result<i64, EvalError> {
        Ok(match self {
            Expr::Const(c) => *c,
            Expr::Int(id) => vals[*id as usize] as i64,
            Expr::Clock(_) => return Err(EvalError::ClockValue),
            Expr::Unary(UnaryOp::Neg, e) => e.eval(vals)?.wrapping_neg(),
            Expr::Unary(UnaryOp::Not, e) => (e.eval(vals)? == 0) as i64,
            Expr::Binary(op, l, r) => {
                let a = l.eval(vals)?;
                let b = r.eval(vals)?;
                match op {
                    BinaryOp::Add => a.wrapping_add(b),
                    BinaryOp::Sub => a.wrapping_sub(b),
                    BinaryOp::Mul => a.wrapping_mul(b),
                    BinaryOp::Div | BinaryOp::Mod if b == 0 => return Err(EvalError::DivisionByZero),
                    BinaryOp::Div => a.wrapping_div(b),
                    BinaryOp::Mod => a.wrapping_rem(b),
                    BinaryOp::Eq => (a == b) as i64,
                    BinaryOp::Ne => (a != b) as i64,
                    BinaryOp::Lt => (a < b) as i64,
                    BinaryOp::Le => (a <= b) as i64,
                    BinaryOp::Gt => (a > b) as i64,
                    BinaryOp::Ge => (a >= b) as i64,
                    BinaryOp::And => (a != 0 && b != 0) as i64,
                    BinaryOp::Or => (a != 0 || b != 0) as i64,
                }
            }
        })
    }

    fn truth(&self, vals: &[i32]) -> Result<Truth, EvalError> {
        Ok(match self {
            Expr::Binary(BinaryOp::And, l, r) => match (l.truth(vals)?, r.truth(vals)?) {
                (Truth::False, _) | (_, Truth::False) => Truth::False,
                (Truth::True, Truth::True) => Truth::True,
                _ => Truth::Unknown,
            },
            Expr::Binary(BinaryOp::Or, l, r) => match (l.truth(vals)?, r.truth(vals)?) {
                (Truth::True, _) | (_, Truth::True) => Truth::True,
                (Truth::False, Truth::False) => Truth::False,
                _ => Truth::Unknown,
            },
            Expr::Unary(UnaryOp::Not, e) => match e.truth(vals)? {
                Truth::False => Truth::True,
                Truth::True => Truth::False,
                Truth::Unknown => Truth::Unknown,
            },
            e if e.mentions_clock() => Truth::Unknown,
            e => {
                if e.eval(vals)? != 0 {
                    Truth::True
                } else {
                    Truth::False
                }
            }
        })
    }

    /// Whether the guard may hold on `vals`, clock constraints abstracted.
    pub fn holds(&self, vals: &[i32]) -> Result<bool, EvalError> {
        Ok(self.truth(vals)? != Truth::False)
    }
}

impl fmt::Display for Expr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Expr::Const(c) => write!(f, "{}", c),
            Expr::Int(id) => write!(f, "i{}", id),
            Expr::Clock(id) => write!(f, "c{}", id),
            Expr::Unary(UnaryOp::Neg, e) => write!(f, "-({})", e),
            Expr::Unary(UnaryOp::Not, e) => write!(f, "!({})", e),
            Expr::Binary(op, l, r) => write!(f, "({} {} {})", l, op.symbol(), r),
        }
    }
}

#[derive(Debug, Clone, Eq, PartialEq)]
enum Token {
    Num(i64),
    Ident(String),
    Op(&'static str),
}

const OPERATORS: [&str; 18] = [
    "==", "!=", "<=", ">=", "&&", "||", "<", ">", "+", "-", "*", "/", "%", "!", "(", ")", "=", ",",
];

fn tokenize(text: &str) -> Result<Vec<Token>, String> {
    let mut tokens = Vec::new();
    let mut rest = text.trim_start();
    while let Some(c) = rest.chars().next() {
        if c.is_ascii_digit() {
            let end = rest.find(|c: char| !c.is_ascii_digit()).unwrap_or(rest.len());
            let value = rest[..end]
                .parse()
                .map_err(|_| format!("integer `{}' out of range", &rest[..end]))?;
            tokens.push(Token::Num(value));
            rest = &rest[end..];
        } else if c.is_ascii_alphabetic() || c == '_' {
            let end = rest
                .find(|c: char| !(c.is_ascii_alphanumeric() || c == '_'))
                .unwrap_or(rest.len());
            tokens.push(Token::Ident(rest[..end].to_string()));
            rest = &rest[end..];
        } else if let Some(op) = OPERATORS.iter().find(|op| rest.starts_with(**op)) {
            tokens.push(Token::Op(*op));
            rest = &rest[op.len()..];
        } else {
            return Err(format!("unexpected character `{}'", c));
        }
        rest = rest.trim_start();
    }
    Ok(tokens)
}

struct Parser<'a> {
    tokens: Vec<Token>,
    pos: usize,
    resolve: &'a dyn Fn(&str) -> Option<Symbol>,
}

impl<'a> Parser<'a> {
    fn peek_op(&self) -> Option<&'static str> {
        match self.tokens.get(self.pos) {
            Some(Token::Op(op)) => Some(*op),
            _ => None,
        }
    }

    fn eat(&mut self, op: &str) -> bool {
        if self.peek_op() == Some(op) {
            self.pos += 1;
            true
        } else {
            false
        }
    }

    fn at_end(&self) -> bool {
        self.pos == self.tokens.len()
    }

    fn binary_level(
        &mut self,
        ops: &[(&str, BinaryOp)],
        next: fn(&mut Self) -> Result<Expr, String>,
    ) -> Result<Expr, String> {
        let mut lhs = next(self)?;
        'outer: loop {
            for &(text, op) in ops {
                if self.eat(text) {
                    let rhs = next(self)?;
                    lhs = Expr::Binary(op, Box::new(lhs), Box::new(rhs));
                    continue 'outer;
                }
            }
            return Ok(lhs);
        }
    }

    fn or(&mut self) -> Result<Expr, String> {
        self.binary_level(&[("||", BinaryOp::Or)], Self::and)
    }

    fn and(&mut self) -> Result<Expr, String> {
        self.binary_level(&[("&&", BinaryOp::And)], Self::comparison)
    }

    fn comparison(&mut self) -> Result<Expr, String> {
        let lhs = self.additive()?;
        let ops = [
            ("==", BinaryOp::Eq),
            ("!=", BinaryOp::Ne),
            ("<=", BinaryOp::Le),
            (">=", BinaryOp::Ge),
            ("<", BinaryOp::Lt),
            (">", BinaryOp::Gt),
        ];
        for (text, op) in ops {
            if self.eat(text) {
                let rhs = self.additive()?;
                return Ok(Expr::Binary(op, Box::new(lhs), Box::new(rhs)));
            }
        }
        Ok(lhs)
    }

    fn additive(&mut self) -> Result<Expr, String> {
        self.binary_level(&[("+", BinaryOp::Add), ("-", BinaryOp::Sub)], Self::multiplicative)
    }

    fn multiplicative(&mut self) -> Result<Expr, String> {
        self.binary_level(
            &[("*", BinaryOp::Mul), ("/", BinaryOp::Div), ("%", BinaryOp::Mod)],
            Self::unary,
        )
    }

    fn unary(&mut self) -> Result<Expr, String> {
        if self.eat("-") {
            return Ok(Expr::Unary(UnaryOp::Neg, Box::new(self.unary()?)));
        }
        if self.eat("!") {
            return Ok(Expr::Unary(UnaryOp::Not, Box::new(self.unary()?)));
        }
        self.primary()
    }

    fn primary(&mut self) -> Result<Expr, String> {
        let token = self.tokens.get(self.pos).cloned();
        self.pos += 1;
        match token {
            Some(Token::Num(n)) => Ok(Expr::Const(n)),
            Some(Token::Ident(name)) => match (self.resolve)(&name) {
                Some(Symbol::Int(id)) => Ok(Expr::Int(id)),
                Some(Symbol::Clock(id)) => Ok(Expr::Clock(id)),
                None => Err(format!("unknown variable `{}'", name)),
            },
            Some(Token::Op("(")) => {
                let e = self.or()?;
                if !self.eat(")") {
                    return Err("missing `)'".to_string());
                }
                Ok(e)
            }
            Some(Token::Op(op)) => Err(format!("unexpected `{}'", op)),
            None => Err("unexpected end of expression".to_string()),
        }
    }
}

/// Parse a guard or invariant. An empty text is the constant true.
pub fn parse_expr(text: &str, resolve: &dyn Fn(&str) -> Option<Symbol>) -> Result<Expr, String> {
    let tokens = tokenize(text)?;
    if tokens.is_empty() {
        return Ok(Expr::TRUE);
    }
    let mut parser = Parser {
        tokens,
        pos: 0,
        resolve,
    };
    let e = parser.or()?;
    if !parser.at_end() {
        return Err(format!("trailing tokens in `{}'", text.trim()));
    }
    Ok(e)
}

/// Parse a `;`-separated sequence of assignments (`nop` is the empty one).
pub fn parse_statement(text: &str, resolve: &dyn Fn(&str) -> Option<Symbol>) -> Result<Vec<Update>, String> {
    let mut updates = Vec::new();
    for part in text.split(';').map(str::trim) {
        if part.is_empty() || part == "nop" {
            continue;
        }
        let (lhs, rhs) = match part.find('=') {
            Some(i) if !part[i + 1..].starts_with('=') => (part[..i].trim(), &part[i + 1..]),
            _ => return Err(format!("expected an assignment, found `{}'", part)),
        };
        if rhs.trim().is_empty() {
            return Err(format!("missing value in `{}'", part));
        }
        let value = parse_expr(rhs, resolve)?;
        match resolve(lhs) {
            Some(Symbol::Int(id)) => updates.push(Update::Int(id, value)),
            Some(Symbol::Clock(id)) => updates.push(Update::Clock(id, value)),
            None => return Err(format!("unknown variable `{}'", lhs)),
        }
    }
    Ok(updates)
}
