use std::fmt;

use log::{debug, warn};
use thiserror::Error;

use self::Operator::*;

/// One of the five reserved characters. Everything else is a literal.
#[derive(PartialOrd, Ord, PartialEq, Eq, Hash, Debug, Clone, Copy)]
pub enum Operator {
    /// Kleene closure, `*`. Unary postfix.
    Star,
    /// Alternation, `+`.
    Alt,
    /// Concatenation, `.`. Usually inserted by [`add_concatenation`].
    Concat,
    /// `(`
    Open,
    /// `)`
    Close,
}

impl Operator {
    pub fn from_char(c: char) -> Option<Operator> {
        match c {
            '*' => Some(Star),
            '+' => Some(Alt),
            '.' => Some(Concat),
            '(' => Some(Open),
            ')' => Some(Close),
            _ => None,
        }
    }

    pub fn as_char(self) -> char {
        match self {
            Star => '*',
            Alt => '+',
            Concat => '.',
            Open => '(',
            Close => ')',
        }
    }

    /// Binding strength, higher binds tighter. Parentheses are structural
    /// and have none.
    pub fn precedence(self) -> Option<u8> {
        match self {
            Star => Some(3),
            Concat => Some(2),
            Alt => Some(1),
            Open | Close => None,
        }
    }
}

/// A single element of an expression: a literal symbol or an operator.
#[derive(PartialOrd, Ord, PartialEq, Eq, Hash, Debug, Clone, Copy)]
pub enum Token {
    Literal(char),
    /// The empty string, written `()`.
    Empty,
    Op(Operator),
}

impl Token {
    pub fn from_char(c: char) -> Token {
        match Operator::from_char(c) {
            Some(op) => Token::Op(op),
            None => Token::Literal(c),
        }
    }
}

impl fmt::Display for Token {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match *self {
            Token::Literal(c) => write!(f, "{}", c),
            Token::Empty => write!(f, "ε"),
            Token::Op(op) => write!(f, "{}", op.as_char()),
        }
    }
}

pub fn is_operator(c: char) -> bool {
    Operator::from_char(c).is_some()
}

/// What to do with parentheses that have no partner.
#[derive(PartialEq, Eq, Debug, Clone, Copy, Default)]
pub enum ParenPolicy {
    /// Drop them and keep going.
    #[default]
    Lenient,
    /// Fail with a [`ParseError`].
    Strict,
}

/// A malformed expression. Positions are char indices into the expression
/// after concatenation insertion.
#[derive(Error, PartialEq, Eq, Debug, Clone, Copy)]
pub enum ParseError {
    #[error("unmatched ')' at position {position}")]
    UnmatchedClose { position: usize },
    #[error("unmatched '(' at position {position}")]
    UnmatchedOpen { position: usize },
}

/// Makes every concatenation explicit by inserting `.` between the end of
/// an operand (a literal, `)` or `*`) and the start of the next one (a
/// literal or `(`). Whitespace is copied through and does not separate
/// operands.
pub fn add_concatenation(regex: &str) -> String {
    let chars: Vec<char> = regex.chars().collect();
    let mut result = String::with_capacity(regex.len() * 2);

    for (i, &c) in chars.iter().enumerate() {
        result.push(c);
        if c.is_whitespace() || !ends_operand(c) {
            continue;
        }
        let next = chars[i + 1..].iter().find(|d| !d.is_whitespace());
        if let Some(&d) = next {
            if starts_operand(d) {
                result.push(Concat.as_char());
            }
        }
    }

    result
}

fn ends_operand(c: char) -> bool {
    !is_operator(c) || c == Close.as_char() || c == Star.as_char()
}

fn starts_operand(c: char) -> bool {
    !is_operator(c) || c == Open.as_char()
}

/// Shunting-yard over an already normalized expression.
struct Converter {
    stack: Vec<(Operator, usize)>,
    out: Vec<Token>,
    errors: Vec<ParseError>,
}

impl Converter {
    fn new() -> Converter {
        Converter {
            stack: Vec::new(),
            out: Vec::new(),
            errors: Vec::new(),
        }
    }

    fn close(&mut self, position: usize) {
        while let Some((op, _)) = self.stack.pop() {
            if op == Open {
                return;
            }
            self.out.push(Token::Op(op));
        }
        self.errors.push(ParseError::UnmatchedClose { position });
    }

    fn binary(&mut self, op: Operator, position: usize) {
        let prec = op.precedence();
        while let Some(&(top, _)) = self.stack.last() {
            if top == Open || top.precedence() < prec {
                break;
            }
            self.stack.pop();
            self.out.push(Token::Op(top));
        }
        self.stack.push((op, position));
    }

    fn finish(&mut self) {
        while let Some((op, position)) = self.stack.pop() {
            if op == Open {
                self.errors.push(ParseError::UnmatchedOpen { position });
            } else {
                self.out.push(Token::Op(op));
            }
        }
    }

    /// `()` with nothing inside. The '(' is still on top of the stack.
    fn empty_group(&mut self) {
        self.stack.pop();
        self.out.push(Token::Empty);
    }

    fn convert(normalized: &str) -> Converter {
        let mut conv = Converter::new();
        let mut prev = None;
        for (position, c) in normalized.chars().enumerate() {
            if c.is_whitespace() {
                continue;
            }
            match Operator::from_char(c) {
                None => conv.out.push(Token::Literal(c)),
                Some(Open) => conv.stack.push((Open, position)),
                Some(Close) if prev == Some(Open) => conv.empty_group(),
                Some(Close) => conv.close(position),
                Some(Star) => conv.out.push(Token::Op(Star)),
                Some(op) => conv.binary(op, position),
            }
            prev = Operator::from_char(c);
        }
        conv.finish();
        conv
    }
}

/// Converts an infix regex to postfix order, tolerating unbalanced
/// parentheses. The result never contains `(` or `)`; an empty group `()`
/// becomes [`Token::Empty`].
pub fn to_postfix(regex: &str) -> Vec<Token> {
    let normalized = add_concatenation(regex);
    let conv = Converter::convert(&normalized);
    for e in &conv.errors {
        warn!("ignoring {} in {:?}", e, normalized);
    }
    debug!("postfix of {:?}: {}", normalized, postfix_string(&conv.out));
    conv.out
}

/// Like [`to_postfix`], but under [`ParenPolicy::Strict`] the first
/// unbalanced parenthesis is reported instead of dropped.
pub fn to_postfix_with(regex: &str, policy: ParenPolicy) -> Result<Vec<Token>, ParseError> {
    match policy {
        ParenPolicy::Lenient => Ok(to_postfix(regex)),
        ParenPolicy::Strict => {
            let normalized = add_concatenation(regex);
            let conv = Converter::convert(&normalized);
            // Errors are recorded in scan order, except that unmatched '('s
            // only show up at the end; report whichever comes first.
            match conv.errors.into_iter().min_by_key(error_position) {
                Some(e) => Err(e),
                None => {
                    debug!("postfix of {:?}: {}", normalized, postfix_string(&conv.out));
                    Ok(conv.out)
                }
            }
        }
    }
}

fn error_position(e: &ParseError) -> usize {
    match *e {
        ParseError::UnmatchedClose { position } | ParseError::UnmatchedOpen { position } => position,
    }
}

pub fn postfix_string(tokens: &[Token]) -> String {
    tokens.iter().map(ToString::to_string).collect()
}
