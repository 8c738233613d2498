use std::iter::Peekable;
use std::str::{CharIndices, FromStr};

use rust_decimal::Decimal;

use super::expr::{Constant, Expr, Function};
use super::rational::Rational;
use super::Bindings;

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
#[error("{message} at position {position}")]
pub struct ParseError {
    pub message: String,
    pub position: usize,
}

impl ParseError {
    fn new(message: impl Into<String>, position: usize) -> Self {
        Self {
            message: message.into(),
            position,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
enum Token {
    Number(Rational),
    Ident(String),
    Plus,
    Minus,
    Star,
    Slash,
    Power,
    LParen,
    RParen,
    Pipe,
    Equals,
}

impl Token {
    fn starts_operand(&self) -> bool {
        matches!(self, Token::Number(_) | Token::Ident(_) | Token::LParen)
    }
}

fn tokenize(input: &str) -> Result<Vec<(Token, usize)>, ParseError> {
    let mut tokens = Vec::new();
    let mut chars: Peekable<CharIndices> = input.char_indices().peekable();

    while let Some(&(pos, c)) = chars.peek() {
        if c.is_whitespace() {
            chars.next();
            continue;
        }
        if c.is_ascii_digit() || c == '.' {
            let mut literal = String::new();
            let mut seen_dot = false;
            while let Some(&(_, d)) = chars.peek() {
                if d.is_ascii_digit() {
                    literal.push(d);
                } else if d == '.' && !seen_dot {
                    seen_dot = true;
                    literal.push(d);
                } else {
                    break;
                }
                chars.next();
            }
            if literal == "." {
                return Err(ParseError::new("stray decimal point", pos));
            }
            if literal.starts_with('.') {
                literal.insert(0, '0');
            }
            if literal.ends_with('.') {
                literal.pop();
            }
            let exponent = scan_exponent(input, &mut chars);
            let decimal = match exponent {
                Some(exp) => {
                    literal.push_str(exp);
                    Decimal::from_scientific(&literal)
                }
                None => Decimal::from_str(&literal),
            }
            .map_err(|e| ParseError::new(format!("invalid number `{}`: {}", literal, e), pos))?;
            let value = Rational::from_decimal(decimal)
                .map_err(|e| ParseError::new(format!("invalid number `{}`: {}", literal, e), pos))?;
            tokens.push((Token::Number(value), pos));
            continue;
        }
        if c.is_alphabetic() || c == '_' {
            let mut name = String::new();
            while let Some(&(_, d)) = chars.peek() {
                if d.is_alphanumeric() || d == '_' {
                    name.push(d);
                    chars.next();
                } else {
                    break;
                }
            }
            tokens.push((Token::Ident(name), pos));
            continue;
        }

        chars.next();
        let token = match c {
            '+' => Token::Plus,
            '-' => Token::Minus,
            '*' => {
                if matches!(chars.peek(), Some(&(_, '*'))) {
                    chars.next();
                    Token::Power
                } else {
                    Token::Star
                }
            }
            '^' => Token::Power,
            '/' => Token::Slash,
            '(' | '[' => Token::LParen,
            ')' | ']' => Token::RParen,
            '|' => Token::Pipe,
            '=' => Token::Equals,
            other => {
                return Err(ParseError::new(
                    format!("unexpected character `{}`", other),
                    pos,
                ))
            }
        };
        tokens.push((token, pos));
    }

    Ok(tokens)
}

/// Consumes an `e5` / `E-3` suffix after a numeric literal. A bare `e` is
/// left alone so `2e` still reads as `2*e`.
fn scan_exponent<'a>(input: &'a str, chars: &mut Peekable<CharIndices<'a>>) -> Option<&'a str> {
    let &(start, marker) = chars.peek()?;
    if marker != 'e' && marker != 'E' {
        return None;
    }
    let rest = &input[start + 1..];
    let sign = usize::from(rest.starts_with(['+', '-']));
    let digits = rest[sign..].bytes().take_while(u8::is_ascii_digit).count();
    if digits == 0 {
        return None;
    }
    let end = start + 1 + sign + digits;
    while chars.peek().is_some_and(|&(i, _)| i < end) {
        chars.next();
    }
    Some(&input[start..end])
}

/// Parses normalized text into an expression tree.
///
/// Bound names with a value are replaced by that value; bound names without
/// one stay symbols. Juxtaposed operands multiply, and unknown multi-letter
/// names split into single-letter symbols (`xy` is `x*y`).
pub fn parse(input: &str, bindings: &Bindings) -> Result<Expr, ParseError> {
    let tokens = tokenize(input)?;
    if tokens.is_empty() {
        return Err(ParseError::new("empty expression", 0));
    }
    let mut parser = Parser {
        tokens,
        pos: 0,
        end: input.len(),
        bindings,
    };
    let expr = parser.expression()?;
    if let Some((token, at)) = parser.tokens.get(parser.pos) {
        let message = match token {
            Token::Equals => "unexpected `=` in expression".to_string(),
            Token::RParen => "unbalanced closing parenthesis".to_string(),
            other => format!("unexpected token {:?}", other),
        };
        return Err(ParseError::new(message, *at));
    }
    Ok(expr)
}

struct Parser<'a> {
    tokens: Vec<(Token, usize)>,
    pos: usize,
    end: usize,
    bindings: &'a Bindings,
}

impl<'a> Parser<'a> {
    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.pos).map(|(t, _)| t)
    }

    fn position(&self) -> usize {
        self.tokens.get(self.pos).map(|(_, p)| *p).unwrap_or(self.end)
    }

    fn advance(&mut self) -> Option<Token> {
        let token = self.tokens.get(self.pos).map(|(t, _)| t.clone());
        self.pos += 1;
        token
    }

    fn expect(&mut self, expected: Token, what: &str) -> Result<(), ParseError> {
        if self.peek() == Some(&expected) {
            self.pos += 1;
            Ok(())
        } else {
            Err(ParseError::new(format!("expected {}", what), self.position()))
        }
    }

    fn expression(&mut self) -> Result<Expr, ParseError> {
        let mut lhs = self.term()?;
        loop {
            match self.peek() {
                Some(Token::Plus) => {
                    self.pos += 1;
                    let rhs = self.term()?;
                    lhs = Expr::Add(Box::new(lhs), Box::new(rhs));
                }
                Some(Token::Minus) => {
                    self.pos += 1;
                    let rhs = self.term()?;
                    lhs = Expr::Sub(Box::new(lhs), Box::new(rhs));
                }
                _ => return Ok(lhs),
            }
        }
    }

    fn term(&mut self) -> Result<Expr, ParseError> {
        let mut lhs = self.unary()?;
        loop {
            match self.peek() {
                Some(Token::Star) => {
                    self.pos += 1;
                    let rhs = self.unary()?;
                    lhs = Expr::Mul(Box::new(lhs), Box::new(rhs));
                }
                Some(Token::Slash) => {
                    self.pos += 1;
                    let rhs = self.unary()?;
                    lhs = Expr::Div(Box::new(lhs), Box::new(rhs));
                }
                Some(t) if t.starts_operand() => {
                    let rhs = self.power()?;
                    lhs = Expr::Mul(Box::new(lhs), Box::new(rhs));
                }
                _ => return Ok(lhs),
            }
        }
    }

    fn unary(&mut self) -> Result<Expr, ParseError> {
        match self.peek() {
            Some(Token::Minus) => {
                self.pos += 1;
                Ok(Expr::Neg(Box::new(self.unary()?)))
            }
            Some(Token::Plus) => {
                self.pos += 1;
                self.unary()
            }
            _ => self.power(),
        }
    }

    fn power(&mut self) -> Result<Expr, ParseError> {
        let base = self.primary()?;
        if self.peek() == Some(&Token::Power) {
            self.pos += 1;
            let exponent = self.unary()?;
            return Ok(Expr::Pow(Box::new(base), Box::new(exponent)));
        }
        Ok(base)
    }

    fn primary(&mut self) -> Result<Expr, ParseError> {
        let at = self.position();
        match self.advance() {
            Some(Token::Number(r)) => Ok(Expr::Number(r)),
            Some(Token::LParen) => {
                let inner = self.expression()?;
                self.expect(Token::RParen, "closing parenthesis")?;
                Ok(inner)
            }
            Some(Token::Pipe) => {
                let inner = self.expression()?;
                self.expect(Token::Pipe, "closing `|`")?;
                Ok(Expr::Call(Function::Abs, Box::new(inner)))
            }
            Some(Token::Ident(name)) => self.identifier(name, at),
            Some(Token::Equals) => Err(ParseError::new("unexpected `=` in expression", at)),
            Some(other) => Err(ParseError::new(format!("unexpected token {:?}", other), at)),
            None => Err(ParseError::new("unexpected end of input", at)),
        }
    }

    fn identifier(&mut self, name: String, at: usize) -> Result<Expr, ParseError> {
        if let Some(func) = Function::from_name(&name) {
            if self.peek() != Some(&Token::LParen) {
                return Err(ParseError::new(
                    format!("function `{}` needs parenthesized arguments", name),
                    at,
                ));
            }
            self.pos += 1;
            let arg = self.expression()?;
            self.expect(Token::RParen, "closing parenthesis")?;
            return Ok(Expr::Call(func, Box::new(arg)));
        }

        if let Some(expr) = self.resolve(&name, at)? {
            return Ok(expr);
        }
        if name.chars().any(|c| c.is_ascii_digit() || c == '_') {
            return Ok(Expr::Symbol(name));
        }

        // Split an unknown run of letters, preferring the longest known name
        // at each position.
        let chars: Vec<char> = name.chars().collect();
        let mut factors = Vec::new();
        let mut i = 0;
        while i < chars.len() {
            let mut matched = None;
            for j in (i + 2..=chars.len()).rev() {
                let candidate: String = chars[i..j].iter().collect();
                if let Some(expr) = self.resolve(&candidate, at)? {
                    matched = Some((expr, j));
                    break;
                }
            }
            let (expr, next) = match matched {
                Some(found) => found,
                None => {
                    let single = chars[i].to_string();
                    let expr = self
                        .resolve(&single, at)?
                        .unwrap_or(Expr::Symbol(single));
                    (expr, i + 1)
                }
            };
            factors.push(expr);
            i = next;
        }
        let mut product = factors.remove(0);
        for factor in factors {
            product = Expr::mul(product, factor);
        }
        Ok(product)
    }

    /// Bound variables shadow constants; single letters are plain symbols.
    fn resolve(&self, name: &str, at: usize) -> Result<Option<Expr>, ParseError> {
        if let Some(binding) = self.bindings.get(name) {
            return match binding {
                Some(value) => Rational::from_f64(*value)
                    .map(|r| Some(Expr::Number(r)))
                    .map_err(|e| {
                        ParseError::new(format!("invalid value for `{}`: {}", name, e), at)
                    }),
                None => Ok(Some(Expr::Symbol(name.to_string()))),
            };
        }
        if let Some(c) = Constant::from_name(name) {
            return Ok(Some(Expr::Constant(c)));
        }
        if name.chars().count() == 1 {
            return Ok(Some(Expr::Symbol(name.to_string())));
        }
        Ok(None)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn p(input: &str) -> String {
        parse(input, &Bindings::new()).unwrap().to_string()
    }

    #[test]
    fn respects_precedence_and_associativity() {
        assert_eq!(p("1 + 2*3"), "1 + 2*3");
        assert_eq!(p("(1 + 2)*3"), "(1 + 2)*3");
        assert_eq!(p("2**3**2"), "2**(3**2)");
        assert_eq!(p("-x**2"), "-x**2");
        assert_eq!(p("a - b - c"), "a - b - c");
        assert_eq!(p("x^-1"), "x**(-1)");
    }

    #[test]
    fn juxtaposition_multiplies() {
        assert_eq!(p("2(x+1)"), "2*(x + 1)");
        assert_eq!(p("(x+1)(x-1)"), "(x + 1)*(x - 1)");
        assert_eq!(p("2x^2"), "2*x**2");
        assert_eq!(p("1/2x"), "1/2*x");
    }

    #[test]
    fn splits_unknown_names() {
        assert_eq!(p("xy"), "x*y");
        assert_eq!(p("2pix"), "2*pi*x");
        assert_eq!(p("x_1 + x2"), "x_1 + x2");
    }

    #[test]
    fn bindings_shadow_and_substitute() {
        let mut bindings = Bindings::new();
        bindings.insert("rate".to_string(), None);
        bindings.insert("E".to_string(), None);
        bindings.insert("k".to_string(), Some(2.5));
        let e = parse("rate*E + k", &bindings).unwrap();
        assert_eq!(e.to_string(), "rate*E + 5/2");
        assert_eq!(e.symbols().len(), 2);
    }

    #[test]
    fn functions_and_constants() {
        assert_eq!(p("sqrt(2)/2"), "sqrt(2)/2");
        assert_eq!(p("ln(E)"), "log(E)");
        assert_eq!(p("ln(e)"), "log(e)");
        assert_eq!(p("|x - 1|"), "Abs(x - 1)");
        assert_eq!(p("3.14159"), "314159/100000");
    }

    #[test]
    fn reads_scientific_notation() {
        assert_eq!(p("1e5"), "100000");
        assert_eq!(p("2.5e-3"), "1/400");
        assert_eq!(p("4E+2x"), "400*x");
        assert_eq!(p("2e"), "2*e");
        assert_eq!(p("3e-x"), "3*e - x");
    }

    #[test]
    fn reports_malformed_input() {
        let empty = Bindings::new();
        assert!(parse("", &empty).is_err());
        assert!(parse("2 +", &empty).is_err());
        assert!(parse("(x + 1", &empty).is_err());
        assert!(parse("x + 1)", &empty).is_err());
        assert!(parse("sin x", &empty).is_err());
        assert!(parse("x = 1", &empty).is_err());
        let err = parse("2 # 3", &empty).unwrap_err();
        assert_eq!(err.position, 2);
    }
}
