use std::collections::BTreeSet;
use std::fmt;

use super::rational::Rational;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Constant {
    Pi,
    E,
}

impl Constant {
    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "pi" => Some(Constant::Pi),
            "E" => Some(Constant::E),
            _ => None,
        }
    }

    pub fn value(&self) -> f64 {
        match self {
            Constant::Pi => std::f64::consts::PI,
            Constant::E => std::f64::consts::E,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Constant::Pi => "pi",
            Constant::E => "E",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Function {
    Sqrt,
    Abs,
    Exp,
    Log,
    Sin,
    Cos,
    Tan,
    Asin,
    Acos,
    Atan,
}

impl Function {
    pub fn from_name(name: &str) -> Option<Self> {
        let f = match name {
            "sqrt" => Function::Sqrt,
            "abs" | "Abs" => Function::Abs,
            "exp" => Function::Exp,
            "log" | "ln" => Function::Log,
            "sin" => Function::Sin,
            "cos" => Function::Cos,
            "tan" => Function::Tan,
            "asin" | "arcsin" => Function::Asin,
            "acos" | "arccos" => Function::Acos,
            "atan" | "arctan" => Function::Atan,
            _ => return None,
        };
        Some(f)
    }

    pub fn name(&self) -> &'static str {
        match self {
            Function::Sqrt => "sqrt",
            Function::Abs => "Abs",
            Function::Exp => "exp",
            Function::Log => "log",
            Function::Sin => "sin",
            Function::Cos => "cos",
            Function::Tan => "tan",
            Function::Asin => "asin",
            Function::Acos => "acos",
            Function::Atan => "atan",
        }
    }

    pub fn apply(&self, x: f64) -> f64 {
        match self {
            Function::Sqrt => x.sqrt(),
            Function::Abs => x.abs(),
            Function::Exp => x.exp(),
            Function::Log => x.ln(),
            Function::Sin => x.sin(),
            Function::Cos => x.cos(),
            Function::Tan => x.tan(),
            Function::Asin => x.asin(),
            Function::Acos => x.acos(),
            Function::Atan => x.atan(),
        }
    }
}

/// Parsed algebraic expression.
#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    Number(Rational),
    Symbol(String),
    Constant(Constant),
    Neg(Box<Expr>),
    Add(Box<Expr>, Box<Expr>),
    Sub(Box<Expr>, Box<Expr>),
    Mul(Box<Expr>, Box<Expr>),
    Div(Box<Expr>, Box<Expr>),
    Pow(Box<Expr>, Box<Expr>),
    Call(Function, Box<Expr>),
}

impl Expr {
    pub fn symbol(name: impl Into<String>) -> Self {
        Expr::Symbol(name.into())
    }

    pub fn int(value: i128) -> Self {
        Expr::Number(Rational::integer(value))
    }

    pub fn sub(lhs: Expr, rhs: Expr) -> Self {
        Expr::Sub(Box::new(lhs), Box::new(rhs))
    }

    pub fn mul(lhs: Expr, rhs: Expr) -> Self {
        Expr::Mul(Box::new(lhs), Box::new(rhs))
    }

    /// Names of the free symbols, sorted.
    pub fn symbols(&self) -> BTreeSet<String> {
        let mut out = BTreeSet::new();
        self.collect_symbols(&mut out);
        out
    }

    fn collect_symbols(&self, out: &mut BTreeSet<String>) {
        match self {
            Expr::Symbol(name) => {
                out.insert(name.clone());
            }
            Expr::Number(_) | Expr::Constant(_) => {}
            Expr::Neg(inner) | Expr::Call(_, inner) => inner.collect_symbols(out),
            Expr::Add(a, b)
            | Expr::Sub(a, b)
            | Expr::Mul(a, b)
            | Expr::Div(a, b)
            | Expr::Pow(a, b) => {
                a.collect_symbols(out);
                b.collect_symbols(out);
            }
        }
    }

    fn precedence(&self) -> u8 {
        match self {
            Expr::Add(..) | Expr::Sub(..) => 1,
            Expr::Mul(..) | Expr::Div(..) => 2,
            Expr::Neg(_) => 3,
            Expr::Pow(..) => 4,
            Expr::Number(r) if r.is_negative() => 3,
            Expr::Number(r) if !r.is_integer() => 2,
            _ => 5,
        }
    }

    fn fmt_operand(&self, f: &mut fmt::Formatter<'_>, parens: bool) -> fmt::Result {
        if parens {
            write!(f, "({})", self)
        } else {
            write!(f, "{}", self)
        }
    }
}

impl fmt::Display for Expr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Expr::Number(r) => write!(f, "{}", r),
            Expr::Symbol(name) => write!(f, "{}", name),
            Expr::Constant(c) => write!(f, "{}", c.name()),
            Expr::Neg(inner) => {
                write!(f, "-")?;
                let p = inner.precedence();
                inner.fmt_operand(f, p <= 1 || p == 3)
            }
            Expr::Add(a, b) => {
                a.fmt_operand(f, false)?;
                write!(f, " + ")?;
                b.fmt_operand(f, b.precedence() <= 1)
            }
            Expr::Sub(a, b) => {
                a.fmt_operand(f, false)?;
                write!(f, " - ")?;
                b.fmt_operand(f, b.precedence() <= 1)
            }
            Expr::Mul(a, b) => {
                a.fmt_operand(f, a.precedence() <= 1)?;
                write!(f, "*")?;
                b.fmt_operand(f, b.precedence() <= 1)
            }
            Expr::Div(a, b) => {
                a.fmt_operand(f, a.precedence() <= 1)?;
                write!(f, "/")?;
                b.fmt_operand(f, b.precedence() <= 2)
            }
            Expr::Pow(base, exp) => {
                base.fmt_operand(f, base.precedence() <= 4)?;
                write!(f, "**")?;
                exp.fmt_operand(f, exp.precedence() <= 4)
            }
            Expr::Call(func, arg) => write!(f, "{}({})", func.name(), arg),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_parenthesizes_by_precedence() {
        let sum = Expr::Add(Box::new(Expr::symbol("x")), Box::new(Expr::int(1)));
        let product = Expr::mul(Expr::int(2), sum.clone());
        assert_eq!(product.to_string(), "2*(x + 1)");

        let power = Expr::Pow(Box::new(sum), Box::new(Expr::int(2)));
        assert_eq!(power.to_string(), "(x + 1)**2");

        let nested = Expr::sub(Expr::symbol("a"), Expr::sub(Expr::symbol("b"), Expr::symbol("c")));
        assert_eq!(nested.to_string(), "a - (b - c)");
    }

    #[test]
    fn collects_sorted_symbols() {
        let e = Expr::mul(Expr::symbol("y"), Expr::Call(Function::Sin, Box::new(Expr::symbol("x"))));
        let names: Vec<_> = e.symbols().into_iter().collect();
        assert_eq!(names, vec!["x".to_string(), "y".to_string()]);
    }
}
