//! Canonical form used by the "difference simplifies to zero" check.
//!
//! An expression is mapped to a quotient of two polynomials with exact
//! rational coefficients. Symbols and constants are indeterminates;
//! anything non-polynomial (`sin(x)`, `sqrt(x)`, `x**y`) becomes an opaque
//! atom keyed by the canonical rendering of its arguments, so `sin(x + 1)`
//! and `sin(1 + x)` are the same atom. Two expressions are equal when the
//! numerator of their difference cancels to zero. Atoms are treated as
//! independent, so the check can miss identities (`sqrt(2)**2 == 2`) but
//! never invents one.

use std::collections::BTreeMap;
use std::fmt;
use std::time::Instant;

use super::expr::{Constant, Expr, Function};
use super::rational::Rational;
use super::MathError;

const MAX_TERMS: usize = 2048;

#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Atom {
    Symbol(String),
    Constant(Constant),
    Opaque(String),
}

impl fmt::Display for Atom {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Atom::Symbol(name) => write!(f, "{}", name),
            Atom::Constant(c) => write!(f, "{}", c.name()),
            Atom::Opaque(text) => write!(f, "{}", text),
        }
    }
}

type Monomial = BTreeMap<Atom, u32>;

fn multiply_monomials(a: &Monomial, b: &Monomial) -> Result<Monomial, MathError> {
    let mut out = a.clone();
    for (atom, exp) in b {
        let entry = out.entry(atom.clone()).or_insert(0);
        *entry = entry.checked_add(*exp).ok_or(MathError::Overflow)?;
    }
    Ok(out)
}

/// Sparse polynomial; zero coefficients are never stored.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Poly {
    terms: BTreeMap<Monomial, Rational>,
}

impl Poly {
    pub fn zero() -> Self {
        Self::default()
    }

    pub fn constant(c: Rational) -> Self {
        let mut terms = BTreeMap::new();
        if !c.is_zero() {
            terms.insert(Monomial::new(), c);
        }
        Self { terms }
    }

    pub fn atom(atom: Atom) -> Self {
        let mut mono = Monomial::new();
        mono.insert(atom, 1);
        let mut terms = BTreeMap::new();
        terms.insert(mono, Rational::ONE);
        Self { terms }
    }

    pub fn is_zero(&self) -> bool {
        self.terms.is_empty()
    }

    pub fn len(&self) -> usize {
        self.terms.len()
    }

    fn has_opaque(&self) -> bool {
        self.terms
            .keys()
            .flat_map(|mono| mono.keys())
            .any(|atom| matches!(atom, Atom::Opaque(_)))
    }

    pub fn as_constant(&self) -> Option<Rational> {
        match self.terms.len() {
            0 => Some(Rational::ZERO),
            1 => self.terms.get(&Monomial::new()).copied(),
            _ => None,
        }
    }

    fn leading_coefficient(&self) -> Option<Rational> {
        self.terms.values().next_back().copied()
    }

    fn accumulate(&mut self, mono: Monomial, coeff: Rational) -> Result<(), MathError> {
        let sum = match self.terms.get(&mono) {
            Some(existing) => existing.checked_add(&coeff)?,
            None => coeff,
        };
        if sum.is_zero() {
            self.terms.remove(&mono);
        } else {
            self.terms.insert(mono, sum);
        }
        Ok(())
    }

    pub fn add(&self, other: &Poly) -> Result<Poly, MathError> {
        let mut out = self.clone();
        for (mono, coeff) in &other.terms {
            out.accumulate(mono.clone(), *coeff)?;
        }
        Ok(out)
    }

    pub fn neg(&self) -> Result<Poly, MathError> {
        self.scale(&Rational::integer(-1))
    }

    pub fn sub(&self, other: &Poly) -> Result<Poly, MathError> {
        self.add(&other.neg()?)
    }

    pub fn scale(&self, factor: &Rational) -> Result<Poly, MathError> {
        if factor.is_zero() {
            return Ok(Poly::zero());
        }
        let mut terms = BTreeMap::new();
        for (mono, coeff) in &self.terms {
            terms.insert(mono.clone(), coeff.checked_mul(factor)?);
        }
        Ok(Poly { terms })
    }

    pub fn mul(&self, other: &Poly) -> Result<Poly, MathError> {
        if self.terms.len().saturating_mul(other.terms.len()) > MAX_TERMS * 8 {
            return Err(MathError::TooComplex);
        }
        let mut out = Poly::zero();
        for (ma, ca) in &self.terms {
            for (mb, cb) in &other.terms {
                out.accumulate(multiply_monomials(ma, mb)?, ca.checked_mul(cb)?)?;
            }
        }
        if out.terms.len() > MAX_TERMS {
            return Err(MathError::TooComplex);
        }
        Ok(out)
    }
}

impl fmt::Display for Poly {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.terms.is_empty() {
            return write!(f, "0");
        }
        for (i, (mono, coeff)) in self.terms.iter().enumerate() {
            if i > 0 {
                write!(f, " + ")?;
            }
            let factors: Vec<String> = mono
                .iter()
                .map(|(atom, exp)| {
                    if *exp == 1 {
                        atom.to_string()
                    } else {
                        format!("{}**{}", atom, exp)
                    }
                })
                .collect();
            if factors.is_empty() {
                write!(f, "{}", coeff)?;
            } else if coeff.is_one() {
                write!(f, "{}", factors.join("*"))?;
            } else {
                write!(f, "{}*{}", coeff, factors.join("*"))?;
            }
        }
        Ok(())
    }
}

/// Quotient of polynomials with a denominator whose leading coefficient is 1.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RationalFunction {
    num: Poly,
    den: Poly,
}

impl RationalFunction {
    pub fn constant(c: Rational) -> Self {
        Self {
            num: Poly::constant(c),
            den: Poly::constant(Rational::ONE),
        }
    }

    pub fn atom(atom: Atom) -> Self {
        Self {
            num: Poly::atom(atom),
            den: Poly::constant(Rational::ONE),
        }
    }

    fn new(num: Poly, den: Poly) -> Result<Self, MathError> {
        if den.is_zero() {
            return Err(MathError::DivisionByZero);
        }
        if num.is_zero() {
            return Ok(Self::constant(Rational::ZERO));
        }
        match den.leading_coefficient() {
            Some(lc) if !lc.is_one() => {
                let inv = lc.recip()?;
                Ok(Self {
                    num: num.scale(&inv)?,
                    den: den.scale(&inv)?,
                })
            }
            _ => Ok(Self { num, den }),
        }
    }

    pub fn numerator(&self) -> &Poly {
        &self.num
    }

    pub fn is_zero(&self) -> bool {
        self.num.is_zero()
    }

    /// Built only from numbers, symbols and `pi`/`E`. Such a form is the zero
    /// function exactly when it is zero here.
    pub fn is_transparent(&self) -> bool {
        !self.num.has_opaque() && !self.den.has_opaque()
    }

    pub fn as_constant(&self) -> Option<Rational> {
        let n = self.num.as_constant()?;
        let d = self.den.as_constant()?;
        n.checked_div(&d).ok()
    }

    pub fn add(&self, other: &Self) -> Result<Self, MathError> {
        if self.den == other.den {
            return Self::new(self.num.add(&other.num)?, self.den.clone());
        }
        let num = self
            .num
            .mul(&other.den)?
            .add(&other.num.mul(&self.den)?)?;
        Self::new(num, self.den.mul(&other.den)?)
    }

    pub fn neg(&self) -> Result<Self, MathError> {
        Ok(Self {
            num: self.num.neg()?,
            den: self.den.clone(),
        })
    }

    pub fn sub(&self, other: &Self) -> Result<Self, MathError> {
        self.add(&other.neg()?)
    }

    pub fn mul(&self, other: &Self) -> Result<Self, MathError> {
        Self::new(self.num.mul(&other.num)?, self.den.mul(&other.den)?)
    }

    pub fn recip(&self) -> Result<Self, MathError> {
        Self::new(self.den.clone(), self.num.clone())
    }

    pub fn div(&self, other: &Self) -> Result<Self, MathError> {
        self.mul(&other.recip()?)
    }

    pub fn powi(&self, exp: i64) -> Result<Self, MathError> {
        let mut base = if exp < 0 { self.recip()? } else { self.clone() };
        let mut remaining = exp.unsigned_abs();
        let mut acc = Self::constant(Rational::ONE);
        while remaining > 0 {
            if remaining & 1 == 1 {
                acc = acc.mul(&base)?;
            }
            remaining >>= 1;
            if remaining > 0 {
                base = base.mul(&base)?;
            }
        }
        Ok(acc)
    }
}

impl fmt::Display for RationalFunction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.den.as_constant().map_or(false, |d| d.is_one()) {
            write!(f, "{}", self.num)
        } else {
            write!(f, "({})/({})", self.num, self.den)
        }
    }
}

/// Outcome of comparing two canonical forms.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Equivalence {
    Equal,
    /// The difference is a nonzero form without opaque atoms.
    Different,
    /// The difference is nonzero but involves opaque atoms, which may hide
    /// an identity such as `sqrt(2)**2 == 2`.
    Undecided,
}

/// Maps expression trees onto [`RationalFunction`]s.
#[derive(Debug, Clone)]
pub struct Canonicalizer {
    max_degree: u32,
    deadline: Option<Instant>,
}

impl Canonicalizer {
    pub fn new(max_degree: u32) -> Self {
        Self {
            max_degree,
            deadline: None,
        }
    }

    /// Same limits, but every step after `deadline` fails with
    /// [`MathError::DeadlineExceeded`].
    pub fn with_deadline(&self, deadline: Instant) -> Self {
        Self {
            max_degree: self.max_degree,
            deadline: Some(deadline),
        }
    }

    pub fn canonical(&self, expr: &Expr) -> Result<RationalFunction, MathError> {
        if self.deadline.is_some_and(|d| Instant::now() >= d) {
            return Err(MathError::DeadlineExceeded);
        }
        match expr {
            Expr::Number(r) => Ok(RationalFunction::constant(*r)),
            Expr::Symbol(name) => Ok(RationalFunction::atom(Atom::Symbol(name.clone()))),
            Expr::Constant(c) => Ok(RationalFunction::atom(Atom::Constant(*c))),
            Expr::Neg(inner) => self.canonical(inner)?.neg(),
            Expr::Add(a, b) => self.canonical(a)?.add(&self.canonical(b)?),
            Expr::Sub(a, b) => self.canonical(a)?.sub(&self.canonical(b)?),
            Expr::Mul(a, b) => self.canonical(a)?.mul(&self.canonical(b)?),
            Expr::Div(a, b) => self.canonical(a)?.div(&self.canonical(b)?),
            Expr::Pow(base, exp) => self.power(base, exp),
            Expr::Call(func, arg) => self.call(*func, arg),
        }
    }

    pub fn compare(&self, a: &Expr, b: &Expr) -> Result<Equivalence, MathError> {
        let difference = self.canonical(a)?.sub(&self.canonical(b)?)?;
        Ok(if difference.is_zero() {
            Equivalence::Equal
        } else if difference.is_transparent() {
            Equivalence::Different
        } else {
            Equivalence::Undecided
        })
    }

    /// True when `a - b` cancels to zero.
    pub fn equivalent(&self, a: &Expr, b: &Expr) -> Result<bool, MathError> {
        Ok(self.compare(a, b)? == Equivalence::Equal)
    }

    fn within_degree(&self, n: i128) -> bool {
        n.unsigned_abs() <= self.max_degree as u128
    }

    fn power(&self, base: &Expr, exp: &Expr) -> Result<RationalFunction, MathError> {
        let e = self.canonical(exp)?;
        let Some(k) = e.as_constant() else {
            if *base == Expr::Constant(Constant::E) {
                return Ok(RationalFunction::atom(Atom::Opaque(format!("exp({})", e))));
            }
            let b = self.canonical(base)?;
            return Ok(RationalFunction::atom(Atom::Opaque(format!("pow({}, {})", b, e))));
        };

        let b = self.canonical(base)?;
        if k.is_integer() {
            if self.within_degree(k.numer()) {
                return b.powi(k.numer() as i64);
            }
            return Ok(RationalFunction::atom(Atom::Opaque(format!("pow({}, {})", b, k))));
        }
        self.root(b, k.numer(), k.denom())
    }

    /// `base ** (p/q)` with `q > 1`.
    fn root(&self, base: RationalFunction, p: i128, q: i128) -> Result<RationalFunction, MathError> {
        let (Ok(q32), true) = (u32::try_from(q), self.within_degree(p)) else {
            return Ok(RationalFunction::atom(Atom::Opaque(format!(
                "pow({}, {}/{})",
                base, p, q
            ))));
        };
        if let Some(root) = base.as_constant().and_then(|c| c.exact_root(q32)) {
            return RationalFunction::constant(root).powi(p as i64);
        }
        let atom = if q32 == 2 {
            Atom::Opaque(format!("sqrt({})", base))
        } else {
            Atom::Opaque(format!("root({}, {})", base, q32))
        };
        RationalFunction::atom(atom).powi(p as i64)
    }

    fn call(&self, func: Function, arg: &Expr) -> Result<RationalFunction, MathError> {
        let a = self.canonical(arg)?;
        let constant = a.as_constant();
        let folded = match (func, constant) {
            (Function::Sqrt, _) => return self.root(a, 1, 2),
            (Function::Abs, Some(c)) => Some(if c.is_negative() { c.checked_neg()? } else { c }),
            (Function::Exp, Some(c)) if c.is_zero() => Some(Rational::ONE),
            (Function::Exp, Some(c)) if c.is_one() => {
                return Ok(RationalFunction::atom(Atom::Constant(Constant::E)))
            }
            (Function::Log, Some(c)) if c.is_one() => Some(Rational::ZERO),
            (Function::Log, None) if a == RationalFunction::atom(Atom::Constant(Constant::E)) => {
                Some(Rational::ONE)
            }
            (Function::Sin | Function::Tan | Function::Asin | Function::Atan, Some(c))
                if c.is_zero() =>
            {
                Some(Rational::ZERO)
            }
            (Function::Cos, Some(c)) if c.is_zero() => Some(Rational::ONE),
            _ => None,
        };
        match folded {
            Some(value) => Ok(RationalFunction::constant(value)),
            None => Ok(RationalFunction::atom(Atom::Opaque(format!(
                "{}({})",
                func.name(),
                a
            )))),
        }
    }
}
