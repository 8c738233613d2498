use std::cmp::Ordering;
use std::fmt;

use num_integer::Integer;
use rust_decimal::Decimal;

use super::MathError;

/// Exact rational number kept in lowest terms with a positive denominator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Rational {
    num: i128,
    den: i128,
}

impl Rational {
    pub const ZERO: Rational = Rational { num: 0, den: 1 };
    pub const ONE: Rational = Rational { num: 1, den: 1 };

    pub fn new(num: i128, den: i128) -> Result<Self, MathError> {
        if den == 0 {
            return Err(MathError::DivisionByZero);
        }
        let g = num.gcd(&den);
        let (mut num, mut den) = if g == 0 { (0, 1) } else { (num / g, den / g) };
        if den < 0 {
            num = num.checked_neg().ok_or(MathError::Overflow)?;
            den = den.checked_neg().ok_or(MathError::Overflow)?;
        }
        Ok(Self { num, den })
    }

    pub fn integer(value: i128) -> Self {
        Self { num: value, den: 1 }
    }

    pub fn from_decimal(value: Decimal) -> Result<Self, MathError> {
        let scale = value.scale();
        let den = 10i128
            .checked_pow(scale)
            .ok_or(MathError::Overflow)?;
        Self::new(value.mantissa(), den)
    }

    /// Exact conversion of a finite float through its shortest decimal form.
    pub fn from_f64(value: f64) -> Result<Self, MathError> {
        if !value.is_finite() {
            return Err(MathError::NotFinite);
        }
        let decimal = Decimal::try_from(value).map_err(|_| MathError::Overflow)?;
        Self::from_decimal(decimal.normalize())
    }

    pub fn numer(&self) -> i128 {
        self.num
    }

    pub fn denom(&self) -> i128 {
        self.den
    }

    pub fn is_zero(&self) -> bool {
        self.num == 0
    }

    pub fn is_one(&self) -> bool {
        self.num == 1 && self.den == 1
    }

    pub fn is_integer(&self) -> bool {
        self.den == 1
    }

    pub fn is_negative(&self) -> bool {
        self.num < 0
    }

    pub fn to_f64(&self) -> f64 {
        self.num as f64 / self.den as f64
    }

    pub fn checked_add(&self, other: &Rational) -> Result<Rational, MathError> {
        let g = self.den.gcd(&other.den);
        let lcm = (self.den / g)
            .checked_mul(other.den)
            .ok_or(MathError::Overflow)?;
        let left = self
            .num
            .checked_mul(lcm / self.den)
            .ok_or(MathError::Overflow)?;
        let right = other
            .num
            .checked_mul(lcm / other.den)
            .ok_or(MathError::Overflow)?;
        Rational::new(left.checked_add(right).ok_or(MathError::Overflow)?, lcm)
    }

    pub fn checked_neg(&self) -> Result<Rational, MathError> {
        Ok(Rational {
            num: self.num.checked_neg().ok_or(MathError::Overflow)?,
            den: self.den,
        })
    }

    pub fn checked_sub(&self, other: &Rational) -> Result<Rational, MathError> {
        self.checked_add(&other.checked_neg()?)
    }

    pub fn checked_mul(&self, other: &Rational) -> Result<Rational, MathError> {
        // Cross-reduce first to keep intermediates small.
        let g1 = self.num.gcd(&other.den).max(1);
        let g2 = other.num.gcd(&self.den).max(1);
        let num = (self.num / g1)
            .checked_mul(other.num / g2)
            .ok_or(MathError::Overflow)?;
        let den = (self.den / g2)
            .checked_mul(other.den / g1)
            .ok_or(MathError::Overflow)?;
        Rational::new(num, den)
    }

    pub fn recip(&self) -> Result<Rational, MathError> {
        Rational::new(self.den, self.num)
    }

    pub fn checked_div(&self, other: &Rational) -> Result<Rational, MathError> {
        self.checked_mul(&other.recip()?)
    }

    pub fn checked_pow(&self, exp: i64) -> Result<Rational, MathError> {
        let base = if exp < 0 { self.recip()? } else { *self };
        let e = u32::try_from(exp.unsigned_abs()).map_err(|_| MathError::Overflow)?;
        Ok(Rational {
            num: base.num.checked_pow(e).ok_or(MathError::Overflow)?,
            den: base.den.checked_pow(e).ok_or(MathError::Overflow)?,
        })
    }

    /// Exact `root`-th root when both numerator and denominator are perfect powers.
    pub fn exact_root(&self, root: u32) -> Option<Rational> {
        if root == 0 || (self.num < 0 && root % 2 == 0) {
            return None;
        }
        let num = integer_root(self.num.checked_abs()?, root)?;
        let den = integer_root(self.den, root)?;
        let num = if self.num < 0 { -num } else { num };
        Some(Rational { num, den })
    }
}

fn integer_root(value: i128, root: u32) -> Option<i128> {
    if value < 2 {
        return Some(value);
    }
    let guess = (value as f64).powf(1.0 / root as f64).round() as i128;
    (guess.saturating_sub(1)..=guess + 1).find(|c| *c >= 0 && c.checked_pow(root) == Some(value))
}

impl PartialOrd for Rational {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Rational {
    fn cmp(&self, other: &Self) -> Ordering {
        match (
            self.num.checked_mul(other.den),
            other.num.checked_mul(self.den),
        ) {
            (Some(a), Some(b)) => a.cmp(&b),
            _ => self
                .to_f64()
                .partial_cmp(&other.to_f64())
                .unwrap_or(Ordering::Equal),
        }
    }
}

impl fmt::Display for Rational {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.den == 1 {
            write!(f, "{}", self.num)
        } else {
            write!(f, "{}/{}", self.num, self.den)
        }
    }
}
