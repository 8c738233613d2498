use std::collections::HashMap;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use super::expr::Expr;
use super::MathError;

const RELATIVE_EPSILON: f64 = 1e-9;
const MIN_VALID_SAMPLES: usize = 3;

/// Evaluates `expr` to a finite real number. Every free symbol must have a
/// value in `env`.
pub fn evaluate(expr: &Expr, env: &HashMap<String, f64>) -> Result<f64, MathError> {
    let value = eval(expr, env)?;
    if value.is_finite() {
        Ok(value)
    } else {
        Err(MathError::NotFinite)
    }
}

fn eval(expr: &Expr, env: &HashMap<String, f64>) -> Result<f64, MathError> {
    let value = match expr {
        Expr::Number(r) => r.to_f64(),
        Expr::Symbol(name) => *env
            .get(name)
            .ok_or_else(|| MathError::Unbound(name.clone()))?,
        Expr::Constant(c) => c.value(),
        Expr::Neg(inner) => -eval(inner, env)?,
        Expr::Add(a, b) => eval(a, env)? + eval(b, env)?,
        Expr::Sub(a, b) => eval(a, env)? - eval(b, env)?,
        Expr::Mul(a, b) => eval(a, env)? * eval(b, env)?,
        Expr::Div(a, b) => {
            let divisor = eval(b, env)?;
            if divisor == 0.0 {
                return Err(MathError::DivisionByZero);
            }
            eval(a, env)? / divisor
        }
        Expr::Pow(base, exp) => eval(base, env)?.powf(eval(exp, env)?),
        Expr::Call(func, arg) => func.apply(eval(arg, env)?),
    };
    Ok(value)
}

pub fn approx_eq(a: f64, b: f64) -> bool {
    let scale = 1f64.max(a.abs()).max(b.abs());
    (a - b).abs() <= RELATIVE_EPSILON * scale
}

/// Compares two expressions by evaluating them at seeded random points.
///
/// Points where either side is undefined are skipped; any defined point
/// where the values differ fails the comparison. At least three defined
/// points are needed when the expressions have free symbols.
pub fn sampled_equal(a: &Expr, b: &Expr, samples: usize, seed: u64) -> bool {
    let mut symbols = a.symbols();
    symbols.extend(b.symbols());

    if symbols.is_empty() {
        let env = HashMap::new();
        return match (evaluate(a, &env), evaluate(b, &env)) {
            (Ok(x), Ok(y)) => approx_eq(x, y),
            _ => false,
        };
    }

    let mut rng = StdRng::seed_from_u64(seed);
    let mut valid = 0usize;
    for _ in 0..samples {
        let env: HashMap<String, f64> = symbols
            .iter()
            .map(|name| {
                let magnitude: f64 = rng.gen_range(0.1..3.0);
                let value = if rng.gen_bool(0.5) { magnitude } else { -magnitude };
                (name.clone(), value)
            })
            .collect();
        match (evaluate(a, &env), evaluate(b, &env)) {
            (Ok(x), Ok(y)) => {
                if !approx_eq(x, y) {
                    return false;
                }
                valid += 1;
            }
            _ => continue,
        }
    }
    valid >= MIN_VALID_SAMPLES.min(samples)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::math::{parse, Bindings};

    fn expr(s: &str) -> Expr {
        parse(s, &Bindings::new()).unwrap()
    }

    #[test]
    fn evaluates_constants_and_functions() {
        let env = HashMap::new();
        let v = evaluate(&expr("2*pi"), &env).unwrap();
        assert!((v - std::f64::consts::TAU).abs() < 1e-12);
        assert_eq!(evaluate(&expr("sqrt(16) + 2**3"), &env).unwrap(), 12.0);
    }

    #[test]
    fn reports_unbound_and_undefined() {
        let env = HashMap::new();
        assert_eq!(
            evaluate(&expr("x + 1"), &env),
            Err(MathError::Unbound("x".to_string()))
        );
        assert_eq!(evaluate(&expr("1/0"), &env), Err(MathError::DivisionByZero));
        assert_eq!(evaluate(&expr("sqrt(-1)"), &env), Err(MathError::NotFinite));
    }

    #[test]
    fn sampling_matches_identities() {
        assert!(sampled_equal(&expr("sin(x)**2 + cos(x)**2"), &expr("1"), 16, 7));
        assert!(sampled_equal(&expr("sqrt(x)**2"), &expr("x"), 16, 7));
        assert!(!sampled_equal(&expr("abs(x)"), &expr("x"), 16, 7));
        assert!(!sampled_equal(&expr("x + y"), &expr("x - y"), 16, 7));
    }

    #[test]
    fn sampling_is_deterministic_for_a_seed() {
        let a = expr("x**2");
        let b = expr("x*x");
        assert_eq!(sampled_equal(&a, &b, 8, 42), sampled_equal(&a, &b, 8, 42));
    }
}
