//! Symbolic answer checking.
//!
//! Text goes through [`normalize`] first, is parsed into an [`Expr`] tree and
//! then compared either exactly (canonical rational-function form) or
//! numerically (sampled evaluation).

pub mod checker;
pub mod expr;
pub mod normalize;
pub mod numeric;
pub mod parser;
pub mod poly;
pub mod rational;
pub mod steps;

use std::collections::HashMap;

pub use checker::{
    CheckError, CheckerConfig, EqualityChecks, EquivalenceChecker, ProblemKind, Submission,
    Verdict,
};
pub use expr::{Constant, Expr, Function};
pub use normalize::normalize;
pub use parser::{parse, ParseError};
pub use rational::Rational;

/// Variable name to optional value. A `None` value declares a free symbol.
pub type Bindings = HashMap<String, Option<f64>>;

/// Failures inside the symbolic and numeric layers. These never reach the
/// caller directly; the checker folds them into a verdict.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum MathError {
    #[error("coefficient overflow")]
    Overflow,

    #[error("division by zero")]
    DivisionByZero,

    #[error("result is not a finite real number")]
    NotFinite,

    #[error("symbol `{0}` has no value")]
    Unbound(String),

    #[error("expression too complex to expand")]
    TooComplex,

    #[error("time budget exhausted")]
    DeadlineExceeded,
}
