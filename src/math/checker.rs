use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;
use std::time::Instant;

use serde::ser::SerializeStruct;
use serde::{Deserialize, Serialize, Serializer};

use super::expr::Expr;
use super::normalize::normalize;
use super::numeric::{evaluate, sampled_equal};
use super::parser::parse;
use super::poly::{Canonicalizer, Equivalence};
use super::Bindings;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProblemKind {
    Expression,
    Equation,
    Numeric,
}

impl ProblemKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ProblemKind::Expression => "expression",
            ProblemKind::Equation => "equation",
            ProblemKind::Numeric => "numeric",
        }
    }
}

impl fmt::Display for ProblemKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ProblemKind {
    type Err = CheckError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "expression" => Ok(ProblemKind::Expression),
            "equation" => Ok(ProblemKind::Equation),
            "numeric" => Ok(ProblemKind::Numeric),
            other => Err(CheckError::InvalidProblemType(other.to_string())),
        }
    }
}

/// Expected failures of a check. They describe the submission, not the
/// service, and travel inside the [`Verdict`].
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum CheckError {
    #[error("Equation must contain exactly one = sign (found {found})")]
    MalformedEquation { found: usize },

    #[error("Numeric evaluation error: {0}")]
    NumericEvaluation(String),

    #[error("Invalid problem type: {0}")]
    InvalidProblemType(String),

    #[error("Could not parse answer: {0}")]
    Parse(String),

    #[error("Missing required fields")]
    MissingAnswer,
}

impl CheckError {
    pub fn kind(&self) -> &'static str {
        match self {
            CheckError::MalformedEquation { .. } => "MalformedEquation",
            CheckError::NumericEvaluation(_) => "NumericEvaluationError",
            CheckError::InvalidProblemType(_) => "InvalidProblemType",
            CheckError::Parse(_) => "ParseError",
            CheckError::MissingAnswer => "MissingAnswer",
        }
    }
}

impl Serialize for CheckError {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut state = serializer.serialize_struct("CheckError", 2)?;
        state.serialize_field("type", self.kind())?;
        state.serialize_field("message", &self.to_string())?;
        state.end()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Submission {
    pub raw_user_answer: String,
    pub raw_reference_answer: String,
    pub kind: ProblemKind,
    #[serde(default)]
    pub variable_bindings: Bindings,
    #[serde(default)]
    pub tolerance: Option<f64>,
}

/// Which equality checks held for an expression or equation comparison.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct EqualityChecks {
    /// `user - reference` reduced to zero in canonical form.
    pub simplified_difference: bool,
    /// Both sides agreed at every sampled point.
    pub sampled: bool,
    /// Display forms matched verbatim.
    pub string_form: bool,
    /// The canonical difference had no opaque atoms, so simplification alone
    /// settles the comparison.
    #[serde(default)]
    pub exact: bool,
    /// Simplification and sampling reached different conclusions.
    pub disagreement: bool,
}

impl EqualityChecks {
    /// An exact canonical comparison is final; otherwise any passing check
    /// is enough.
    pub fn passed(&self) -> bool {
        if self.exact {
            return self.simplified_difference;
        }
        self.simplified_difference || self.sampled || self.string_form
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Verdict {
    pub is_correct: bool,
    pub kind: Option<ProblemKind>,
    pub normalized_user_answer: String,
    pub normalized_reference_answer: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub symbolic_forms: Option<(String, String)>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub checks: Option<EqualityChecks>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<CheckError>,
}

impl Verdict {
    fn failed(
        kind: Option<ProblemKind>,
        user: String,
        reference: String,
        error: CheckError,
    ) -> Self {
        Self {
            is_correct: false,
            kind,
            normalized_user_answer: user,
            normalized_reference_answer: reference,
            symbolic_forms: None,
            checks: None,
            error: Some(error),
        }
    }
}

#[derive(Debug, Clone)]
pub struct CheckerConfig {
    pub default_tolerance: f64,
    pub max_expansion_degree: u32,
    pub sample_points: usize,
    pub sample_seed: u64,
}

impl Default for CheckerConfig {
    fn default() -> Self {
        Self {
            default_tolerance: 0.01,
            max_expansion_degree: 64,
            sample_points: 16,
            sample_seed: 0x5eed,
        }
    }
}

/// Decides whether a submitted answer matches a reference answer.
///
/// Holds only configuration; every call owns its parse state, so one
/// checker can serve concurrent requests.
#[derive(Debug, Clone)]
pub struct EquivalenceChecker {
    config: CheckerConfig,
    canonicalizer: Canonicalizer,
}

impl Default for EquivalenceChecker {
    fn default() -> Self {
        Self::new(CheckerConfig::default())
    }
}

impl EquivalenceChecker {
    pub fn new(config: CheckerConfig) -> Self {
        let canonicalizer = Canonicalizer::new(config.max_expansion_degree);
        Self {
            config,
            canonicalizer,
        }
    }

    pub fn config(&self) -> &CheckerConfig {
        &self.config
    }

    /// Checks an answer whose problem kind arrives as text.
    pub fn check(
        &self,
        user_answer: &str,
        reference_answer: &str,
        kind: &str,
        bindings: &Bindings,
        tolerance: Option<f64>,
    ) -> Verdict {
        self.check_with(
            &self.canonicalizer,
            user_answer,
            reference_answer,
            kind,
            bindings,
            tolerance,
        )
    }

    /// Like [`check`](Self::check), but symbolic work stops at `deadline` and
    /// the comparison falls back to sampling.
    pub fn check_until(
        &self,
        user_answer: &str,
        reference_answer: &str,
        kind: &str,
        bindings: &Bindings,
        tolerance: Option<f64>,
        deadline: Instant,
    ) -> Verdict {
        self.check_with(
            &self.canonicalizer.with_deadline(deadline),
            user_answer,
            reference_answer,
            kind,
            bindings,
            tolerance,
        )
    }

    fn check_with(
        &self,
        canonicalizer: &Canonicalizer,
        user_answer: &str,
        reference_answer: &str,
        kind: &str,
        bindings: &Bindings,
        tolerance: Option<f64>,
    ) -> Verdict {
        match kind.parse::<ProblemKind>() {
            Ok(kind) => self.evaluate_with(canonicalizer, &Submission {
                raw_user_answer: user_answer.to_string(),
                raw_reference_answer: reference_answer.to_string(),
                kind,
                variable_bindings: bindings.clone(),
                tolerance,
            }),
            Err(error) => Verdict::failed(
                None,
                normalize(user_answer),
                normalize(reference_answer),
                error,
            ),
        }
    }

    pub fn evaluate(&self, submission: &Submission) -> Verdict {
        self.evaluate_with(&self.canonicalizer, submission)
    }

    fn evaluate_with(&self, canonicalizer: &Canonicalizer, submission: &Submission) -> Verdict {
        let user = normalize(&submission.raw_user_answer);
        let reference = normalize(&submission.raw_reference_answer);
        let kind = submission.kind;
        let bindings = &submission.variable_bindings;

        if user.is_empty() || reference.is_empty() {
            return Verdict::failed(Some(kind), user, reference, CheckError::MissingAnswer);
        }

        let outcome = match kind {
            ProblemKind::Expression => {
                self.compare_expressions(canonicalizer, &user, &reference, bindings)
            }
            ProblemKind::Equation => {
                self.compare_equations(canonicalizer, &user, &reference, bindings)
            }
            ProblemKind::Numeric => self
                .compare_numeric(&user, &reference, bindings, submission.tolerance)
                .map(|correct| Comparison {
                    correct,
                    checks: None,
                    symbolic_forms: None,
                }),
        };

        match outcome {
            Ok(comparison) => {
                tracing::debug!(
                    kind = %kind,
                    correct = comparison.correct,
                    "answer checked"
                );
                Verdict {
                    is_correct: comparison.correct,
                    kind: Some(kind),
                    normalized_user_answer: user,
                    normalized_reference_answer: reference,
                    symbolic_forms: comparison.symbolic_forms,
                    checks: comparison.checks,
                    error: None,
                }
            }
            Err(error) => {
                tracing::debug!(kind = %kind, error = %error, "answer rejected");
                Verdict::failed(Some(kind), user, reference, error)
            }
        }
    }

    fn compare_expressions(
        &self,
        canonicalizer: &Canonicalizer,
        user: &str,
        reference: &str,
        bindings: &Bindings,
    ) -> Result<Comparison, CheckError> {
        let user_expr = parse_answer(user, bindings)?;
        let reference_expr = parse_answer(reference, bindings)?;

        let user_form = user_expr.to_string();
        let reference_form = reference_expr.to_string();
        let checks = self.equality_checks(
            canonicalizer,
            &user_expr,
            &reference_expr,
            &user_form,
            &reference_form,
        );

        let symbolic_forms = (user_form != user || reference_form != reference)
            .then(|| (user_form, reference_form));
        Ok(Comparison {
            correct: checks.passed(),
            checks: Some(checks),
            symbolic_forms,
        })
    }

    /// `a = b` matches `c = d` when `a - b` matches `c - d` or `d - c`.
    fn compare_equations(
        &self,
        canonicalizer: &Canonicalizer,
        user: &str,
        reference: &str,
        bindings: &Bindings,
    ) -> Result<Comparison, CheckError> {
        let (user_lhs, user_rhs) = parse_equation(user, bindings)?;
        let (reference_lhs, reference_rhs) = parse_equation(reference, bindings)?;

        let user_form = format!("{} = {}", user_lhs, user_rhs);
        let reference_form = format!("{} = {}", reference_lhs, reference_rhs);

        let user_expr = Expr::sub(user_lhs, user_rhs);
        let user_text = user_expr.to_string();
        let same_sides = Expr::sub(reference_lhs.clone(), reference_rhs.clone());
        let mut checks = self.equality_checks(
            canonicalizer,
            &user_expr,
            &same_sides,
            &user_text,
            &same_sides.to_string(),
        );
        if !checks.passed() {
            let swapped_sides = Expr::sub(reference_rhs, reference_lhs);
            let swapped = self.equality_checks(
                canonicalizer,
                &user_expr,
                &swapped_sides,
                &user_text,
                &swapped_sides.to_string(),
            );
            if swapped.passed() {
                checks = swapped;
            }
        }

        let symbolic_forms = (user_form != user || reference_form != reference)
            .then(|| (user_form, reference_form));
        Ok(Comparison {
            correct: checks.passed(),
            checks: Some(checks),
            symbolic_forms,
        })
    }

    fn compare_numeric(
        &self,
        user: &str,
        reference: &str,
        bindings: &Bindings,
        tolerance: Option<f64>,
    ) -> Result<bool, CheckError> {
        let tolerance = tolerance.unwrap_or(self.config.default_tolerance);
        if !tolerance.is_finite() || tolerance < 0.0 {
            return Err(CheckError::NumericEvaluation(format!(
                "tolerance must be a non-negative number, got {}",
                tolerance
            )));
        }
        let user_value = numeric_value(user, bindings)?;
        let reference_value = numeric_value(reference, bindings)?;
        Ok((user_value - reference_value).abs() <= tolerance)
    }

    /// Runs every equality check independently. See [`EqualityChecks::passed`]
    /// for how they combine.
    fn equality_checks(
        &self,
        canonicalizer: &Canonicalizer,
        user: &Expr,
        reference: &Expr,
        user_form: &str,
        reference_form: &str,
    ) -> EqualityChecks {
        let outcome = match canonicalizer.compare(user, reference) {
            Ok(outcome) => Some(outcome),
            Err(e) => {
                tracing::debug!(error = %e, "canonical comparison not available");
                None
            }
        };
        let simplified = outcome.map(|o| o == Equivalence::Equal);
        let sampled = sampled_equal(
            user,
            reference,
            self.config.sample_points,
            self.config.sample_seed,
        );
        let disagreement = simplified.is_some_and(|s| s != sampled);
        if disagreement {
            tracing::warn!(
                user = %user_form,
                reference = %reference_form,
                simplified = ?simplified,
                sampled,
                "equality checks disagree"
            );
        }
        EqualityChecks {
            simplified_difference: simplified.unwrap_or(false),
            sampled,
            string_form: user_form == reference_form,
            exact: matches!(outcome, Some(Equivalence::Equal | Equivalence::Different)),
            disagreement,
        }
    }
}

struct Comparison {
    correct: bool,
    checks: Option<EqualityChecks>,
    symbolic_forms: Option<(String, String)>,
}

fn parse_answer(text: &str, bindings: &Bindings) -> Result<Expr, CheckError> {
    parse(text, bindings).map_err(|e| CheckError::Parse(e.to_string()))
}

fn parse_equation(text: &str, bindings: &Bindings) -> Result<(Expr, Expr), CheckError> {
    let found = text.matches('=').count();
    let Some((lhs, rhs)) = text.split_once('=').filter(|_| found == 1) else {
        return Err(CheckError::MalformedEquation { found });
    };
    Ok((parse_answer(lhs, bindings)?, parse_answer(rhs, bindings)?))
}

fn numeric_value(text: &str, bindings: &Bindings) -> Result<f64, CheckError> {
    let expr = parse_answer(text, bindings)?;
    evaluate(&expr, &HashMap::new())
        .map_err(|e| CheckError::NumericEvaluation(format!("`{}`: {}", text, e)))
}
