use std::sync::OnceLock;

use regex::{Captures, Regex};

struct Patterns {
    frac: Regex,
    sqrt: Regex,
    times: Regex,
    div: Regex,
    delimiters: Regex,
    pi: Regex,
    coefficient: Regex,
    whitespace: Regex,
}

fn patterns() -> &'static Patterns {
    static PATTERNS: OnceLock<Patterns> = OnceLock::new();
    PATTERNS.get_or_init(|| Patterns {
        frac: Regex::new(r"\\[dt]?frac\s*\{([^{}]*)\}\s*\{([^{}]*)\}").unwrap(),
        sqrt: Regex::new(r"\\sqrt\s*\{([^{}]*)\}").unwrap(),
        times: Regex::new(r"\\(?:cdot|times)").unwrap(),
        div: Regex::new(r"\\div").unwrap(),
        delimiters: Regex::new(r"\\(?:left|right)").unwrap(),
        pi: Regex::new(r"\\pi").unwrap(),
        // The first branch matches scientific literals so they are kept whole.
        coefficient: Regex::new(
            r"\b(\d+(?:\.\d+)?[eE][+-]?\d+)|\b(\d+(?:\.\d+)?)\s*([A-Za-z])",
        )
        .unwrap(),
        whitespace: Regex::new(r"\s+").unwrap(),
    })
}

/// Rewrites common alternate math notations into the syntax understood by
/// [`parse`](super::parse). Unknown notation is passed through untouched.
///
/// `normalize(&normalize(s)) == normalize(s)` holds for every input.
pub fn normalize(raw: &str) -> String {
    let p = patterns();

    let mut text = String::with_capacity(raw.len());
    for c in raw.chars() {
        match c {
            '×' | '·' | '⋅' | '∗' => text.push('*'),
            '÷' | '∕' => text.push('/'),
            '−' | '–' => text.push('-'),
            'π' => text.push_str("pi"),
            '^' => text.push_str("**"),
            other => text.push(other),
        }
    }

    // Every LaTeX rewrite shortens the text, so this reaches a fixpoint.
    loop {
        let next = rewrite_latex(p, &text);
        if next == text {
            break;
        }
        text = next;
    }
    let text = text.replace('{', "(").replace('}', ")");

    let text = p.coefficient.replace_all(&text, |caps: &Captures| match caps.get(1) {
        Some(literal) => literal.as_str().to_string(),
        None => format!("{}*{}", &caps[2], &caps[3]),
    });
    let text = p.whitespace.replace_all(&text, " ");
    text.trim().to_string()
}

fn rewrite_latex(p: &Patterns, text: &str) -> String {
    let text = p.frac.replace_all(text, "($1)/($2)");
    let text = p.sqrt.replace_all(&text, "sqrt($1)");
    let text = p.times.replace_all(&text, "*");
    let text = p.div.replace_all(&text, "/");
    let text = p.delimiters.replace_all(&text, "");
    p.pi.replace_all(&text, "pi").into_owned()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rewrites_glyphs_and_caret() {
        assert_eq!(normalize("x^2 × 3 ÷ y"), "x**2 * 3 / y");
        assert_eq!(normalize("5 − 2"), "5 - 2");
    }

    #[test]
    fn makes_coefficients_explicit() {
        assert_eq!(normalize("2x+2"), "2*x+2");
        assert_eq!(normalize("3 y"), "3*y");
        assert_eq!(normalize("1.5t"), "1.5*t");
        assert_eq!(normalize("2π"), "2*pi");
        // digits glued to a name are part of the name
        assert_eq!(normalize("x2y"), "x2y");
    }

    #[test]
    fn rewrites_latex_macros() {
        assert_eq!(normalize(r"\frac{1}{2}"), "(1)/(2)");
        assert_eq!(normalize(r"\sqrt{x+1}"), "sqrt(x+1)");
        assert_eq!(normalize(r"\frac{\frac{a}{b}}{c}"), "((a)/(b))/(c)");
        assert_eq!(normalize(r"2 \cdot \pi"), "2 * pi");
        assert_eq!(normalize(r"\left( x \right)"), "( x )");
        assert_eq!(normalize("x^{2}"), "x**(2)");
    }

    #[test]
    fn collapses_whitespace() {
        assert_eq!(normalize("  x   +\t1 \n"), "x + 1");
    }

    #[test]
    fn passes_unknown_notation_through() {
        assert_eq!(normalize(r"\weird{x}"), r"\weird(x)");
        assert_eq!(normalize("x @ y"), "x @ y");
    }

    #[test]
    fn is_idempotent() {
        let samples = [
            "2x+2",
            "x^2 + 3x = 5",
            r"\frac{\sqrt{2}}{2}",
            r"\frac{1}{\frac{1}{x}}",
            "3 ÷ 4 × 2π",
            "  a   b  ",
            "x^^2",
            "1.5 t − 2.25u",
            r"\left(\frac{a}{b}\right)^{2}",
            "",
            "{}{",
            r"\π",
            "1e5 + 2.5E-3x",
            "2 e5",
        ];
        for s in samples {
            let once = normalize(s);
            assert_eq!(normalize(&once), once, "not idempotent for {:?}", s);
        }
    }

    #[test]
    fn latex_rewrites_run_to_a_fixpoint() {
        let nested = format!("{}\\left{}", r"\l".repeat(33), "eft".repeat(33));
        let once = normalize(&nested);
        assert_eq!(once, "");
        assert_eq!(normalize(&once), once);
        assert_eq!(normalize(r"\π"), "pi");
    }

    #[test]
    fn keeps_scientific_literals_whole() {
        assert_eq!(normalize("1e5"), "1e5");
        assert_eq!(normalize("2.5e-3"), "2.5e-3");
        assert_eq!(normalize("3E+2 y"), "3E+2 y");
        assert_eq!(normalize("2e"), "2*e");
        assert_eq!(normalize("2 e5"), "2*e5");
    }
}
