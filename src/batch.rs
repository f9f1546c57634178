//! Multi-line evaluation against one session.
//!
//! Lines run in order against a shared [`Environment`]. A failing line is
//! recorded and skipped; it never stops the lines after it.

use std::fmt::Display;

use serde::{Serialize, Serializer};
use tracing::{debug, info, warn};

use crate::{Environment, Error, ErrorKind, Evaluation, Number, evaluate_statement};

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LineResult {
    pub line: usize,
    pub name: String,
    pub value: Number,
    /// `name = value`
    pub result: String,
    pub postfix: String,
}

impl LineResult {
    fn new(line: usize, evaluation: Evaluation) -> Self {
        LineResult {
            line,
            result: evaluation.to_string(),
            name: evaluation.name,
            value: evaluation.value,
            postfix: evaluation.postfix,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct LineError {
    pub line: usize,
    pub kind: ErrorKind,
    pub message: String,
}

impl LineError {
    fn new(line: usize, error: &Error) -> Self {
        LineError {
            line,
            kind: error.kind(),
            message: error.to_string(),
        }
    }
}

impl Display for LineError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Line {}: {}: {}", self.line, self.kind, self.message)
    }
}

/// Serialized as its `Line <n>: <kind>: <message>` text.
impl Serialize for LineError {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BatchReport {
    /// The batch itself ran; individual lines may still have failed.
    pub success: bool,
    pub results: Vec<LineResult>,
    pub errors: Vec<LineError>,
    pub symbol_table: Environment,
}

impl BatchReport {
    pub fn is_clean(&self) -> bool {
        self.errors.is_empty()
    }
}

/// Evaluate `lines` in order. Line numbers are 1-based and count blank lines,
/// which are skipped.
pub fn evaluate_batch<'a>(
    lines: impl IntoIterator<Item = &'a str>,
    environment: &mut Environment,
) -> BatchReport {
    let mut results = Vec::new();
    let mut errors = Vec::new();

    for (index, text) in lines.into_iter().enumerate() {
        let line = index + 1;
        if text.trim().is_empty() {
            debug!(line, "skipping blank line");
            continue;
        }

        match evaluate_statement(text, environment) {
            Ok(Some(evaluation)) => results.push(LineResult::new(line, evaluation)),
            Ok(None) => debug!(line, "line held no statement"),
            Err(error) => {
                warn!(line, kind = %error.kind(), %error, "statement failed");
                errors.push(LineError::new(line, &error));
            }
        }
    }

    info!(
        evaluated = results.len(),
        failed = errors.len(),
        variables = environment.len(),
        "batch finished"
    );

    BatchReport {
        success: true,
        results,
        errors,
        symbol_table: environment.clone(),
    }
}

/// Split `source` on line breaks and evaluate it as a batch.
pub fn evaluate_source(source: &str, environment: &mut Environment) -> BatchReport {
    evaluate_batch(source.lines(), environment)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn table(entries: &[(&str, Number)]) -> Environment {
        entries.iter().copied().collect()
    }

    #[test]
    fn dependent_lines() {
        let mut env = Environment::new();
        let report = evaluate_batch(["a = 5", "b = a + 3", "c = a * b"], &mut env);

        assert!(report.is_clean());
        let echoed: Vec<&str> = report.results.iter().map(|r| r.result.as_str()).collect();
        assert_eq!(echoed, vec!["a = 5", "b = 8", "c = 40"]);
        assert_eq!(
            report.symbol_table,
            table(&[
                ("a", Number::Int(5)),
                ("b", Number::Int(8)),
                ("c", Number::Int(40))
            ])
        );
        assert_eq!(report.symbol_table, env);
    }

    #[test]
    fn failing_line_is_isolated() {
        let mut env = Environment::new();
        let report = evaluate_batch(["a = 5", "b = a +", "c = a * 2"], &mut env);

        assert_eq!(report.results.len(), 2);
        assert_eq!(report.errors.len(), 1);
        assert_eq!(report.errors[0].line, 2);
        assert_eq!(report.errors[0].kind, ErrorKind::Parse);
        assert!(report.errors[0].to_string().starts_with("Line 2: Parse Error: "));
        assert_eq!(
            env,
            table(&[("a", Number::Int(5)), ("c", Number::Int(10))])
        );
    }

    #[test]
    fn blank_lines_are_skipped_but_counted() {
        let mut env = Environment::new();
        let report = evaluate_batch(["a = 5", "", "   ", "b = a + 1", "c = q"], &mut env);

        assert_eq!(report.results.len(), 2);
        assert_eq!(report.results[1].line, 4);
        assert_eq!(
            report.errors[0].to_string(),
            "Line 5: Name Error: Variable `q` is not defined."
        );
    }

    #[test]
    fn division_by_zero_keeps_earlier_results() {
        let mut env = Environment::new();
        let report = evaluate_source("a = 10\nb = 0\nc = a / b\n", &mut env);

        assert_eq!(report.results.len(), 2);
        assert_eq!(report.errors.len(), 1);
        assert_eq!(
            report.errors[0].to_string(),
            "Line 3: Arithmetic Error: division by zero"
        );
        assert!(!env.contains("c"));
    }

    #[test]
    fn results_carry_postfix() {
        let report = evaluate_batch(["result = (2 + 3) * 4"], &mut Environment::new());
        assert_eq!(report.results[0].postfix, "result 2 3 + 4 * =");
        assert_eq!(report.results[0].value, Number::Int(20));
    }

    #[test]
    fn empty_batch() {
        let report = evaluate_batch(std::iter::empty(), &mut Environment::new());
        assert!(report.results.is_empty());
        assert!(report.is_clean());
        assert!(report.symbol_table.is_empty());
    }
}
