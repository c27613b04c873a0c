//! The immutable outcome of one harness run or bound attempt.

use serde::Serialize;

use crate::classify::{classify_source, Verdict};
use crate::diagnostics::ReportSource;
use crate::model::{self, ModelVariable};
use crate::taxonomy::{Property, ResultCause, ResultClass, VerificationResult};

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AnalysisResult {
    result: VerificationResult,
    cause: ResultCause,
    cause_message: String,
    model: Vec<ModelVariable>,
}

impl AnalysisResult {
    pub fn new(
        result: VerificationResult,
        cause: ResultCause,
        cause_message: impl Into<String>,
        model: Vec<ModelVariable>,
    ) -> Self {
        Self {
            result,
            cause,
            cause_message: cause_message.into(),
            model,
        }
    }

    pub fn from_verdict(verdict: Verdict, model: Vec<ModelVariable>) -> Self {
        Self::new(verdict.result, verdict.cause, verdict.message, model)
    }

    /// Classify a stream; the model is decoded only for `false` results when
    /// `with_model` is set.
    pub fn from_source(source: &ReportSource, properties: &[Property], with_model: bool) -> Self {
        let verdict = classify_source(source, properties);
        let model = match source {
            ReportSource::Parsed(report)
                if with_model && verdict.result.class() == ResultClass::False =>
            {
                model::assemble(&report.nondet_calls, &report.model_values)
            }
            _ => Vec::new(),
        };
        Self::from_verdict(verdict, model)
    }

    pub fn unknown(cause: ResultCause, cause_message: impl Into<String>) -> Self {
        Self::new(VerificationResult::Unknown, cause, cause_message, Vec::new())
    }

    pub fn compilation_failed(cause_message: impl Into<String>) -> Self {
        Self::unknown(ResultCause::CompilationFailed, cause_message)
    }

    pub fn result(&self) -> VerificationResult {
        self.result
    }

    pub fn cause(&self) -> ResultCause {
        self.cause
    }

    pub fn cause_message(&self) -> &str {
        &self.cause_message
    }

    pub fn model(&self) -> &[ModelVariable] {
        &self.model
    }

    pub fn class(&self) -> ResultClass {
        self.result.class()
    }

    pub fn can_generate_witness(&self) -> bool {
        self.class().is_definitive()
    }

    /// `result: <class>`, followed by ` : <cause> : <message>` for unknown
    /// results when `print_cause` is set.
    pub fn render_line(&self, print_cause: bool) -> String {
        let mut line = format!("result: {}", self.class());
        if print_cause && self.class() == ResultClass::Unknown {
            line.push_str(&format!(" : {} : {}", self.cause, self.cause_message));
        }
        line
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::diagnostics::DiagnosticReport;
    use crate::model::ModelValue;

    const VIOLATION: &str = "\
[lamp any] __VERIFIER_nondet_int:main.c:4
[lamp any] __VERIFIER_nondet_pointer:main.c:5
[lart fault] reach_error
[term model] var_1 = 17
[term model] var_2 = 0
";

    #[test]
    fn model_is_decoded_for_violations_when_requested() {
        let source = ReportSource::Parsed(DiagnosticReport::parse_str(VIOLATION));
        let res = AnalysisResult::from_source(&source, &[Property::Reach], true);
        assert_eq!(res.result(), VerificationResult::FalseProperty(Property::Reach));
        assert_eq!(res.model().len(), 2);
        assert_eq!(res.model()[0].value, Some(ModelValue::Signed { bits: 32, value: 17 }));
        assert_eq!(res.model()[0].line, 4);
        assert_eq!(res.model()[1].value, None);
        assert!(res.can_generate_witness());

        let res = AnalysisResult::from_source(&source, &[Property::Reach], false);
        assert!(res.model().is_empty());
    }

    #[test]
    fn model_is_ignored_for_non_violations() {
        let text = format!("{VIOLATION}[lart status] bounded exit\n");
        let source = ReportSource::Parsed(DiagnosticReport::parse_str(&text));
        let res = AnalysisResult::from_source(&source, &[Property::Reach], true);
        assert_eq!(res.cause(), ResultCause::BoundReached);
        assert!(res.model().is_empty());
        assert!(!res.can_generate_witness());
    }

    #[test]
    fn render_line_prints_cause_only_for_unknown() {
        let res = AnalysisResult::unknown(ResultCause::BoundReached, "[lart status] bounded exit");
        assert_eq!(res.render_line(false), "result: unknown");
        assert_eq!(
            res.render_line(true),
            "result: unknown : bound reached : [lart status] bounded exit"
        );

        let res = AnalysisResult::new(VerificationResult::True, ResultCause::None, "", Vec::new());
        assert_eq!(res.render_line(true), "result: true");
    }

    #[test]
    fn compilation_failure_is_unknown() {
        let res = AnalysisResult::compilation_failed("no artifact");
        assert_eq!(res.class(), ResultClass::Unknown);
        assert_eq!(res.cause(), ResultCause::CompilationFailed);
        assert_eq!(res.cause_message(), "no artifact");
    }
}
