//! Ordered rule table mapping diagnostic facts to a verdict.
//!
//! Rules are evaluated top-down and the first one that fires decides the
//! result tag and its cause. The message is the raw marker line that fired.

use serde::Serialize;
use tracing::{debug, warn};

use crate::diagnostics::{DiagnosticReport, MarkerLine, ReportSource};
use crate::taxonomy::{Property, ResultCause, VerificationResult};

/// Classification of one diagnostic stream.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Verdict {
    pub result: VerificationResult,
    pub cause: ResultCause,
    pub message: String,
}

impl Verdict {
    pub fn new(result: VerificationResult, cause: ResultCause, message: impl Into<String>) -> Self {
        Self {
            result,
            cause,
            message: message.into(),
        }
    }

    pub fn unknown(cause: ResultCause, message: impl Into<String>) -> Self {
        Self::new(VerificationResult::Unknown, cause, message)
    }

    fn from_marker(result: VerificationResult, cause: ResultCause, marker: &MarkerLine) -> Self {
        Self::new(result, cause, marker.raw.clone())
    }
}

/// One row of the classification table.
pub struct ClassificationRule {
    pub name: &'static str,
    pub fire: fn(&DiagnosticReport, &[Property]) -> Option<Verdict>,
}

pub const RULES: &[ClassificationRule] = &[
    ClassificationRule {
        name: "sanitizer-fatal",
        fire: |report, _| {
            report
                .sanitizer_fatal
                .as_ref()
                .map(|m| Verdict::from_marker(VerificationResult::Unknown, ResultCause::DataflowError, m))
        },
    },
    ClassificationRule {
        name: "bounded-exit",
        fire: |report, _| {
            report
                .bounded
                .as_ref()
                .map(|m| Verdict::from_marker(VerificationResult::Unknown, ResultCause::BoundReached, m))
        },
    },
    ClassificationRule {
        name: "error-entry-fault",
        fire: |report, properties| {
            report.faults.iter().find_map(|fault| {
                properties.iter().find_map(|p| {
                    let entry = p.error_entry()?;
                    if !fault.payload.contains(entry) {
                        return None;
                    }
                    let result = p.violation()?;
                    Some(Verdict::from_marker(result, ResultCause::None, fault))
                })
            })
        },
    },
    ClassificationRule {
        name: "unsupported",
        fire: |report, _| {
            report
                .unsupported
                .as_ref()
                .map(|m| Verdict::from_marker(VerificationResult::Unknown, ResultCause::Unsupported, m))
        },
    },
    ClassificationRule {
        name: "other-fault",
        fire: |report, _| {
            report
                .faults
                .first()
                .map(|m| Verdict::from_marker(VerificationResult::Unknown, ResultCause::UnknownFault, m))
        },
    },
    ClassificationRule {
        name: "verified",
        fire: |report, _| {
            report
                .verified
                .as_ref()
                .map(|m| Verdict::from_marker(VerificationResult::True, ResultCause::None, m))
        },
    },
];

/// Classify a parsed stream and coerce the tag into the valid set of
/// `properties`.
pub fn classify(report: &DiagnosticReport, properties: &[Property]) -> Verdict {
    let raw = RULES
        .iter()
        .find_map(|rule| {
            let verdict = (rule.fire)(report, properties)?;
            debug!("classification rule '{}' fired", rule.name);
            Some(verdict)
        })
        .unwrap_or_else(|| Verdict::unknown(ResultCause::None, ""));
    coerce(raw, properties)
}

/// Classify a stream that may not have been produced at all.
pub fn classify_source(source: &ReportSource, properties: &[Property]) -> Verdict {
    match source {
        ReportSource::Parsed(report) => classify(report, properties),
        ReportSource::Missing => Verdict::unknown(ResultCause::MissingReport, ""),
        ReportSource::Unreadable(message) => {
            Verdict::unknown(ResultCause::EnvironmentError, message.clone())
        }
    }
}

fn coerce(verdict: Verdict, properties: &[Property]) -> Verdict {
    let result = verdict.result.coerce(properties);
    if result != verdict.result {
        warn!(
            "result '{}' is not valid for the configured properties; reporting '{result}'",
            verdict.result
        );
    }
    Verdict { result, ..verdict }
}
