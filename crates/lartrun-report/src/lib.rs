#![doc = include_str!("../README.md")]

pub mod analysis;
pub mod choice;
pub mod classify;
pub mod diagnostics;
pub mod model;
pub mod taxonomy;

pub use analysis::AnalysisResult;
pub use choice::ChoicePath;
pub use classify::{classify, Verdict};
pub use diagnostics::{DiagnosticReport, ReportSource};
pub use model::{ModelValue, ModelVariable, NondetKind};
pub use taxonomy::{Property, ResultCause, ResultClass, VerificationResult};
