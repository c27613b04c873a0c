// Command handler for: Classify
//
// Offline classification of a saved diagnostic log with the same rules the
// harness applies.

use std::path::PathBuf;

use serde::Serialize;

use lartrun_report::diagnostics::ReportSource;
use lartrun_report::{AnalysisResult, Property, ResultClass};

use super::helpers::{parse_properties, print_json};
use crate::OutputFormat;

#[derive(Debug, Serialize)]
pub(crate) struct ClassifyReport<'a> {
    pub log: String,
    pub properties: &'a [Property],
    pub class: ResultClass,
    #[serde(flatten)]
    pub analysis: &'a AnalysisResult,
}

pub(crate) fn run_classify_command(
    log: PathBuf,
    properties: &[String],
    print_cause: bool,
    format: OutputFormat,
) -> miette::Result<()> {
    let properties = parse_properties(properties)?;
    let source = ReportSource::read(&log);
    let analysis = AnalysisResult::from_source(&source, &properties, true);

    match format {
        OutputFormat::Text => println!("{}", analysis.render_line(print_cause)),
        OutputFormat::Json => print_json(&ClassifyReport {
            log: log.display().to_string(),
            properties: &properties,
            class: analysis.class(),
            analysis: &analysis,
        })?,
    }
    Ok(())
}
