// Command handler for: Verify
//
// Runs the full harness and prints the final classification line.

use std::path::PathBuf;

use serde::Serialize;

use lartrun_engine::harness::{BoundAttempt, HarnessStage};
use lartrun_engine::{Harness, HarnessOptions};
use lartrun_report::model::ModelVariable;
use lartrun_report::{ResultCause, ResultClass, VerificationResult};

use super::helpers::{config_from_args, parse_witness_mode, print_json};
use crate::cli::VerifyArgs;
use crate::OutputFormat;

#[derive(Debug, Serialize)]
pub(crate) struct VerifyReport {
    pub benchmark: String,
    pub class: ResultClass,
    pub result: VerificationResult,
    pub cause: ResultCause,
    pub cause_message: String,
    pub model: Vec<ModelVariable>,
    pub attempts: Vec<BoundAttempt>,
    pub witness: Option<PathBuf>,
    pub stage: HarnessStage,
}

pub(crate) fn run_verify_command(args: VerifyArgs, format: OutputFormat) -> miette::Result<()> {
    let config = config_from_args(&args)?;
    let options = HarnessOptions {
        workdir: args.workdir.clone(),
        witness: parse_witness_mode(&args.witness)?,
        witness_dir: args.witness_dir.clone(),
        initial_bound: args.initial_bound,
        bound_step: args.bound_step,
        max_bound: args.max_bound,
        echo: args.echo,
    };

    let mut harness = Harness::new(config, options)?;
    let outcome = harness.run();
    let analysis = &outcome.analysis;

    match format {
        OutputFormat::Text => {
            for attempt in &outcome.attempts {
                tracing::debug!(
                    "bound {}: {} ({}), exit {:?}",
                    attempt.bound,
                    attempt.result,
                    attempt.cause,
                    attempt.exit_code
                );
            }
            println!("{}", analysis.render_line(args.print_cause));
        }
        OutputFormat::Json => {
            let report = VerifyReport {
                benchmark: args.benchmark.display().to_string(),
                class: analysis.class(),
                result: analysis.result(),
                cause: analysis.cause(),
                cause_message: analysis.cause_message().to_string(),
                model: analysis.model().to_vec(),
                attempts: outcome.attempts.clone(),
                witness: outcome.witness.clone(),
                stage: outcome.stage,
            };
            print_json(&report)?;
        }
    }
    Ok(())
}
