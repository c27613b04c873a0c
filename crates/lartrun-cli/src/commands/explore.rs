// Command handler for: Explore

use std::ffi::OsString;
use std::path::PathBuf;

use miette::IntoDiagnostic;

use lartrun_engine::{DecisionPathExplorer, ExplorerOptions, ProcessExecutor};

use super::helpers::print_json;
use crate::OutputFormat;

pub(crate) fn run_explore_command(
    program: PathBuf,
    args: Vec<OsString>,
    echo: bool,
    format: OutputFormat,
) -> miette::Result<()> {
    let options = ExplorerOptions {
        args,
        echo,
        ..ExplorerOptions::default()
    };
    let mut explorer = DecisionPathExplorer::new(ProcessExecutor::new(program, options));
    let summary = explorer.explore().into_diagnostic()?;

    match format {
        OutputFormat::Text => {
            for step in &summary.steps {
                let exit = step
                    .exit_code
                    .map_or_else(|| "signal".to_string(), |code| code.to_string());
                println!(
                    "depth {}: forced [{}] took [{}] exit {exit}",
                    step.depth, step.forced, step.taken
                );
            }
            println!("final depth: {}", summary.final_depth);
        }
        OutputFormat::Json => print_json(&summary)?,
    }
    Ok(())
}
