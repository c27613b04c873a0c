// Shared helper functions used across CLI command handlers.
//
// These parse CLI string arguments into typed values and render reports.

use miette::IntoDiagnostic;
use serde::Serialize;

use lartrun_engine::config::{load_property_file, Config};
use lartrun_engine::WitnessMode;
use lartrun_report::Property;

use crate::cli::VerifyArgs;
use crate::OutputFormat;

pub(crate) fn parse_output_format(raw: &str) -> miette::Result<OutputFormat> {
    match raw {
        "text" => Ok(OutputFormat::Text),
        "json" => Ok(OutputFormat::Json),
        other => Err(miette::miette!(
            "Unknown output format: {other}. Use 'text' or 'json'."
        )),
    }
}

pub(crate) fn parse_witness_mode(raw: &str) -> miette::Result<WitnessMode> {
    raw.parse::<WitnessMode>().map_err(|e| miette::miette!("{e}"))
}

/// Parse property names without checking support; offline classification
/// accepts every property.
pub(crate) fn parse_properties(raw: &[String]) -> miette::Result<Vec<Property>> {
    raw.iter()
        .map(|name| name.parse::<Property>().into_diagnostic())
        .collect()
}

/// Build the verification config from the `verify` flags. Unsupported
/// properties stop here.
pub(crate) fn config_from_args(args: &VerifyArgs) -> miette::Result<Config> {
    let mut config = Config::new(&args.lartcc, &args.benchmark);
    config.architecture = args.arch.parse()?;
    config.lamp = args.lamp.clone();
    for path in &args.prop_files {
        config.add_property_file(load_property_file(path)?)?;
    }
    for name in &args.properties {
        config.add_property_name(name)?;
    }
    config.validate()?;
    Ok(config)
}

pub(crate) fn print_json<T: Serialize>(value: &T) -> miette::Result<()> {
    println!("{}", serde_json::to_string_pretty(value).into_diagnostic()?);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;

    use crate::cli::{Cli, Commands};

    fn verify_args(argv: &[&str]) -> VerifyArgs {
        let mut full = vec!["lartrun", "verify", "main.c"];
        full.extend_from_slice(argv);
        match Cli::try_parse_from(full).unwrap().command {
            Commands::Verify(args) => args,
            _ => panic!("expected verify command"),
        }
    }

    #[test]
    fn output_format_is_text_or_json() {
        assert_eq!(parse_output_format("json").unwrap(), OutputFormat::Json);
        assert_eq!(parse_output_format("text").unwrap(), OutputFormat::Text);
        assert!(parse_output_format("yaml").is_err());
    }

    #[test]
    fn config_collects_named_properties() {
        let config = config_from_args(&verify_args(&["--property", "reach", "--arch", "32"])).unwrap();
        assert_eq!(config.properties, vec![Property::Reach]);
        assert_eq!(config.architecture.bits(), 32);
        assert_eq!(config.lamp, "term");
    }

    #[test]
    fn config_rejects_unsupported_and_missing_properties() {
        let err = config_from_args(&verify_args(&["--property", "termination"])).unwrap_err();
        assert!(err.to_string().contains("not supported"), "got: {err}");
        assert!(config_from_args(&verify_args(&[])).is_err());
        assert!(config_from_args(&verify_args(&["--property", "reach", "--arch", "16"])).is_err());
    }

    #[test]
    fn offline_properties_skip_the_support_check() {
        let props = parse_properties(&["termination".to_string(), "unreach-call".to_string()]).unwrap();
        assert_eq!(props, vec![Property::Termination, Property::Reach]);
        assert!(parse_properties(&["liveness".to_string()]).is_err());
    }
}
