//! CLI argument definitions: top-level `Cli` struct and `Commands` enum.

use std::ffi::OsString;
use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

pub(crate) const CLI_LONG_ABOUT: &str =
    "Bounded verification of C benchmarks through the LART instrumenting compiler.\n\n\
    Typical use:\n  \
    lartrun verify main.c --lartcc /opt/lart/bin/lartcc --prop unreach-call.prp\n\n\
    The final line on stdout is always `result: <true|false|unknown|error>`.";

#[derive(Parser)]
#[command(name = "lartrun")]
#[command(about = "Bounded verification harness around the LART toolchain")]
#[command(long_about = CLI_LONG_ABOUT)]
#[command(version)]
pub(crate) struct Cli {
    /// Output format: text | json
    #[arg(long, global = true, default_value = "text")]
    pub(crate) format: String,

    #[command(subcommand)]
    pub(crate) command: Commands,
}

#[derive(Subcommand)]
pub(crate) enum Commands {
    /// Preprocess, compile and verify a benchmark
    Verify(VerifyArgs),

    /// Run the decision-path explorer over an instrumented program
    Explore {
        /// The instrumented executable
        program: PathBuf,

        /// Arguments passed to the program on every run
        #[arg(trailing_var_arg = true, allow_hyphen_values = true)]
        args: Vec<OsString>,

        /// Mirror the program's stderr while it runs
        #[arg(long, default_value_t = false)]
        echo: bool,
    },

    /// Classify a saved diagnostic log
    Classify {
        /// The diagnostic log (stderr of an instrumented run)
        log: PathBuf,

        /// Property the run was checking (repeatable)
        #[arg(long = "property", required = true)]
        properties: Vec<String>,

        /// Print the cause of unknown results
        #[arg(long, default_value_t = false)]
        print_cause: bool,
    },
}

#[derive(Args)]
pub(crate) struct VerifyArgs {
    /// Path to the C benchmark
    pub(crate) benchmark: PathBuf,

    /// The instrumenting compiler, looked up on PATH by default
    #[arg(long, default_value = "lartcc")]
    pub(crate) lartcc: PathBuf,

    /// SV-COMP property file (repeatable)
    #[arg(long = "prop")]
    pub(crate) prop_files: Vec<PathBuf>,

    /// Property by name, e.g. unreach-call or valid-memsafety (repeatable)
    #[arg(long = "property")]
    pub(crate) properties: Vec<String>,

    /// Target architecture: 32 | 64
    #[arg(long, default_value = "64")]
    pub(crate) arch: String,

    /// Instrumentation library passed to the compiler
    #[arg(long, default_value = "term")]
    pub(crate) lamp: String,

    /// Keep intermediate files in this directory
    #[arg(long)]
    pub(crate) workdir: Option<PathBuf>,

    /// Witness policy: off | auto | correctness
    #[arg(long, default_value = "auto")]
    pub(crate) witness: String,

    /// Directory receiving witness.graphml (default: current directory)
    #[arg(long)]
    pub(crate) witness_dir: Option<PathBuf>,

    /// First exploration bound
    #[arg(long, default_value_t = 10)]
    pub(crate) initial_bound: u64,

    /// Bound increment after a bounded exit
    #[arg(long, default_value_t = 50)]
    pub(crate) bound_step: u64,

    /// Give up once the bound would exceed this value
    #[arg(long)]
    pub(crate) max_bound: Option<u64>,

    /// Print the cause of unknown results
    #[arg(long, default_value_t = false)]
    pub(crate) print_cause: bool,

    /// Mirror the verified program's stderr while it runs
    #[arg(long, default_value_t = false)]
    pub(crate) echo: bool,
}
