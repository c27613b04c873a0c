//! Line-preserving rewrite of the benchmark source.
//!
//! One linear pass: every input line maps to exactly one output line, after
//! a single header line. Benchmark features are inferred from textual
//! patterns on the way.

use std::fs;
use std::io;
use std::path::Path;
use std::sync::LazyLock;

use regex::Regex;
use serde::Serialize;
use tracing::debug;

use crate::config::BenchmarkFlags;

pub const HEADER: &str = "#include <lamp.h>";

/// Lines the header adds ahead of the original source.
pub const LINE_OFFSET: u32 = 1;

const NONDET_PREFIX: &str = "__VERIFIER_nondet_";
const NONDET_FLOATS: [&str; 2] = ["__VERIFIER_nondet_float", "__VERIFIER_nondet_double"];
const NONDET_POINTER: &str = "__VERIFIER_nondet_pointer";

static RE_NONDET_EXTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^\s*extern\s[^;]*\b__VERIFIER_nondet_\w+\s*\([^;]*\)\s*;\s*$").unwrap()
});

static RE_GLOBAL_EXTERN: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^\s*extern[^(]*;").unwrap());

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct PreprocessSummary {
    pub line_offset: u32,
    pub source_lines: usize,
    /// 1-based source line numbers replaced by blank lines.
    pub stripped_lines: Vec<usize>,
}

/// Rewrite `source`, updating `flags` from what the lines contain.
pub fn preprocess_source(source: &str, flags: &mut BenchmarkFlags) -> (String, PreprocessSummary) {
    let mut out = String::with_capacity(source.len() + HEADER.len() + 1);
    out.push_str(HEADER);
    out.push('\n');

    let mut summary = PreprocessSummary {
        line_offset: LINE_OFFSET,
        ..PreprocessSummary::default()
    };
    for (index, line) in source.lines().enumerate() {
        summary.source_lines += 1;
        infer_flags(line, flags);
        if RE_NONDET_EXTERN.is_match(line) {
            debug!("stripping nondet declaration on line {}: {line}", index + 1);
            summary.stripped_lines.push(index + 1);
        } else {
            out.push_str(line);
        }
        out.push('\n');
    }
    (out, summary)
}

fn infer_flags(line: &str, flags: &mut BenchmarkFlags) {
    flags.symbolic |= line.contains(NONDET_PREFIX);
    flags.libm |= line.contains("<math.h>");
    if flags.symbolic {
        flags.floats |= NONDET_FLOATS.iter().any(|f| line.contains(f));
        flags.pointer |= line.contains(NONDET_POINTER);
    }
    flags.sequential &= !line.contains("pthread_");
    if RE_GLOBAL_EXTERN.is_match(line) {
        flags.globals = true;
    }
}

/// Read `input`, write the rewritten source to `output`.
pub fn preprocess_file(
    input: &Path,
    output: &Path,
    flags: &mut BenchmarkFlags,
) -> io::Result<PreprocessSummary> {
    let bytes = fs::read(input)?;
    let source = String::from_utf8_lossy(&bytes);
    let (text, summary) = preprocess_source(&source, flags);
    fs::write(output, text)?;
    Ok(summary)
}
