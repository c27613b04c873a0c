//! Marker recognition over the diagnostic stream of an instrumented run.
//!
//! The stream is line oriented and mostly noise. A line is only interpreted
//! when it starts with (or, for the sanitizer, contains) one of the marker
//! strings below; everything else is counted and skipped. Parsing never
//! fails on content: malformed marker payloads are dropped with a `debug!`.

use std::collections::BTreeMap;
use std::fs::File;
use std::io::{self, BufRead, BufReader};
use std::path::Path;

use serde::Serialize;
use tracing::{debug, warn};

use crate::choice::ChoicePath;
use crate::model::NondetKind;

pub const CHOICE_MARKER: &str = "[lart-choice]";
pub const FAULT_MARKER: &str = "[lart fault]";
pub const STATUS_MARKER: &str = "[lart status]";
pub const BOUNDED_EXIT: &str = "bounded exit";
pub const VERIFIED: &str = "verified";
pub const FAIL_MARKER: &str = "[lamp fail]";
pub const UNSUPPORTED: &str = "unsupported";
pub const SANITIZER_FATAL: &str = "FATAL: DataFlowSanitizer";
pub const NONDET_MARKER: &str = "[lamp any]";
pub const LEGACY_NONDET_MARKER: &str = "nondet:";
pub const MODEL_MARKER: &str = "[term model]";
pub const LEGACY_MODEL_HEADER: &str = "model:";
pub const MODEL_VARIABLE_PREFIX: &str = "var_";

/// One recognised marker line.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MarkerLine {
    /// 1-based line number in the stream.
    pub line_no: usize,
    /// Text after the marker, trimmed.
    pub payload: String,
    /// The complete line without its terminator.
    pub raw: String,
}

/// A request for an unconstrained input value reported by the target.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct NondetCall {
    pub call: String,
    pub file: Option<String>,
    pub line: u32,
    pub kind: NondetKind,
}

impl NondetCall {
    pub fn new(call: impl Into<String>, file: Option<String>, line: u32) -> Self {
        let call = call.into();
        let kind = NondetKind::from_call(&call);
        Self {
            call,
            file,
            line,
            kind,
        }
    }
}

/// Structured facts extracted from one diagnostic stream.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct DiagnosticReport {
    /// Decisions in the order the target reported them.
    pub choices: ChoicePath,
    pub faults: Vec<MarkerLine>,
    pub statuses: Vec<MarkerLine>,
    /// First `bounded exit` status.
    pub bounded: Option<MarkerLine>,
    /// First `verified` status.
    pub verified: Option<MarkerLine>,
    /// First `unsupported` failure.
    pub unsupported: Option<MarkerLine>,
    /// First sanitizer fatal line.
    pub sanitizer_fatal: Option<MarkerLine>,
    pub nondet_calls: Vec<NondetCall>,
    /// Raw model values keyed by the index printed by the backend.
    pub model_values: BTreeMap<usize, String>,
    pub lines_read: usize,
}

impl DiagnosticReport {
    pub fn parse_str(text: &str) -> Self {
        let mut parser = LineParser::default();
        for line in text.lines() {
            parser.feed(line);
        }
        parser.finish()
    }

    /// Parse a stream, replacing invalid UTF-8 instead of rejecting it.
    pub fn parse_reader<R: BufRead>(mut reader: R) -> io::Result<Self> {
        let mut parser = LineParser::default();
        let mut buf = Vec::new();
        loop {
            buf.clear();
            if reader.read_until(b'\n', &mut buf)? == 0 {
                break;
            }
            let line = String::from_utf8_lossy(&buf);
            parser.feed(line.trim_end_matches(&['\n', '\r'][..]));
        }
        Ok(parser.finish())
    }

    /// The first fault or status marker in stream order.
    pub fn first_marker(&self) -> Option<&MarkerLine> {
        self.faults
            .iter()
            .chain(self.statuses.iter())
            .min_by_key(|m| m.line_no)
    }

    pub fn bound_reached(&self) -> bool {
        self.bounded.is_some()
    }

    pub fn is_empty(&self) -> bool {
        self.lines_read == 0
    }
}

#[derive(Default)]
struct LineParser {
    report: DiagnosticReport,
    in_legacy_model: bool,
}

impl LineParser {
    fn feed(&mut self, line: &str) {
        self.report.lines_read += 1;
        let line_no = self.report.lines_read;
        debug!("report line {line_no}: {line}");
        let marker = |payload: &str| MarkerLine {
            line_no,
            payload: payload.trim().trim_start_matches(':').trim().to_string(),
            raw: line.to_string(),
        };

        if line.contains(SANITIZER_FATAL) && self.report.sanitizer_fatal.is_none() {
            self.report.sanitizer_fatal = Some(marker(line));
        }

        if let Some(rest) = line.strip_prefix(CHOICE_MARKER) {
            match parse_choice(rest) {
                Some(choice) => self.report.choices.push(choice),
                None => debug!("ignoring malformed choice marker: {line}"),
            }
        } else if let Some(rest) = line.strip_prefix(FAULT_MARKER) {
            self.report.faults.push(marker(rest));
        } else if let Some(rest) = line.strip_prefix(STATUS_MARKER) {
            let status = marker(rest);
            if status.payload.contains(BOUNDED_EXIT) && self.report.bounded.is_none() {
                self.report.bounded = Some(status.clone());
            }
            if status.payload.contains(VERIFIED) && self.report.verified.is_none() {
                self.report.verified = Some(status.clone());
            }
            self.report.statuses.push(status);
        } else if let Some(rest) = line.strip_prefix(FAIL_MARKER) {
            if rest.contains(UNSUPPORTED) && self.report.unsupported.is_none() {
                self.report.unsupported = Some(marker(rest));
            }
        } else if let Some(rest) = line.strip_prefix(NONDET_MARKER) {
            match parse_nondet(rest) {
                Some(call) => self.report.nondet_calls.push(call),
                None => debug!("ignoring malformed nondet marker: {line}"),
            }
        } else if let Some(rest) = line.strip_prefix(MODEL_MARKER) {
            match parse_model_entry(rest, '=') {
                Some((index, value)) => {
                    self.report.model_values.insert(index, value);
                }
                None => debug!("ignoring malformed model marker: {line}"),
            }
        } else if let Some(pos) = line.find(LEGACY_NONDET_MARKER) {
            match parse_legacy_nondet(&line[pos + LEGACY_NONDET_MARKER.len()..]) {
                Some(call) => self.report.nondet_calls.push(call),
                None => debug!("ignoring malformed nondet marker: {line}"),
            }
        } else if self.in_legacy_model && line.starts_with(MODEL_VARIABLE_PREFIX) {
            if let Some((index, value)) = parse_model_entry(line, ':') {
                self.report.model_values.insert(index, value);
            }
        }

        if line.contains(LEGACY_MODEL_HEADER) {
            self.in_legacy_model = true;
        }
    }

    fn finish(self) -> DiagnosticReport {
        self.report
    }
}

/// `"<index>: <value>"` or a bare `"<value>"`.
fn parse_choice(rest: &str) -> Option<u32> {
    let value = rest.rsplit(':').next()?;
    value.trim().parse().ok()
}

/// `"<call>:<file>:<line>"`; the file may itself contain colons.
fn parse_nondet(rest: &str) -> Option<NondetCall> {
    let rest = rest.trim();
    let (head, line) = rest.rsplit_once(':')?;
    let (call, file) = head.split_once(':')?;
    let line = line.trim().parse().ok()?;
    let call = call.trim();
    if call.is_empty() {
        return None;
    }
    Some(NondetCall::new(call, Some(file.trim().to_string()), line))
}

/// `"<call>:<line>"` following the legacy marker.
fn parse_legacy_nondet(rest: &str) -> Option<NondetCall> {
    let mut parts = rest.trim().split(':');
    let call = parts.next()?.trim();
    let line = parts.next()?.trim().parse().ok()?;
    if call.is_empty() {
        return None;
    }
    Some(NondetCall::new(call, None, line))
}

/// `"var_<n> <sep> <value>"`.
fn parse_model_entry(text: &str, separator: char) -> Option<(usize, String)> {
    let (name, value) = text.split_once(separator)?;
    let index = name.trim().strip_prefix(MODEL_VARIABLE_PREFIX)?.parse().ok()?;
    let value = value.trim();
    if value.is_empty() {
        return None;
    }
    Some((index, value.to_string()))
}

/// Outcome of reading a diagnostic stream from disk.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReportSource {
    Parsed(DiagnosticReport),
    /// The stream was never produced, or is empty.
    Missing,
    /// The stream exists but could not be read.
    Unreadable(String),
}

impl ReportSource {
    pub fn read(path: &Path) -> Self {
        let file = match File::open(path) {
            Ok(file) => file,
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                warn!("no diagnostic report at {}", path.display());
                return ReportSource::Missing;
            }
            Err(e) => {
                warn!("cannot open diagnostic report {}: {e}", path.display());
                return ReportSource::Unreadable(format!("{}: {e}", path.display()));
            }
        };
        match DiagnosticReport::parse_reader(BufReader::new(file)) {
            Ok(report) if report.is_empty() => ReportSource::Missing,
            Ok(report) => ReportSource::Parsed(report),
            Err(e) => {
                warn!("cannot read diagnostic report {}: {e}", path.display());
                ReportSource::Unreadable(format!("{}: {e}", path.display()))
            }
        }
    }
}
