//! Verification configuration and SV-COMP property files.

use std::ffi::OsString;
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use lartrun_report::taxonomy::Property;
use miette::{Diagnostic, NamedSource, SourceSpan};
use serde::Serialize;
use thiserror::Error;
use tracing::debug;

/// Default instrumentation library passed to the compiler.
pub const DEFAULT_LAMP: &str = "term";

/// Maps an LTL formula of a property file to a property.
pub const PROPERTY_FORMULAS: [(&str, Property); 9] = [
    ("LTL(G ! call(reach_error()))", Property::Reach),
    ("LTL(F end)", Property::Termination),
    ("LTL(G valid-free)", Property::Free),
    ("LTL(G valid-deref)", Property::Deref),
    ("LTL(G valid-memtrack)", Property::Memtrack),
    ("LTL(G valid-memcleanup)", Property::Memcleanup),
    ("LTL(G ! overflow)", Property::Overflow),
    ("LTL(G ! deadlock)", Property::Deadlock),
    ("LTL(G def-behavior)", Property::DefBehavior),
];

#[derive(Debug, Error, Diagnostic)]
pub enum ConfigError {
    #[error("property {property} not supported yet")]
    #[diagnostic(
        code(lartrun::config::unsupported_property),
        help("supported properties are unreach-call, no-deadlock, valid-deref, valid-free, valid-memtrack and valid-memsafety")
    )]
    UnsupportedProperty { property: Property },

    #[error("unknown property '{name}'")]
    #[diagnostic(code(lartrun::config::unknown_property))]
    UnknownProperty { name: String },

    #[error("unknown property formula '{formula}'")]
    #[diagnostic(
        code(lartrun::config::unknown_formula),
        help("expected one of the SV-COMP formulas, e.g. LTL(G ! call(reach_error()))")
    )]
    UnknownFormula {
        formula: String,
        #[label("unrecognised formula")]
        span: SourceSpan,
        #[source_code]
        src: NamedSource<String>,
    },

    #[error("property file {path} contains no CHECK line")]
    #[diagnostic(code(lartrun::config::empty_property_file))]
    EmptyPropertyFile { path: String },

    #[error("cannot read property file {path}: {source}")]
    #[diagnostic(code(lartrun::config::io))]
    Io {
        path: String,
        source: std::io::Error,
    },

    #[error("unsupported architecture '{0}'")]
    #[diagnostic(
        code(lartrun::config::architecture),
        help("use 32 or 64")
    )]
    Architecture(String),

    #[error("no property requested")]
    #[diagnostic(
        code(lartrun::config::no_property),
        help("pass a property file with --prop or a name with --property")
    )]
    NoProperty,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub enum Architecture {
    #[serde(rename = "32")]
    Bits32,
    #[default]
    #[serde(rename = "64")]
    Bits64,
}

impl Architecture {
    pub fn bits(self) -> u8 {
        match self {
            Architecture::Bits32 => 32,
            Architecture::Bits64 => 64,
        }
    }
}

impl fmt::Display for Architecture {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.bits())
    }
}

impl FromStr for Architecture {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().trim_end_matches("bit") {
            "32" => Ok(Architecture::Bits32),
            "64" => Ok(Architecture::Bits64),
            _ => Err(ConfigError::Architecture(s.trim().to_string())),
        }
    }
}

/// Features of the benchmark inferred while preprocessing it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct BenchmarkFlags {
    /// The benchmark requests nondeterministic values.
    pub symbolic: bool,
    /// Nondeterministic floating-point values are requested.
    pub floats: bool,
    /// Nondeterministic pointers are requested.
    pub pointer: bool,
    /// No threads are created.
    pub sequential: bool,
    /// The benchmark declares external variables.
    pub globals: bool,
    /// The math library must be linked.
    pub libm: bool,
}

impl Default for BenchmarkFlags {
    fn default() -> Self {
        Self {
            symbolic: false,
            floats: false,
            pointer: false,
            sequential: true,
            globals: false,
            libm: false,
        }
    }
}

/// Properties parsed from one property file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PropertyFile {
    pub properties: Vec<Property>,
    /// The `CHECK(...)` lines, verbatim.
    pub specifications: Vec<String>,
}

/// Parse the contents of a `.prp` file.
///
/// Every `LTL(...)` formula is mapped through [`PROPERTY_FORMULAS`]. When the
/// three memory-safety formulas all occur, `valid-memsafety` is recorded
/// as well.
pub fn parse_property_file(name: &str, text: &str) -> Result<PropertyFile, ConfigError> {
    let mut properties = Vec::new();
    let mut specifications = Vec::new();
    let mut offset = 0;

    for line in text.split_inclusive('\n') {
        let line_start = offset;
        offset += line.len();
        let trimmed = line.trim();
        if !trimmed.starts_with("CHECK") {
            continue;
        }
        specifications.push(trimmed.to_string());

        let mut search = 0;
        while let Some(found) = line[search..].find("LTL(") {
            let start = search + found;
            let end = formula_end(line, start).unwrap_or(line.trim_end().len());
            let formula = &line[start..end];
            let property = property_from_formula(formula).ok_or_else(|| ConfigError::UnknownFormula {
                formula: formula.to_string(),
                span: (line_start + start, end - start).into(),
                src: NamedSource::new(name, text.to_string()),
            })?;
            debug!("property formula {formula} -> {property}");
            if !properties.contains(&property) {
                properties.push(property);
            }
            search = end;
        }
    }

    if specifications.is_empty() {
        return Err(ConfigError::EmptyPropertyFile {
            path: name.to_string(),
        });
    }

    let memsafety = [Property::Deref, Property::Free, Property::Memtrack];
    if memsafety.iter().all(|p| properties.contains(p)) {
        properties.push(Property::Memsafety);
    }

    Ok(PropertyFile {
        properties,
        specifications,
    })
}

/// Index one past the parenthesis closing the formula opened at `start`.
fn formula_end(line: &str, start: usize) -> Option<usize> {
    let mut depth = 0usize;
    for (i, c) in line[start..].char_indices() {
        match c {
            '(' => depth += 1,
            ')' => {
                depth = depth.checked_sub(1)?;
                if depth == 0 {
                    return Some(start + i + 1);
                }
            }
            _ => {}
        }
    }
    None
}

pub fn property_from_formula(formula: &str) -> Option<Property> {
    let normalized: String = formula.split_whitespace().collect::<Vec<_>>().join(" ");
    PROPERTY_FORMULAS
        .iter()
        .find(|(f, _)| *f == normalized)
        .map(|(_, p)| *p)
}

pub fn load_property_file(path: &Path) -> Result<PropertyFile, ConfigError> {
    let name = path.display().to_string();
    let text = fs::read_to_string(path).map_err(|source| ConfigError::Io {
        path: name.clone(),
        source,
    })?;
    parse_property_file(&name, &text)
}

/// Everything the harness needs to know about one verification task.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Config {
    /// The instrumenting compiler.
    pub lartcc: PathBuf,
    pub benchmark: PathBuf,
    pub properties: Vec<Property>,
    /// Specification strings copied into the witness.
    pub property_strings: Vec<String>,
    pub architecture: Architecture,
    /// Instrumentation library selected on the compiler command line.
    pub lamp: String,
    pub flags: BenchmarkFlags,
    pub leakcheck: bool,
}

impl Config {
    pub fn new(lartcc: impl Into<PathBuf>, benchmark: impl Into<PathBuf>) -> Self {
        Self {
            lartcc: lartcc.into(),
            benchmark: benchmark.into(),
            properties: Vec::new(),
            property_strings: Vec::new(),
            architecture: Architecture::default(),
            lamp: DEFAULT_LAMP.to_string(),
            flags: BenchmarkFlags::default(),
            leakcheck: false,
        }
    }

    /// Request a property. Unsupported properties are a hard error.
    pub fn add_property(&mut self, property: Property) -> Result<(), ConfigError> {
        if !property.is_supported() {
            return Err(ConfigError::UnsupportedProperty { property });
        }
        if property == Property::Memsafety {
            self.leakcheck = true;
        }
        if !self.properties.contains(&property) {
            self.properties.push(property);
        }
        Ok(())
    }

    pub fn add_property_name(&mut self, name: &str) -> Result<(), ConfigError> {
        let property = name.parse::<Property>().map_err(|_| ConfigError::UnknownProperty {
            name: name.trim().to_string(),
        })?;
        self.add_property(property)
    }

    pub fn add_property_file(&mut self, file: PropertyFile) -> Result<(), ConfigError> {
        for property in file.properties {
            self.add_property(property)?;
        }
        self.property_strings.extend(file.specifications);
        Ok(())
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.properties.is_empty() {
            return Err(ConfigError::NoProperty);
        }
        Ok(())
    }

    /// Arguments of the compiler invocation producing `output` from the
    /// preprocessed `source`.
    pub fn compile_args(&self, source: &Path, output: &Path) -> Vec<OsString> {
        let mut args: Vec<OsString> = vec![self.lamp.clone().into(), source.into()];
        if self.lamp == "term" {
            args.push("-lz3".into());
        }
        if self.flags.libm {
            args.push("-lm".into());
        }
        if !self.flags.sequential {
            args.push("-pthread".into());
        }
        args.push("-rdynamic".into());
        args.push("-o".into());
        args.push(output.into());
        args
    }
}
