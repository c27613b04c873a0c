//! Closed vocabulary of verification outcomes.
//!
//! Property names follow the SV-COMP rules. Every property admits only a
//! fixed subset of [`VerificationResult`] tags; anything else observed from
//! raw classification is coerced to [`VerificationResult::Unknown`].

use std::fmt;
use std::str::FromStr;

use serde::{Serialize, Serializer};
use thiserror::Error;

/// A verification goal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Property {
    Reach,
    Termination,
    Overflow,
    Deadlock,
    DefBehavior,
    Deref,
    Free,
    Memtrack,
    Memcleanup,
    /// Internal meta property covering deref, free and memtrack.
    Memsafety,
}

pub const ALL_PROPERTIES: [Property; 10] = [
    Property::Reach,
    Property::Termination,
    Property::Overflow,
    Property::Deadlock,
    Property::DefBehavior,
    Property::Deref,
    Property::Free,
    Property::Memtrack,
    Property::Memcleanup,
    Property::Memsafety,
];

/// Properties the harness refuses at configuration time.
pub const UNSUPPORTED_PROPERTIES: [Property; 4] = [
    Property::Memcleanup,
    Property::Termination,
    Property::DefBehavior,
    Property::Overflow,
];

impl Property {
    /// SV-COMP spelling, e.g. `unreach-call`.
    pub fn as_str(self) -> &'static str {
        match self {
            Property::Reach => "unreach-call",
            Property::Termination => "termination",
            Property::Overflow => "no-overflow",
            Property::Deadlock => "no-deadlock",
            Property::DefBehavior => "def-behavior",
            Property::Deref => "valid-deref",
            Property::Free => "valid-free",
            Property::Memtrack => "valid-memtrack",
            Property::Memcleanup => "valid-memcleanup",
            Property::Memsafety => "valid-memsafety",
        }
    }

    pub fn is_memsafety(self) -> bool {
        matches!(
            self,
            Property::Deref | Property::Free | Property::Memtrack | Property::Memsafety
        )
    }

    pub fn is_supported(self) -> bool {
        !UNSUPPORTED_PROPERTIES.contains(&self)
    }

    /// Name of the error entry point whose fault report refutes this property.
    pub fn error_entry(self) -> Option<&'static str> {
        match self {
            Property::Reach => Some("reach_error"),
            _ => None,
        }
    }

    /// The `false(<property>)` tag of this property. The meta property has none.
    pub fn violation(self) -> Option<VerificationResult> {
        match self {
            Property::Memsafety => None,
            p => Some(VerificationResult::FalseProperty(p)),
        }
    }

    /// Results that are semantically valid for this property.
    pub fn valid_results(self) -> Vec<VerificationResult> {
        let mut valid = vec![VerificationResult::True, VerificationResult::False];
        match self {
            Property::Memsafety => valid.extend(
                [Property::Deref, Property::Free, Property::Memtrack]
                    .into_iter()
                    .map(VerificationResult::FalseProperty),
            ),
            p => valid.push(VerificationResult::FalseProperty(p)),
        }
        valid
    }
}

impl fmt::Display for Property {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TaxonomyError {
    #[error("unknown property '{0}'")]
    UnknownProperty(String),
    #[error("unknown result '{0}'")]
    UnknownResult(String),
}

impl FromStr for Property {
    type Err = TaxonomyError;

    /// Accepts the SV-COMP spelling and the short aliases.
    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        let name = raw.trim().to_ascii_lowercase();
        if let Some(p) = ALL_PROPERTIES.iter().find(|p| p.as_str() == name) {
            return Ok(*p);
        }
        match name.as_str() {
            "reach" => Ok(Property::Reach),
            "overflow" => Ok(Property::Overflow),
            "deadlock" => Ok(Property::Deadlock),
            "defbehavior" => Ok(Property::DefBehavior),
            "deref" => Ok(Property::Deref),
            "free" => Ok(Property::Free),
            "memtrack" => Ok(Property::Memtrack),
            "memcleanup" => Ok(Property::Memcleanup),
            "memsafety" => Ok(Property::Memsafety),
            _ => Err(TaxonomyError::UnknownProperty(raw.trim().to_string())),
        }
    }
}

impl Serialize for Property {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

/// Possible run results.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum VerificationResult {
    /// Tool terminated properly and true/false does not make sense.
    Done,
    /// No answer due to incompleteness.
    Unknown,
    /// Tool could not complete due to an error.
    Error,
    /// Property holds.
    True,
    /// Property does not hold.
    False,
    /// The named property is violated.
    FalseProperty(Property),
    /// Property violated and the witness was confirmed.
    WitnessConfirmed,
}

impl VerificationResult {
    pub fn class(self) -> ResultClass {
        match self {
            VerificationResult::Error => ResultClass::Error,
            VerificationResult::Unknown => ResultClass::Unknown,
            VerificationResult::True => ResultClass::True,
            _ => ResultClass::False,
        }
    }

    /// Whether this tag is admitted by at least one of `properties`.
    ///
    /// `unknown` and `ERROR` are always admitted.
    pub fn is_valid_for(self, properties: &[Property]) -> bool {
        match self {
            VerificationResult::Unknown | VerificationResult::Error => true,
            result => properties
                .iter()
                .any(|p| p.valid_results().contains(&result)),
        }
    }

    /// Coerce an out-of-set tag to `unknown`.
    pub fn coerce(self, properties: &[Property]) -> VerificationResult {
        if self.is_valid_for(properties) {
            self
        } else {
            VerificationResult::Unknown
        }
    }
}

impl fmt::Display for VerificationResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            VerificationResult::Done => f.write_str("done"),
            VerificationResult::Unknown => f.write_str("unknown"),
            VerificationResult::Error => f.write_str("ERROR"),
            VerificationResult::True => f.write_str("true"),
            VerificationResult::False => f.write_str("false"),
            VerificationResult::FalseProperty(p) => write!(f, "false({p})"),
            VerificationResult::WitnessConfirmed => f.write_str("witness confirmed"),
        }
    }
}

impl FromStr for VerificationResult {
    type Err = TaxonomyError;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        let trimmed = raw.trim();
        match trimmed {
            "done" => return Ok(VerificationResult::Done),
            "unknown" => return Ok(VerificationResult::Unknown),
            "ERROR" | "error" => return Ok(VerificationResult::Error),
            "true" => return Ok(VerificationResult::True),
            "false" => return Ok(VerificationResult::False),
            "witness confirmed" => return Ok(VerificationResult::WitnessConfirmed),
            _ => {}
        }
        trimmed
            .strip_prefix("false(")
            .and_then(|rest| rest.strip_suffix(')'))
            .and_then(|name| name.parse::<Property>().ok())
            .and_then(Property::violation)
            .ok_or_else(|| TaxonomyError::UnknownResult(trimmed.to_string()))
    }
}

impl Serialize for VerificationResult {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

/// Why a result is unknown or an error.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ResultCause {
    CompilationFailed,
    BoundReached,
    UnknownFault,
    Unsupported,
    EnvironmentError,
    MissingReport,
    DataflowError,
    None,
}

impl ResultCause {
    pub fn as_str(self) -> &'static str {
        match self {
            ResultCause::CompilationFailed => "compilation failed",
            ResultCause::BoundReached => "bound reached",
            ResultCause::UnknownFault => "unknown fault",
            ResultCause::Unsupported => "unsupported instruction",
            ResultCause::EnvironmentError => "environment error",
            ResultCause::MissingReport => "missing report",
            ResultCause::DataflowError => "dataflow error",
            ResultCause::None => "none",
        }
    }
}

impl fmt::Display for ResultCause {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Serialize for ResultCause {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

/// Coarse classification of a [`VerificationResult`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ResultClass {
    True,
    False,
    Unknown,
    Error,
}

impl ResultClass {
    pub fn as_str(self) -> &'static str {
        match self {
            ResultClass::True => "true",
            ResultClass::False => "false",
            ResultClass::Unknown => "unknown",
            ResultClass::Error => "error",
        }
    }

    /// Only definitive classes can be certified by a witness.
    pub fn is_definitive(self) -> bool {
        matches!(self, ResultClass::True | ResultClass::False)
    }
}

impl fmt::Display for ResultClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Every tag of the closed result vocabulary.
pub fn all_results() -> Vec<VerificationResult> {
    let mut results = vec![
        VerificationResult::Done,
        VerificationResult::Unknown,
        VerificationResult::Error,
        VerificationResult::True,
        VerificationResult::False,
    ];
    results.extend(ALL_PROPERTIES.iter().filter_map(|p| p.violation()));
    results.push(VerificationResult::WitnessConfirmed);
    results
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn property_names_round_trip_through_from_str() {
        for p in ALL_PROPERTIES {
            assert_eq!(p.as_str().parse::<Property>().unwrap(), p);
        }
        assert_eq!("reach".parse::<Property>().unwrap(), Property::Reach);
        assert_eq!(" MemSafety ".parse::<Property>().unwrap(), Property::Memsafety);
        assert!("liveness".parse::<Property>().is_err());
    }

    #[test]
    fn reach_admits_only_reach_violations() {
        let props = [Property::Reach];
        assert!(VerificationResult::True.is_valid_for(&props));
        assert!(VerificationResult::FalseProperty(Property::Reach).is_valid_for(&props));
        assert!(!VerificationResult::FalseProperty(Property::Deref).is_valid_for(&props));
        assert!(!VerificationResult::Done.is_valid_for(&props));
        assert!(!VerificationResult::WitnessConfirmed.is_valid_for(&props));
        assert_eq!(
            VerificationResult::FalseProperty(Property::Free).coerce(&props),
            VerificationResult::Unknown
        );
    }

    #[test]
    fn memsafety_admits_each_sub_property() {
        let props = [Property::Memsafety];
        for sub in [Property::Deref, Property::Free, Property::Memtrack] {
            assert!(VerificationResult::FalseProperty(sub).is_valid_for(&props));
        }
        assert!(!VerificationResult::FalseProperty(Property::Memcleanup).is_valid_for(&props));
    }

    #[test]
    fn unknown_and_error_are_always_valid() {
        assert!(VerificationResult::Unknown.is_valid_for(&[]));
        assert!(VerificationResult::Error.is_valid_for(&[]));
        assert!(!VerificationResult::True.is_valid_for(&[]));
    }

    #[test]
    fn result_display_matches_report_vocabulary() {
        assert_eq!(
            VerificationResult::FalseProperty(Property::Reach).to_string(),
            "false(unreach-call)"
        );
        assert_eq!(VerificationResult::Error.to_string(), "ERROR");
        assert_eq!(VerificationResult::WitnessConfirmed.to_string(), "witness confirmed");
        for result in all_results() {
            assert_eq!(result.to_string().parse::<VerificationResult>().unwrap(), result);
        }
    }

    #[test]
    fn class_of_non_true_definitive_results_is_false() {
        assert_eq!(VerificationResult::Done.class(), ResultClass::False);
        assert_eq!(VerificationResult::WitnessConfirmed.class(), ResultClass::False);
        assert_eq!(
            VerificationResult::FalseProperty(Property::Deref).class(),
            ResultClass::False
        );
        assert_eq!(VerificationResult::Unknown.class(), ResultClass::Unknown);
        assert!(!ResultClass::Error.is_definitive());
    }

    #[test]
    fn unsupported_properties_are_flagged() {
        assert!(Property::Reach.is_supported());
        assert!(Property::Memsafety.is_supported());
        assert!(!Property::Termination.is_supported());
        assert!(!Property::Overflow.is_supported());
    }

    #[test]
    fn serializes_as_report_strings() {
        let json = serde_json::to_string(&VerificationResult::FalseProperty(Property::Free)).unwrap();
        assert_eq!(json, "\"false(valid-free)\"");
        let json = serde_json::to_string(&ResultCause::BoundReached).unwrap();
        assert_eq!(json, "\"bound reached\"");
        let json = serde_json::to_string(&ResultClass::Unknown).unwrap();
        assert_eq!(json, "\"unknown\"");
    }
}
