//! Forced-decision vectors.

use std::fmt;
use std::num::ParseIntError;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Branch indices selected at successive runtime decision points.
///
/// Serialized as a hyphen-joined decimal string; the empty path is `""`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(into = "String", try_from = "String")]
pub struct ChoicePath(Vec<u32>);

impl ChoicePath {
    pub fn new() -> Self {
        Self(Vec::new())
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn as_slice(&self) -> &[u32] {
        &self.0
    }

    pub fn push(&mut self, choice: u32) {
        self.0.push(choice);
    }

    pub fn get(&self, index: usize) -> Option<u32> {
        self.0.get(index).copied()
    }

    /// A copy of `self` with the decision at `depth` advanced to its next
    /// value.
    ///
    /// Returns `None` if `self` does not reach `depth` or the value would
    /// overflow.
    pub fn advanced_at(&self, depth: usize) -> Option<ChoicePath> {
        let next = self.0.get(depth)?.checked_add(1)?;
        let mut advanced = self.0.clone();
        advanced[depth] = next;
        Some(ChoicePath(advanced))
    }
}

impl From<Vec<u32>> for ChoicePath {
    fn from(choices: Vec<u32>) -> Self {
        Self(choices)
    }
}

impl From<ChoicePath> for String {
    fn from(path: ChoicePath) -> Self {
        path.to_string()
    }
}

impl TryFrom<String> for ChoicePath {
    type Error = ParseIntError;

    fn try_from(raw: String) -> Result<Self, Self::Error> {
        raw.parse()
    }
}

impl FromIterator<u32> for ChoicePath {
    fn from_iter<I: IntoIterator<Item = u32>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

impl fmt::Display for ChoicePath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, choice) in self.0.iter().enumerate() {
            if i > 0 {
                f.write_str("-")?;
            }
            write!(f, "{choice}")?;
        }
        Ok(())
    }
}

impl FromStr for ChoicePath {
    type Err = ParseIntError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        if s.is_empty() {
            return Ok(Self::new());
        }
        s.split('-').map(|part| part.trim().parse::<u32>()).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_is_hyphen_joined() {
        assert_eq!(ChoicePath::from(vec![0, 3, 12]).to_string(), "0-3-12");
        assert_eq!(ChoicePath::new().to_string(), "");
    }

    #[test]
    fn parse_accepts_empty_and_rejects_garbage() {
        assert_eq!("".parse::<ChoicePath>().unwrap(), ChoicePath::new());
        assert_eq!(
            "1-2".parse::<ChoicePath>().unwrap(),
            ChoicePath::from(vec![1, 2])
        );
        assert!("1--2".parse::<ChoicePath>().is_err());
        assert!("a".parse::<ChoicePath>().is_err());
    }

    #[test]
    fn serializes_as_the_channel_string() {
        let path = ChoicePath::from(vec![2, 0]);
        assert_eq!(serde_json::to_string(&path).unwrap(), "\"2-0\"");
        let back: ChoicePath = serde_json::from_str("\"2-0\"").unwrap();
        assert_eq!(back, path);
        assert!(serde_json::from_str::<ChoicePath>("\"x\"").is_err());
    }

    #[test]
    fn advance_bumps_a_single_decision() {
        let taken = ChoicePath::from(vec![0, 4, 1]);
        assert_eq!(taken.advanced_at(0), Some(ChoicePath::from(vec![1, 4, 1])));
        assert_eq!(taken.advanced_at(1), Some(ChoicePath::from(vec![0, 5, 1])));
        assert_eq!(taken.advanced_at(3), None);
        assert_eq!(ChoicePath::from(vec![u32::MAX]).advanced_at(0), None);
    }
}
