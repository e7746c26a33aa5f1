use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// StepId
// ---------------------------------------------------------------------------

/// Identifier of one step in the ordered generation sequence.
///
/// Steps are written `step1`, `step2`, ... and ordered numerically, so
/// `step10` sorts after `step9`. Both the step's template and its output are
/// keyed by this identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct StepId(u32);

impl StepId {
    /// The first step of every project.
    pub const FIRST: StepId = StepId(1);

    /// Build a step id from its 1-based number.
    ///
    /// Returns `None` for zero.
    pub fn new(number: u32) -> Option<Self> {
        (number > 0).then_some(Self(number))
    }

    /// The 1-based step number.
    pub fn number(self) -> u32 {
        self.0
    }

    /// The step immediately after this one.
    pub fn next(self) -> Self {
        Self(self.0.saturating_add(1))
    }

    /// The step immediately before this one, if any.
    pub fn previous(self) -> Option<Self> {
        Self::new(self.0 - 1)
    }

    /// All steps strictly before this one, oldest first.
    pub fn predecessors(self) -> impl Iterator<Item = StepId> {
        (1..self.0).map(StepId)
    }
}

impl fmt::Display for StepId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "step{}", self.0)
    }
}

impl FromStr for StepId {
    type Err = StepIdParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        let digits = trimmed
            .get(..4)
            .filter(|prefix| prefix.eq_ignore_ascii_case("step"))
            .map(|_| &trimmed[4..])
            .ok_or_else(|| StepIdParseError(s.to_owned()))?;

        if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
            return Err(StepIdParseError(s.to_owned()));
        }

        digits
            .parse::<u32>()
            .ok()
            .and_then(StepId::new)
            .ok_or_else(|| StepIdParseError(s.to_owned()))
    }
}

impl TryFrom<String> for StepId {
    type Error = StepIdParseError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<StepId> for String {
    fn from(step: StepId) -> Self {
        step.to_string()
    }
}

/// Error returned when parsing an invalid [`StepId`] string.
#[derive(Debug, Clone)]
pub struct StepIdParseError(pub String);

impl fmt::Display for StepIdParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "invalid step id: {:?} (expected step1, step2, ...)", self.0)
    }
}

impl std::error::Error for StepIdParseError {}
