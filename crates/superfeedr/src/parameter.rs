use std::error::Error;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// The name of the verification mode parameter.
pub const VERIFY: &str = "verify";

/// The name of the notification format parameter.
pub const FORMAT: &str = "format";

/// The enumerated parameters accepted by the hub.
///
/// Maps each parameter name to the lowercase values it accepts.
#[derive(Copy, Clone, Debug)]
pub struct ParameterSchema(&'static [(&'static str, &'static [&'static str])]);

/// The parameter schema of the Superfeedr hub.
pub const PARAMETERS: ParameterSchema = ParameterSchema(&[
    (VERIFY, &["async", "sync"]),
    (FORMAT, &["json", "atom"]),
]);

/// Whether the hub verifies the intent of a (un)subscription before replying
/// or after.
#[derive(Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Hash, Debug, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Verify {
    Sync,
    Async,
}

/// The format notifications are delivered in.
#[derive(Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Hash, Debug, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Format {
    /// JSON, for feeds only.
    Json,
    /// Atom, the default for any feed.
    Atom,
}

/// The error type returned when parsing an enumerated parameter fails.
#[derive(Debug)]
#[non_exhaustive]
pub struct ParseParameterError {
    name: &'static str,
}

impl ParameterSchema {
    /// Returns the accepted values of the parameter `name`, if it is known.
    pub fn values(&self, name: &str) -> Option<&'static [&'static str]> {
        self.0
            .iter()
            .find(|(known, _)| *known == name)
            .map(|(_, values)| *values)
    }

    /// Checks `value` against the accepted values of the parameter `name`.
    ///
    /// Unknown parameters never match. The comparison is case-insensitive and
    /// a missing value never matches.
    ///
    /// # Example
    ///
    /// ```
    /// use superfeedr::parameter::PARAMETERS;
    ///
    /// assert!(PARAMETERS.check("verify", Some("ASYNC")));
    /// assert!(!PARAMETERS.check("verify", None));
    /// assert!(!PARAMETERS.check("mode", Some("subscribe")));
    /// ```
    pub fn check(&self, name: &str, value: Option<&str>) -> bool {
        let Some(values) = self.values(name) else {
            return false;
        };
        let value = value.unwrap_or_default().to_lowercase();

        values.contains(&value.as_str())
    }
}

/// Checks `value` against [`PARAMETERS`].
pub fn check_parameter(name: &str, value: Option<&str>) -> bool {
    PARAMETERS.check(name, value)
}

impl Verify {
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Sync => "sync",
            Self::Async => "async",
        }
    }
}

impl Format {
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Json => "json",
            Self::Atom => "atom",
        }
    }
}

impl FromStr for Verify {
    type Err = ParseParameterError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if !check_parameter(VERIFY, Some(s)) {
            return Err(ParseParameterError { name: VERIFY });
        }

        Ok(if s.eq_ignore_ascii_case("sync") {
            Self::Sync
        } else {
            Self::Async
        })
    }
}

impl FromStr for Format {
    type Err = ParseParameterError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if !check_parameter(FORMAT, Some(s)) {
            return Err(ParseParameterError { name: FORMAT });
        }

        Ok(if s.eq_ignore_ascii_case("json") {
            Self::Json
        } else {
            Self::Atom
        })
    }
}

impl From<Verify> for String {
    fn from(verify: Verify) -> Self {
        verify.as_str().to_owned()
    }
}

impl From<Format> for String {
    fn from(format: Format) -> Self {
        format.as_str().to_owned()
    }
}

impl fmt::Display for Verify {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{value}", value = self.as_str())
    }
}

impl fmt::Display for Format {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{value}", value = self.as_str())
    }
}

impl fmt::Display for ParseParameterError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let values = PARAMETERS.values(self.name).unwrap_or_default();
        write!(
            f,
            "{name} must be one of: {values}",
            name = self.name,
            values = values.join(", ")
        )
    }
}

impl Error for ParseParameterError {}

impl ParseParameterError {
    /// Returns the name of the parameter that failed to parse.
    #[must_use]
    pub const fn name(&self) -> &'static str {
        self.name
    }
}
