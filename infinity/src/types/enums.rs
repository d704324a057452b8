use std::fmt;

use serde::{Deserialize, Deserializer, Serialize};

/// Coarse outcome of a single test as published by a worker.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum TestOutcome {
    #[default]
    Success,
    Fail,
    Skip,
}

impl TestOutcome {
    /// Parse the `result` string sent by the pytest plugin.
    ///
    /// Only `"fail"` and `"skip"` are recognized. Every other value lands in
    /// the success bucket, matching what the plugin has always been read as.
    pub fn from_wire(value: &str) -> Self {
        match value {
            "fail" => TestOutcome::Fail,
            "skip" => TestOutcome::Skip,
            _ => TestOutcome::Success,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            TestOutcome::Success => "success",
            TestOutcome::Fail => "fail",
            TestOutcome::Skip => "skip",
        }
    }
}

impl fmt::Display for TestOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for TestOutcome {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let raw = String::deserialize(deserializer)?;
        Ok(TestOutcome::from_wire(&raw))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_outcome_from_wire_known_values() {
        assert_eq!(TestOutcome::from_wire("fail"), TestOutcome::Fail);
        assert_eq!(TestOutcome::from_wire("skip"), TestOutcome::Skip);
        assert_eq!(TestOutcome::from_wire("success"), TestOutcome::Success);
    }

    #[test]
    fn test_outcome_from_wire_falls_back_to_success() {
        assert_eq!(TestOutcome::from_wire("passed"), TestOutcome::Success);
        assert_eq!(TestOutcome::from_wire("xfail"), TestOutcome::Success);
        assert_eq!(TestOutcome::from_wire(""), TestOutcome::Success);
        // Matching is exact, like the plugin's own comparison.
        assert_eq!(TestOutcome::from_wire("FAIL"), TestOutcome::Success);
    }

    #[test]
    fn test_outcome_serde() {
        let json = serde_json::to_string(&TestOutcome::Skip).unwrap();
        assert_eq!(json, "\"skip\"");

        let parsed: TestOutcome = serde_json::from_str("\"fail\"").unwrap();
        assert_eq!(parsed, TestOutcome::Fail);

        let parsed: TestOutcome = serde_json::from_str("\"error\"").unwrap();
        assert_eq!(parsed, TestOutcome::Success);

        assert!(serde_json::from_str::<TestOutcome>("3").is_err());
    }

    #[test]
    fn test_outcome_display() {
        assert_eq!(TestOutcome::Success.to_string(), "success");
        assert_eq!(TestOutcome::Fail.to_string(), "fail");
        assert_eq!(TestOutcome::Skip.to_string(), "skip");
    }
}
