use serde::{Deserialize, Serialize};

use super::enums::TestOutcome;

/// One test-result notification posted by a pytest worker.
///
/// Field names match the JSON body the publishing plugin sends.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResultEvent {
    /// Test name, rendered as a column of the run table.
    pub name: String,
    /// xdist group the test was scheduled in, rendered as a row.
    pub xdist_scope: String,
    pub result: TestOutcome,
    /// Artifact directory or file the test produced, if any.
    #[serde(default)]
    pub pubdir_path: Option<String>,
}

impl ResultEvent {
    pub fn new(name: impl Into<String>, xdist_scope: impl Into<String>, result: TestOutcome) -> Self {
        Self {
            name: name.into(),
            xdist_scope: xdist_scope.into(),
            result,
            pubdir_path: None,
        }
    }

    pub fn with_artifact(mut self, path: impl Into<String>) -> Self {
        self.pubdir_path = Some(path.into());
        self
    }
}
