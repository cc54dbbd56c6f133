use serde::{Deserialize, Serialize};

use crate::model::ids::TestId;
use crate::model::level::Level;

/// Descriptive header of a practice test. The session level comes from here.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Topic {
    pub test_id: TestId,
    pub title: String,
    #[serde(default)]
    pub description: Option<String>,
    pub level: Level,
}

impl Topic {
    #[must_use]
    pub fn new(test_id: TestId, title: impl Into<String>, level: Level) -> Self {
        Self {
            test_id,
            title: title.into(),
            description: None,
            level,
        }
    }

    #[must_use]
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }
}
