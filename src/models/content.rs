use serde::{Deserialize, Serialize};

/// Outcome of classifying and rendering a piece of content. Not persisted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClassificationResult {
    pub is_markdown: bool,
    pub html: String,
}
