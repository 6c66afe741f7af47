//! Benchmark questions with reference answers
//!
//! Question sets are ordered JSON files; the harness treats them as opaque
//! input and truncates to the requested sample count.
//!
//! ## Question File Format (JSON)
//!
//! ```json
//! {
//!   "metadata": {
//!     "name": "my-questions",
//!     "description": "Custom question set",
//!     "version": "1.0"
//!   },
//!   "questions": [
//!     {
//!       "question": "What is the capital of Australia?",
//!       "expected": "Canberra",
//!       "category": "factual"
//!     }
//!   ]
//! }
//! ```
//!
//! A TruthfulQA-style subset of 30 questions ships with the binary and is
//! used when no question file is given.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Embedded default question set
const TRUTHFULQA_JSON: &str = include_str!("../data/truthfulqa.json");

/// A single benchmark question with its reference answer
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EvalQuestion {
    /// Question text submitted to the service
    pub question: String,
    /// Reference answer used for lexical scoring
    pub expected: String,
    /// Free-form category tag (e.g. "factual", "misconceptions")
    #[serde(default)]
    pub category: String,
}

/// Metadata about a question file
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QuestionFileMetadata {
    /// Name of the question set
    pub name: String,
    /// Optional description
    #[serde(default)]
    pub description: String,
    /// Optional version
    #[serde(default)]
    pub version: String,
}

/// A complete question file that can be loaded from JSON
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QuestionFile {
    /// Metadata about the question set
    pub metadata: QuestionFileMetadata,
    /// The questions, in evaluation order
    pub questions: Vec<EvalQuestion>,
}

impl QuestionFile {
    /// Load questions from a JSON file
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read question file: {}", path.display()))?;

        let file: QuestionFile = serde_json::from_str(&content)
            .with_context(|| format!("Failed to parse question file: {}", path.display()))?;

        file.validate()?;
        Ok(file)
    }

    /// The built-in TruthfulQA-style subset
    pub fn builtin() -> Result<Self> {
        let file: QuestionFile = serde_json::from_str(TRUTHFULQA_JSON)
            .context("Failed to parse embedded question set")?;
        Ok(file)
    }

    /// Save questions to a JSON file
    pub fn save(&self, path: &Path) -> Result<()> {
        let content =
            serde_json::to_string_pretty(self).context("Failed to serialize question file")?;

        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        std::fs::write(path, content)
            .with_context(|| format!("Failed to write question file: {}", path.display()))?;

        Ok(())
    }

    /// Check that every question is usable for scoring
    pub fn validate(&self) -> Result<()> {
        for (i, q) in self.questions.iter().enumerate() {
            if q.question.is_empty() {
                anyhow::bail!("Question {} has empty question text", i);
            }
            if q.expected.is_empty() {
                anyhow::bail!("Question '{}' has no expected answer", q.question);
            }
        }
        Ok(())
    }

    /// First `samples` questions, in order (the whole set if it is shorter)
    pub fn take(&self, samples: usize) -> &[EvalQuestion] {
        &self.questions[..self.questions.len().min(samples)]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builtin_set_loads() {
        let file = QuestionFile::builtin().unwrap();
        assert_eq!(file.questions.len(), 30);
        assert!(file.validate().is_ok());
    }

    #[test]
    fn test_builtin_set_has_categories() {
        let file = QuestionFile::builtin().unwrap();
        assert!(file.questions.iter().any(|q| q.category == "factual"));
        assert!(file.questions.iter().any(|q| q.category == "misconceptions"));
    }

    #[test]
    fn test_take_truncates_in_order() {
        let file = QuestionFile::builtin().unwrap();
        let subset = file.take(5);
        assert_eq!(subset.len(), 5);
        assert_eq!(subset[0].question, file.questions[0].question);

        // Asking for more than exists returns the whole set
        assert_eq!(file.take(1000).len(), 30);
    }

    #[test]
    fn test_validate_rejects_empty_fields() {
        let file = QuestionFile {
            metadata: QuestionFileMetadata {
                name: "bad".to_string(),
                description: String::new(),
                version: String::new(),
            },
            questions: vec![EvalQuestion {
                question: "Why?".to_string(),
                expected: String::new(),
                category: String::new(),
            }],
        };
        assert!(file.validate().is_err());
    }
}
