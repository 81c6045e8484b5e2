use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::Path;

/// One interview prompt
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Question {
    pub id: u32,
    pub text: String,
    #[serde(rename = "type", default)]
    pub kind: String,
    #[serde(default)]
    pub difficulty: String,
    #[serde(default)]
    pub job_field: String,
}

impl Question {
    pub fn new(id: u32, text: impl Into<String>) -> Self {
        Self {
            id,
            text: text.into(),
            kind: String::new(),
            difficulty: String::new(),
            job_field: String::new(),
        }
    }
}

/// Supplies the ordered prompts for a role
#[async_trait::async_trait]
pub trait QuestionSource: Send + Sync {
    async fn questions_for(&self, job_id: &str) -> Result<Vec<Question>>;
}

/// Question banks keyed by job reference, with a fallback bank
#[derive(Debug, Clone, Default, Deserialize)]
pub struct StaticQuestionSource {
    #[serde(default)]
    banks: HashMap<String, Vec<Question>>,
    #[serde(default)]
    fallback: Vec<Question>,
}

impl StaticQuestionSource {
    pub fn new(fallback: Vec<Question>) -> Self {
        Self {
            banks: HashMap::new(),
            fallback,
        }
    }

    pub fn with_bank(mut self, job_id: impl Into<String>, questions: Vec<Question>) -> Self {
        self.banks.insert(job_id.into(), questions);
        self
    }

    /// Load `{"banks": {job_id: [...]}, "fallback": [...]}` from disk
    pub fn from_json_file(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read question bank {}", path.display()))?;
        serde_json::from_str(&raw).context("Failed to parse question bank")
    }
}

#[async_trait::async_trait]
impl QuestionSource for StaticQuestionSource {
    async fn questions_for(&self, job_id: &str) -> Result<Vec<Question>> {
        Ok(self
            .banks
            .get(job_id)
            .cloned()
            .unwrap_or_else(|| self.fallback.clone()))
    }
}

impl StaticQuestionSource {
    /// General-purpose prompts used when no bank is configured
    pub fn builtin() -> Self {
        Self::new(vec![
            Question::new(1, "Tell me about yourself and what drew you to this role."),
            Question::new(2, "Describe a recent project you are proud of and your part in it."),
            Question::new(3, "Tell me about a time you disagreed with a teammate. How did you resolve it?"),
            Question::new(4, "How do you decide what to work on when everything seems urgent?"),
            Question::new(5, "What would you want to learn or improve in your first six months here?"),
        ])
    }
}
