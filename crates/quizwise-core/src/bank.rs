//! Question bank: the immutable question store and its loaders.
//!
//! A bank is loaded once per process from a JSON or TOML file and never
//! mutated afterwards. Consumers must tolerate ids that are no longer
//! present, since the file may shrink between loads.

use std::collections::{BTreeMap, HashSet};
use std::path::Path;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

/// A single multiple-choice question.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Question {
    /// Stable identifier.
    pub id: String,
    /// The question text.
    pub prompt: String,
    /// Options in display order.
    pub choices: Vec<String>,
    /// Exact text of the correct option.
    pub correct_choice: String,
}

impl Question {
    /// Whether `answer` matches the correct choice exactly.
    pub fn is_correct(&self, answer: &str) -> bool {
        self.correct_choice == answer
    }

    /// Reasons this question cannot be served, if any.
    pub fn problems(&self) -> Vec<String> {
        let mut problems = Vec::new();
        if self.prompt.trim().is_empty() {
            problems.push("prompt is empty".to_string());
        }
        if self.choices.len() < 2 {
            problems.push(format!(
                "needs at least 2 choices, found {}",
                self.choices.len()
            ));
        }
        if !self.choices.contains(&self.correct_choice) {
            problems.push(format!(
                "correct choice '{}' is not one of the choices",
                self.correct_choice
            ));
        }
        problems
    }
}

/// Immutable id → question mapping, iterated in id order.
#[derive(Debug, Clone, Default)]
pub struct QuestionBank {
    questions: BTreeMap<String, Question>,
}

impl QuestionBank {
    /// Build a bank, skipping questions that violate their invariants.
    ///
    /// When an id occurs twice the later entry wins.
    pub fn new(questions: impl IntoIterator<Item = Question>) -> Self {
        let mut map = BTreeMap::new();
        for question in questions {
            let problems = question.problems();
            if !problems.is_empty() {
                tracing::warn!(
                    "skipping question {}: {}",
                    question.id,
                    problems.join("; ")
                );
                continue;
            }
            map.insert(question.id.clone(), question);
        }
        Self { questions: map }
    }

    pub fn get(&self, id: &str) -> Option<&Question> {
        self.questions.get(id)
    }

    pub fn contains(&self, id: &str) -> bool {
        self.questions.contains_key(id)
    }

    /// All question ids in sorted order.
    pub fn ids(&self) -> Vec<String> {
        self.questions.keys().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.questions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.questions.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Question> {
        self.questions.values()
    }
}

/// JSON entry body; the id is the enclosing object key.
#[derive(Debug, Deserialize)]
struct JsonQuestion {
    prompt: String,
    choices: Vec<String>,
    correct_choice: String,
}

/// Intermediate TOML structure for bank files.
#[derive(Debug, Deserialize)]
struct TomlBankFile {
    #[serde(default)]
    questions: Vec<Question>,
}

/// Supported bank file formats.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BankFormat {
    Json,
    Toml,
}

impl BankFormat {
    /// Pick the format from a file extension; anything but `.toml` is JSON.
    pub fn from_path(path: &Path) -> Self {
        if path.extension().is_some_and(|ext| ext == "toml") {
            BankFormat::Toml
        } else {
            BankFormat::Json
        }
    }
}

/// Parse raw questions from a string without enforcing invariants.
pub fn parse_questions_str(
    content: &str,
    format: BankFormat,
    source_path: &Path,
) -> Result<Vec<Question>> {
    match format {
        BankFormat::Json => {
            let parsed: BTreeMap<String, JsonQuestion> = serde_json::from_str(content)
                .with_context(|| format!("failed to parse JSON: {}", source_path.display()))?;
            Ok(parsed
                .into_iter()
                .map(|(id, q)| Question {
                    id,
                    prompt: q.prompt,
                    choices: q.choices,
                    correct_choice: q.correct_choice,
                })
                .collect())
        }
        BankFormat::Toml => {
            let parsed: TomlBankFile = toml::from_str(content)
                .with_context(|| format!("failed to parse TOML: {}", source_path.display()))?;
            Ok(parsed.questions)
        }
    }
}

/// Read raw questions from a bank file.
pub fn parse_questions(path: &Path) -> Result<Vec<Question>> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read question bank: {}", path.display()))?;
    parse_questions_str(&content, BankFormat::from_path(path), path)
}

/// Load a question bank, dropping malformed questions with a warning.
pub fn load_bank(path: &Path) -> Result<QuestionBank> {
    let questions = parse_questions(path)?;
    let bank = QuestionBank::new(questions);
    tracing::debug!("loaded {} questions from {}", bank.len(), path.display());
    Ok(bank)
}

/// A warning from bank validation.
#[derive(Debug, Clone)]
pub struct ValidationWarning {
    /// The question ID (if applicable).
    pub question_id: Option<String>,
    /// Warning message.
    pub message: String,
}

/// Validate raw questions for common issues.
pub fn validate_questions(questions: &[Question]) -> Vec<ValidationWarning> {
    let mut warnings = Vec::new();

    if questions.is_empty() {
        warnings.push(ValidationWarning {
            question_id: None,
            message: "bank contains no questions".into(),
        });
    }

    let mut seen_ids = HashSet::new();
    for question in questions {
        if !seen_ids.insert(&question.id) {
            warnings.push(ValidationWarning {
                question_id: Some(question.id.clone()),
                message: format!("duplicate question ID: {}", question.id),
            });
        }
    }

    for question in questions {
        for problem in question.problems() {
            warnings.push(ValidationWarning {
                question_id: Some(question.id.clone()),
                message: problem,
            });
        }

        let mut seen_choices = HashSet::new();
        for choice in &question.choices {
            if !seen_choices.insert(choice) {
                warnings.push(ValidationWarning {
                    question_id: Some(question.id.clone()),
                    message: format!("duplicate choice: {choice}"),
                });
            }
        }
    }

    warnings
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    const VALID_JSON: &str = r#"{
        "1": {
            "prompt": "Capital of France?",
            "choices": ["Paris", "Lyon", "Nice"],
            "correct_choice": "Paris"
        },
        "2": {
            "prompt": "2 + 2?",
            "choices": ["3", "4"],
            "correct_choice": "4"
        }
    }"#;

    const VALID_TOML: &str = r#"
[[questions]]
id = "rust-1"
prompt = "Which keyword declares an immutable binding?"
choices = ["let", "var", "const mut"]
correct_choice = "let"
"#;

    fn question(id: &str, choices: &[&str], correct: &str) -> Question {
        Question {
            id: id.into(),
            prompt: format!("Question {id}"),
            choices: choices.iter().map(|c| c.to_string()).collect(),
            correct_choice: correct.into(),
        }
    }

    #[test]
    fn parse_json_bank() {
        let questions =
            parse_questions_str(VALID_JSON, BankFormat::Json, &PathBuf::from("q.json")).unwrap();
        let bank = QuestionBank::new(questions);
        assert_eq!(bank.len(), 2);
        assert_eq!(bank.ids(), vec!["1", "2"]);
        assert!(bank.get("1").unwrap().is_correct("Paris"));
        assert!(!bank.get("1").unwrap().is_correct("paris"));
    }

    #[test]
    fn parse_toml_bank() {
        let questions =
            parse_questions_str(VALID_TOML, BankFormat::Toml, &PathBuf::from("q.toml")).unwrap();
        assert_eq!(questions.len(), 1);
        assert_eq!(questions[0].id, "rust-1");
        assert_eq!(questions[0].choices.len(), 3);
    }

    #[test]
    fn format_from_extension() {
        assert_eq!(BankFormat::from_path(Path::new("a.toml")), BankFormat::Toml);
        assert_eq!(BankFormat::from_path(Path::new("a.json")), BankFormat::Json);
        assert_eq!(BankFormat::from_path(Path::new("bank")), BankFormat::Json);
    }

    #[test]
    fn malformed_questions_are_skipped() {
        let bank = QuestionBank::new(vec![
            question("ok", &["a", "b"], "a"),
            question("one-choice", &["a"], "a"),
            question("bad-answer", &["a", "b"], "c"),
        ]);
        assert_eq!(bank.ids(), vec!["ok"]);
        assert!(!bank.contains("bad-answer"));
    }

    #[test]
    fn validate_reports_problems() {
        let warnings = validate_questions(&[
            question("1", &["a", "b"], "a"),
            question("1", &["a", "a"], "z"),
        ]);
        assert!(warnings.iter().any(|w| w.message.contains("duplicate question ID")));
        assert!(warnings.iter().any(|w| w.message.contains("duplicate choice")));
        assert!(warnings.iter().any(|w| w.message.contains("not one of the choices")));
    }

    #[test]
    fn validate_empty_bank() {
        let warnings = validate_questions(&[]);
        assert_eq!(warnings.len(), 1);
        assert!(warnings[0].question_id.is_none());
    }

    #[test]
    fn parse_malformed_json() {
        let result = parse_questions_str("{ nope", BankFormat::Json, &PathBuf::from("bad.json"));
        assert!(result.is_err());
    }

    #[test]
    fn load_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bank.json");
        std::fs::write(&path, VALID_JSON).unwrap();

        let bank = load_bank(&path).unwrap();
        assert_eq!(bank.len(), 2);
        assert!(load_bank(&dir.path().join("missing.json")).is_err());
    }
}
