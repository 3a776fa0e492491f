//! quizwise configuration loading.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::session::SettingsRequest;

/// Default quiz settings used when a front end does not override them.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuizDefaults {
    #[serde(default = "default_total_questions")]
    pub total_questions: u32,
    #[serde(default)]
    pub duration_minutes: u32,
    #[serde(default = "default_mode")]
    pub mode: String,
    #[serde(default = "default_show_results")]
    pub show_results: String,
    #[serde(default)]
    pub reveal_correct_answers: bool,
}

fn default_total_questions() -> u32 {
    40
}
fn default_mode() -> String {
    "practice".to_string()
}
fn default_show_results() -> String {
    "immediate".to_string()
}

impl Default for QuizDefaults {
    fn default() -> Self {
        Self {
            total_questions: default_total_questions(),
            duration_minutes: 0,
            mode: default_mode(),
            show_results: default_show_results(),
            reveal_correct_answers: false,
        }
    }
}

impl QuizDefaults {
    pub fn to_request(&self) -> SettingsRequest {
        SettingsRequest {
            duration_minutes: self.duration_minutes,
            total_questions: self.total_questions,
            mode: self.mode.clone(),
            show_results: self.show_results.clone(),
            reveal_correct_answers: self.reveal_correct_answers,
        }
    }
}

/// Top-level quizwise configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuizwiseConfig {
    /// Question bank file (`.json` or `.toml`).
    #[serde(default = "default_question_bank")]
    pub question_bank: PathBuf,
    /// Statistics store file.
    #[serde(default = "default_stats_path")]
    pub stats_path: PathBuf,
    /// Directory holding one session file per client.
    #[serde(default = "default_sessions_dir")]
    pub sessions_dir: PathBuf,
    #[serde(default)]
    pub quiz: QuizDefaults,
}

fn default_question_bank() -> PathBuf {
    PathBuf::from("questions.json")
}
fn default_stats_path() -> PathBuf {
    PathBuf::from("quizwise-stats.json")
}
fn default_sessions_dir() -> PathBuf {
    PathBuf::from(".quizwise-sessions")
}

impl Default for QuizwiseConfig {
    fn default() -> Self {
        Self {
            question_bank: default_question_bank(),
            stats_path: default_stats_path(),
            sessions_dir: default_sessions_dir(),
            quiz: QuizDefaults::default(),
        }
    }
}

/// Resolve environment variable references like `${VAR_NAME}` in a string.
fn resolve_env_vars(s: &str) -> String {
    let mut result = s.to_string();
    let mut from = 0;
    while let Some(offset) = result[from..].find("${") {
        let start = from + offset;
        let Some(end) = result[start..].find('}') else {
            break;
        };
        let var_name = &result[start + 2..start + end];
        let value = std::env::var(var_name).unwrap_or_default();
        result = format!("{}{}{}", &result[..start], value, &result[start + end + 1..]);
        from = start + value.len();
    }
    result
}

fn resolve_path(path: &Path) -> PathBuf {
    PathBuf::from(resolve_env_vars(&path.to_string_lossy()))
}

/// Load config from an explicit path, or search the default locations:
/// `quizwise.toml` in the current directory, then
/// `~/.config/quizwise/config.toml`.
///
/// Environment variable overrides: `QUIZWISE_BANK`, `QUIZWISE_STATS`,
/// `QUIZWISE_SESSIONS`.
pub fn load_config_from(path: Option<&Path>) -> Result<QuizwiseConfig> {
    let config_path = if let Some(p) = path {
        if p.exists() {
            Some(p.to_path_buf())
        } else {
            anyhow::bail!("config file not found: {}", p.display());
        }
    } else {
        let local = PathBuf::from("quizwise.toml");
        if local.exists() {
            Some(local)
        } else {
            dirs_path()
                .map(|home| home.join("config.toml"))
                .filter(|global| global.exists())
        }
    };

    let mut config = match &config_path {
        Some(path) => parse_config(path)?,
        None => QuizwiseConfig::default(),
    };

    config.question_bank = resolve_path(&config.question_bank);
    config.stats_path = resolve_path(&config.stats_path);
    config.sessions_dir = resolve_path(&config.sessions_dir);

    // Relative paths in a config file are relative to that file.
    if let Some(base) = config_path.as_deref().and_then(Path::parent) {
        for p in [
            &mut config.question_bank,
            &mut config.stats_path,
            &mut config.sessions_dir,
        ] {
            if p.is_relative() && !base.as_os_str().is_empty() {
                *p = base.join(&*p);
            }
        }
    }

    // Apply env var overrides
    if let Ok(bank) = std::env::var("QUIZWISE_BANK") {
        config.question_bank = PathBuf::from(bank);
    }
    if let Ok(stats) = std::env::var("QUIZWISE_STATS") {
        config.stats_path = PathBuf::from(stats);
    }
    if let Ok(sessions) = std::env::var("QUIZWISE_SESSIONS") {
        config.sessions_dir = PathBuf::from(sessions);
    }

    Ok(config)
}

fn parse_config(path: &Path) -> Result<QuizwiseConfig> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read config: {}", path.display()))?;
    toml::from_str::<QuizwiseConfig>(&content)
        .with_context(|| format!("failed to parse config: {}", path.display()))
}

fn dirs_path() -> Option<PathBuf> {
    std::env::var("HOME")
        .ok()
        .map(|h| PathBuf::from(h).join(".config").join("quizwise"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn resolve_env_vars_basic() {
        std::env::set_var("_QUIZWISE_TEST_VAR", "data");
        assert_eq!(resolve_env_vars("${_QUIZWISE_TEST_VAR}"), "data");
        assert_eq!(
            resolve_env_vars("${_QUIZWISE_TEST_VAR}/bank.json"),
            "data/bank.json"
        );
        assert_eq!(resolve_env_vars("no vars"), "no vars");
        assert_eq!(resolve_env_vars("${unterminated"), "${unterminated");
        std::env::remove_var("_QUIZWISE_TEST_VAR");
    }

    #[test]
    fn default_config() {
        let config = QuizwiseConfig::default();
        assert_eq!(config.question_bank, PathBuf::from("questions.json"));
        assert_eq!(config.quiz.total_questions, 40);
        assert_eq!(config.quiz.mode, "practice");
    }

    #[test]
    fn parse_partial_config() {
        let toml_str = r#"
question_bank = "bank.toml"

[quiz]
total_questions = 10
mode = "exam"
duration_minutes = 15
"#;
        let config: QuizwiseConfig = toml::from_str(toml_str).unwrap();
        assert_eq!(config.question_bank, PathBuf::from("bank.toml"));
        assert_eq!(config.stats_path, PathBuf::from("quizwise-stats.json"));
        assert_eq!(config.quiz.total_questions, 10);
        assert_eq!(config.quiz.show_results, "immediate");

        let request = config.quiz.to_request();
        assert_eq!(request.mode, "exam");
        assert_eq!(request.duration_minutes, 15);
    }

    #[test]
    fn explicit_missing_config_is_an_error() {
        let result = load_config_from(Some(Path::new("/definitely/not/here.toml")));
        assert!(result.is_err());
    }

    #[test]
    fn relative_paths_follow_config_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("quizwise.toml");
        std::fs::write(&path, "question_bank = \"bank.json\"\n").unwrap();

        let config = load_config_from(Some(&path)).unwrap();
        assert_eq!(config.question_bank, dir.path().join("bank.json"));
        assert_eq!(config.stats_path, dir.path().join("quizwise-stats.json"));
    }
}
