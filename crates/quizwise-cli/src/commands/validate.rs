//! The `quizwise validate` command.

use std::path::{Path, PathBuf};

use anyhow::Result;
use quizwise_core::bank::{parse_questions, validate_questions};
use quizwise_core::config::load_config_from;

pub fn execute(bank: Option<PathBuf>, config_path: Option<&Path>) -> Result<()> {
    let path = match bank {
        Some(path) => path,
        None => load_config_from(config_path)?.question_bank,
    };

    let questions = parse_questions(&path)?;
    println!("Question bank: {} ({} questions)", path.display(), questions.len());

    let warnings = validate_questions(&questions);
    for w in &warnings {
        let prefix = w
            .question_id
            .as_ref()
            .map(|id| format!("  [{id}]"))
            .unwrap_or_else(|| "  ".to_string());
        println!("{prefix} WARNING: {}", w.message);
    }

    if warnings.is_empty() {
        println!("Question bank valid.");
    } else {
        println!("\n{} warning(s) found.", warnings.len());
    }

    Ok(())
}
