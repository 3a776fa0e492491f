//! The `quizwise init` command.

use std::path::Path;

use anyhow::Result;

pub fn execute() -> Result<()> {
    if Path::new("quizwise.toml").exists() {
        println!("quizwise.toml already exists, skipping.");
    } else {
        std::fs::write("quizwise.toml", SAMPLE_CONFIG)?;
        println!("Created quizwise.toml");
    }

    if Path::new("questions.json").exists() {
        println!("questions.json already exists, skipping.");
    } else {
        std::fs::write("questions.json", SAMPLE_BANK)?;
        println!("Created questions.json");
    }

    println!("\nNext steps:");
    println!("  1. Add your own questions to questions.json");
    println!("  2. Run: quizwise validate");
    println!("  3. Run: quizwise start --questions 5");

    Ok(())
}

const SAMPLE_CONFIG: &str = r#"# quizwise configuration

question_bank = "questions.json"
stats_path = "quizwise-stats.json"
sessions_dir = ".quizwise-sessions"

[quiz]
total_questions = 40
duration_minutes = 0
mode = "practice"        # or "exam"
show_results = "immediate"  # or "end"
reveal_correct_answers = false
"#;

const SAMPLE_BANK: &str = r#"{
  "agents-1": {
    "prompt": "Which agent acts only on the current percept?",
    "choices": ["Simple reflex agent", "Model-based agent", "Goal-based agent", "Utility-based agent"],
    "correct_choice": "Simple reflex agent"
  },
  "search-1": {
    "prompt": "Which search strategy is complete and optimal with unit step costs?",
    "choices": ["Depth-first search", "Breadth-first search", "Greedy best-first search"],
    "correct_choice": "Breadth-first search"
  },
  "search-2": {
    "prompt": "A* is optimal when its heuristic is:",
    "choices": ["Admissible", "Negative", "Random", "Zero only at the start"],
    "correct_choice": "Admissible"
  },
  "logic-1": {
    "prompt": "Modus ponens infers Q from:",
    "choices": ["P and P => Q", "Q => P", "not P", "P or Q"],
    "correct_choice": "P and P => Q"
  },
  "ml-1": {
    "prompt": "Overfitting is usually detected by comparing:",
    "choices": ["Training and validation error", "Two training runs", "Learning rates"],
    "correct_choice": "Training and validation error"
  }
}
"#;
