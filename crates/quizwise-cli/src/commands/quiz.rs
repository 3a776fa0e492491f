//! Quiz lifecycle commands: start, show, answer, navigate, finish, report, reset.

use std::path::Path;

use anyhow::{bail, Context, Result};
use quizwise_core::session::Navigation;
use quizwise_core::view::PageView;
use quizwise_core::{FinishOutcome, QuizView};

use super::open_engine;
use crate::render;

/// Command-line overrides for the configured quiz defaults.
pub struct StartOptions {
    pub questions: Option<u32>,
    pub minutes: Option<u32>,
    pub mode: Option<String>,
    pub show_results: Option<String>,
    pub reveal: bool,
}

pub fn start(config_path: Option<&Path>, client: &str, options: StartOptions) -> Result<()> {
    let (config, engine) = open_engine(config_path)?;

    let mut request = config.quiz.to_request();
    if let Some(questions) = options.questions {
        request.total_questions = questions;
    }
    if let Some(minutes) = options.minutes {
        request.duration_minutes = minutes;
    }
    if let Some(mode) = options.mode {
        request.mode = mode;
    }
    if let Some(policy) = options.show_results {
        request.show_results = policy;
    }
    request.reveal_correct_answers |= options.reveal;

    let page = engine.start(client, &request)?;
    render::print_page(&page);
    Ok(())
}

pub fn show(config_path: Option<&Path>, client: &str) -> Result<()> {
    let (_, engine) = open_engine(config_path)?;
    render::print_view(&engine.view(client)?);
    Ok(())
}

pub fn answer(config_path: Option<&Path>, client: &str, raw: &[String]) -> Result<()> {
    let (_, engine) = open_engine(config_path)?;

    let page = match engine.view(client)? {
        QuizView::InProgress(page) => Some(page),
        _ => None,
    };

    let mut answers = Vec::with_capacity(raw.len());
    for item in raw {
        let (position, choice) = parse_answer(item)?;
        let choice = match &page {
            Some(page) => resolve_choice(page, position, choice),
            None => choice.to_string(),
        };
        answers.push((position, choice));
    }

    let view = engine.submit(client, answers)?;
    render::print_view(&view);
    Ok(())
}

pub fn navigate(config_path: Option<&Path>, client: &str, target: Navigation) -> Result<()> {
    let (_, engine) = open_engine(config_path)?;
    render::print_view(&engine.navigate(client, target)?);
    Ok(())
}

pub fn finish(config_path: Option<&Path>, client: &str) -> Result<()> {
    let (_, engine) = open_engine(config_path)?;
    match engine.finish(client)? {
        FinishOutcome::Completed(report) => render::print_report(&report),
        FinishOutcome::Incomplete { unanswered, page } => {
            let list: Vec<String> = unanswered.iter().map(usize::to_string).collect();
            println!(
                "{} question(s) still unanswered: {}",
                unanswered.len(),
                list.join(", ")
            );
            println!();
            render::print_page(&page);
        }
    }
    Ok(())
}

pub fn report(config_path: Option<&Path>, client: &str, format: &str) -> Result<()> {
    let (_, engine) = open_engine(config_path)?;
    let report = engine.report(client)?;
    match format {
        "text" => render::print_report(&report),
        "json" => println!(
            "{}",
            serde_json::to_string_pretty(&report).context("failed to serialize report")?
        ),
        other => bail!("unknown report format '{other}' (expected text or json)"),
    }
    Ok(())
}

pub fn reset(config_path: Option<&Path>, client: &str) -> Result<()> {
    let (_, engine) = open_engine(config_path)?;
    engine.reset(client)?;
    println!("Quiz reset. Run `quizwise start` to begin a new one.");
    Ok(())
}

/// Split `POS=CHOICE`.
fn parse_answer(raw: &str) -> Result<(usize, &str)> {
    let Some((position, choice)) = raw.split_once('=') else {
        bail!("invalid answer '{raw}' (expected POSITION=CHOICE)");
    };
    let position = position
        .trim()
        .parse()
        .with_context(|| format!("invalid question position in '{raw}'"))?;
    Ok((position, choice.trim()))
}

/// Map a choice letter to its text when it names no choice verbatim.
fn resolve_choice(page: &PageView, position: usize, choice: &str) -> String {
    let Some(question) = page.questions.iter().find(|q| q.position == position) else {
        return choice.to_string();
    };
    if question.choices.iter().any(|c| c == choice) {
        return choice.to_string();
    }
    let mut chars = choice.chars();
    match (chars.next(), chars.next()) {
        (Some(letter), None) if letter.is_ascii_alphabetic() => {
            let index = (letter.to_ascii_lowercase() as u8 - b'a') as usize;
            question
                .choices
                .get(index)
                .cloned()
                .unwrap_or_else(|| choice.to_string())
        }
        _ => choice.to_string(),
    }
}
