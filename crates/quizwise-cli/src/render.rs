//! Plain-text rendering of quiz views.

use quizwise_core::scorer::QuizReport;
use quizwise_core::session::format_duration;
use quizwise_core::view::PageView;
use quizwise_core::QuizView;

pub fn print_view(view: &QuizView) {
    match view {
        QuizView::AwaitingSettings => {
            println!("No quiz in progress. Run `quizwise start` to begin.");
        }
        QuizView::InProgress(page) => print_page(page),
        QuizView::Completed(report) => print_report(report),
    }
}

pub fn print_page(page: &PageView) {
    let mut header = format!(
        "Page {}/{} | {}/{} answered | {} mode",
        page.page, page.total_pages, page.answered_count, page.total_questions, page.mode
    );
    if let Some(left) = &page.time_remaining {
        header.push_str(&format!(" | {left} left"));
    }
    if let Some(score) = page.running_score {
        header.push_str(&format!(
            " | {} correct, {} incorrect",
            score.correct, score.incorrect
        ));
    }
    println!("{header}");

    for question in &page.questions {
        println!();
        println!("{}. {}", question.position, question.prompt);
        for (index, choice) in question.choices.iter().enumerate() {
            let marker = if question.selected.as_deref() == Some(choice.as_str()) {
                '*'
            } else {
                ' '
            };
            println!("  {marker} {}) {choice}", choice_letter(index));
        }
        match (question.correct, &question.correct_choice) {
            (Some(true), _) => println!("    Correct"),
            (Some(false), Some(answer)) => println!("    Incorrect (answer: {answer})"),
            (Some(false), None) => println!("    Incorrect"),
            (None, _) => {}
        }
    }

    println!();
    let mut hints = Vec::new();
    if page.has_prev() {
        hints.push("prev");
    }
    if page.has_next() {
        hints.push("next");
    }
    if page.all_answered() {
        hints.push("finish");
    }
    if !hints.is_empty() {
        println!("Commands: {}", hints.join(", "));
    }
}

pub fn print_report(report: &QuizReport) {
    if report.timed_out {
        println!("Time is up.");
    }
    println!(
        "Score: {}% ({} correct, {} incorrect, {} unanswered)",
        report.score, report.correct_count, report.incorrect_count, report.unanswered_count
    );
    if let Some(secs) = report.elapsed_secs {
        println!(
            "Time taken: {}",
            format_duration(chrono::Duration::seconds(secs))
        );
    }

    let Some(details) = &report.details else {
        return;
    };
    println!();
    for outcome in details {
        let status = match (&outcome.selected, outcome.is_correct) {
            (None, _) => "unanswered",
            (Some(_), true) => "correct",
            (Some(_), false) => "incorrect",
        };
        println!("{}. {} [{status}]", outcome.position, outcome.prompt);
        if let Some(selected) = &outcome.selected {
            println!("    your answer: {selected}");
        }
        if !outcome.is_correct {
            println!("    correct answer: {}", outcome.correct_choice);
        }
    }
}

fn choice_letter(index: usize) -> char {
    u8::try_from(index)
        .ok()
        .filter(|i| *i < 26)
        .map(|i| (b'a' + i) as char)
        .unwrap_or('?')
}
