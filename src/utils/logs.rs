use console::{measure_text_width, Style};
use std::path::Path;

use crate::evaluation::{EvaluationStatus, SubmissionReport};
use crate::scoring::CriterionMatch;
use crate::speech::{PauseMetrics, SpeechMetrics};

pub const TREE_BRANCH: char = '\u{251C}';
pub const TREE_END: char = '\u{2514}';
pub const TREE_HORIZ: char = '\u{2500}';

const TREE_PREFIX_WIDTH: usize = 4;
const VALUE_COLUMN: usize = 25;

fn tree_branch() -> String {
    dim()
        .apply_to(format!("{}{}{} ", TREE_BRANCH, TREE_HORIZ, TREE_HORIZ))
        .to_string()
}

fn tree_end() -> String {
    dim()
        .apply_to(format!("{}{}{} ", TREE_END, TREE_HORIZ, TREE_HORIZ))
        .to_string()
}

fn branch_for(index: usize, count: usize) -> String {
    if index + 1 == count {
        tree_end()
    } else {
        tree_branch()
    }
}

pub fn dim() -> Style {
    Style::new().dim()
}

fn blue() -> Style {
    Style::new().blue()
}

fn magenta() -> Style {
    Style::new().magenta()
}

fn cyan() -> Style {
    Style::new().cyan()
}

fn green() -> Style {
    Style::new().green()
}

fn red() -> Style {
    Style::new().red()
}

fn yellow() -> Style {
    Style::new().yellow()
}

fn bold() -> Style {
    Style::new().bold()
}

fn init_prefix() -> String {
    blue().apply_to("[INIT]").to_string()
}

fn embed_prefix() -> String {
    yellow().apply_to("[EMBED]").to_string()
}

fn worker_prefix() -> String {
    magenta().apply_to("[WORKER]").to_string()
}

fn db_prefix() -> String {
    cyan().apply_to("[DB]").to_string()
}

pub fn pad_label(label: &str, depth: usize) -> String {
    let prefix_width = depth * TREE_PREFIX_WIDTH;
    let target_width = VALUE_COLUMN.saturating_sub(prefix_width);
    let current_width = measure_text_width(label);
    if current_width < target_width {
        format!("{}{}", label, " ".repeat(target_width - current_width))
    } else {
        format!("{} ", label)
    }
}

pub fn format_signed(value: f32) -> String {
    let sign = if value >= 0.0 { "+" } else { "-" };
    format!("{}{:.2}", dim().apply_to(sign), value.abs())
}

pub fn log_init(database_url: &str, inbox_dir: &Path) {
    println!(
        "{} starting pitch-scorer on {}...",
        init_prefix(),
        cyan().apply_to(database_url),
    );
    println!(
        "{} watching {} for submissions.",
        init_prefix(),
        cyan().apply_to(inbox_dir.display()),
    );
}

pub fn log_settings_unwatched(error: &str) {
    println!(
        "{} {} {}",
        init_prefix(),
        yellow().apply_to("settings hot reload disabled:"),
        dim().apply_to(error)
    );
}

pub fn log_model_loading(model: &str) {
    println!("{} loading {}...", embed_prefix(), cyan().apply_to(model));
}

pub fn log_model_loaded(model: &str, secs: f32) {
    println!(
        "{} {} ready in {}",
        embed_prefix(),
        cyan().apply_to(model),
        bold().apply_to(format!("{secs:.1}s"))
    );
}

pub fn log_model_failed(reason: &str) {
    println!(
        "{} {} {}",
        embed_prefix(),
        red().apply_to("model failed to load:"),
        dim().apply_to(reason)
    );
}

pub fn log_db_ready() {
    println!("{} migrations applied, database ready.", db_prefix());
}

pub fn log_db_error(error: &str) {
    println!("{} {}", db_prefix(), red().apply_to(error));
}

pub fn log_job_started(submission_id: &str) {
    println!(
        "{} evaluating {}...",
        worker_prefix(),
        bold().apply_to(submission_id)
    );
}

pub fn log_job_done(report: &SubmissionReport) {
    println!(
        "{}{} {} (score: {})",
        tree_end(),
        status_style(report.status).apply_to(report.status),
        dim().apply_to(&report.submission_id),
        bold().apply_to(report.evaluation.score)
    );
}

pub fn log_job_timeout(submission_id: &str, secs: u64) {
    println!(
        "{}{} {} after {}s",
        tree_branch(),
        yellow().apply_to("timed out"),
        dim().apply_to(submission_id),
        secs
    );
}

pub fn log_job_rejected(path: &Path, error: &str) {
    println!(
        "{} {} {}: {}",
        worker_prefix(),
        red().apply_to("rejected"),
        dim().apply_to(path.display()),
        error
    );
}

pub fn log_worker_error(error: &str) {
    println!("{} {}", worker_prefix(), red().apply_to(error));
}

pub fn log_error(message: &str) {
    println!("{} {}", red().apply_to("[ERROR]"), message);
}

pub fn log_shutdown() {
    println!("{} shutting down.", worker_prefix());
}

fn status_style(status: EvaluationStatus) -> Style {
    match status {
        EvaluationStatus::Scored => green(),
        EvaluationStatus::Degraded => yellow(),
        EvaluationStatus::Unavailable => red(),
    }
}

fn score_style(score: u8) -> Style {
    match score {
        70.. => green(),
        40..=69 => yellow(),
        _ => red(),
    }
}

pub fn print_report(report: &SubmissionReport) {
    let mut lines: Vec<String> = Vec::new();
    let evaluation = &report.evaluation;

    lines.push(format!(
        "{} {} {}",
        magenta().apply_to(bold().apply_to("[SUBMISSION]")),
        dim().apply_to(&report.submission_id),
        status_style(report.status).apply_to(report.status)
    ));

    lines.push(String::new());
    lines.push(format!("{}", bold().apply_to("SEMANTIC")));
    if let Some(ref error) = evaluation.error {
        lines.push(format!("{}{}", tree_end(), red().apply_to(error)));
    } else {
        lines.push(format!(
            "{}{} {}",
            tree_branch(),
            pad_label("score", 1),
            score_style(evaluation.score).apply_to(evaluation.score)
        ));
        lines.push(format!(
            "{}{} {}",
            tree_branch(),
            pad_label("raw", 1),
            format_signed(evaluation.raw_score)
        ));
        let range = match evaluation.min_possible_score {
            Some(min) => format!(
                "{} .. {}",
                format_signed(min),
                format_signed(evaluation.max_possible_score)
            ),
            None => dim().apply_to("n/a").to_string(),
        };
        lines.push(format!("{}{} {}", tree_branch(), pad_label("range", 1), range));
        if evaluation.degraded_windows > 0 {
            lines.push(format!(
                "{}{} {}",
                tree_branch(),
                pad_label("degraded windows", 1),
                yellow().apply_to(evaluation.degraded_windows)
            ));
        }
        if !evaluation.skipped_criteria.is_empty() {
            lines.push(format!(
                "{}{} {}",
                tree_branch(),
                pad_label("skipped", 1),
                yellow().apply_to(evaluation.skipped_criteria.join(", "))
            ));
        }

        lines.push(format!("{}{}", tree_end(), pad_label("criteria", 1)));
        if evaluation.details.is_empty() {
            lines.push(format!("    {}{}", tree_end(), dim().apply_to("none")));
        }
        let count = evaluation.details.len();
        for (i, detail) in evaluation.details.iter().enumerate() {
            lines.push(format!("    {}{}", branch_for(i, count), format_criterion(detail)));
        }
    }

    if let Some(similarity) = report.similarity {
        lines.push(String::new());
        lines.push(format!("{}", bold().apply_to("IDEAL PITCH")));
        if similarity.degraded {
            lines.push(format!(
                "{}{}",
                tree_end(),
                yellow().apply_to("transcript could not be embedded")
            ));
        } else {
            lines.push(format!(
                "{}{} {}",
                tree_branch(),
                pad_label("score", 1),
                score_style(similarity.score).apply_to(similarity.score)
            ));
            lines.push(format!(
                "{}{} {}",
                tree_end(),
                pad_label("cosine", 1),
                format_signed(similarity.similarity)
            ));
        }
    }

    push_speech(&mut lines, &report.speech);
    if let Some(ref pauses) = report.pauses {
        push_pauses(&mut lines, pauses);
    }

    println!("{}\n", lines.join("\n"));
}

fn format_criterion(detail: &CriterionMatch) -> String {
    let mark = if detail.matched {
        green().apply_to("\u{2713}")
    } else {
        dim().apply_to("\u{2717}")
    };
    let mut line = format!(
        "{} {} {} {}",
        mark,
        pad_label(&format!("{} ({:+})", detail.keyword, detail.weight), 3),
        format_signed(detail.score),
        dim().apply_to(format!("sim {:.2}", detail.similarity))
    );
    if detail.degraded {
        line.push_str(&format!(" {}", yellow().apply_to("degraded")));
    }
    line
}

fn push_speech(lines: &mut Vec<String>, speech: &SpeechMetrics) {
    let overall = &speech.overall_metrics;
    lines.push(String::new());
    lines.push(format!("{}", bold().apply_to("SPEECH RATE")));
    lines.push(format!(
        "{}{} {}",
        tree_branch(),
        pad_label("words", 1),
        overall.total_words
    ));
    lines.push(format!(
        "{}{} {:.1}s",
        tree_branch(),
        pad_label("duration", 1),
        overall.total_duration
    ));
    lines.push(format!(
        "{}{} {}",
        tree_branch(),
        pad_label("average", 1),
        bold().apply_to(format!("{:.0} wpm", overall.average_rate))
    ));
    lines.push(format!("{}{}", tree_end(), pad_label("windows", 1)));
    if speech.window_metrics.is_empty() {
        lines.push(format!("    {}{}", tree_end(), dim().apply_to("none")));
    }
    let count = speech.window_metrics.len();
    for (i, window) in speech.window_metrics.iter().enumerate() {
        let style = if window.is_optimal { green() } else { yellow() };
        lines.push(format!(
            "    {}{} {} {}",
            branch_for(i, count),
            pad_label(&format!("{:.0}s-{:.0}s", window.start_time, window.end_time), 2),
            bold().apply_to(format!("{:.0} wpm", window.rate)),
            style.apply_to(window.pace)
        ));
    }
}

fn push_pauses(lines: &mut Vec<String>, pauses: &PauseMetrics) {
    lines.push(String::new());
    lines.push(format!(
        "{} {}",
        bold().apply_to("PAUSES"),
        dim().apply_to(format!("({})", pauses.mode))
    ));
    lines.push(format!(
        "{}{} {}",
        tree_branch(),
        pad_label("conversational", 1),
        bold().apply_to(format!("{:.0} wpm", pauses.conversational_rate))
    ));
    lines.push(format!(
        "{}{} {}%",
        tree_branch(),
        pad_label("speaking", 1),
        pauses.speaking_time_percent
    ));
    lines.push(format!(
        "{}{} {:.1}s",
        tree_branch(),
        pad_label("paused", 1),
        pauses.total_pause_time
    ));
    lines.push(format!("{}{}", tree_end(), pad_label("pauses", 1)));
    let counts = [
        ("short", pauses.short_pauses),
        ("medium", pauses.medium_pauses),
        ("long", pauses.long_pauses),
    ];
    for (i, (label, count)) in counts.iter().enumerate() {
        lines.push(format!(
            "    {}{} {}",
            branch_for(i, counts.len()),
            pad_label(label, 2),
            dim().apply_to(count)
        ));
    }
}
