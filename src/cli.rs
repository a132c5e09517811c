/**
 * The command-line front end: taking practice sessions and exams, and reporting on
 * past attempts.
 */
use std::io;
use std::time::{Duration, Instant};

use colored::*;

use super::bank::QuestionBank;
use super::common::{Command, Mode, Options, QuizError, Result, StoreKind, Topic};
use super::engine::{Clock, EngineConfig, QuizEngine, Shuffler, SystemClock, ThreadShuffler};
use super::iohelper::{prettyprint, prettyprint_colored, prompt, yesno, Readline};
use super::persistence::{
    self, JsonFileStore, RecordStore, SqliteStore, EXAMS_KEY, PROGRESS_KEY,
};
use super::results::SessionResult;
use super::stats;
use super::timer::format_clock;

const LETTERS: &str = "abcd";

/// Run the subcommand in `options`.
pub fn run<W: io::Write, R: Readline>(
    writer: &mut W,
    reader: &mut R,
    options: Options,
) -> Result<()> {
    if options.no_color {
        colored::control::set_override(false);
    }

    let store = open_store(&options)?;
    let bank = QuestionBank::builtin()?;
    match options.cmd {
        Command::Practice(practice) => {
            let mut engine = QuizEngine::new(bank, store);
            main_practice(writer, reader, &mut engine, practice.topic)
        }
        Command::Exam(exam) => {
            let config = EngineConfig {
                exam_seconds: exam.minutes.saturating_mul(60).max(1),
                ..EngineConfig::default()
            };
            let mut engine = QuizEngine::with_collaborators(
                bank,
                store,
                SystemClock,
                ThreadShuffler,
                config,
            );
            main_exam(writer, reader, &mut engine, exam.topic)
        }
        Command::Dashboard => main_dashboard(writer, &store, &bank, &SystemClock),
        Command::History(history) => {
            main_history(writer, &store, history.num_to_show, history.exams_only)
        }
        Command::Topics => main_topics(writer, &bank),
    }
}

/// Open the record store selected on the command line, creating the data directory if
/// necessary.
pub fn open_store(options: &Options) -> Result<Box<dyn RecordStore>> {
    let dir = persistence::require_app_dir_path(options.directory.as_deref())?;
    let store: Box<dyn RecordStore> = match options.store {
        StoreKind::Json => Box::new(JsonFileStore::new(dir)),
        StoreKind::Sqlite => Box::new(SqliteStore::open(dir.join("records.db"))?),
    };
    Ok(store)
}

/// The main function for the `practice` subcommand.
pub fn main_practice<W, R, S, C, X>(
    writer: &mut W,
    reader: &mut R,
    engine: &mut QuizEngine<S, C, X>,
    topic: Topic,
) -> Result<()>
where
    W: io::Write,
    R: Readline,
    S: RecordStore,
    C: Clock,
    X: Shuffler,
{
    let session = engine.start_session(topic, Mode::Practice)?;
    let header = format!(
        "Practice: {} ({}, {} questions)",
        topic,
        session.difficulty().map(|d| d.as_str()).unwrap_or("mixed"),
        session.queue().len()
    );
    prettyprint_colored(writer, &header, "", Some(Color::BrightBlue), None)?;
    engine.confirm_start()?;

    take(writer, reader, engine)
}

/// The main function for the `exam` subcommand.
pub fn main_exam<W, R, S, C, X>(
    writer: &mut W,
    reader: &mut R,
    engine: &mut QuizEngine<S, C, X>,
    topic: Topic,
) -> Result<()>
where
    W: io::Write,
    R: Readline,
    S: RecordStore,
    C: Clock,
    X: Shuffler,
{
    let total = engine.start_session(topic, Mode::Exam)?.queue().len();
    let instructions = format!(
        "Exam: {}. You have {} to answer {} questions drawn from every difficulty. \
         Unanswered questions do not count against you, but the exam cannot be paused.",
        topic,
        format_clock(engine.config().exam_seconds),
        total
    );
    my_write!(writer, "\n")?;
    prettyprint_colored(writer, &instructions, "  ", Some(Color::BrightBlue), None)?;
    prettyprint(
        writer,
        "The clock keeps running while you think. The time shown is updated after each answer.",
        "  ",
    )?;
    my_write!(writer, "\n")?;

    if !yesno(reader, "Start the exam? ")? {
        engine.cancel()?;
        return my_writeln!(writer, "Exam not started.");
    }
    engine.confirm_start()?;

    take(writer, reader, engine)
}

/// Ask questions until the session ends or the user leaves it.
fn take<W, R, S, C, X>(
    writer: &mut W,
    reader: &mut R,
    engine: &mut QuizEngine<S, C, X>,
) -> Result<()>
where
    W: io::Write,
    R: Readline,
    S: RecordStore,
    C: Clock,
    X: Shuffler,
{
    let mut last_tick = Instant::now();

    while let Some(view) = engine.current_question() {
        let options = view.options.to_vec();
        let prefix = format!("  ({}/{}) ", view.number, view.total);
        my_write!(writer, "\n")?;
        prettyprint_colored(writer, view.text, &prefix, Some(Color::White), Some(Color::Cyan))?;
        for (letter, option) in LETTERS.chars().zip(options.iter()) {
            prettyprint(writer, option, &format!("     ({}) ", letter))?;
        }
        my_write!(writer, "\n")?;

        let message = match engine.time_display() {
            Some(clock) => format!("[{}] Enter a letter: ", clock),
            None => String::from("Enter a letter: "),
        };
        let guess = loop {
            match prompt(reader, &message)? {
                Some(response) => match letter_index(&response, options.len()) {
                    Some(index) => break Some(index),
                    None => my_writeln!(writer, "{}", "Please enter a letter.".white())?,
                },
                None => break None,
            }
        };

        // Charge the exam clock for the time spent on this question.
        let seconds = last_tick.elapsed().as_secs();
        last_tick += Duration::from_secs(seconds);
        if let Some(result) = engine.elapse(seconds) {
            my_writeln!(writer, "\n{}", "Time is up!".red())?;
            return output_results(writer, &result);
        }

        let index = match guess {
            Some(index) => index,
            None => {
                if leave(writer, reader, engine)? {
                    return Ok(());
                }
                continue;
            }
        };

        if let Some(answered) = engine.submit_answer(&options[index]) {
            if answered.correct {
                my_writeln!(writer, "{}", "Correct!".green())?;
            } else {
                let message = format!(
                    "{} The correct answer was {}.",
                    "Incorrect.".red(),
                    answered.correct_option.green()
                );
                prettyprint(writer, &message, "")?;
            }

            if let Some(result) = answered.finished {
                return output_results(writer, &result);
            }
        }
    }
    Ok(())
}

/// Handle the end of input in the middle of a session. Returns `true` if the session
/// was abandoned.
fn leave<W, R, S, C, X>(
    writer: &mut W,
    reader: &mut R,
    engine: &mut QuizEngine<S, C, X>,
) -> Result<bool>
where
    W: io::Write,
    R: Readline,
    S: RecordStore,
    C: Clock,
    X: Shuffler,
{
    if engine.exam_in_progress() {
        let answer = prompt(reader, "Leave the exam? Your answers will not be saved. ")?;
        // A second end of input also leaves.
        let leaving = answer.map_or(true, |a| a.to_lowercase().starts_with('y'));
        if !leaving {
            return Ok(false);
        }
        engine.cancel_exam_confirmed();
        my_writeln!(writer, "\n{}", "Exam abandoned.".red())?;
    } else {
        engine.cancel()?;
        my_writeln!(writer, "\n{}", "Session abandoned.".white())?;
    }
    Ok(true)
}

fn letter_index(response: &str, count: usize) -> Option<usize> {
    let mut chars = response.chars();
    let letter = chars.next()?.to_ascii_lowercase();
    if chars.next().is_some() {
        return None;
    }
    LETTERS.chars().take(count).position(|c| c == letter)
}

fn output_results<W: io::Write>(writer: &mut W, result: &SessionResult) -> Result<()> {
    let percentage = format!("{}%", result.record.percentage);
    let incorrect = result.total_answered as u32 - result.score;

    my_write!(writer, "\n\n")?;
    my_writeln!(
        writer,
        "{} {}",
        result.feedback.emoji(),
        result.feedback.title().bold()
    )?;
    my_write!(writer, "{}", "Score: ".white())?;
    my_write!(writer, "{}", percentage.cyan())?;
    my_write!(writer, "{}", " out of ".white())?;
    my_write!(writer, "{}", format!("{}", result.total_answered).cyan())?;
    if result.total_answered == 1 {
        my_writeln!(writer, "{}", " question".white())?;
    } else {
        my_writeln!(writer, "{}", " questions".white())?;
    }
    my_write!(writer, "  {}", format!("{}", result.score).bright_green())?;
    my_write!(writer, "{}\n", " correct".white())?;
    my_write!(writer, "  {}", format!("{}", incorrect).red())?;
    my_write!(writer, "{}\n", " incorrect".white())?;
    let unanswered = result.total_questions - result.total_answered;
    if unanswered > 0 {
        my_write!(writer, "  {}", format!("{}", unanswered).cyan())?;
        my_write!(writer, "{}\n", " unanswered".white())?;
    }

    match result.mastery_delta {
        Some(delta) if delta > 0 => {
            my_writeln!(writer, "\nMastery: up {} points", format!("{}", delta).green())?
        }
        Some(delta) if delta < 0 => {
            my_writeln!(writer, "\nMastery: down {} points", format!("{}", -delta).red())?
        }
        Some(_) => my_writeln!(writer, "\nMastery: consistent with previous practice")?,
        None => my_writeln!(writer, "\nMastery: first attempt at this topic")?,
    }

    if !result.strengths.is_empty() {
        prettyprint(writer, &result.strengths.join(", "), "Strengths: ")?;
    }
    if !result.improvements.is_empty() {
        prettyprint(writer, &result.improvements.join(", "), "Focus on: ")?;
    }
    if !result.saved {
        my_writeln!(
            writer,
            "{}",
            "Warning: this attempt could not be saved.".red()
        )?;
    }
    Ok(())
}

/// The main function for the `dashboard` subcommand.
pub fn main_dashboard<W: io::Write, S: RecordStore + ?Sized, C: Clock>(
    writer: &mut W,
    store: &S,
    bank: &QuestionBank,
    clock: &C,
) -> Result<()> {
    let progress = store.load(PROGRESS_KEY);
    let exams = store.load(EXAMS_KEY);

    if progress.is_empty() && exams.is_empty() {
        my_writeln!(writer, "No attempts have been recorded yet.")?;
    }

    for topic in bank.topics() {
        let summary = stats::topic_summary(&progress, topic);
        let best = summary
            .best
            .map(|b| format!("{}%", b))
            .unwrap_or_else(|| String::from("-"));
        let last = summary
            .last_attempt
            .map(|d| d.format("%Y-%m-%d").to_string())
            .unwrap_or_else(|| String::from("never"));
        let prefix = format!("{:<12}", topic.as_str());
        let line = format!(
            "mastery {:>3}%   best {:>4}   {:>2} attempts   last {}",
            summary.mastery, best, summary.attempts, last
        );
        prettyprint_colored(writer, &line, &prefix, None, Some(Color::Cyan))?;
    }

    let streak = stats::practice_streak(&progress, clock.now());
    my_write!(writer, "\n")?;
    my_writeln!(
        writer,
        "Overall average: {}",
        format!("{}%", stats::average(&progress).round()).cyan()
    )?;
    let days = if streak == 1 { "day" } else { "days" };
    my_writeln!(writer, "Practice streak: {} {}", format!("{}", streak).cyan(), days)?;
    my_writeln!(writer, "Exams taken: {}", format!("{}", exams.len()).cyan())?;

    if let Some(focus) = stats::focus(bank, &progress) {
        let concept = focus
            .concept
            .map(|c| format!(" ({})", c))
            .unwrap_or_default();
        let message = format!(
            "{}{} for {} minutes",
            focus.topic, concept, focus.minutes
        );
        prettyprint_colored(writer, &message, "Recommended focus: ", Some(Color::Yellow), None)?;
    }
    Ok(())
}

/// The main function for the `history` subcommand.
pub fn main_history<W: io::Write, S: RecordStore + ?Sized>(
    writer: &mut W,
    store: &S,
    num_to_show: Option<usize>,
    exams_only: bool,
) -> Result<()> {
    let progress = if exams_only {
        Vec::new()
    } else {
        store.load(PROGRESS_KEY)
    };
    let exams = store.load(EXAMS_KEY);

    let timeline = stats::timeline(&progress, &exams, num_to_show);
    if timeline.is_empty() {
        return my_writeln!(writer, "No attempts have been recorded yet.");
    }

    for record in timeline {
        let prefix = format!(
            "{}  {:<8} {:<12} {:>3}%  ",
            record.date.format("%Y-%m-%d %H:%M"),
            record.mode.as_str(),
            record.topic.as_str(),
            record.percentage
        );
        let weak = if record.weak_areas.is_empty() {
            String::from("-")
        } else {
            format!("weak: {}", record.weak_areas.join(", "))
        };
        prettyprint_colored(writer, &weak, &prefix, None, Some(Color::Cyan))?;
    }
    Ok(())
}

/// The main function for the `topics` subcommand.
pub fn main_topics<W: io::Write>(writer: &mut W, bank: &QuestionBank) -> Result<()> {
    let topics = bank.topics();
    if topics.is_empty() {
        return Err(QuizError::EmptyQuiz);
    }

    my_writeln!(writer, "Available topics:")?;
    for topic in topics {
        my_writeln!(writer, "  {} ({} questions)", topic, bank.count(topic))?;
    }
    Ok(())
}
